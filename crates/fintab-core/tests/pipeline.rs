//! End-to-end runs over a synthetic three-page report.

use std::path::{Path, PathBuf};

use fintab_core::crossval::compare;
use fintab_core::{FintabConfig, PageScanner, PdfDocument, TableExtractor, TextExtractor};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;

fn text_op(x: u32, y: u32, text: &str) -> String {
    format!("BT /F1 10 Tf {} {} Td ({}) Tj ET\n", x, y, text)
}

fn page_content(lines: &[(u32, u32, &str)]) -> Vec<u8> {
    lines
        .iter()
        .map(|&(x, y, text)| text_op(x, y, text))
        .collect::<String>()
        .into_bytes()
}

/// Page 1 is a cover, page 2 an income statement, page 3 notes.
fn synthetic_report(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let contents = [
        page_content(&[(50, 740, "Quarterly Report"), (50, 720, "Third quarter")]),
        page_content(&[
            (50, 740, "Income Statement"),
            (200, 700, "3Q25"),
            (300, 700, "3Q24"),
            (50, 685, "Revenue"),
            (200, 685, "1,500.0"),
            (300, 685, "1,200.0"),
            (50, 670, "Net Income"),
            (200, 670, "300"),
            (300, 670, "250"),
        ]),
        page_content(&[(50, 740, "Notes to the report")]),
    ];

    let kids: Vec<Object> = contents
        .into_iter()
        .map(|content| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("3Q25.pdf");
    synthetic_report(&pdf);
    (dir, pdf)
}

#[test]
fn scan_finds_the_statement_page() {
    let (_dir, pdf) = setup();
    let doc = PdfDocument::open(&pdf, None).unwrap();
    let report = PageScanner::new(&FintabConfig::default()).scan(&doc);

    assert_eq!(report.total_pages, 3);
    assert_eq!(report.pages.len(), 3);

    let page = report.page(2).unwrap();
    assert_eq!(page.tables, 1);
    assert!(page.financial_keywords.contains(&"net income".to_string()));
    assert!(page.preview.starts_with("Income Statement | "));

    assert_eq!(report.page(1).unwrap().tables, 0);
    assert!(report.financial_pages.contains(&2));
}

#[test]
fn extract_writes_one_csv_for_the_statement() {
    let (dir, pdf) = setup();
    let out = dir.path().join("tables");
    let metadata = TableExtractor::new(&FintabConfig::default())
        .extract_file(&pdf, None, &[2], &out)
        .unwrap();

    assert_eq!(metadata.pages_extracted, vec![2]);
    assert_eq!(metadata.tables.len(), 1);
    assert_eq!(metadata.tables[0].file, "page_2_table_1.csv");
    assert_eq!(metadata.tables[0].rows, 3);

    let csv = std::fs::read_to_string(out.join("page_2_table_1.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], r#""Revenue","1,500.0","1,200.0""#);
    assert!(out.join("_metadata.json").is_file());
}

#[test]
fn extraction_is_idempotent() {
    let (dir, pdf) = setup();
    let extractor = TableExtractor::new(&FintabConfig::default());
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    extractor.extract_file(&pdf, None, &[1, 2, 3], &first).unwrap();
    extractor.extract_file(&pdf, None, &[1, 2, 3], &second).unwrap();

    let read = |d: &Path| std::fs::read(d.join("page_2_table_1.csv")).unwrap();
    assert_eq!(read(&first), read(&second));
}

#[test]
fn text_and_compare_agree_with_tables() {
    let (dir, pdf) = setup();
    let config = FintabConfig::default();
    let out = dir.path().join("tables");
    TableExtractor::new(&config).extract_file(&pdf, None, &[2], &out).unwrap();

    let report = TextExtractor::new(&config).extract_file(&pdf, None, &[2]).unwrap();
    let page = report.page(2).unwrap();
    assert!(page.text_simple.contains("Net Income"));
    assert!(page.text_layout.contains("Net Income"));

    let validation = compare(&out, &report).unwrap();
    assert_eq!(validation.rows_compared, 2);
    assert_eq!(validation.rows_matched, 2);
}

#[test]
fn missing_input_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("tables");
    let err = TableExtractor::new(&FintabConfig::default())
        .extract_file(&dir.path().join("missing.pdf"), None, &[1], &out)
        .unwrap_err();

    assert!(err.to_string().contains("not found"));
    assert!(!out.exists());
}

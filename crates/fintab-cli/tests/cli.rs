use std::path::Path;

use assert_cmd::Command;
use lopdf::{dictionary, Document, Object, Stream};
use predicates::prelude::*;

fn fintab() -> Command {
    Command::cargo_bin("fintab").unwrap()
}

/// Two pages: a cover and an income statement.
fn write_report(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let pages: [&[(u32, u32, &str)]; 2] = [
        &[(50, 740, "Quarterly Report")],
        &[
            (50, 740, "Income Statement"),
            (200, 700, "3Q25"),
            (300, 700, "3Q24"),
            (50, 685, "Revenue"),
            (200, 685, "1,500.0"),
            (300, 685, "1,200.0"),
            (50, 670, "Net Income"),
            (200, 670, "300"),
            (300, 670, "250"),
        ],
    ];

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let content: String = lines
            .iter()
            .map(|(x, y, text)| format!("BT /F1 10 Tf {} {} Td ({}) Tj ET\n", x, y, text))
            .collect();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

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

#[test]
fn help_lists_subcommands() {
    fintab()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("combine"));
}

#[test]
fn scan_reports_pages() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("3Q25.pdf");
    write_report(&pdf);

    fintab()
        .arg("scan")
        .arg(&pdf)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_pages\": 2"))
        .stdout(predicate::str::contains("net income"));
}

#[test]
fn scan_missing_file_prints_json_error() {
    fintab()
        .args(["scan", "/nonexistent/report.pdf"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn extract_writes_csv_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("3Q25.pdf");
    let out = dir.path().join("tables");
    write_report(&pdf);

    fintab()
        .arg("extract")
        .arg(&pdf)
        .arg(&out)
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("page_2_table_1.csv"));

    assert!(out.join("page_2_table_1.csv").is_file());
    assert!(out.join("_metadata.json").is_file());
}

#[test]
fn extract_rejects_bad_page_spec_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("3Q25.pdf");
    let out = dir.path().join("tables");
    write_report(&pdf);

    fintab()
        .arg("extract")
        .arg(&pdf)
        .arg(&out)
        .arg("abc")
        .assert()
        .failure();

    assert!(!out.exists());
}

#[test]
fn text_then_compare() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("3Q25.pdf");
    let out = dir.path().join("tables");
    let text = dir.path().join("text.json");
    write_report(&pdf);

    fintab().arg("extract").arg(&pdf).arg(&out).arg("2").assert().success();

    fintab()
        .arg("text")
        .arg(&pdf)
        .arg("2")
        .arg("--output")
        .arg(&text)
        .assert()
        .success();
    let content = std::fs::read_to_string(&text).unwrap();
    assert!(content.contains("Net Income"));

    fintab()
        .arg("compare")
        .arg(&out)
        .arg(&text)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows_matched\": 2"));
}

#[test]
fn config_init_get_set() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");

    fintab()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.is_file());

    fintab()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "batch.max_pages", "4"])
        .assert()
        .success();

    fintab()
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "batch.max_pages"])
        .assert()
        .success()
        .stdout(predicate::str::diff("4\n"));

    fintab()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "batch.unknown", "1"])
        .assert()
        .failure();
}

#[test]
fn batch_then_combine() {
    let dir = tempfile::tempdir().unwrap();
    let reports = dir.path().join("reports");
    let out = dir.path().join("out");
    std::fs::create_dir(&reports).unwrap();
    write_report(&reports.join("3Q25.pdf"));

    fintab()
        .arg("batch")
        .arg(&reports)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"successful\": 1"));
    assert!(out.join("3Q25_tables").join("income_statement_3Q25.csv").is_file());

    fintab()
        .arg("combine")
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("combined_income_statement.csv").is_file());
}

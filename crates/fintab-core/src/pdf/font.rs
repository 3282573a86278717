//! Font metrics and character decoding for text-showing operators.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use tracing::trace;

lazy_static! {
    static ref BFCHAR_BLOCK: Regex = Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE_BLOCK: Regex = Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
    static ref BFCHAR_ENTRY: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
    static ref BFRANGE_ENTRY: Regex = Regex::new(
        r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]*)>|\[([^\]]*)\])"
    )
    .unwrap();
    static ref HEX_TOKEN: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
}

/// Largest `bfrange` expanded into the lookup table.
const MAX_RANGE: u32 = 0x1_0000;

/// WinAnsiEncoding code points 0x80..=0x9F (the rest follows Latin-1).
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
    '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
    '\u{FFFD}', 'ž', 'Ÿ',
];

/// A decoded glyph: character code, Unicode text, and advance width in
/// thousandths of text space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    pub code: u32,
    pub text: String,
    pub width: f64,
}

/// Decoding and width information for one font resource.
#[derive(Debug, Clone)]
pub(crate) struct FontInfo {
    two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: BTreeMap<u32, f64>,
    default_width: f64,
    to_unicode: BTreeMap<u32, String>,
    differences: BTreeMap<u32, String>,
}

impl FontInfo {
    /// Font used when the resource cannot be resolved.
    pub fn fallback() -> Self {
        Self {
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: BTreeMap::new(),
            default_width: 500.0,
            to_unicode: BTreeMap::new(),
            differences: BTreeMap::new(),
        }
    }

    /// Build font information from a font dictionary.
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let mut font = Self::fallback();

        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"Type1");

        if subtype == b"Type0" {
            font.two_byte = true;
            font.default_width = 1000.0;
            if let Some(descendant) = descendant_font(doc, dict) {
                if let Some(dw) = get_number(doc, descendant, b"DW") {
                    font.default_width = dw;
                }
                if let Some(Object::Array(w)) = get_resolved(doc, descendant, b"W") {
                    font.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            font.first_char = get_number(doc, dict, b"FirstChar").unwrap_or(0.0) as u32;
            if let Some(Object::Array(widths)) = get_resolved(doc, dict, b"Widths") {
                font.widths = widths
                    .iter()
                    .map(|w| resolve_number(doc, w).unwrap_or(0.0))
                    .collect();
            }
            if let Some(Object::Dictionary(descriptor)) = get_resolved(doc, dict, b"FontDescriptor") {
                if let Some(missing) = get_number(doc, descriptor, b"MissingWidth") {
                    if missing > 0.0 {
                        font.default_width = missing;
                    }
                }
            }
            if let Some(Object::Dictionary(encoding)) = get_resolved(doc, dict, b"Encoding") {
                if let Some(Object::Array(diffs)) = get_resolved(doc, encoding, b"Differences") {
                    font.differences = parse_differences(diffs);
                }
            }
        }

        if let Some(Object::Stream(stream)) = get_resolved(doc, dict, b"ToUnicode") {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            font.to_unicode = parse_to_unicode(&String::from_utf8_lossy(&data));
            trace!("Parsed ToUnicode map with {} entries", font.to_unicode.len());
        }

        font
    }

    /// Whether codes are two bytes wide.
    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Split a string operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = if pair.len() == 2 {
                        (u32::from(pair[0]) << 8) | u32::from(pair[1])
                    } else {
                        u32::from(pair[0])
                    };
                    self.glyph(code)
                })
                .collect()
        } else {
            bytes.iter().map(|b| self.glyph(u32::from(*b))).collect()
        }
    }

    fn glyph(&self, code: u32) -> Glyph {
        let text = if let Some(mapped) = self.to_unicode.get(&code) {
            mapped.clone()
        } else if let Some(name) = self.differences.get(&code) {
            glyph_name_to_text(name).unwrap_or_else(|| single_byte_text(code))
        } else if self.two_byte {
            char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_else(|| "\u{FFFD}".to_string())
        } else {
            single_byte_text(code)
        };

        Glyph {
            code,
            text,
            width: self.width(code),
        }
    }

    fn width(&self, code: u32) -> f64 {
        if self.two_byte {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|idx| self.widths.get(idx as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }
}

fn descendant_font<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    match get_resolved(doc, dict, b"DescendantFonts")? {
        Object::Array(fonts) => {
            let first = fonts.first()?;
            match doc.dereference(first).ok()?.1 {
                Object::Dictionary(d) => Some(d),
                _ => None,
            }
        }
        _ => None,
    }
}

fn get_resolved<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let obj = dict.get(key).ok()?;
    doc.dereference(obj).ok().map(|(_, o)| o)
}

fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    get_resolved(doc, dict, key).and_then(|o| resolve_number(doc, o))
}

/// Read an integer or real operand as `f64`.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn resolve_number(doc: &Document, obj: &Object) -> Option<f64> {
    match obj {
        Object::Reference(_) => doc.dereference(obj).ok().and_then(|(_, o)| number(o)),
        other => number(other),
    }
}

/// Parse a CIDFont `W` array: `c [w1 w2 ...]` and `cfirst clast w` forms.
fn parse_cid_widths(doc: &Document, w: &[Object]) -> BTreeMap<u32, f64> {
    let mut widths = BTreeMap::new();
    let mut i = 0;

    while i < w.len() {
        let Some(first) = resolve_number(doc, &w[i]) else {
            i += 1;
            continue;
        };
        match w.get(i + 1) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    if let Some(width) = resolve_number(doc, width) {
                        widths.insert(first as u32 + offset as u32, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (
                    resolve_number(doc, last),
                    w.get(i + 2).and_then(|o| resolve_number(doc, o)),
                ) else {
                    break;
                };
                let (first, last) = (first as u32, last as u32);
                if last >= first && last - first <= MAX_RANGE {
                    for code in first..=last {
                        widths.insert(code, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}

fn parse_differences(diffs: &[Object]) -> BTreeMap<u32, String> {
    let mut map = BTreeMap::new();
    let mut code = 0u32;

    for item in diffs {
        match item {
            Object::Integer(start) => code = (*start).max(0) as u32,
            Object::Name(name) => {
                map.insert(code, String::from_utf8_lossy(name).into_owned());
                code += 1;
            }
            _ => {}
        }
    }

    map
}

/// Parse the `bfchar`/`bfrange` sections of a ToUnicode CMap.
pub(crate) fn parse_to_unicode(cmap: &str) -> BTreeMap<u32, String> {
    let mut map = BTreeMap::new();

    for block in BFCHAR_BLOCK.captures_iter(cmap) {
        for entry in BFCHAR_ENTRY.captures_iter(&block[1]) {
            if let Some(code) = hex_code(&entry[1]) {
                map.insert(code, utf16_hex(&entry[2]));
            }
        }
    }

    for block in BFRANGE_BLOCK.captures_iter(cmap) {
        for entry in BFRANGE_ENTRY.captures_iter(&block[1]) {
            let (Some(lo), Some(hi)) = (hex_code(&entry[1]), hex_code(&entry[2])) else {
                continue;
            };
            if hi < lo || hi - lo > MAX_RANGE {
                continue;
            }

            if let Some(dst) = entry.get(3) {
                let mut units = hex_units(dst.as_str());
                for code in lo..=hi {
                    map.insert(code, String::from_utf16_lossy(&units));
                    if let Some(last) = units.last_mut() {
                        *last = last.wrapping_add(1);
                    }
                }
            } else if let Some(list) = entry.get(4) {
                for (offset, token) in HEX_TOKEN.captures_iter(list.as_str()).enumerate() {
                    let code = lo + offset as u32;
                    if code > hi {
                        break;
                    }
                    map.insert(code, utf16_hex(&token[1]));
                }
            }
        }
    }

    map
}

fn hex_code(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok()
}

fn hex_units(hex: &str) -> Vec<u16> {
    let bytes: Vec<u8> = hex
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect();
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_hex(hex: &str) -> String {
    String::from_utf16_lossy(&hex_units(hex))
}

fn single_byte_text(code: u32) -> String {
    let c = match code {
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
    };
    if c.is_control() && c != '\t' {
        return " ".to_string();
    }
    c.to_string()
}

/// Map the glyph names most common in financial reports.
fn glyph_name_to_text(name: &str) -> Option<String> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            return u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from);
        }
    }
    if name.chars().count() == 1 {
        return Some(name.to_string());
    }

    let text = match name {
        "space" => " ",
        "bullet" => "•",
        "endash" => "–",
        "emdash" => "—",
        "hyphen" | "minus" => "-",
        "period" => ".",
        "comma" => ",",
        "parenleft" => "(",
        "parenright" => ")",
        "dollar" => "$",
        "percent" => "%",
        "quoteright" => "’",
        "quoteleft" => "‘",
        "zero" => "0",
        "one" => "1",
        "two" => "2",
        "three" => "3",
        "four" => "4",
        "five" => "5",
        "six" => "6",
        "seven" => "7",
        "eight" => "8",
        "nine" => "9",
        "aacute" => "á",
        "eacute" => "é",
        "iacute" => "í",
        "oacute" => "ó",
        "uacute" => "ú",
        "ntilde" => "ñ",
        _ => return None,
    };
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_to_unicode() {
        let cmap = r#"
            /CIDInit /ProcSet findresource begin
            2 beginbfchar
            <0003> <0020>
            <0011> <0041>
            endbfchar
            1 beginbfrange
            <0020> <0022> <0061>
            endbfrange
            1 beginbfrange
            <0030> <0031> [<00F3> <00F1>]
            endbfrange
        "#;
        let map = parse_to_unicode(cmap);

        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("A"));
        assert_eq!(map.get(&0x20).map(String::as_str), Some("a"));
        assert_eq!(map.get(&0x22).map(String::as_str), Some("c"));
        assert_eq!(map.get(&0x30).map(String::as_str), Some("ó"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("ñ"));
    }

    #[test]
    fn test_win_ansi_bullet() {
        let font = FontInfo::fallback();
        let glyphs = font.decode(&[0x95, b'A']);
        assert_eq!(glyphs[0].text, "•");
        assert_eq!(glyphs[1].text, "A");
        assert_eq!(glyphs[1].width, 500.0);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_text("bullet").as_deref(), Some("•"));
        assert_eq!(glyph_name_to_text("uni00E9").as_deref(), Some("é"));
        assert_eq!(glyph_name_to_text("x").as_deref(), Some("x"));
        assert_eq!(glyph_name_to_text("unknownglyph"), None);
    }
}

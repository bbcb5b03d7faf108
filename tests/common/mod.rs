#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use std::{fs, io};

use a4_preview::fonts::FontSet;
use a4_preview::measure::MeasureSurface;
use a4_preview::{A4Preview, Margins};
use serde_json::Value;

fn load_skiplist() -> HashSet<String> {
    let path = Path::new("tests/fixtures/SKIPLIST");
    let Ok(content) = fs::read_to_string(path) else {
        return HashSet::new();
    };
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect()
}

pub fn case_name(fixture: &Path) -> String {
    fixture
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

/// Output directory: tests/output/<case>/
pub fn output_dir(fixture: &Path) -> PathBuf {
    PathBuf::from("tests/output").join(case_name(fixture))
}

/// Discover fixture directories holding a `document.json`. Filter with
/// A4_PREVIEW_CASE (case name).
pub fn discover_fixtures() -> io::Result<Vec<PathBuf>> {
    let fixtures_dir = Path::new("tests/fixtures");
    let case_filter = std::env::var("A4_PREVIEW_CASE").ok();
    let skiplist = load_skiplist();
    let mut fixtures: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(fixtures_dir)? {
        let path = entry?.path();
        if !path.is_dir() || !path.join("document.json").exists() {
            continue;
        }
        let name = case_name(&path);
        match &case_filter {
            Some(filter) if name != *filter => {}
            Some(_) => fixtures.push(path),
            None if skiplist.contains(&name) => {}
            None => fixtures.push(path),
        }
    }
    fixtures.sort();
    Ok(fixtures)
}

/// Mounted preview on built-in metrics with one pass already committed.
pub fn committed(document: Value, margins: Margins) -> A4Preview {
    let mut preview = A4Preview::new(document).with_margins(margins);
    preview.mount(MeasureSurface::new(FontSet::builtin()), Instant::now());
    preview.recompute_now();
    preview
}

pub fn partition(document: Value, margins: Margins) -> Vec<Vec<usize>> {
    committed(document, margins).page_list().partition()
}

/// `n` one-line paragraphs.
pub fn short_paragraphs(n: usize) -> String {
    (1..=n).map(|i| format!("<p>Madde {i}</p>")).collect()
}

/// `n` paragraphs of a few wrapped lines each.
pub fn long_paragraphs(n: usize) -> String {
    let sentence = "Sendikamızın olağan genel kurul toplantısı tüzüğün ilgili maddeleri uyarınca yapılacaktır. ";
    (0..n)
        .map(|i| format!("<p>{}</p>", sentence.repeat(2 + i % 3)))
        .collect()
}

pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

pub fn pdf_page_count(pdf: &[u8]) -> usize {
    count(pdf, b"/Type /Page") - count(pdf, b"/Type /Pages")
}

/// Inflated bodies of every Flate stream in the file, in object order.
pub fn pdf_streams(pdf: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = pdf;
    while let Some(start) = find(rest, b"stream\n") {
        let body = &rest[start + b"stream\n".len()..];
        let Some(end) = find(body, b"endstream") else {
            break;
        };
        let data = body[..end].strip_suffix(b"\n").unwrap_or(&body[..end]);
        if let Ok(inflated) = miniz_oxide::inflate::decompress_to_vec_zlib(data) {
            out.push(inflated);
        }
        rest = &body[end + b"endstream".len()..];
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

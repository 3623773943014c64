use std::io::{self, Write};

use mdpage_pdf::{PdfOptions, PdfRenderer};
use mdpage_render::{CanvasError, RenderEngineOptions, RenderError};

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn plain_renderer() -> PdfRenderer {
    PdfRenderer::new(
        RenderEngineOptions::default(),
        PdfOptions {
            compress: false,
            ..PdfOptions::default()
        },
    )
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn output_is_a_pdf_file() {
    let doc = PdfRenderer::default().render("# Title\n\nbody").unwrap();
    let bytes = doc.as_bytes();
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(contains(bytes, b"%%EOF"));
    assert!(contains(bytes, b"/FlateDecode"));
    assert_eq!(doc.page_count(), 1);
}

#[test]
fn empty_document_has_one_page() {
    let doc = PdfRenderer::default().render("").unwrap();
    assert_eq!(doc.page_count(), 1);
    assert!(contains(doc.as_bytes(), b"/Count 1"));
}

#[test]
fn heading_is_drawn_in_bold_at_heading_size() {
    let doc = plain_renderer().render("# Title\n\nHello **world**").unwrap();
    let bytes = doc.as_bytes();
    assert!(contains(bytes, b"/F2 24 Tf"));
    assert!(contains(bytes, b"(Title) Tj"));
    assert!(contains(bytes, b"(Hello ) Tj"));
    assert!(contains(bytes, b"/BaseFont /Helvetica-Bold"));
    assert!(contains(bytes, b"/Title (Title)"));
}

#[test]
fn explicit_title_wins_over_first_heading() {
    let renderer = PdfRenderer::new(
        RenderEngineOptions::default(),
        PdfOptions {
            compress: false,
            title: Some("Report".to_string()),
        },
    );
    let doc = renderer.render("# Heading").unwrap();
    assert!(contains(doc.as_bytes(), b"/Title (Report)"));
}

#[test]
fn bullets_are_encoded_as_winansi() {
    let doc = plain_renderer().render("- item\n").unwrap();
    assert_eq!(doc.report().substituted_chars, 0);
    assert!(!contains(doc.as_bytes(), b"(? item) Tj"));
}

#[test]
fn unsupported_characters_are_counted() {
    let doc = plain_renderer().render("snow \u{2603} man").unwrap();
    assert_eq!(doc.report().substituted_chars, 1);
    assert!(contains(doc.as_bytes(), b"(snow ? man) Tj"));
}

#[test]
fn latin_symbols_encode_and_cjk_is_substituted() {
    let markdown = "# Special Characters\n\n\
                    Accents: \u{e1}\u{e9}\u{ed}\u{f3}\u{fa} \u{f1}\n\n\
                    - symbols: \u{a9} \u{ae} \u{2122} \u{20ac} \u{a3} \u{a5}\n\
                    - unicode: \u{4f60}\u{597d} \u{c548}\u{b155}\u{d558}\u{c138}\u{c694}\n";
    let doc = plain_renderer().render(markdown).unwrap();
    assert_eq!(doc.report().substituted_chars, 7);
    assert_eq!(doc.page_count(), 1);
}

#[test]
fn long_document_spans_many_pages() {
    let markdown: String = (1..=200)
        .map(|n| format!("# Section {n}\n\nBody text\n"))
        .collect();
    let doc = PdfRenderer::default().render(&markdown).unwrap();
    assert!(doc.page_count() > 1);
    let count = format!("/Count {}", doc.page_count());
    assert!(contains(doc.as_bytes(), count.as_bytes()));
    assert_eq!(doc.report().summary.blocks, 400);
}

#[test]
fn writer_failure_is_a_render_failure() {
    let err = PdfRenderer::default()
        .render_to_writer("# Title", BrokenPipe)
        .unwrap_err();
    assert!(matches!(err, RenderError::RenderFailure(CanvasError::Io(_))));
    assert!(!err.is_client_error());
}

#[test]
fn malformed_input_writes_nothing() {
    let mut out = Vec::new();
    let err = PdfRenderer::default()
        .render_to_writer("bad\0input", &mut out)
        .unwrap_err();
    assert!(err.is_client_error());
    assert!(out.is_empty());
}

#[test]
fn render_to_writer_reports_bytes() {
    let mut out = Vec::new();
    let report = PdfRenderer::default()
        .render_to_writer("para one\n\npara two", &mut out)
        .unwrap();
    assert_eq!(report.pages, 1);
    assert_eq!(report.bytes_written, out.len());
    assert_eq!(report.summary.blocks, 2);
}

#[cfg(feature = "async")]
#[tokio::test]
async fn document_writes_to_async_writer() {
    let doc = PdfRenderer::default().render("# Async").unwrap();
    let mut out: Vec<u8> = Vec::new();
    doc.write_to_async(&mut out).await.unwrap();
    assert_eq!(out, doc.as_bytes());
}

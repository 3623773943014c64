//! PDF output for `mdpage` render pages.
//!
//! [`PdfRenderer`] runs the render engine with standard-font metrics and
//! writes each page to the output as soon as the canvas closes it. Text uses the
//! built-in Helvetica, Helvetica-Bold, and Courier fonts with WinAnsi
//! encoding, so no font data is embedded.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod fonts;

use std::io::Write;
use std::sync::Arc;

use mdpage::{split_inline, Token, Tokenizer};
use mdpage_render::{
    BlockOptions, CanvasError, DrawCommand, FontFace, LayoutConfig, PageSink, RenderEngine,
    RenderEngineOptions, RenderError, RenderPage, RenderSummary, TextCommand,
};
use pdf_writer::{Chunk, Content, Filter, Name, Rect, Ref, Str, TextStr};
use pdf_writer::writers::{Catalog, DocumentInfo};
use serde::{Deserialize, Serialize};

pub use fonts::StandardFontMeasurer;

const PRODUCER: &str = concat!("mdpage ", env!("CARGO_PKG_VERSION"));
const PDF_HEADER: &[u8] = b"%PDF-1.7\n%\x80\x80\x80\x80\n\n";

/// PDF serialization options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    /// Deflate page content streams.
    pub compress: bool,
    /// Document title. Defaults to the first heading.
    pub title: Option<String>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            compress: true,
            title: None,
        }
    }
}

/// Complete configuration for PDF rendering, as read from a JSON file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub layout: LayoutConfig,
    pub blocks: BlockOptions,
    pub pdf: PdfOptions,
}

impl PdfConfig {
    /// Parse a JSON document. Missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn into_renderer(self) -> PdfRenderer {
        let engine_opts = RenderEngineOptions {
            layout: self.layout,
            blocks: self.blocks,
            ..RenderEngineOptions::default()
        };
        PdfRenderer::new(engine_opts, self.pdf)
    }
}

/// Counters for one written PDF.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PdfReport {
    pub pages: usize,
    pub bytes_written: usize,
    /// Characters replaced because WinAnsi has no code for them.
    pub substituted_chars: usize,
    pub summary: RenderSummary,
}

/// In-memory PDF.
#[derive(Clone, Debug)]
pub struct PdfDocument {
    bytes: Vec<u8>,
    report: PdfReport,
}

impl PdfDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.report.pages
    }

    pub fn report(&self) -> &PdfReport {
        &self.report
    }

    /// Write the document to an async writer and flush it.
    #[cfg(feature = "async")]
    pub async fn write_to_async<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        use tokio::io::AsyncWriteExt;

        writer.write_all(&self.bytes).await?;
        writer.flush().await
    }
}

struct ObjectIds {
    catalog: Ref,
    pages: Ref,
    info: Ref,
    fonts: [Ref; 3],
    next: i32,
}

impl ObjectIds {
    fn new() -> Self {
        Self {
            catalog: Ref::new(1),
            pages: Ref::new(2),
            info: Ref::new(3),
            fonts: [Ref::new(4), Ref::new(5), Ref::new(6)],
            next: 7,
        }
    }

    fn alloc(&mut self) -> Ref {
        let id = Ref::new(self.next);
        self.next += 1;
        id
    }
}

/// Page sink that streams a PDF into a writer.
///
/// The file header and font objects are written with the first page. Each
/// page's content stream and page object go out as soon as the page
/// arrives; the page tree, catalog, info dictionary and cross-reference
/// table follow on close. Nothing is written before the first page.
pub struct PdfSink<W: Write> {
    writer: W,
    ids: ObjectIds,
    /// Byte offset of each object, indexed by object number minus one.
    offsets: Vec<usize>,
    page_refs: Vec<Ref>,
    page_width: f32,
    page_height: f32,
    compress: bool,
    title: Option<String>,
    started: bool,
    closed: bool,
    bytes_written: usize,
    substituted_chars: usize,
}

impl<W: Write> PdfSink<W> {
    pub fn new(writer: W, layout: &LayoutConfig, opts: &PdfOptions) -> Self {
        Self {
            writer,
            ids: ObjectIds::new(),
            offsets: Vec::with_capacity(16),
            page_refs: Vec::with_capacity(8),
            page_width: layout.page_width,
            page_height: layout.page_height,
            compress: opts.compress,
            title: opts.title.clone(),
            started: false,
            closed: false,
            bytes_written: 0,
            substituted_chars: 0,
        }
    }

    /// Set the document title written to the info dictionary.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn pages_written(&self) -> usize {
        self.page_refs.len()
    }

    /// Bytes handed to the writer so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Consume the sink, returning the writer.
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CanvasError> {
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len();
        Ok(())
    }

    /// Write one indirect object built by `build` and record its offset.
    fn write_object<F>(&mut self, id: Ref, build: F) -> Result<(), CanvasError>
    where
        F: FnOnce(&mut Chunk),
    {
        let mut chunk = Chunk::new();
        build(&mut chunk);
        let index = usize::try_from(id.get() - 1).unwrap_or(0);
        if self.offsets.len() <= index {
            self.offsets.resize(index + 1, 0);
        }
        self.offsets[index] = self.bytes_written;
        self.write_raw(chunk.as_bytes())
    }

    fn start(&mut self) -> Result<(), CanvasError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        self.write_raw(PDF_HEADER)?;
        for (face, id) in fonts::FACES.iter().zip(self.ids.fonts) {
            self.write_object(id, |chunk| {
                chunk
                    .type1_font(id)
                    .base_font(Name(fonts::base_font(*face)))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
            })?;
        }
        Ok(())
    }

    fn write_xref(&mut self) -> Result<(), CanvasError> {
        let xref_offset = self.bytes_written;
        let mut table = String::with_capacity(64 + self.offsets.len() * 20);
        table.push_str(&format!("xref\n0 {}\n", self.offsets.len() + 1));
        table.push_str("0000000000 65535 f\r\n");
        for offset in &self.offsets {
            table.push_str(&format!("{:010} 00000 n\r\n", offset));
        }
        table.push_str(&format!(
            "trailer\n<<\n  /Size {}\n  /Root {} 0 R\n  /Info {} 0 R\n>>\nstartxref\n{}\n%%EOF",
            self.offsets.len() + 1,
            self.ids.catalog.get(),
            self.ids.info.get(),
            xref_offset
        ));
        self.write_raw(table.as_bytes())
    }

    fn encode_content(&mut self, page: &RenderPage) -> Vec<u8> {
        let mut content = Content::new();
        let mut text_open = false;
        let mut current_font: Option<(FontFace, f32)> = None;
        for cmd in page.commands() {
            match cmd {
                DrawCommand::Text(run) => {
                    if !text_open {
                        content.begin_text();
                        content.next_line(run.x, self.page_height - run.baseline_y);
                        text_open = true;
                        current_font = None;
                    }
                    self.show_run(&mut content, run, &mut current_font);
                    if !run.continued {
                        content.end_text();
                        text_open = false;
                    }
                }
                DrawCommand::Rule(rule) => {
                    if text_open {
                        content.end_text();
                        text_open = false;
                    }
                    content.set_line_width(rule.thickness);
                    content.move_to(rule.x1, self.page_height - rule.y1);
                    content.line_to(rule.x2, self.page_height - rule.y2);
                    content.stroke();
                }
            }
        }
        if text_open {
            content.end_text();
        }
        content.finish()
    }

    fn show_run(
        &mut self,
        content: &mut Content,
        run: &TextCommand,
        current_font: &mut Option<(FontFace, f32)>,
    ) {
        let font = (run.style.face, run.style.size_pt);
        if *current_font != Some(font) {
            content.set_font(Name(fonts::resource_name(font.0)), font.1);
            *current_font = Some(font);
        }
        let (bytes, substituted) = fonts::encode_winansi(&run.text);
        if substituted > 0 {
            log::warn!(
                "page text has {} characters outside WinAnsi; replaced with '?'",
                substituted
            );
            self.substituted_chars += substituted;
        }
        content.show(Str(&bytes));
    }

    fn report(&self, summary: RenderSummary) -> PdfReport {
        PdfReport {
            pages: self.page_refs.len(),
            bytes_written: self.bytes_written,
            substituted_chars: self.substituted_chars,
            summary,
        }
    }
}

impl<W: Write> PageSink for PdfSink<W> {
    fn accept_page(&mut self, page: RenderPage) -> Result<(), CanvasError> {
        if self.closed {
            return Err(CanvasError::Closed);
        }
        self.start()?;
        let raw = self.encode_content(&page);
        let page_id = self.ids.alloc();
        let content_id = self.ids.alloc();
        if self.compress {
            let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6);
            self.write_object(content_id, |chunk| {
                chunk
                    .stream(content_id, &compressed)
                    .filter(Filter::FlateDecode);
            })?;
        } else {
            self.write_object(content_id, |chunk| {
                chunk.stream(content_id, &raw);
            })?;
        }

        let media_box = Rect::new(0.0, 0.0, self.page_width, self.page_height);
        let parent = self.ids.pages;
        let font_ids = self.ids.fonts;
        self.write_object(page_id, |chunk| {
            let mut pdf_page = chunk.page(page_id);
            pdf_page
                .media_box(media_box)
                .parent(parent)
                .contents(content_id);
            pdf_page
                .resources()
                .fonts()
                .pair(Name(fonts::resource_name(FontFace::Normal)), font_ids[0])
                .pair(Name(fonts::resource_name(FontFace::Bold)), font_ids[1])
                .pair(Name(fonts::resource_name(FontFace::Monospace)), font_ids[2]);
        })?;

        self.page_refs.push(page_id);
        log::debug!(
            "pdf page {} written ({} content bytes)",
            page.page_number,
            raw.len()
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), CanvasError> {
        if self.closed {
            return Err(CanvasError::Closed);
        }
        self.closed = true;
        let count = i32::try_from(self.page_refs.len()).map_err(|_| CanvasError::LimitExceeded {
            kind: "pdf_page_count",
            actual: self.page_refs.len(),
            limit: i32::MAX as usize,
        })?;
        self.start()?;

        let (catalog, pages, info) = (self.ids.catalog, self.ids.pages, self.ids.info);
        self.write_object(catalog, |chunk| {
            chunk.indirect(catalog).start::<Catalog>().pages(pages);
        })?;
        let kids = self.page_refs.clone();
        self.write_object(pages, |chunk| {
            chunk.pages(pages).kids(kids.iter().copied()).count(count);
        })?;
        let title = self.title.clone();
        self.write_object(info, |chunk| {
            let mut doc_info = chunk.indirect(info).start::<DocumentInfo>();
            doc_info.producer(TextStr(PRODUCER));
            if let Some(title) = title.as_deref() {
                doc_info.title(TextStr(title));
            }
        })?;
        self.write_xref()?;
        self.writer.flush()?;
        log::debug!(
            "pdf written: pages={} bytes={} substituted_chars={}",
            self.page_refs.len(),
            self.bytes_written,
            self.substituted_chars
        );
        Ok(())
    }

    fn abort(&mut self) {
        self.closed = true;
        self.page_refs.clear();
    }
}

/// Markdown to PDF renderer.
#[derive(Clone, Debug)]
pub struct PdfRenderer {
    engine: RenderEngine,
    opts: PdfOptions,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new(RenderEngineOptions::default(), PdfOptions::default())
    }
}

impl PdfRenderer {
    pub fn new(engine_opts: RenderEngineOptions, opts: PdfOptions) -> Self {
        let engine =
            RenderEngine::new(engine_opts).with_text_measurer(Arc::new(StandardFontMeasurer));
        Self { engine, opts }
    }

    pub fn options(&self) -> &PdfOptions {
        &self.opts
    }

    pub fn engine(&self) -> &RenderEngine {
        &self.engine
    }

    /// Render `markdown` into an in-memory PDF.
    pub fn render(&self, markdown: &str) -> Result<PdfDocument, RenderError> {
        let (sink, report) = self.render_with_sink(markdown, Vec::new())?;
        Ok(PdfDocument {
            bytes: sink.into_writer(),
            report,
        })
    }

    /// Render `markdown` and write the PDF to `writer` page by page.
    ///
    /// A malformed document writes nothing. A failure after the first page
    /// leaves a truncated file in `writer`.
    pub fn render_to_writer<W: Write>(
        &self,
        markdown: &str,
        writer: W,
    ) -> Result<PdfReport, RenderError> {
        let (_, report) = self.render_with_sink(markdown, writer)?;
        Ok(report)
    }

    fn render_with_sink<W: Write>(
        &self,
        markdown: &str,
        writer: W,
    ) -> Result<(PdfSink<W>, PdfReport), RenderError> {
        let tokenizer = Tokenizer::new(self.engine.options().limits);
        let tokens = tokenizer.tokenize(markdown).map_err(|err| {
            log::warn!("rejecting malformed document: {}", err);
            RenderError::MalformedDocument(err)
        })?;
        let title = self
            .opts
            .title
            .clone()
            .or_else(|| first_heading_title(&tokens));
        let sink = PdfSink::new(writer, &self.engine.options().layout, &self.opts).with_title(title);
        let rendered = self
            .engine
            .render_tokens(&tokens, self.engine.canvas_for(sink))?;
        let report = rendered.output.report(rendered.summary);
        Ok((rendered.output, report))
    }
}

/// Plain text of the first heading, markers stripped.
fn first_heading_title(tokens: &[Token]) -> Option<String> {
    tokens.iter().find_map(|token| match token {
        Token::Heading { text, .. } => {
            let title: String = split_inline(text).iter().map(|s| s.content.as_ref()).collect();
            let title = title.trim();
            (!title.is_empty()).then(|| title.to_string())
        }
        _ => None,
    })
}

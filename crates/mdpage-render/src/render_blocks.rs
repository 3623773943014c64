use mdpage::{escape_literal, split_inline, Token};
use serde::{Deserialize, Serialize};

use crate::render_canvas::{Canvas, CanvasError, PageGeometry, TextOptions};
use crate::render_ir::FontFace;

/// Typography and spacing for block rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockOptions {
    /// Reserve below the cursor under which a new block starts a new page.
    pub safety_margin_pt: f32,
    /// Sizes for heading depths 1 through 6.
    pub heading_sizes_pt: [f32; 6],
    /// Size for any other heading depth.
    pub heading_fallback_pt: f32,
    pub body_size_pt: f32,
    pub code_size_pt: f32,
    /// Left offset for list items.
    pub list_indent_pt: f32,
    /// Marker prepended to unordered list items.
    pub bullet: String,
    /// Gap after headings, paragraphs and code blocks, in lines.
    pub block_gap_lines: f32,
    /// Gap after each list item, in lines.
    pub item_gap_lines: f32,
    /// Extra gap after a whole list, in lines.
    pub list_gap_lines: f32,
    /// Gap after a rule, in lines.
    pub rule_gap_lines: f32,
}

impl Default for BlockOptions {
    fn default() -> Self {
        Self {
            safety_margin_pt: 100.0,
            heading_sizes_pt: [24.0, 20.0, 16.0, 14.0, 12.0, 11.0],
            heading_fallback_pt: 12.0,
            body_size_pt: 12.0,
            code_size_pt: 11.0,
            list_indent_pt: 20.0,
            bullet: "\u{2022} ".to_string(),
            block_gap_lines: 0.5,
            item_gap_lines: 0.25,
            list_gap_lines: 1.0,
            rule_gap_lines: 1.0,
        }
    }
}

impl BlockOptions {
    /// Font size for a heading of `depth`.
    pub fn heading_size(&self, depth: u8) -> f32 {
        match depth {
            1..=6 => self.heading_sizes_pt[usize::from(depth - 1)],
            _ => self.heading_fallback_pt,
        }
    }

    /// Marker for list item `index` (0-based).
    pub fn list_marker(&self, start: Option<u64>, index: usize) -> String {
        match start {
            Some(start) => format!("{}. ", start.saturating_add(index as u64)),
            None => self.bullet.clone(),
        }
    }
}

/// Counters gathered while rendering blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSummary {
    /// Blocks rendered.
    pub blocks: usize,
    /// Pages started by the pagination check before a block.
    pub page_breaks: usize,
    /// Pages in the finished document.
    pub pages: usize,
}

/// Block renderer and pagination controller over a canvas.
///
/// Owns the canvas for the duration of one render. Every block leaves the
/// canvas with the normal face selected.
pub struct RenderContext<'a, C: Canvas> {
    canvas: C,
    opts: &'a BlockOptions,
    geometry: PageGeometry,
    summary: RenderSummary,
}

impl<'a, C: Canvas> RenderContext<'a, C> {
    pub fn new(mut canvas: C, opts: &'a BlockOptions) -> Self {
        canvas.set_font(FontFace::Normal, opts.body_size_pt);
        Self {
            geometry: canvas.geometry(),
            canvas,
            opts,
            summary: RenderSummary::default(),
        }
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn summary(&self) -> RenderSummary {
        self.summary
    }

    /// Start a new page when the cursor is within the safety margin of the
    /// content bottom. Returns whether a page was added.
    ///
    /// Blocks are never split by this check; a block that outgrows the
    /// remaining space is left to the canvas. A page whose cursor is still
    /// at the top margin is never abandoned.
    pub fn ensure_room(&mut self) -> Result<bool, CanvasError> {
        let threshold = self.geometry.content_bottom - self.opts.safety_margin_pt;
        let y = self.canvas.current_y();
        if y <= threshold || y <= self.geometry.top_margin {
            return Ok(false);
        }
        log::debug!(
            "page break before block {}: y={:.1} threshold={:.1}",
            self.summary.blocks + 1,
            self.canvas.current_y(),
            threshold
        );
        self.canvas.add_page()?;
        self.summary.page_breaks += 1;
        Ok(true)
    }

    /// Pagination check followed by the block itself.
    pub fn render_token(&mut self, token: &Token) -> Result<(), CanvasError> {
        self.ensure_room()?;
        self.render_block(token)
    }

    /// Draw one block at the cursor.
    pub fn render_block(&mut self, token: &Token) -> Result<(), CanvasError> {
        let start_y = self.canvas.current_y();
        match token {
            Token::Heading { depth, text } => self.render_heading(*depth, text)?,
            Token::Paragraph { text } => self.render_paragraph(text)?,
            Token::List { items, start } => self.render_list(items, *start)?,
            Token::Code { text, .. } => self.render_code(text)?,
            Token::Rule => self.render_rule(start_y)?,
        }
        self.summary.blocks += 1;
        Ok(())
    }

    /// Hand back the canvas and the counters.
    pub fn finish(self) -> (C, RenderSummary) {
        let mut summary = self.summary;
        summary.pages = self.canvas.page_number();
        (self.canvas, summary)
    }

    fn render_heading(&mut self, depth: u8, text: &str) -> Result<(), CanvasError> {
        let size = self.opts.heading_size(depth);
        self.draw_segments(text, FontFace::Bold, size, TextOptions::default())?;
        self.canvas.move_down(self.opts.block_gap_lines);
        Ok(())
    }

    fn render_paragraph(&mut self, text: &str) -> Result<(), CanvasError> {
        let opts = TextOptions {
            width: Some(self.geometry.content_width),
            ..TextOptions::default()
        };
        self.draw_segments(text, FontFace::Normal, self.opts.body_size_pt, opts)?;
        self.canvas.move_down(self.opts.block_gap_lines);
        Ok(())
    }

    fn render_list(&mut self, items: &[String], start: Option<u64>) -> Result<(), CanvasError> {
        let indent = self.opts.list_indent_pt;
        let opts = TextOptions {
            indent,
            width: Some((self.geometry.content_width - indent).max(1.0)),
            ..TextOptions::default()
        };
        for (idx, item) in items.iter().enumerate() {
            let marker = self.opts.list_marker(start, idx);
            let mut line = escape_literal(&marker).into_owned();
            line.push_str(item);
            self.draw_segments(&line, FontFace::Normal, self.opts.body_size_pt, opts)?;
            self.canvas.move_down(self.opts.item_gap_lines);
        }
        self.canvas.move_down(self.opts.list_gap_lines);
        Ok(())
    }

    fn render_code(&mut self, text: &str) -> Result<(), CanvasError> {
        let size = self.opts.code_size_pt;
        self.canvas.set_font(FontFace::Monospace, size);
        if !text.is_empty() {
            let opts = TextOptions {
                width: Some(self.geometry.content_width),
                ..TextOptions::default()
            };
            self.canvas.draw_text(text, opts)?;
        }
        self.canvas.set_font(FontFace::Normal, size);
        self.canvas.move_down(self.opts.block_gap_lines);
        Ok(())
    }

    fn render_rule(&mut self, y: f32) -> Result<(), CanvasError> {
        let left = self.geometry.margin_left;
        let right = left + self.geometry.content_width;
        self.canvas.draw_line(left, y, right, y)?;
        self.canvas.move_down(self.opts.rule_gap_lines);
        Ok(())
    }

    /// Draw inline `text` as one continued chain of styled runs. Bold spans
    /// use the bold face; the rest use `base`. Leaves the normal face selected.
    fn draw_segments(
        &mut self,
        text: &str,
        base: FontFace,
        size: f32,
        opts: TextOptions,
    ) -> Result<(), CanvasError> {
        for segment in split_inline(text) {
            let face = if segment.bold { FontFace::Bold } else { base };
            self.canvas.set_font(face, size);
            self.canvas
                .draw_text(&segment.content, opts.continued(segment.continued))?;
        }
        self.canvas.set_font(FontFace::Normal, size);
        Ok(())
    }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::render_canvas::{Canvas, CanvasError, PageGeometry, PageSink, TextOptions};
use crate::render_ir::{
    DrawCommand, FontFace, RenderPage, ResolvedTextStyle, RuleCommand, TextAlign, TextCommand,
};

const ASCENT_RATIO: f32 = 0.8;
const FIT_EPSILON: f32 = 0.01;
const PAGE_NUMBER_SIZE_PT: f32 = 9.0;

/// Width measurement hook for text layout.
pub trait TextMeasurer: Send + Sync {
    /// Rendered width of `text` in points.
    fn measure_text_pt(&self, text: &str, style: &ResolvedTextStyle) -> f32;
}

/// Page geometry and flow policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    /// Line height as a multiple of font size.
    pub line_height: f32,
    /// Stroke width for rules.
    pub rule_thickness: f32,
    /// Move a line that would cross the bottom margin onto a new page.
    ///
    /// When disabled the line is placed anyway and the page is marked as
    /// overflowed.
    pub flow_overflow: bool,
    /// Hard ceiling on emitted pages.
    pub max_pages: usize,
    /// Draw a centered page number in the bottom margin.
    pub page_numbers: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            margin_left: 50.0,
            margin_right: 50.0,
            margin_top: 50.0,
            margin_bottom: 50.0,
            line_height: 1.15,
            rule_thickness: 1.0,
            flow_overflow: true,
            max_pages: 10_000,
            page_numbers: false,
        }
    }
}

impl LayoutConfig {
    /// Default margins on a page of the given size in points.
    pub fn for_page(page_width: f32, page_height: f32) -> Self {
        Self {
            page_width,
            page_height,
            ..Self::default()
        }
    }

    /// ISO A4 portrait.
    pub fn a4() -> Self {
        Self::for_page(595.28, 841.89)
    }

    pub fn content_width(&self) -> f32 {
        (self.page_width - self.margin_left - self.margin_right).max(1.0)
    }

    pub fn content_bottom(&self) -> f32 {
        self.page_height - self.margin_bottom
    }

    /// Line advance for text at `size_pt`.
    pub fn line_height_for(&self, size_pt: f32) -> f32 {
        (size_pt * self.line_height).max(1.0)
    }

    pub fn geometry(&self) -> PageGeometry {
        PageGeometry {
            page_width: self.page_width,
            page_height: self.page_height,
            margin_left: self.margin_left,
            top_margin: self.margin_top,
            content_bottom: self.content_bottom(),
            content_width: self.content_width(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct TextRegion {
    x: f32,
    width: f32,
    align: TextAlign,
}

#[derive(Clone, Debug)]
struct LineSpan {
    text: String,
    style: ResolvedTextStyle,
    width: f32,
}

#[derive(Clone, Debug, Default)]
struct PendingLine {
    spans: SmallVec<[LineSpan; 4]>,
    width: f32,
    /// Started by a soft wrap rather than at a hard line start.
    soft: bool,
}

impl PendingLine {
    fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    fn push(&mut self, text: &str, style: ResolvedTextStyle, width: f32) {
        self.width += width;
        if let Some(last) = self.spans.last_mut() {
            if last.style == style {
                last.text.push_str(text);
                last.width += width;
                return;
            }
        }
        self.spans.push(LineSpan {
            text: text.to_string(),
            style,
            width,
        });
    }
}

/// Canvas that lays text into lines and hands finished pages to a sink.
///
/// Lines are built from successive `draw_text` calls until a call with
/// `continued == false`; each run keeps the font that was set when it was
/// drawn. A page is passed to the sink as soon as the next one starts, and
/// the last page is always emitted on `finalize`, blank or not.
pub struct PageCanvas<S: PageSink = Vec<RenderPage>> {
    cfg: LayoutConfig,
    text_measurer: Option<Arc<dyn TextMeasurer>>,
    sink: S,
    page: RenderPage,
    cursor_y: f32,
    style: ResolvedTextStyle,
    region: Option<TextRegion>,
    line: PendingLine,
    flowed_lines: usize,
}

impl<S: PageSink> core::fmt::Debug for PageCanvas<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageCanvas")
            .field("cfg", &self.cfg)
            .field("page_number", &self.page.page_number)
            .field("cursor_y", &self.cursor_y)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl<S: PageSink> PageCanvas<S> {
    pub fn new(cfg: LayoutConfig, sink: S) -> Self {
        Self {
            cursor_y: cfg.margin_top,
            cfg,
            text_measurer: None,
            sink,
            page: RenderPage::new(1),
            style: ResolvedTextStyle::default(),
            region: None,
            line: PendingLine::default(),
            flowed_lines: 0,
        }
    }

    /// Use `measurer` instead of the built-in width heuristic.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Lines moved onto a new page because they would have crossed the
    /// bottom margin.
    pub fn flowed_lines(&self) -> usize {
        self.flowed_lines
    }

    fn measure(&self, text: &str, style: &ResolvedTextStyle) -> f32 {
        match self.text_measurer.as_ref() {
            Some(measurer) => measurer.measure_text_pt(text, style),
            None => heuristic_measure_text(text, style),
        }
    }

    fn region_for(&self, opts: &TextOptions) -> TextRegion {
        let indent = opts.indent.max(0.0);
        let width = opts
            .width
            .unwrap_or(self.cfg.content_width() - indent)
            .max(1.0);
        TextRegion {
            x: self.cfg.margin_left + indent,
            width,
            align: opts.align,
        }
    }

    fn line_height_of(&self, line: &PendingLine) -> f32 {
        let size = line
            .spans
            .iter()
            .map(|span| span.style.size_pt)
            .fold(0.0f32, f32::max);
        let size = if size > 0.0 { size } else { self.style.size_pt };
        self.cfg.line_height_for(size)
    }

    fn place_piece(&mut self, piece: &str, region: TextRegion) -> Result<(), CanvasError> {
        for chunk in piece.split_inclusive(' ') {
            self.place_chunk(chunk, region)?;
        }
        Ok(())
    }

    fn place_chunk(&mut self, chunk: &str, region: TextRegion) -> Result<(), CanvasError> {
        let style = self.style;
        let word = chunk.trim_end_matches(' ');
        if word.is_empty() {
            // Spaces at the start of a wrapped line are dropped.
            if self.line.is_empty() && self.line.soft {
                return Ok(());
            }
            let width = self.measure(chunk, &style);
            self.line.push(chunk, style, width);
            return Ok(());
        }

        let word_width = self.measure(word, &style);
        if !self.line.is_empty() && self.line.width + word_width > region.width + FIT_EPSILON {
            self.wrap(region)?;
        }
        if self.line.is_empty() && word_width > region.width + FIT_EPSILON {
            return self.place_long_word(chunk, region);
        }
        let chunk_width = if word.len() == chunk.len() {
            word_width
        } else {
            self.measure(chunk, &style)
        };
        self.line.push(chunk, style, chunk_width);
        Ok(())
    }

    fn place_long_word(&mut self, chunk: &str, region: TextRegion) -> Result<(), CanvasError> {
        let style = self.style;
        let mut rest = chunk;
        loop {
            let available = region.width - self.line.width;
            let end = self.fitting_prefix_len(rest, available, &style);
            if end >= rest.len() {
                let width = self.measure(rest, &style);
                self.line.push(rest, style, width);
                return Ok(());
            }
            let (head, tail) = rest.split_at(end);
            let width = self.measure(head, &style);
            self.line.push(head, style, width);
            self.wrap(region)?;
            rest = tail.trim_start_matches(' ');
            if rest.is_empty() {
                return Ok(());
            }
        }
    }

    /// Byte length of the longest prefix of `text` that fits in `available`.
    /// Always at least one char.
    fn fitting_prefix_len(&self, text: &str, available: f32, style: &ResolvedTextStyle) -> usize {
        let mut used = 0.0f32;
        let mut end = 0usize;
        let mut buf = [0u8; 4];
        for (idx, ch) in text.char_indices() {
            let width = self.measure(ch.encode_utf8(&mut buf), style);
            if end > 0 && used + width > available + FIT_EPSILON {
                break;
            }
            used += width;
            end = idx + ch.len_utf8();
        }
        end
    }

    fn wrap(&mut self, region: TextRegion) -> Result<(), CanvasError> {
        self.break_line(region)?;
        self.line.soft = true;
        Ok(())
    }

    /// Place the pending line (if any) and advance the cursor by one line.
    fn break_line(&mut self, region: TextRegion) -> Result<(), CanvasError> {
        let line = core::mem::take(&mut self.line);
        let line_height = self.line_height_of(&line);
        self.reserve_line(line_height)?;
        if !line.is_empty() {
            self.emit_line(line, region);
        }
        self.cursor_y += line_height;
        self.page.metrics.line_count += 1;
        Ok(())
    }

    fn reserve_line(&mut self, line_height: f32) -> Result<(), CanvasError> {
        if self.cursor_y + line_height <= self.cfg.content_bottom() + FIT_EPSILON {
            return Ok(());
        }
        if self.cfg.flow_overflow && self.cursor_y > self.cfg.margin_top + FIT_EPSILON {
            log::debug!(
                "line flows past bottom margin on page {}; continuing on next page",
                self.page.page_number
            );
            self.flowed_lines += 1;
            return self.start_next_page();
        }
        if !self.page.metrics.overflowed {
            log::warn!(
                "page {} content overflows bottom margin at y={:.1}",
                self.page.page_number,
                self.cursor_y
            );
            self.page.metrics.overflowed = true;
        }
        Ok(())
    }

    fn emit_line(&mut self, line: PendingLine, region: TextRegion) {
        let mut spans = line.spans;
        if let Some(last) = spans.last_mut() {
            let trimmed_len = last.text.trim_end().len();
            if trimmed_len != last.text.len() {
                last.text.truncate(trimmed_len);
                last.width = self.measure(&last.text, &last.style);
            }
        }
        spans.retain(|span| !span.text.is_empty());
        if spans.is_empty() {
            return;
        }

        let width: f32 = spans.iter().map(|span| span.width).sum();
        let offset = match region.align {
            TextAlign::Left => 0.0,
            TextAlign::Center => ((region.width - width) / 2.0).max(0.0),
            TextAlign::Right => (region.width - width).max(0.0),
        };
        let max_size = spans
            .iter()
            .map(|span| span.style.size_pt)
            .fold(0.0f32, f32::max);
        let baseline_y = self.cursor_y + max_size * ASCENT_RATIO;
        let mut x = region.x + offset;
        let count = spans.len();
        for (idx, span) in spans.into_iter().enumerate() {
            let advance = span.width;
            self.page.push_content_command(DrawCommand::Text(TextCommand {
                x,
                baseline_y,
                text: span.text,
                style: span.style,
                continued: idx + 1 < count,
            }));
            x += advance;
        }
    }

    fn flush_pending(&mut self) -> Result<(), CanvasError> {
        if self.line.is_empty() {
            return Ok(());
        }
        let opts = TextOptions::default();
        let region = self.region.unwrap_or_else(|| self.region_for(&opts));
        self.break_line(region)
    }

    fn start_next_page(&mut self) -> Result<(), CanvasError> {
        let next = self.page.page_number + 1;
        if next > self.cfg.max_pages {
            return Err(CanvasError::LimitExceeded {
                kind: "max_pages",
                actual: next,
                limit: self.cfg.max_pages,
            });
        }
        self.page.metrics.cursor_end_y = self.cursor_y;
        let finished = core::mem::replace(&mut self.page, RenderPage::new(next));
        self.cursor_y = self.cfg.margin_top;
        self.emit_page(finished)
    }

    fn emit_page(&mut self, mut page: RenderPage) -> Result<(), CanvasError> {
        if self.cfg.page_numbers {
            self.push_page_number(&mut page);
        }
        log::debug!(
            "page {} closed: commands={} lines={} overflowed={}",
            page.page_number,
            page.content_commands.len(),
            page.metrics.line_count,
            page.metrics.overflowed
        );
        self.sink.accept_page(page)
    }

    fn push_page_number(&self, page: &mut RenderPage) {
        let style = ResolvedTextStyle::new(FontFace::Normal, PAGE_NUMBER_SIZE_PT);
        let text = page.page_number.to_string();
        let width = self.measure(&text, &style);
        let x = self.cfg.margin_left + ((self.cfg.content_width() - width) / 2.0).max(0.0);
        let baseline_y = self.cfg.content_bottom() + self.cfg.margin_bottom / 2.0;
        page.push_chrome_command(DrawCommand::Text(TextCommand {
            x,
            baseline_y,
            text,
            style,
            continued: false,
        }));
    }

    fn finish_pages(&mut self) -> Result<(), CanvasError> {
        self.flush_pending()?;
        self.region = None;
        self.page.metrics.cursor_end_y = self.cursor_y;
        let last = core::mem::take(&mut self.page);
        log::debug!(
            "canvas finalized: pages={} flowed_lines={}",
            last.page_number,
            self.flowed_lines
        );
        self.emit_page(last)?;
        self.sink.close()
    }
}

impl<S: PageSink> Canvas for PageCanvas<S> {
    type Output = S;

    fn geometry(&self) -> PageGeometry {
        self.cfg.geometry()
    }

    fn current_y(&self) -> f32 {
        self.cursor_y
    }

    fn page_number(&self) -> usize {
        self.page.page_number
    }

    fn add_page(&mut self) -> Result<(), CanvasError> {
        self.flush_pending()?;
        self.start_next_page()
    }

    fn set_font(&mut self, face: FontFace, size_pt: f32) {
        self.style = ResolvedTextStyle::new(face, size_pt);
    }

    fn font(&self) -> ResolvedTextStyle {
        self.style
    }

    fn draw_text(&mut self, text: &str, opts: TextOptions) -> Result<(), CanvasError> {
        let region = match self.region {
            Some(region) => region,
            None => {
                let region = self.region_for(&opts);
                self.region = Some(region);
                region
            }
        };
        for (idx, piece) in text.split('\n').enumerate() {
            if idx > 0 {
                self.break_line(region)?;
            }
            self.place_piece(piece, region)?;
        }
        if !opts.continued {
            if !self.line.is_empty() {
                self.break_line(region)?;
            }
            self.region = None;
        }
        Ok(())
    }

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<(), CanvasError> {
        self.page
            .push_content_command(DrawCommand::Rule(RuleCommand {
                x1,
                y1,
                x2,
                y2,
                thickness: self.cfg.rule_thickness,
            }));
        Ok(())
    }

    fn move_down(&mut self, lines: f32) {
        self.cursor_y += lines.max(0.0) * self.cfg.line_height_for(self.style.size_pt);
    }

    fn finalize(mut self) -> Result<S, CanvasError> {
        match self.finish_pages() {
            Ok(()) => Ok(self.sink),
            Err(err) => {
                self.sink.abort();
                Err(err)
            }
        }
    }

    fn abort(mut self) {
        self.sink.abort();
    }
}

/// Width estimate used when no measurer is installed.
pub fn heuristic_measure_text(text: &str, style: &ResolvedTextStyle) -> f32 {
    let em_sum: f32 = if style.face.is_monospace() {
        text.chars().count() as f32 * 0.6
    } else {
        text.chars().map(proportional_glyph_em_width).sum()
    };
    let scale = match style.face {
        FontFace::Bold => 1.05,
        _ => 1.0,
    };
    em_sum * style.size_pt * scale
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' | '\u{00A0}' => 0.28,
        '\t' => 1.12,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.26,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' => 0.34,
        '\u{2014}' => 1.0,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.33,
        'f' | 't' | 'j' | 'r' => 0.30,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.82,
        c if c.is_ascii_digit() => 0.56,
        c if c.is_ascii_uppercase() => 0.67,
        c if c.is_ascii_lowercase() => 0.54,
        c if c.is_whitespace() => 0.28,
        c if c.is_ascii_punctuation() => 0.50,
        _ => 0.56,
    }
}

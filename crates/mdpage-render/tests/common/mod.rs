#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use mdpage_render::{
    Canvas, CanvasError, FontFace, LayoutConfig, PageCanvas, PageGeometry, RenderPage,
    ResolvedTextStyle, TextCommand, TextOptions,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    AddPage,
    SetFont(FontFace, f32),
    DrawText {
        text: String,
        face: FontFace,
        continued: bool,
    },
    DrawLine {
        y: f32,
    },
    MoveDown(f32),
}

#[derive(Debug, Default)]
pub struct SpyLog {
    pub calls: Vec<Call>,
    /// Page number and cursor after each call.
    pub cursor: Vec<(usize, f32)>,
    pub aborted: bool,
    pub finalized: bool,
}

/// Canvas that records every call and forwards to a real page canvas.
pub struct SpyCanvas {
    inner: PageCanvas,
    log: Rc<RefCell<SpyLog>>,
    fail_on_draw: Option<usize>,
    draws: usize,
}

impl SpyCanvas {
    pub fn new(cfg: LayoutConfig) -> (Self, Rc<RefCell<SpyLog>>) {
        let log = Rc::new(RefCell::new(SpyLog::default()));
        let spy = Self {
            inner: PageCanvas::new(cfg, Vec::new()),
            log: Rc::clone(&log),
            fail_on_draw: None,
            draws: 0,
        };
        (spy, log)
    }

    /// Fail the `n`th `draw_text` call (1-based).
    pub fn failing_on_draw(cfg: LayoutConfig, n: usize) -> (Self, Rc<RefCell<SpyLog>>) {
        let (mut spy, log) = Self::new(cfg);
        spy.fail_on_draw = Some(n);
        (spy, log)
    }

    fn record(&self, call: Call) {
        let mut log = self.log.borrow_mut();
        log.calls.push(call);
        log.cursor
            .push((self.inner.page_number(), self.inner.current_y()));
    }
}

impl Canvas for SpyCanvas {
    type Output = Vec<RenderPage>;

    fn geometry(&self) -> PageGeometry {
        self.inner.geometry()
    }

    fn current_y(&self) -> f32 {
        self.inner.current_y()
    }

    fn page_number(&self) -> usize {
        self.inner.page_number()
    }

    fn add_page(&mut self) -> Result<(), CanvasError> {
        self.inner.add_page()?;
        self.record(Call::AddPage);
        Ok(())
    }

    fn set_font(&mut self, face: FontFace, size_pt: f32) {
        self.inner.set_font(face, size_pt);
        self.record(Call::SetFont(face, size_pt));
    }

    fn font(&self) -> ResolvedTextStyle {
        self.inner.font()
    }

    fn draw_text(&mut self, text: &str, opts: TextOptions) -> Result<(), CanvasError> {
        self.draws += 1;
        if self.fail_on_draw == Some(self.draws) {
            return Err(CanvasError::Closed);
        }
        self.inner.draw_text(text, opts)?;
        self.record(Call::DrawText {
            text: text.to_string(),
            face: self.inner.font().face,
            continued: opts.continued,
        });
        Ok(())
    }

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<(), CanvasError> {
        self.inner.draw_line(x1, y1, x2, y2)?;
        self.record(Call::DrawLine { y: y1 });
        Ok(())
    }

    fn move_down(&mut self, lines: f32) {
        self.inner.move_down(lines);
        self.record(Call::MoveDown(lines));
    }

    fn finalize(self) -> Result<Vec<RenderPage>, CanvasError> {
        self.log.borrow_mut().finalized = true;
        self.inner.finalize()
    }

    fn abort(self) {
        self.log.borrow_mut().aborted = true;
        self.inner.abort();
    }
}

pub fn all_runs(pages: &[RenderPage]) -> Vec<&TextCommand> {
    pages.iter().flat_map(|page| page.text_runs()).collect()
}

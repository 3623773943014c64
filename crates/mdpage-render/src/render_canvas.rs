use core::fmt;

use crate::render_ir::{FontFace, RenderPage, ResolvedTextStyle, TextAlign};

/// Fixed page geometry a block renderer lays out against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    /// Left edge of the content area.
    pub margin_left: f32,
    /// Y at which every page starts.
    pub top_margin: f32,
    /// Lowest Y that content may reach.
    pub content_bottom: f32,
    /// Width of the content area.
    pub content_width: f32,
}

/// Per-call text placement options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextOptions {
    /// The next `draw_text` call continues the current line.
    pub continued: bool,
    /// Offset from the left margin.
    pub indent: f32,
    /// Wrap width. `None` uses the remaining content width.
    pub width: Option<f32>,
    pub align: TextAlign,
}

impl TextOptions {
    pub fn continued(mut self, continued: bool) -> Self {
        self.continued = continued;
        self
    }
}

/// Failures raised by a canvas or the page sink behind it.
#[derive(Debug)]
pub enum CanvasError {
    /// The canvas or its sink no longer accepts output.
    Closed,
    /// A configured ceiling was hit.
    LimitExceeded {
        kind: &'static str,
        actual: usize,
        limit: usize,
    },
    /// Writing output failed.
    Io(std::io::Error),
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "canvas closed"),
            Self::LimitExceeded {
                kind,
                actual,
                limit,
            } => write!(
                f,
                "canvas limit exceeded: {} (actual={} limit={})",
                kind, actual, limit
            ),
            Self::Io(err) => write!(f, "canvas output failed: {}", err),
        }
    }
}

impl std::error::Error for CanvasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CanvasError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Drawing surface the block renderer writes into.
///
/// A canvas owns a vertical cursor that only moves down within a page and
/// resets to the top margin when a page is added. Text flows from the
/// cursor; lines never move it.
pub trait Canvas {
    /// Value produced by [`finalize`](Self::finalize).
    type Output;

    fn geometry(&self) -> PageGeometry;

    /// Current cursor position.
    fn current_y(&self) -> f32;

    /// 1-based number of the page being filled.
    fn page_number(&self) -> usize;

    /// Close the current page and start a fresh one at the top margin.
    fn add_page(&mut self) -> Result<(), CanvasError>;

    fn set_font(&mut self, face: FontFace, size_pt: f32);

    /// Face and size currently in effect.
    fn font(&self) -> ResolvedTextStyle;

    /// Place text at the cursor, wrapping within the text region.
    fn draw_text(&mut self, text: &str, opts: TextOptions) -> Result<(), CanvasError>;

    /// Stroke a line. The cursor does not move.
    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<(), CanvasError>;

    /// Advance the cursor by `lines` multiples of the current line height.
    fn move_down(&mut self, lines: f32);

    /// Flush the final page and produce the output.
    fn finalize(self) -> Result<Self::Output, CanvasError>
    where
        Self: Sized;

    /// Discard everything produced so far.
    fn abort(self)
    where
        Self: Sized;
}

/// Receiver for pages as they close.
pub trait PageSink {
    fn accept_page(&mut self, page: RenderPage) -> Result<(), CanvasError>;

    /// Called once after the final page.
    fn close(&mut self) -> Result<(), CanvasError> {
        Ok(())
    }

    /// Called instead of `close` when rendering fails.
    fn abort(&mut self) {}
}

impl PageSink for Vec<RenderPage> {
    fn accept_page(&mut self, page: RenderPage) -> Result<(), CanvasError> {
        self.push(page);
        Ok(())
    }

    fn abort(&mut self) {
        self.clear();
    }
}

impl<S: PageSink + ?Sized> PageSink for &mut S {
    fn accept_page(&mut self, page: RenderPage) -> Result<(), CanvasError> {
        (**self).accept_page(page)
    }

    fn close(&mut self) -> Result<(), CanvasError> {
        (**self).close()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_collects_and_clears_on_abort() {
        let mut sink: Vec<RenderPage> = Vec::new();
        sink.accept_page(RenderPage::new(1)).unwrap();
        sink.accept_page(RenderPage::new(2)).unwrap();
        assert_eq!(sink.len(), 2);
        PageSink::abort(&mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn limit_error_display_names_kind() {
        let err = CanvasError::LimitExceeded {
            kind: "max_pages",
            actual: 3,
            limit: 2,
        };
        assert_eq!(
            err.to_string(),
            "canvas limit exceeded: max_pages (actual=3 limit=2)"
        );
    }

    #[test]
    fn io_error_is_exposed_as_source() {
        let err = CanvasError::from(std::io::Error::other("disk full"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("disk full"));
    }
}

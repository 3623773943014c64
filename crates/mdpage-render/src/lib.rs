//! Render IR, page canvas, block layout, and orchestration for `mdpage`.

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

mod render_blocks;
mod render_canvas;
mod render_engine;
mod render_ir;
mod render_layout;

pub use mdpage::{StyledSegment, Token, TokenizeError, TokenizeLimits};
pub use render_blocks::{BlockOptions, RenderContext, RenderSummary};
pub use render_canvas::{Canvas, CanvasError, PageGeometry, PageSink, TextOptions};
pub use render_engine::{
    RenderEngine, RenderEngineOptions, RenderError, Rendered, RenderedDocument,
};
pub use render_ir::{
    DrawCommand, FontFace, PageMetrics, RenderPage, ResolvedTextStyle, RuleCommand, TextAlign,
    TextCommand,
};
pub use render_layout::{heuristic_measure_text, LayoutConfig, PageCanvas, TextMeasurer};

use std::sync::Arc;

use mdpage::{Token, TokenizeError, TokenizeLimits, Tokenizer};
use serde::{Deserialize, Serialize};

use crate::render_blocks::{BlockOptions, RenderContext, RenderSummary};
use crate::render_canvas::{Canvas, CanvasError, PageSink};
use crate::render_ir::RenderPage;
use crate::render_layout::{LayoutConfig, PageCanvas, TextMeasurer};

/// Render engine options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderEngineOptions {
    /// Page geometry and flow policy.
    pub layout: LayoutConfig,
    /// Typography and spacing.
    pub blocks: BlockOptions,
    /// Tokenizer safety caps.
    #[serde(skip)]
    pub limits: TokenizeLimits,
}

impl RenderEngineOptions {
    /// Default options on a page of the given size in points.
    pub fn for_page(page_width: f32, page_height: f32) -> Self {
        Self {
            layout: LayoutConfig::for_page(page_width, page_height),
            ..Self::default()
        }
    }

    /// Parse options from a JSON document. Missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Why a render did not produce a document.
#[derive(Debug)]
pub enum RenderError {
    /// The markdown could not be tokenized. Not worth retrying.
    MalformedDocument(TokenizeError),
    /// The canvas or its output failed mid-render.
    RenderFailure(CanvasError),
}

impl RenderError {
    /// The input was at fault rather than the renderer.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedDocument(_))
    }
}

impl core::fmt::Display for RenderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MalformedDocument(err) => write!(f, "{}", err),
            Self::RenderFailure(err) => write!(f, "render failed: {}", err),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedDocument(err) => Some(err),
            Self::RenderFailure(err) => Some(err),
        }
    }
}

impl From<TokenizeError> for RenderError {
    fn from(value: TokenizeError) -> Self {
        Self::MalformedDocument(value)
    }
}

impl From<CanvasError> for RenderError {
    fn from(value: CanvasError) -> Self {
        Self::RenderFailure(value)
    }
}

/// Finished render output with its counters.
#[derive(Debug)]
pub struct Rendered<T> {
    pub output: T,
    pub summary: RenderSummary,
}

/// Pages collected in memory.
pub type RenderedDocument = Rendered<Vec<RenderPage>>;

impl RenderedDocument {
    pub fn pages(&self) -> &[RenderPage] {
        &self.output
    }
}

/// Document assembler: tokenizes markdown and drives a canvas block by
/// block, with a pagination check before each block.
#[derive(Clone)]
pub struct RenderEngine {
    opts: RenderEngineOptions,
    tokenizer: Tokenizer,
    text_measurer: Option<Arc<dyn TextMeasurer>>,
}

impl core::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("opts", &self.opts)
            .field("has_text_measurer", &self.text_measurer.is_some())
            .finish()
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new(RenderEngineOptions::default())
    }
}

impl RenderEngine {
    pub fn new(opts: RenderEngineOptions) -> Self {
        Self {
            tokenizer: Tokenizer::new(opts.limits),
            opts,
            text_measurer: None,
        }
    }

    /// Measure text with `measurer` on canvases this engine creates.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    pub fn options(&self) -> &RenderEngineOptions {
        &self.opts
    }

    /// A page canvas configured like this engine, feeding `sink`.
    pub fn canvas_for<S: PageSink>(&self, sink: S) -> PageCanvas<S> {
        let canvas = PageCanvas::new(self.opts.layout, sink);
        match self.text_measurer.as_ref() {
            Some(measurer) => canvas.with_text_measurer(Arc::clone(measurer)),
            None => canvas,
        }
    }

    /// Render into in-memory pages.
    pub fn render(&self, markdown: &str) -> Result<RenderedDocument, RenderError> {
        self.render_to_sink(markdown, Vec::new())
    }

    /// Render onto a page canvas feeding `sink`. Returns the sink.
    pub fn render_to_sink<S: PageSink>(
        &self,
        markdown: &str,
        sink: S,
    ) -> Result<Rendered<S>, RenderError> {
        self.render_into(markdown, self.canvas_for(sink))
    }

    /// Render onto any canvas.
    ///
    /// The whole input is tokenized before anything is drawn, so a malformed
    /// document never produces partial output. On any failure the canvas is
    /// aborted.
    pub fn render_into<C: Canvas>(
        &self,
        markdown: &str,
        canvas: C,
    ) -> Result<Rendered<C::Output>, RenderError> {
        let tokens = match self.tokenizer.tokenize(markdown) {
            Ok(tokens) => tokens,
            Err(err) => {
                log::warn!("rejecting malformed document: {}", err);
                canvas.abort();
                return Err(RenderError::MalformedDocument(err));
            }
        };
        self.render_tokens(&tokens, canvas)
    }

    /// Render an already tokenized document.
    pub fn render_tokens<C: Canvas>(
        &self,
        tokens: &[Token],
        canvas: C,
    ) -> Result<Rendered<C::Output>, RenderError> {
        let mut ctx = RenderContext::new(canvas, &self.opts.blocks);
        for token in tokens {
            if let Err(err) = ctx.render_token(token) {
                log::warn!(
                    "render failed at {} block {}: {}",
                    token.kind(),
                    ctx.summary().blocks + 1,
                    err
                );
                let (canvas, _) = ctx.finish();
                canvas.abort();
                return Err(RenderError::RenderFailure(err));
            }
        }
        let (canvas, summary) = ctx.finish();
        let output = canvas.finalize()?;
        log::debug!(
            "rendered {} blocks onto {} pages ({} pagination breaks)",
            summary.blocks,
            summary.pages,
            summary.page_breaks
        );
        Ok(Rendered { output, summary })
    }
}

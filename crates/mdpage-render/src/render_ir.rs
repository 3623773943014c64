use serde::{Deserialize, Serialize};

/// Font face selection for text runs.
///
/// Backends map these onto concrete fonts; the layout layer only needs to
/// know which family a run belongs to for measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFace {
    /// Regular proportional body face.
    #[default]
    Normal,
    /// Bold proportional face.
    Bold,
    /// Fixed-width face for code.
    Monospace,
}

impl FontFace {
    /// Whether glyphs in this face share a single advance width.
    pub fn is_monospace(self) -> bool {
        matches!(self, Self::Monospace)
    }
}

/// Horizontal alignment inside a text region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Face and size in effect for a text run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTextStyle {
    /// Font face.
    pub face: FontFace,
    /// Font size in points.
    pub size_pt: f32,
}

impl ResolvedTextStyle {
    pub fn new(face: FontFace, size_pt: f32) -> Self {
        Self { face, size_pt }
    }
}

impl Default for ResolvedTextStyle {
    fn default() -> Self {
        Self {
            face: FontFace::Normal,
            size_pt: 12.0,
        }
    }
}

/// One positioned text run.
///
/// Coordinates are in points with the origin at the top-left corner of the
/// page and y growing downward.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextCommand {
    /// Left edge of the run.
    pub x: f32,
    /// Baseline position.
    pub baseline_y: f32,
    /// Literal text.
    pub text: String,
    /// Style for this run.
    pub style: ResolvedTextStyle,
    /// The next command continues this line.
    pub continued: bool,
}

/// Straight stroked line between two points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleCommand {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Stroke width in points.
    pub thickness: f32,
}

/// Backend-agnostic draw command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Text(TextCommand),
    Rule(RuleCommand),
}

impl DrawCommand {
    /// Text payload, if this is a text command.
    pub fn as_text(&self) -> Option<&TextCommand> {
        match self {
            Self::Text(text) => Some(text),
            Self::Rule(_) => None,
        }
    }

    /// Rule payload, if this is a rule command.
    pub fn as_rule(&self) -> Option<&RuleCommand> {
        match self {
            Self::Rule(rule) => Some(rule),
            Self::Text(_) => None,
        }
    }
}

/// Per-page layout metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Cursor position when the page was closed.
    pub cursor_end_y: f32,
    /// Lines placed on this page.
    pub line_count: usize,
    /// Some line was placed past the content bottom.
    pub overflowed: bool,
}

/// Page represented as backend-agnostic draw commands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderPage {
    /// 1-based page number.
    pub page_number: usize,
    /// Body draw commands in placement order.
    pub content_commands: Vec<DrawCommand>,
    /// Page furniture such as the page-number footer.
    pub chrome_commands: Vec<DrawCommand>,
    /// Per-page metrics.
    pub metrics: PageMetrics,
}

impl RenderPage {
    const INITIAL_CONTENT_COMMAND_CAPACITY: usize = 8;

    /// Create an empty page.
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            // Empty pages stay allocation-free.
            content_commands: Vec::with_capacity(0),
            chrome_commands: Vec::with_capacity(0),
            metrics: PageMetrics::default(),
        }
    }

    /// Push a content-layer command.
    pub fn push_content_command(&mut self, cmd: DrawCommand) {
        if self.content_commands.capacity() == 0 {
            self.content_commands
                .reserve(Self::INITIAL_CONTENT_COMMAND_CAPACITY);
        }
        self.content_commands.push(cmd);
    }

    /// Push a chrome-layer command.
    pub fn push_chrome_command(&mut self, cmd: DrawCommand) {
        self.chrome_commands.push(cmd);
    }

    /// Iterate content then chrome commands.
    pub fn commands(&self) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.content_commands.iter().chain(self.chrome_commands.iter())
    }

    /// Text runs in the content layer.
    pub fn text_runs(&self) -> impl Iterator<Item = &TextCommand> + '_ {
        self.content_commands.iter().filter_map(DrawCommand::as_text)
    }

    /// No content was placed on this page.
    pub fn is_blank(&self) -> bool {
        self.content_commands.is_empty()
    }
}

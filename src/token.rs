//! Block tokenization of markdown input.
//!
//! The parser (`pulldown-cmark`) produces a nested event stream; this module
//! folds it into the flat block sequence the renderer consumes. Inline text
//! is reconstructed so that strong spans keep their `**` markers for the
//! inline splitter, and nested lists are flattened into their outermost list.
//! Literal `*` and `\` in inline text are backslash-escaped (see
//! [`crate::inline::split_inline`]); code block text is kept verbatim.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::error::TokenizeError;
use crate::inline::escape_literal;

/// Hard limits applied before and during tokenization.
///
/// These bound the work and memory a single untrusted input can cost. They
/// are not markdown validation: any input within them tokenizes, and one
/// that exceeds them is rejected as malformed instead of being truncated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenizeLimits {
    /// Maximum accepted input size in bytes.
    pub max_input_bytes: usize,
    /// Maximum number of block tokens produced.
    pub max_tokens: usize,
    /// Maximum list nesting depth.
    pub max_list_depth: usize,
}

impl Default for TokenizeLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 8 * 1024 * 1024,
            max_tokens: 100_000,
            max_list_depth: 32,
        }
    }
}

/// One block-level unit of parsed markdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// Heading with depth 1-6 and inline text.
    ///
    /// Inline text marks strong spans with `**` and escapes literal `*`
    /// and `\` with a backslash.
    Heading { depth: u8, text: String },
    /// Paragraph with inline text.
    Paragraph { text: String },
    /// List items as inline text, in document order; nested items are
    /// flattened in.
    ///
    /// `start` is the first number of an ordered list.
    List {
        items: Vec<String>,
        start: Option<u64>,
    },
    /// Literal code block.
    Code {
        text: String,
        language: Option<String>,
    },
    /// Thematic break.
    Rule,
}

impl Token {
    /// Short kind name for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading",
            Self::Paragraph { .. } => "paragraph",
            Self::List { .. } => "list",
            Self::Code { .. } => "code",
            Self::Rule => "rule",
        }
    }
}

/// Markdown tokenizer with configurable limits.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tokenizer {
    limits: TokenizeLimits,
}

impl Tokenizer {
    pub fn new(limits: TokenizeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> TokenizeLimits {
        self.limits
    }

    /// Tokenize `input` into an ordered block sequence.
    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, TokenizeError> {
        let mut tokens = Vec::with_capacity(16);
        self.tokenize_with(input, |token| tokens.push(token))?;
        Ok(tokens)
    }

    /// Tokenize `input`, streaming each completed block to `on_token`.
    pub fn tokenize_with<F>(&self, input: &str, mut on_token: F) -> Result<(), TokenizeError>
    where
        F: FnMut(Token),
    {
        if input.len() > self.limits.max_input_bytes {
            return Err(
                TokenizeError::new("input_too_large", "input exceeds byte budget").with_limit(
                    "max_input_bytes",
                    input.len(),
                    self.limits.max_input_bytes,
                ),
            );
        }
        if let Some(offset) = input.find('\0') {
            return Err(
                TokenizeError::new("nul_byte", "input contains a NUL byte").with_offset(offset)
            );
        }

        let mut b = BlockBuilder::new(self.limits);
        for (event, range) in Parser::new_ext(input, parser_options()).into_offset_iter() {
            b.offset = range.start;
            b.push_event(event)?;
            for token in b.ready.drain(..) {
                on_token(token);
            }
        }
        log::debug!("tokenized {} bytes into {} blocks", input.len(), b.emitted);
        Ok(())
    }
}

/// Tokenize with default limits.
pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizeError> {
    Tokenizer::default().tokenize(input)
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[derive(Clone, Debug)]
struct OpenItem {
    text: String,
    /// Text already moved into the list because a nested list started.
    flushed: bool,
}

#[derive(Clone, Debug)]
struct OpenCode {
    text: String,
    language: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct OpenTable {
    row: Vec<String>,
    cell: Option<String>,
}

struct BlockBuilder {
    limits: TokenizeLimits,
    offset: usize,
    emitted: usize,
    ready: Vec<Token>,
    heading: Option<(u8, String)>,
    paragraph: Option<String>,
    code: Option<OpenCode>,
    html: Option<String>,
    table: Option<OpenTable>,
    list_depth: usize,
    list_start: Option<u64>,
    list_items: Vec<String>,
    items: Vec<OpenItem>,
    strong_depth: usize,
}

impl BlockBuilder {
    fn new(limits: TokenizeLimits) -> Self {
        Self {
            limits,
            offset: 0,
            emitted: 0,
            ready: Vec::with_capacity(2),
            heading: None,
            paragraph: None,
            code: None,
            html: None,
            table: None,
            list_depth: 0,
            list_start: None,
            list_items: Vec::new(),
            items: Vec::new(),
            strong_depth: 0,
        }
    }

    fn emit(&mut self, token: Token) -> Result<(), TokenizeError> {
        if self.emitted >= self.limits.max_tokens {
            return Err(
                TokenizeError::new("too_many_blocks", "block count exceeds budget")
                    .with_offset(self.offset)
                    .with_limit("max_tokens", self.emitted + 1, self.limits.max_tokens),
            );
        }
        self.emitted += 1;
        self.ready.push(token);
        Ok(())
    }

    /// Buffer that currently receives inline text, innermost first.
    fn text_sink(&mut self) -> Option<&mut String> {
        if self.table.as_ref().is_some_and(|t| t.cell.is_some()) {
            return self.table.as_mut().and_then(|t| t.cell.as_mut());
        }
        if self.code.is_some() {
            return self.code.as_mut().map(|code| &mut code.text);
        }
        if self.heading.is_some() {
            return self.heading.as_mut().map(|(_, text)| text);
        }
        if self.paragraph.is_some() {
            return self.paragraph.as_mut();
        }
        if !self.items.is_empty() {
            return self.items.last_mut().map(|item| &mut item.text);
        }
        self.html.as_mut()
    }

    /// Append source text. Code block text stays verbatim; everywhere else
    /// it is escaped so it cannot pose as a strong marker.
    fn push_text(&mut self, text: &str) {
        if self.code.is_some() {
            self.push_markup(text);
        } else {
            self.push_markup(&escape_literal(text));
        }
    }

    /// Append text the splitter must interpret, such as strong markers.
    fn push_markup(&mut self, markup: &str) {
        if let Some(sink) = self.text_sink() {
            sink.push_str(markup);
        }
    }

    /// Separate consecutive blocks that land in the same list item.
    fn separate_item_block(&mut self) {
        if let Some(item) = self.items.last_mut() {
            if !item.text.is_empty() && !item.text.ends_with(' ') {
                item.text.push(' ');
            }
        }
    }

    fn push_event(&mut self, event: Event<'_>) -> Result<(), TokenizeError> {
        match event {
            Event::Start(tag) => self.start_tag(tag)?,
            Event::End(tag) => self.end_tag(tag)?,
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.push_text(&code),
            Event::InlineHtml(html) => self.push_text(&html),
            Event::Html(html) => {
                if let Some(buf) = self.html.as_mut() {
                    buf.push_str(&escape_literal(&html));
                } else {
                    self.push_text(&html);
                }
            }
            Event::SoftBreak => self.push_markup(" "),
            Event::HardBreak => self.push_markup("\n"),
            Event::FootnoteReference(label) => {
                self.push_text("[");
                self.push_text(&label);
                self.push_text("]");
            }
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " });
            }
            Event::Rule => {
                if self.items.is_empty() {
                    self.emit(Token::Rule)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn start_tag(&mut self, tag: Tag<'_>) -> Result<(), TokenizeError> {
        match tag {
            Tag::Heading { level, .. } => {
                if self.items.is_empty() {
                    self.heading = Some((heading_depth(level), String::new()));
                } else {
                    self.separate_item_block();
                }
            }
            Tag::Paragraph => {
                if self.items.is_empty() && self.table.is_none() {
                    self.paragraph = Some(String::new());
                } else {
                    self.separate_item_block();
                }
            }
            Tag::CodeBlock(kind) => {
                if self.items.is_empty() {
                    let language = match kind {
                        CodeBlockKind::Fenced(lang) => {
                            let lang = lang.trim();
                            (!lang.is_empty()).then(|| lang.to_string())
                        }
                        CodeBlockKind::Indented => None,
                    };
                    self.code = Some(OpenCode {
                        text: String::new(),
                        language,
                    });
                } else {
                    self.separate_item_block();
                }
            }
            Tag::HtmlBlock => {
                if self.items.is_empty() {
                    self.html = Some(String::new());
                }
            }
            Tag::List(start) => {
                if self.list_depth >= self.limits.max_list_depth {
                    return Err(TokenizeError::new(
                        "list_too_deep",
                        "list nesting exceeds depth budget",
                    )
                    .with_offset(self.offset)
                    .with_limit(
                        "max_list_depth",
                        self.list_depth + 1,
                        self.limits.max_list_depth,
                    ));
                }
                if self.list_depth == 0 {
                    self.list_start = start;
                    self.list_items.clear();
                }
                self.list_depth += 1;
            }
            Tag::Item => {
                if let Some(parent) = self.items.last_mut() {
                    if !parent.text.trim().is_empty() {
                        let text = core::mem::take(&mut parent.text);
                        parent.flushed = true;
                        self.list_items.push(text.trim_end().to_string());
                    }
                }
                self.items.push(OpenItem {
                    text: String::new(),
                    flushed: false,
                });
            }
            Tag::Table(_) => {
                if self.items.is_empty() {
                    self.table = Some(OpenTable::default());
                }
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell = Some(String::new());
                }
            }
            Tag::Strong => {
                if self.strong_depth == 0 {
                    self.push_markup("**");
                }
                self.strong_depth += 1;
            }
            _ => {}
        }
        Ok(())
    }

    fn end_tag(&mut self, tag: TagEnd) -> Result<(), TokenizeError> {
        match tag {
            TagEnd::Heading(_) => {
                if let Some((depth, text)) = self.heading.take() {
                    self.emit(Token::Heading {
                        depth,
                        text: text.trim().to_string(),
                    })?;
                }
            }
            TagEnd::Paragraph => {
                if let Some(text) = self.paragraph.take() {
                    self.emit(Token::Paragraph {
                        text: text.trim().to_string(),
                    })?;
                }
            }
            TagEnd::CodeBlock => {
                if let Some(mut code) = self.code.take() {
                    if code.text.ends_with('\n') {
                        code.text.pop();
                    }
                    self.emit(Token::Code {
                        text: code.text,
                        language: code.language,
                    })?;
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html.take() {
                    let text = html.trim();
                    if !text.is_empty() {
                        self.emit(Token::Paragraph {
                            text: text.to_string(),
                        })?;
                    }
                }
            }
            TagEnd::Item => {
                if let Some(item) = self.items.pop() {
                    let text = item.text.trim();
                    if !item.flushed || !text.is_empty() {
                        self.list_items.push(text.to_string());
                    }
                }
            }
            TagEnd::List(_) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    let items = core::mem::take(&mut self.list_items);
                    let start = self.list_start.take();
                    self.emit(Token::List { items, start })?;
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    if let Some(cell) = table.cell.take() {
                        table.row.push(cell.trim().to_string());
                    }
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                let row = self
                    .table
                    .as_mut()
                    .map(|table| core::mem::take(&mut table.row));
                if let Some(row) = row {
                    self.emit(Token::Paragraph {
                        text: row.join(" | "),
                    })?;
                }
            }
            TagEnd::Table => {
                self.table = None;
            }
            TagEnd::Strong => {
                self.strong_depth = self.strong_depth.saturating_sub(1);
                if self.strong_depth == 0 {
                    self.push_markup("**");
                }
            }
            _ => {}
        }
        Ok(())
    }
}

//! Inline style splitting for `**bold**` spans.
//!
//! A block's inline text is scanned once, alternating between plain and bold
//! spans. Matched marker pairs are removed; anything that does not close on
//! the same line is kept literally.
//!
//! Token text produced by the tokenizer escapes literal `*` and `\` with a
//! backslash so that only strong spans carry `**` markers. [`split_inline`]
//! reads that form; [`split_styled`] treats every byte literally.

use std::borrow::Cow;

const BOLD_MARKER: &[u8; 2] = b"**";
const ESCAPE: u8 = b'\\';

/// One styled run derived from a block's inline text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyledSegment<'a> {
    /// Literal text with style markers and escapes stripped.
    pub content: Cow<'a, str>,
    /// Bold span.
    pub bold: bool,
    /// `false` only for the final segment of the source run.
    pub continued: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScanState {
    Normal,
    InBold { open: usize },
}

/// Split `text` into alternating plain/bold segments.
///
/// Empty spans produce no segment, so an empty input yields an empty vector
/// and callers can skip drawing entirely.
pub fn split_styled(text: &str) -> Vec<StyledSegment<'_>> {
    scan(text, false)
}

/// Split escaped token text into alternating plain/bold segments.
///
/// `\*` and `\\` stand for a literal `*` and `\`, and never open or close a
/// bold span. Any other backslash is literal.
pub fn split_inline(text: &str) -> Vec<StyledSegment<'_>> {
    scan(text, true)
}

/// Escape `text` so [`split_inline`] reproduces it without styling.
pub fn escape_literal(text: &str) -> Cow<'_, str> {
    if !text.bytes().any(|b| b == b'*' || b == ESCAPE) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if ch == '*' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    Cow::Owned(out)
}

fn scan(text: &str, escapes: bool) -> Vec<StyledSegment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::with_capacity(4);
    let mut plain_start = 0usize;
    let mut state = ScanState::Normal;
    let mut i = 0usize;

    while i < bytes.len() {
        if escapes && is_escape_at(bytes, i) {
            i += 2;
            continue;
        }
        match state {
            ScanState::Normal => {
                if is_marker_at(bytes, i) {
                    state = ScanState::InBold { open: i };
                    i += BOLD_MARKER.len();
                } else {
                    i += 1;
                }
            }
            ScanState::InBold { open } => {
                if bytes[i] == b'\n' {
                    // No closer on this line; the opener is literal text.
                    state = ScanState::Normal;
                    i += 1;
                } else if is_marker_at(bytes, i) {
                    push_segment(&mut segments, &text[plain_start..open], false, escapes);
                    push_segment(
                        &mut segments,
                        &text[open + BOLD_MARKER.len()..i],
                        true,
                        escapes,
                    );
                    i += BOLD_MARKER.len();
                    plain_start = i;
                    state = ScanState::Normal;
                } else {
                    i += 1;
                }
            }
        }
    }
    push_segment(&mut segments, &text[plain_start..], false, escapes);

    if let Some(last) = segments.last_mut() {
        last.continued = false;
    }
    segments
}

fn is_marker_at(bytes: &[u8], i: usize) -> bool {
    bytes.get(i..i + BOLD_MARKER.len()) == Some(&BOLD_MARKER[..])
}

fn is_escape_at(bytes: &[u8], i: usize) -> bool {
    bytes[i] == ESCAPE && matches!(bytes.get(i + 1).copied(), Some(b'*') | Some(ESCAPE))
}

fn unescape(span: &str) -> Cow<'_, str> {
    if !span.contains('\\') {
        return Cow::Borrowed(span);
    }
    let mut out = String::with_capacity(span.len());
    let mut chars = span.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '*' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    Cow::Owned(out)
}

fn push_segment<'a>(
    segments: &mut Vec<StyledSegment<'a>>,
    content: &'a str,
    bold: bool,
    escapes: bool,
) {
    if content.is_empty() {
        return;
    }
    let content = if escapes {
        unescape(content)
    } else {
        Cow::Borrowed(content)
    };
    segments.push(StyledSegment {
        content,
        bold,
        continued: true,
    });
}

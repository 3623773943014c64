//! Error types for markdown tokenization.

use core::fmt;

/// Typed actual-vs-limit context attached to limit violations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLimitContext {
    /// Which limit was hit (e.g. `"max_input_bytes"`).
    pub kind: &'static str,
    /// Observed value.
    pub actual: usize,
    /// Configured ceiling.
    pub limit: usize,
}

impl ErrorLimitContext {
    pub fn new(kind: &'static str, actual: usize, limit: usize) -> Self {
        Self {
            kind,
            actual,
            limit,
        }
    }
}

/// The parser could not turn the input into a token sequence.
///
/// This is the malformed-document condition: callers should treat it as a
/// client error and not retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizeError {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional byte offset into the input.
    pub offset: Option<usize>,
    /// Optional typed actual-vs-limit context.
    pub limit: Option<Box<ErrorLimitContext>>,
}

/// Alias naming the condition after what it means to a caller.
pub type MalformedDocumentError = TokenizeError;

impl TokenizeError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
            offset: None,
            limit: None,
        }
    }

    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn with_limit(mut self, kind: &'static str, actual: usize, limit: usize) -> Self {
        self.limit = Some(Box::new(ErrorLimitContext::new(kind, actual, limit)));
        self
    }
}

impl fmt::Display for TokenizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed document: {}: {}", self.code, self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " [offset={}]", offset)?;
        }
        if let Some(limit) = self.limit.as_deref() {
            write!(
                f,
                " [limit_kind={} actual={} limit={}]",
                limit.kind, limit.actual, limit.limit
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for TokenizeError {}

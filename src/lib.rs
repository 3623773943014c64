//! Markdown block tokenization and inline style splitting for paginated
//! document rendering.
//!
//! `mdpage` turns markdown text into an ordered sequence of block [`Token`]s
//! and splits inline text into bold/plain [`StyledSegment`]s. Layout and
//! output live in `mdpage-render` and `mdpage-pdf`.

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

pub mod error;
pub mod inline;
pub mod token;

pub use error::{ErrorLimitContext, MalformedDocumentError, TokenizeError};
pub use inline::{escape_literal, split_inline, split_styled, StyledSegment};
pub use token::{tokenize, Token, TokenizeLimits, Tokenizer};

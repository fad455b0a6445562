use thiserror::Error;

/// Raised when the input cannot be treated as text at all.
///
/// Structurally odd markdown never produces this: unterminated fences,
/// unbalanced emphasis and the like degrade to best-effort output instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("input is not valid UTF-8 text: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
}

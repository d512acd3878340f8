use thiserror::Error;

use crate::range::Position;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Unexpected character `{0}` at {1}")]
    UnexpectedCharacter(char, Position),
    #[error("Unterminated string starting at {0}")]
    UnterminatedString(Position),
    #[error("Invalid number `{0}` at {1}")]
    InvalidNumber(String, Position),
    #[error("Unexpected EOF detected, expression opened at {0} is never closed")]
    UnexpectedEOFDetected(Position),
}

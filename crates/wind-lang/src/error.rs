use thiserror::Error as ThisError;

use crate::{ast::error::ParseError, eval::error::EvalError, lexer::error::LexerError};

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

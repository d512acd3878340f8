use thiserror::Error;

use crate::{lexer::token::Token, range::Position};

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token `{0}` at {pos}", pos = .0.position)]
    UnexpectedToken(Token),
    #[error("Expected an operator name after `(` at {0}")]
    EmptyCall(Position),
    #[error("Expected a closing parenthesis `)` but got `{0}` at {pos}", pos = .0.position)]
    ExpectedClosingParen(Token),
    #[error("Expected a closing bracket `]` but got `{0}` at {pos}", pos = .0.position)]
    ExpectedClosingBracket(Token),
    #[error("Expected a closing brace `}}` but got `{0}` at {pos}", pos = .0.position)]
    ExpectedClosingBrace(Token),
    #[error("Invalid object key `{0}` at {pos}", pos = .0.position)]
    InvalidObjectKey(Token),
}

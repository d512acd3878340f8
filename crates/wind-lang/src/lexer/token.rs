use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::range::Position;

#[derive(PartialEq, Debug, Clone)]
pub struct Token {
    pub position: Position,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { position, kind }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum TokenKind {
    /// Raw text outside any top-level expression.
    Text(String),
    Colon,
    Eof,
    Ident(SmolStr),
    LBrace,
    LBracket,
    LParen,
    NumberLiteral(f64),
    RBrace,
    RBracket,
    RParen,
    StringLiteral(String),
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TokenKind::Text(_) => write!(f, "<text>"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::StringLiteral(s) => write!(f, "{:?}", s),
        }
    }
}

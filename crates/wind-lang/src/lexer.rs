pub mod error;
pub mod token;

use std::iter::Peekable;
use std::str::Chars;

use error::LexerError;
use token::{Token, TokenKind};

use crate::range::Position;

/// Splits a source unit into text runs and expression tokens.
///
/// Everything outside a top-level `( ... )` is collected verbatim into
/// [`TokenKind::Text`]; inside an expression the usual token rules apply.
#[derive(Debug, Clone, Default)]
pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Self
    }

    pub fn tokenize(&self, code: &str) -> Result<Vec<Token>, LexerError> {
        Scanner::new(code).run()
    }
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    position: Position,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(code: &'a str) -> Self {
        Self {
            chars: code.chars().peekable(),
            position: Position::default(),
            tokens: Vec::new(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position.advance(c);
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, position: Position) {
        self.tokens.push(Token::new(kind, position));
    }

    fn run(mut self) -> Result<Vec<Token>, LexerError> {
        let mut text = String::new();
        let mut text_start = self.position;

        while let Some(&c) = self.chars.peek() {
            if c == '(' {
                if !text.is_empty() {
                    self.push(TokenKind::Text(std::mem::take(&mut text)), text_start);
                }
                self.expression()?;
            } else {
                if text.is_empty() {
                    text_start = self.position;
                }
                text.push(c);
                self.bump();
            }
        }

        if !text.is_empty() {
            self.push(TokenKind::Text(text), text_start);
        }

        let eof = self.position;
        self.push(TokenKind::Eof, eof);
        Ok(self.tokens)
    }

    fn expression(&mut self) -> Result<(), LexerError> {
        let start = self.position;
        let mut depth = 0usize;

        loop {
            let Some(&c) = self.chars.peek() else {
                return Err(LexerError::UnexpectedEOFDetected(start));
            };
            let position = self.position;

            match c {
                '(' => {
                    self.bump();
                    depth += 1;
                    self.push(TokenKind::LParen, position);
                }
                ')' => {
                    self.bump();
                    self.push(TokenKind::RParen, position);
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '[' => {
                    self.bump();
                    self.push(TokenKind::LBracket, position);
                }
                ']' => {
                    self.bump();
                    self.push(TokenKind::RBracket, position);
                }
                '{' => {
                    self.bump();
                    self.push(TokenKind::LBrace, position);
                }
                '}' => {
                    self.bump();
                    self.push(TokenKind::RBrace, position);
                }
                ':' => {
                    self.bump();
                    self.push(TokenKind::Colon, position);
                }
                '#' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '"' | '\'' => self.string(c, position)?,
                c if c.is_whitespace() || c == ',' => {
                    self.bump();
                }
                c if c.is_ascii_digit() || (c == '-' && self.next_is_digit()) => {
                    self.number(position)?
                }
                c if c.is_control() => return Err(LexerError::UnexpectedCharacter(c, position)),
                _ => self.ident(position),
            }
        }
    }

    fn next_is_digit(&self) -> bool {
        self.chars
            .clone()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn string(&mut self, quote: char, start: Position) -> Result<(), LexerError> {
        self.bump();
        let mut s = String::new();

        loop {
            match self.bump() {
                None => return Err(LexerError::UnterminatedString(start)),
                Some('\\') => match self.bump() {
                    None => return Err(LexerError::UnterminatedString(start)),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('0') => s.push('\0'),
                    Some(c) => s.push(c),
                },
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
            }
        }

        self.push(TokenKind::StringLiteral(s), start);
        Ok(())
    }

    fn number(&mut self, start: Position) -> Result<(), LexerError> {
        let mut raw = String::new();
        if let Some('-') = self.chars.peek() {
            raw.push('-');
            self.bump();
        }

        while let Some(&c) = self.chars.peek() {
            let exponent_sign = (c == '+' || c == '-') && raw.ends_with(['e', 'E']);
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                raw.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let n = raw
            .parse::<f64>()
            .map_err(|_| LexerError::InvalidNumber(raw.clone(), start))?;
        self.push(TokenKind::NumberLiteral(n), start);
        Ok(())
    }

    fn ident(&mut self, start: Position) {
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | ',' | ':' | '"' | '\'') {
                break;
            }
            s.push(c);
            self.bump();
        }
        self.push(TokenKind::Ident(s.into()), start);
    }
}

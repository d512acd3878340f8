use std::iter::Peekable;
use std::slice::Iter;

use serde_json::{Number, Value};
use smol_str::SmolStr;

use super::error::ParseError;
use super::node::{Expr, Node};
use crate::Program;
use crate::lexer::token::{Token, TokenKind};

pub struct Parser<'a> {
    tokens: Peekable<Iter<'a, Token>>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Iter<'a, Token>) -> Self {
        Self {
            tokens: tokens.peekable(),
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut program = Vec::new();

        while let Some(token) = self.tokens.next() {
            match &token.kind {
                TokenKind::Eof => break,
                TokenKind::Text(text) => program.push(Node::Text(text.clone())),
                TokenKind::LParen => program.push(Node::Template(self.parse_call(token)?)),
                _ => return Err(ParseError::UnexpectedToken(token.clone())),
            }
        }

        Ok(program)
    }

    fn next_token(&mut self) -> Result<&'a Token, ParseError> {
        // The lexer always terminates the stream with `Eof`, so running past it
        // means a closing delimiter is missing.
        self.tokens
            .next()
            .ok_or_else(|| ParseError::UnexpectedToken(Token::new(TokenKind::Eof, Default::default())))
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let token = self.next_token()?;

        match &token.kind {
            TokenKind::LParen => self.parse_call(token),
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_object(),
            TokenKind::StringLiteral(s) => Ok(Expr::Literal(Value::String(s.clone()))),
            TokenKind::NumberLiteral(n) => Ok(Expr::Literal(number(*n))),
            TokenKind::Ident(ident) => Ok(match ident.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Ident(ident.clone()),
            }),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn parse_call(&mut self, open: &Token) -> Result<Expr, ParseError> {
        let name = match self.tokens.peek().map(|token| &token.kind) {
            Some(TokenKind::Ident(name)) => name.clone(),
            Some(TokenKind::RParen) => return Err(ParseError::EmptyCall(open.position)),
            _ => {
                let token = self.next_token()?;
                return Err(ParseError::UnexpectedToken(token.clone()));
            }
        };
        self.tokens.next();

        let mut args = Vec::new();
        loop {
            match self.tokens.peek().map(|token| &token.kind) {
                Some(TokenKind::RParen) => {
                    self.tokens.next();
                    return Ok(Expr::Call(name, args));
                }
                Some(TokenKind::Eof) | None => {
                    let token = self.next_token()?;
                    return Err(ParseError::ExpectedClosingParen(token.clone()));
                }
                _ => args.push(self.parse_expr()?),
            }
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let mut items = Vec::new();
        loop {
            match self.tokens.peek().map(|token| &token.kind) {
                Some(TokenKind::RBracket) => {
                    self.tokens.next();
                    return Ok(Expr::Array(items));
                }
                Some(TokenKind::RParen | TokenKind::RBrace | TokenKind::Eof) | None => {
                    let token = self.next_token()?;
                    return Err(ParseError::ExpectedClosingBracket(token.clone()));
                }
                _ => items.push(self.parse_expr()?),
            }
        }
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let mut entries: Vec<(SmolStr, Expr)> = Vec::new();
        loop {
            let token = self.next_token()?;
            let key: SmolStr = match &token.kind {
                TokenKind::RBrace => return Ok(Expr::Object(entries)),
                TokenKind::Ident(key) => key.clone(),
                TokenKind::StringLiteral(key) => key.into(),
                TokenKind::RParen | TokenKind::RBracket | TokenKind::Eof => {
                    return Err(ParseError::ExpectedClosingBrace(token.clone()));
                }
                _ => return Err(ParseError::InvalidObjectKey(token.clone())),
            };

            if let Some(TokenKind::Colon) = self.tokens.peek().map(|token| &token.kind) {
                self.tokens.next();
            }

            if let Some(TokenKind::RBrace) = self.tokens.peek().map(|token| &token.kind) {
                let token = self.next_token()?;
                return Err(ParseError::UnexpectedToken(token.clone()));
            }

            let value = self.parse_expr()?;
            entries.push((key, value));
        }
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

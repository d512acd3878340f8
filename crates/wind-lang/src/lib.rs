//! `wind-lang` is the small expression language evaluated by the wind dispatcher.
//!
//! A source unit is free text interleaved with parenthesised expressions.
//! Only the expressions are executable; the text in between is kept by the
//! reader so callers can decide what to do with it.
//!
//! ## Examples
//!
//! ```rust
//! use wind_lang::{Context, eval_program};
//!
//! let program = wind_lang::parse("(set total (+ 1 2)) (concat \"sum=\" total)").unwrap();
//! let mut ctx = Context::new();
//!
//! assert_eq!(
//!     eval_program(&program, &mut ctx).unwrap(),
//!     serde_json::json!("sum=3")
//! );
//! ```
mod ast;
mod error;
mod eval;
mod lexer;
mod range;
pub mod value;

pub use ast::error::ParseError;
pub use ast::node::{Expr, Node};
pub use ast::parser::Parser;
pub use error::Error;
pub use eval::builtin::{BUILTIN_FUNCTIONS, is_builtin};
pub use eval::env::Context;
pub use eval::error::{EvalError, Unwind};
pub use eval::{Host, eval_expr, eval_node, eval_program};
pub use lexer::Lexer;
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use range::Position;

/// A parsed source unit.
pub type Program = Vec<Node>;

pub fn parse(code: &str) -> Result<Program, Error> {
    let tokens = tokenize(code)?;
    Ok(Parser::new(tokens.iter()).parse()?)
}

pub fn tokenize(code: &str) -> Result<Vec<Token>, Error> {
    Ok(Lexer::new().tokenize(code)?)
}

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// Top-level unit of a parsed source file.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Node {
    /// Literal text found between top-level expressions.
    Text(String),
    /// A top-level parenthesised expression; the only executable node kind.
    Template(Expr),
}

impl Node {
    pub fn is_template(&self) -> bool {
        matches!(self, Node::Template(_))
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    /// Dotted variable path, e.g. `args.user.name`.
    Ident(SmolStr),
    Call(SmolStr, Vec<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(SmolStr, Expr)>),
}

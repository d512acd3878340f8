pub mod builtin;
pub mod env;
pub mod error;

use serde_json::Value;

use crate::ast::node::{Expr, Node};
use crate::value::{self, Object};
use env::Context;
use error::EvalError;

/// The environment a program is evaluated in.
///
/// The evaluator owns no state of its own: variables live in the
/// [`Context`] handed out by `context()`, and every operator that is neither
/// a special form nor a builtin is offered to `call`. Returning `None` from
/// `call` means the host does not know the operator either.
pub trait Host {
    fn context(&mut self) -> &mut Context;

    fn call(&mut self, name: &str, args: Vec<Value>) -> Option<Result<Value, EvalError>>;
}

/// A bare context is a host without any extra primitives.
impl Host for Context {
    fn context(&mut self) -> &mut Context {
        self
    }

    fn call(&mut self, _name: &str, _args: Vec<Value>) -> Option<Result<Value, EvalError>> {
        None
    }
}

/// Evaluates every node in order and returns the value of the last one.
pub fn eval_program(nodes: &[Node], host: &mut dyn Host) -> Result<Value, EvalError> {
    let mut result = Value::Null;
    for node in nodes {
        result = eval_node(node, host)?;
    }
    Ok(result)
}

pub fn eval_node(node: &Node, host: &mut dyn Host) -> Result<Value, EvalError> {
    match node {
        Node::Text(text) => Ok(Value::String(text.clone())),
        Node::Template(expr) => eval_expr(expr, host),
    }
}

pub fn eval_expr(expr: &Expr, host: &mut dyn Host) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(path) => Ok(host.context().lookup(path)),
        Expr::Array(items) => items
            .iter()
            .map(|item| eval_expr(item, host))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Object(entries) => {
            let mut map = Object::with_capacity(entries.len());
            for (key, expr) in entries {
                map.insert(key.to_string(), eval_expr(expr, host)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Call(name, args) => eval_call(name, args, host),
    }
}

fn eval_call(name: &str, args: &[Expr], host: &mut dyn Host) -> Result<Value, EvalError> {
    match name {
        "set" => eval_set(name, args, host),
        "get" => match args {
            [target] => {
                let path = eval_path(target, host)?;
                Ok(host.context().lookup(&path))
            }
            _ => Err(EvalError::InvalidNumberOfArguments(name.into(), 1, args.len())),
        },
        "do" => {
            let mut result = Value::Null;
            for arg in args {
                result = eval_expr(arg, host)?;
            }
            Ok(result)
        }
        "if" => match args {
            [cond, then] => eval_if(cond, then, None, host),
            [cond, then, otherwise] => eval_if(cond, then, Some(otherwise), host),
            _ => Err(EvalError::InvalidNumberOfArguments(name.into(), 2, args.len())),
        },
        "and" => {
            let mut result = Value::Bool(true);
            for arg in args {
                result = eval_expr(arg, host)?;
                if !value::is_truthy(&result) {
                    break;
                }
            }
            Ok(result)
        }
        "or" => {
            let mut result = Value::Bool(false);
            for arg in args {
                result = eval_expr(arg, host)?;
                if value::is_truthy(&result) {
                    break;
                }
            }
            Ok(result)
        }
        _ => {
            let values = args
                .iter()
                .map(|arg| eval_expr(arg, host))
                .collect::<Result<Vec<_>, _>>()?;

            if let Some(result) = builtin::eval_builtin(name, &values) {
                return result;
            }

            host.call(name, values)
                .unwrap_or_else(|| Err(EvalError::NotDefined(name.into())))
        }
    }
}

fn eval_set(name: &str, args: &[Expr], host: &mut dyn Host) -> Result<Value, EvalError> {
    let [target, expr] = args else {
        return Err(EvalError::InvalidNumberOfArguments(name.into(), 2, args.len()));
    };

    let path = eval_path(target, host)?;
    if path.is_empty() {
        return Err(EvalError::InvalidTypes {
            name: name.into(),
            args: vec!["string"],
        });
    }

    let value = eval_expr(expr, host)?;
    host.context().set(&path, value.clone());
    Ok(value)
}

/// A bare name is the path itself; anything else is evaluated and its text
/// used as the path.
fn eval_path(target: &Expr, host: &mut dyn Host) -> Result<String, EvalError> {
    match target {
        Expr::Ident(path) => Ok(path.to_string()),
        other => Ok(value::to_text(&eval_expr(other, host)?)),
    }
}

fn eval_if(
    cond: &Expr,
    then: &Expr,
    otherwise: Option<&Expr>,
    host: &mut dyn Host,
) -> Result<Value, EvalError> {
    if value::is_truthy(&eval_expr(cond, host)?) {
        eval_expr(then, host)
    } else {
        otherwise.map_or(Ok(Value::Null), |expr| eval_expr(expr, host))
    }
}

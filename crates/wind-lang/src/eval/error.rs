use smol_str::SmolStr;
use thiserror::Error;

type FunctionName = SmolStr;

/// Non-local exits raised by host primitives. The evaluator never handles
/// these itself; they travel up to whoever started the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unwind {
    /// A nested execution replied; unwind to the call site.
    Return,
    /// A top-level reply inside a batch entry; unwind to the batch loop.
    Suppressed,
    /// The request is finished; nothing further may run.
    Terminated,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{}", message)]
    UserDefined { message: String },
    #[error("\"{0}\" is not defined")]
    NotDefined(FunctionName),
    #[error("Invalid number of arguments in \"{0}\", expected {1}, got {2}")]
    InvalidNumberOfArguments(FunctionName, usize, usize),
    #[error(r#"Invalid types for "{}", got {}"#, name, args.join(", "))]
    InvalidTypes {
        name: FunctionName,
        args: Vec<&'static str>,
    },
    #[error("Divided by 0")]
    ZeroDivision,
    /// Raised by the host; the message is shown as is.
    #[error("{0}")]
    Runtime(String),
    #[error("Unexpected unwind {0:?}")]
    Unwind(Unwind),
}

impl EvalError {
    pub fn is_unwind(&self) -> bool {
        matches!(self, EvalError::Unwind(_))
    }
}

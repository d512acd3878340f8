use thiserror::Error;

use crate::path::FunctionPath;
use crate::status::Status;

/// Failure of one dispatched program, as seen at a top-level or batch-entry
/// boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Fault {
    #[error("Function not found: {0}")]
    FunctionNotFound(FunctionPath),
    /// Raised on purpose by program logic (`throw`).
    #[error("{0}")]
    Application(String),
    /// Anything else that went wrong while resolving or evaluating.
    #[error("{0}")]
    Structural(String),
}

impl Fault {
    pub fn status(&self) -> Status {
        match self {
            Fault::FunctionNotFound(_) => Status::FunctionNotFound,
            Fault::Application(_) | Fault::Structural(_) => Status::CustomError,
        }
    }

    /// Whether the fault must become a structured reply even for clients that
    /// do not accept JSON.
    pub fn is_always_reported(&self) -> bool {
        !matches!(self, Fault::Structural(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Unhandled fault while dispatching \"{path}\": {fault}")]
    Unhandled { path: String, fault: Fault },
}

use smol_str::SmolStr;
use thiserror::Error;

use crate::path::FunctionPath;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallStackError {
    #[error("Cannot resolve relative path \"{0}\" without an active frame")]
    NoActiveFrame(FunctionPath),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub namespace: SmolStr,
    pub path: FunctionPath,
}

impl CallFrame {
    pub fn new(path: FunctionPath) -> Self {
        Self {
            namespace: path.namespace(),
            path,
        }
    }
}

/// Frames of the programs currently executing, innermost last. Used only for
/// relative name resolution; recursion limits are tracked on the context.
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn resolve(&self, path: &FunctionPath) -> Result<FunctionPath, CallStackError> {
        if !path.is_relative() {
            return Ok(path.clone());
        }

        self.top()
            .map(|frame| path.with_namespace(&frame.namespace))
            .ok_or_else(|| CallStackError::NoActiveFrame(path.clone()))
    }
}

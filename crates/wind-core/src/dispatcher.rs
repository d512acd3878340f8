use std::sync::Arc;

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info, warn};
use wind_lang::{Context, EvalError, Host, Unwind, value};

use crate::cache::{CacheError, ProgramCache};
use crate::call_stack::{CallFrame, CallStack};
use crate::error::{DispatchError, Fault};
use crate::params::RequestParams;
use crate::path::FunctionPath;
use crate::reply::{Reply, ReplyEngine, Response, echo_line};

pub const DEFAULT_MAX_DEPTH: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Deepest `internal_call` a `call`/`icall` may reach.
    pub max_depth: u32,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// How one `process` run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The program finished with an empty result; nothing was replied.
    Completed(Value),
    /// A nested execution replied.
    EarlyReturn(Reply),
    /// A batch entry replied; nothing was written.
    SuppressedEmit(Reply),
    /// The request is over.
    Terminated,
    Fault(Fault),
}

/// Executes the programs of one physical request.
///
/// A dispatcher owns all per-request state: the call stack, the execution
/// context and the reply engine. Only the program cache is shared.
pub struct Dispatcher {
    cache: Arc<ProgramCache>,
    options: DispatchOptions,
    params: RequestParams,
    stack: CallStack,
    context: Context,
    output: ReplyEngine,
    pub(crate) batch: bool,
}

impl Dispatcher {
    pub fn new(cache: Arc<ProgramCache>) -> Self {
        Self::with_options(cache, DispatchOptions::default())
    }

    pub fn with_options(cache: Arc<ProgramCache>, options: DispatchOptions) -> Self {
        Self {
            cache,
            options,
            params: RequestParams::new(),
            stack: CallStack::new(),
            context: Context::new(),
            output: ReplyEngine::new(),
            batch: false,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn reply_engine(&self) -> &ReplyEngine {
        &self.output
    }

    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: RequestParams) -> RequestParams {
        std::mem::replace(&mut self.params, params)
    }

    /// Handles one request end to end and returns what the transport should
    /// send.
    ///
    /// Faults become structured replies, except a structural fault for a
    /// client that does not accept JSON, which is returned as an error.
    pub fn main(mut self, params: RequestParams) -> Result<Response, DispatchError> {
        self.params = params;
        self.context = Context::new();

        let (label, outcome) = match self.params.batch_envelope().map(str::to_string) {
            Some(envelope) => ("<batch>".to_string(), self.run_batch(&envelope)),
            None => match self.params.function_name() {
                Some(path) => (path.to_string(), self.process(&path, true)),
                None => {
                    let fault = Fault::FunctionNotFound(FunctionPath::new(
                        self.params.get("f").unwrap_or_default(),
                    ));
                    ("<none>".to_string(), Outcome::Fault(fault))
                }
            },
        };

        if let Outcome::Fault(fault) = outcome {
            if !fault.is_always_reported() && !self.params.accepts_json() {
                warn!(path = %label, %fault, "unhandled fault");
                return Err(DispatchError::Unhandled { path: label, fault });
            }

            debug!(path = %label, %fault, "fault converted to reply");
            self.emit(Reply::error(fault.status(), fault.to_string()).into_value());
        }

        Ok(self.output.finish())
    }

    /// Runs the program at `path` against the current context.
    pub fn process(&mut self, path: &FunctionPath, reset_context: bool) -> Outcome {
        if reset_context {
            self.context = Context::new();
        }

        match self.execute(path) {
            Ok(value) => Outcome::Completed(value),
            Err(EvalError::Unwind(Unwind::Return)) => {
                Outcome::EarlyReturn(self.output.take_pending().unwrap_or(Reply::Empty))
            }
            Err(EvalError::Unwind(Unwind::Suppressed)) => {
                Outcome::SuppressedEmit(self.output.take_pending().unwrap_or(Reply::Empty))
            }
            Err(EvalError::Unwind(Unwind::Terminated)) => Outcome::Terminated,
            Err(EvalError::UserDefined { message }) => Outcome::Fault(Fault::Application(message)),
            Err(e) => Outcome::Fault(Fault::Structural(e.to_string())),
        }
    }

    fn execute(&mut self, path: &FunctionPath) -> Result<Value, EvalError> {
        let path = self
            .stack
            .resolve(path)
            .map_err(|e| EvalError::Runtime(e.to_string()))?;

        if !path.is_valid() {
            return Err(self.not_found(&path));
        }

        let program = match self.cache.resolve(&path) {
            Ok(program) => program,
            Err(CacheError::NotFound(path)) => return Err(self.not_found(&path)),
            Err(e) => return Err(EvalError::Runtime(e.to_string())),
        };

        debug!(path = %path, depth = self.context.internal_call(), "executing");
        self.stack.push(CallFrame::new(path));
        let result = {
            let mut this = scopeguard::guard(&mut *self, |this| {
                this.stack.pop();
            });
            wind_lang::eval_program(&program, &mut **this)?
        };

        if value::is_empty(&result) {
            Ok(result)
        } else {
            Err(self.reply(result))
        }
    }

    /// Hands `value` to the reply engine and returns the signal to unwind
    /// with.
    fn reply(&mut self, value: Value) -> EvalError {
        EvalError::Unwind(self.output.reply(value, self.context.is_nested(), self.batch))
    }

    /// Replies at true top level regardless of the current depth or mode.
    pub(crate) fn emit(&mut self, value: Value) {
        self.output.reply(value, false, false);
    }

    fn not_found(&mut self, path: &FunctionPath) -> EvalError {
        debug!(path = %path, "function not found");
        let fault = Fault::FunctionNotFound(path.clone());
        self.reply(Reply::error(fault.status(), fault.to_string()).into_value())
    }

    /// Context-sharing sub-call: the callee sees and may change every
    /// variable of the caller; only `args` is swapped for the duration.
    pub fn call(&mut self, path: &FunctionPath, args: value::Object) -> Outcome {
        self.context.enter();
        let saved = self.context.replace_args(args);

        let mut guard = scopeguard::guard((self, saved), |(this, saved)| {
            this.context.restore_args(saved);
            this.context.leave();
        });
        let (this, _) = &mut *guard;
        this.process(path, false)
    }

    /// Context-isolating sub-call: the callee runs in a fresh context that
    /// inherits nothing but the nesting depth.
    pub fn icall(&mut self, path: &FunctionPath, args: value::Object) -> Outcome {
        let depth = self.context.enter();
        let parent = std::mem::replace(&mut self.context, Context::isolated(depth, args));

        let mut guard = scopeguard::guard((self, parent), |(this, parent)| {
            this.context = parent;
            this.context.leave();
        });
        let (this, _) = &mut *guard;
        this.process(path, false)
    }

    /// `(call name args?)` / `(icall name args?)` from inside a program.
    fn call_from_program(&mut self, op: &str, args: Vec<Value>, isolate: bool) -> Result<Value, EvalError> {
        let mut args = args.into_iter();
        let name = match args.next() {
            Some(name) => value::to_text(&name),
            None => return Err(EvalError::InvalidNumberOfArguments(op.into(), 1, 0)),
        };
        let named = match args.next() {
            None | Some(Value::Null) => value::Object::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(EvalError::InvalidTypes {
                    name: op.into(),
                    args: vec!["string", value::type_name(&other)],
                });
            }
        };

        if self.context.internal_call() >= self.options.max_depth {
            return Err(EvalError::Runtime(format!(
                "Maximum call depth of {} exceeded calling \"{}\"",
                self.options.max_depth, name
            )));
        }

        let path = FunctionPath::new(name);
        let outcome = if isolate {
            self.icall(&path, named)
        } else {
            self.call(&path, named)
        };

        match outcome {
            Outcome::Completed(value) => Ok(value),
            Outcome::EarlyReturn(reply) if reply.is_failure() => Err(self.reply(reply.into_value())),
            Outcome::EarlyReturn(reply) => Ok(reply.into_value()),
            Outcome::SuppressedEmit(reply) => {
                self.output.set_pending(Some(reply));
                Err(EvalError::Unwind(Unwind::Suppressed))
            }
            Outcome::Terminated => Err(EvalError::Unwind(Unwind::Terminated)),
            Outcome::Fault(Fault::Application(message)) => Err(EvalError::UserDefined { message }),
            Outcome::Fault(fault) => Err(EvalError::Runtime(fault.to_string())),
        }
    }

    fn stop(&mut self) -> EvalError {
        if self.batch {
            self.output.set_pending(None);
            EvalError::Unwind(Unwind::Suppressed)
        } else {
            self.output.terminate();
            EvalError::Unwind(Unwind::Terminated)
        }
    }

    fn header(&mut self, args: &[Value]) -> Result<Value, EvalError> {
        let (name, value) = match args {
            [line] => {
                let line = value::to_text(line);
                match line.split_once(':') {
                    Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
                    None => {
                        return Err(EvalError::Runtime(format!("Invalid header line \"{}\"", line)));
                    }
                }
            }
            [name, value] => (value::to_text(name), value::to_text(value)),
            _ => {
                return Err(EvalError::InvalidNumberOfArguments("header".into(), 1, args.len()));
            }
        };

        if name.is_empty() {
            return Err(EvalError::Runtime("Header name must not be empty".to_string()));
        }

        if self.batch {
            warn!(%name, %value, "header dropped inside a batch");
        } else if name.eq_ignore_ascii_case("content-type") {
            self.output.set_content_type(value);
        } else {
            self.output.add_header(name, value);
        }
        Ok(Value::Null)
    }

    fn content_type(&mut self, args: &[Value]) -> Result<Value, EvalError> {
        match args {
            [content_type] => {
                let content_type = value::to_text(content_type);
                if self.batch {
                    warn!(%content_type, "content type dropped inside a batch");
                } else {
                    self.output.set_content_type(content_type);
                }
                Ok(Value::Null)
            }
            _ => Err(EvalError::InvalidNumberOfArguments("content-type".into(), 1, args.len())),
        }
    }

    fn echo(&mut self, args: &[Value]) -> Result<Value, EvalError> {
        let line = echo_line(args);
        if self.batch {
            warn!(output = line.trim_end(), "echo output dropped inside a batch");
        } else {
            self.output.echo(&line);
        }
        Ok(Value::Null)
    }

    fn trace(&mut self, args: &[Value]) -> Result<Value, EvalError> {
        let message = args.iter().map(value::to_text).join(" ");
        if !message.is_empty() {
            let path = self.stack.top().map(|frame| frame.path.to_string()).unwrap_or_default();
            info!(target: "wind::trace", path = %path, "{}", message);
        }
        Ok(Value::Null)
    }

    fn request(&self, args: &[Value]) -> Result<Value, EvalError> {
        match args {
            [] => Ok(self.params.to_value()),
            [key] => Ok(self
                .params
                .get(&value::to_text(key))
                .map_or(Value::Null, |v| Value::String(v.to_string()))),
            _ => Err(EvalError::InvalidNumberOfArguments("request".into(), 1, args.len())),
        }
    }
}

impl Host for Dispatcher {
    fn context(&mut self) -> &mut Context {
        &mut self.context
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Option<Result<Value, EvalError>> {
        let result = match name {
            "header" => self.header(&args),
            "content-type" => self.content_type(&args),
            "return" => Err(self.reply(args.into_iter().next().unwrap_or(Value::Null))),
            "stop" => Err(self.stop()),
            "echo" => self.echo(&args),
            "trace" => self.trace(&args),
            "call" => self.call_from_program(name, args, false),
            "icall" => self.call_from_program(name, args, true),
            "throw" => Err(EvalError::UserDefined {
                message: args.iter().map(value::to_text).join(" "),
            }),
            "request" => self.request(&args),
            _ => return None,
        };
        Some(result)
    }
}

use serde_json::Value;

use crate::value::Object;

const ARGS: &str = "args";

/// Variable environment a program runs against.
///
/// `internal_call` counts how deeply the current execution is nested inside
/// `call`/`icall`; it is `0` for a top-level request and never goes negative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Object,
    args: Object,
    internal_call: u32,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh environment for a context-isolating call: nothing is inherited
    /// except the nesting depth.
    pub fn isolated(internal_call: u32, args: Object) -> Self {
        Self {
            vars: Object::new(),
            args,
            internal_call,
        }
    }

    pub fn internal_call(&self) -> u32 {
        self.internal_call
    }

    pub fn is_nested(&self) -> bool {
        self.internal_call > 0
    }

    pub fn enter(&mut self) -> u32 {
        self.internal_call = self.internal_call.saturating_add(1);
        self.internal_call
    }

    pub fn leave(&mut self) -> u32 {
        self.internal_call = self.internal_call.saturating_sub(1);
        self.internal_call
    }

    pub fn args(&self) -> &Object {
        &self.args
    }

    /// Installs a new argument binding and hands back the previous one so the
    /// caller can put it back with [`Context::restore_args`].
    pub fn replace_args(&mut self, args: Object) -> Object {
        std::mem::replace(&mut self.args, args)
    }

    pub fn restore_args(&mut self, saved: Object) {
        self.args = saved;
    }

    pub fn vars(&self) -> &Object {
        &self.vars
    }

    /// Reads a dotted path such as `user.name` or `items.0`. Paths starting
    /// with `args` read the argument binding.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let mut current = if head == ARGS {
            match segments.next() {
                Some(key) => self.args.get(key)?,
                None => return None,
            }
        } else {
            self.vars.get(head)?
        };

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Returns the whole argument binding as a value when `path` is exactly
    /// `args`, otherwise behaves like [`Context::get`].
    pub fn lookup(&self, path: &str) -> Value {
        if path == ARGS {
            return Value::Object(self.args.clone());
        }
        self.get(path).cloned().unwrap_or(Value::Null)
    }

    /// Writes a dotted path, creating intermediate objects as needed. A
    /// non-object value in the middle of the path is replaced.
    pub fn set(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        if segments.is_empty() && last == ARGS {
            if let Value::Object(map) = value {
                self.args = map;
            }
            return;
        }

        let root = if segments.first() == Some(&ARGS) {
            segments.remove(0);
            &mut self.args
        } else {
            &mut self.vars
        };

        let mut current = root;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Object::new()));
            if !entry.is_object() {
                *entry = Value::Object(Object::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }

        current.insert(last.to_string(), value);
    }
}

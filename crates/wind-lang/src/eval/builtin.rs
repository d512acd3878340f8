use std::cmp::Ordering;
use std::sync::LazyLock;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde_json::Value;

use super::error::EvalError;
use crate::value;

type BuiltinFn = fn(&str, &[Value]) -> Result<Value, EvalError>;

#[derive(Clone, Debug)]
pub struct BuiltinFunction {
    pub num_params: ParamNum,
    pub func: BuiltinFn,
}

#[derive(Clone, Debug)]
pub enum ParamNum {
    Fixed(usize),
    Range(usize, usize),
}

impl ParamNum {
    pub fn to_num(&self) -> usize {
        match self {
            ParamNum::Fixed(n) => *n,
            ParamNum::Range(min, _) => *min,
        }
    }

    #[inline(always)]
    pub fn is_valid(&self, num_args: usize) -> bool {
        match self {
            ParamNum::Fixed(n) => num_args == *n,
            ParamNum::Range(min, max) => num_args >= *min && num_args <= *max,
        }
    }
}

impl BuiltinFunction {
    pub fn new(num_params: ParamNum, func: BuiltinFn) -> Self {
        BuiltinFunction { num_params, func }
    }
}

/// Operators that take already-evaluated arguments. Special forms that need
/// lazy evaluation or the context (`set`, `if`, `and`, ...) live in the
/// evaluator itself.
pub static BUILTIN_FUNCTIONS: LazyLock<FxHashMap<&'static str, BuiltinFunction>> =
    LazyLock::new(|| {
        let mut map = FxHashMap::default();

        map.insert(
            "not",
            BuiltinFunction::new(ParamNum::Fixed(1), |_, args| {
                Ok(Value::Bool(!args.iter().all(value::is_truthy)))
            }),
        );
        map.insert(
            "eq",
            BuiltinFunction::new(ParamNum::Fixed(2), |_, args| match args {
                [a, b] => Ok(Value::Bool(loose_eq(a, b))),
                _ => Ok(Value::Bool(false)),
            }),
        );
        map.insert(
            "ne",
            BuiltinFunction::new(ParamNum::Fixed(2), |_, args| match args {
                [a, b] => Ok(Value::Bool(!loose_eq(a, b))),
                _ => Ok(Value::Bool(false)),
            }),
        );
        map.insert(
            "lt",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args| {
                compare(name, args).map(|o| Value::Bool(o == Ordering::Less))
            }),
        );
        map.insert(
            "le",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args| {
                compare(name, args).map(|o| Value::Bool(o != Ordering::Greater))
            }),
        );
        map.insert(
            "gt",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args| {
                compare(name, args).map(|o| Value::Bool(o == Ordering::Greater))
            }),
        );
        map.insert(
            "ge",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args| {
                compare(name, args).map(|o| Value::Bool(o != Ordering::Less))
            }),
        );
        map.insert(
            "+",
            BuiltinFunction::new(ParamNum::Range(1, usize::MAX), |name, args| {
                let numbers = numbers(name, args)?;
                number(numbers.into_iter().sum())
            }),
        );
        map.insert(
            "*",
            BuiltinFunction::new(ParamNum::Range(1, usize::MAX), |name, args| {
                let numbers = numbers(name, args)?;
                number(numbers.into_iter().product())
            }),
        );
        map.insert(
            "-",
            BuiltinFunction::new(ParamNum::Range(1, usize::MAX), |name, args| {
                match numbers(name, args)?.as_slice() {
                    [n] => number(-n),
                    [first, rest @ ..] => number(rest.iter().fold(*first, |acc, n| acc - n)),
                    [] => number(0.0),
                }
            }),
        );
        map.insert(
            "/",
            BuiltinFunction::new(ParamNum::Fixed(2), |name, args| {
                match numbers(name, args)?.as_slice() {
                    [_, d] if *d == 0.0 => Err(EvalError::ZeroDivision),
                    [n, d] => number(n / d),
                    _ => Err(EvalError::InvalidNumberOfArguments(name.into(), 2, args.len())),
                }
            }),
        );
        map.insert(
            "concat",
            BuiltinFunction::new(ParamNum::Range(0, usize::MAX), |_, args| {
                Ok(Value::String(args.iter().map(value::to_text).join("")))
            }),
        );
        map.insert(
            "len",
            BuiltinFunction::new(ParamNum::Fixed(1), |name, args| match args {
                [Value::String(s)] => Ok(Value::from(s.chars().count())),
                [Value::Array(items)] => Ok(Value::from(items.len())),
                [Value::Object(map)] => Ok(Value::from(map.len())),
                [Value::Null] => Ok(Value::from(0)),
                _ => Err(invalid_types(name, args)),
            }),
        );
        map.insert(
            "array",
            BuiltinFunction::new(ParamNum::Range(0, usize::MAX), |_, args| {
                Ok(Value::Array(args.to_vec()))
            }),
        );
        map.insert(
            "json",
            BuiltinFunction::new(ParamNum::Fixed(1), |_, args| {
                serde_json::to_string(&args[0])
                    .map(Value::String)
                    .map_err(|e| EvalError::Runtime(e.to_string()))
            }),
        );

        map
    });

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains_key(name)
}

#[inline(always)]
pub fn eval_builtin(name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let f = BUILTIN_FUNCTIONS.get(name)?;

    if !f.num_params.is_valid(args.len()) {
        return Some(Err(EvalError::InvalidNumberOfArguments(
            name.into(),
            f.num_params.to_num(),
            args.len(),
        )));
    }

    Some((f.func)(name, args))
}

fn invalid_types(name: &str, args: &[Value]) -> EvalError {
    EvalError::InvalidTypes {
        name: name.into(),
        args: args.iter().map(value::type_name).collect(),
    }
}

fn numbers(name: &str, args: &[Value]) -> Result<Vec<f64>, EvalError> {
    args.iter()
        .map(|arg| match arg {
            Value::Number(_) | Value::String(_) => value::as_f64(arg),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid_types(name, args))
}

fn number(n: f64) -> Result<Value, EvalError> {
    value::from_f64(n).ok_or_else(|| EvalError::Runtime(format!("{} is not a finite number", n)))
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(name: &str, args: &[Value]) -> Result<Ordering, EvalError> {
    match args {
        [Value::String(a), Value::String(b)] => Ok(a.cmp(b)),
        [a, b] => match (value::as_f64(a), value::as_f64(b)) {
            (Some(x), Some(y)) if !(a.is_boolean() || b.is_boolean()) => {
                x.partial_cmp(&y).ok_or_else(|| invalid_types(name, args))
            }
            _ => Err(invalid_types(name, args)),
        },
        _ => Err(invalid_types(name, args)),
    }
}

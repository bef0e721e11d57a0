//! Typed adapters for builtin functions.
//!
//! A builtin is written as an ordinary Rust function over numbers and
//! values, e.g. `fn(f64, f64) -> f64` or `fn(f64, NumIter<'_>) -> f64`,
//! and converted once into the erased [`OperationFn`] the evaluator calls.
//! The adapter checks the argument count and each argument's type, so the
//! function body never sees a mismatch.
//!
//! Shapes supported:
//!
//! | `Args`            | function                          |
//! |-------------------|-----------------------------------|
//! | `(A,)`            | `fn(A) -> R`                      |
//! | `(A, B)`          | `fn(A, B) -> R`                   |
//! | `(I,)`            | `fn(I) -> R`, I a rest iterator   |
//! | `(A, I)`          | `fn(A, I) -> R`                   |
//!
//! `A`/`B` are `f64`, `bool` or `Value`; `I` is [`NumIter`] or
//! [`ValueIter`]; `R` is anything `Into<Value>`, optionally in a `Result`.

use crate::Error;
use crate::ast::{NumberType, Value};
use std::sync::Arc;

/// Erased builtin signature: owns the evaluated arguments.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

fn type_mismatch(expected: &str, value: &Value) -> Error {
    Error::TypeError(format!(
        "expected {expected}, got {}: {value}",
        value.type_name()
    ))
}

/// A single positional parameter.
pub trait FromArg: Sized {
    fn from_arg(value: Value) -> Result<Self, Error>;
}

impl FromArg for Value {
    fn from_arg(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromArg for NumberType {
    fn from_arg(value: Value) -> Result<Self, Error> {
        value.try_into()
    }
}

impl FromArg for bool {
    fn from_arg(value: Value) -> Result<Self, Error> {
        value.try_into()
    }
}

/// Remaining arguments as numbers. Built only after every element has
/// been checked, so iteration cannot fail.
#[derive(Debug, Clone)]
pub struct NumIter<'a> {
    inner: std::slice::Iter<'a, Value>,
}

impl<'a> NumIter<'a> {
    pub(crate) fn new(args: &'a [Value]) -> Result<Self, Error> {
        if let Some(bad) = args.iter().find(|v| !matches!(v, Value::Number(_))) {
            return Err(type_mismatch("number", bad));
        }
        Ok(NumIter { inner: args.iter() })
    }
}

impl Iterator for NumIter<'_> {
    type Item = NumberType;

    fn next(&mut self) -> Option<NumberType> {
        self.inner.by_ref().find_map(|v| match v {
            Value::Number(n) => Some(*n),
            _ => None,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Remaining arguments as they are.
#[derive(Debug, Clone)]
pub struct ValueIter<'a> {
    inner: std::slice::Iter<'a, Value>,
}

impl<'a> ValueIter<'a> {
    pub(crate) fn new(args: &'a [Value]) -> Self {
        ValueIter { inner: args.iter() }
    }
}

impl<'a> Iterator for ValueIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A trailing rest parameter. Named with `'static` in `Args` tuples
/// (`NumIter<'static>`); the function receives it borrowed from the call's
/// argument vector.
pub trait RestArgs {
    type Iter<'a>;

    fn from_rest(args: &[Value]) -> Result<Self::Iter<'_>, Error>;
}

impl RestArgs for NumIter<'static> {
    type Iter<'a> = NumIter<'a>;

    fn from_rest(args: &[Value]) -> Result<NumIter<'_>, Error> {
        NumIter::new(args)
    }
}

impl RestArgs for ValueIter<'static> {
    type Iter<'a> = ValueIter<'a>;

    fn from_rest(args: &[Value]) -> Result<ValueIter<'_>, Error> {
        Ok(ValueIter::new(args))
    }
}

/// Builtin return types: plain values or `Result`s of them.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Fixed-arity function to [`OperationFn`].
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Function ending in a rest parameter to [`OperationFn`].
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

/// Exactly `N` arguments, or an unnamed ArityError.
fn exact<const N: usize>(args: Vec<Value>) -> Result<[Value; N], Error> {
    let got = args.len();
    <[Value; N]>::try_from(args).map_err(|_| Error::arity_error(N, got))
}

impl<F, A, R> IntoOperation<(A,)> for F
where
    F: Fn(A) -> R + Send + Sync + 'static,
    A: FromArg,
    R: IntoValueResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let [a] = exact(args)?;
            self(A::from_arg(a)?).into_value_result()
        })
    }
}

impl<F, A, B, R> IntoOperation<(A, B)> for F
where
    F: Fn(A, B) -> R + Send + Sync + 'static,
    A: FromArg,
    B: FromArg,
    R: IntoValueResult,
{
    fn into_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let [a, b] = exact(args)?;
            self(A::from_arg(a)?, B::from_arg(b)?).into_value_result()
        })
    }
}

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: RestArgs,
    F: for<'a> Fn(I::Iter<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| self(I::from_rest(&args)?).into_value_result())
    }
}

impl<F, A, I, R> IntoVariadicOperation<(A, I)> for F
where
    A: FromArg,
    I: RestArgs,
    F: for<'a> Fn(A, I::Iter<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |mut args: Vec<Value>| {
            let rest = args.split_off(args.len().min(1));
            let Some(first) = args.pop() else {
                return Err(Error::arity_error(1, 0));
            };
            let first = A::from_arg(first)?;
            self(first, I::from_rest(&rest)?).into_value_result()
        })
    }
}

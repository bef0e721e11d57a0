//! Registry of built-in operations.
//!
//! Every name a fresh environment starts with (apart from `true`, `false`
//! and `print`) is listed here once, with its implementation and arity.
//!
//! ```text
//! (add 4 3 10)        ; 17
//! (min 10 22)         ; -12
//! (min 5)             ; -5
//! (str "n=" 10 true)  ; "n=10true"
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** receive evaluated arguments through the typed adapters in
//!   [`crate::intooperation`] (e.g. `add`, `eq`, `str`).
//! - **Special Forms** receive argument nodes and control their evaluation
//!   (`if`, `do`, `def`, `let`, `defn`, `and`, `or`); see
//!   [`crate::specialforms`].
//!
//! ## Typing
//!
//! Arithmetic only accepts numbers and comparisons only accept two numbers
//! or two strings; mismatches are a `TypeError`, never a coercion. `str` and
//! `print` accept anything and concatenate the text form of each argument.
//!
//! `print` is not in the static table because it closes over the
//! interpreter's print handler; see [`print_operation`].

use crate::Error;
use crate::ast::{NumberType, SpecialFormFn, Value};
use crate::environment::Arity;
use crate::intooperation::{IntoOperation, IntoVariadicOperation, NumIter, OperationFn, ValueIter};
use crate::output::SharedPrintHandler;
use crate::specialforms::{eval_and, eval_def, eval_defn, eval_do, eval_if, eval_let, eval_or};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Name under which [`print_operation`] is bound
pub const PRINT_ID: &str = "print";

/// Implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Takes evaluated arguments, through the canonical erased signature
    Function(Arc<OperationFn>),
    /// Takes unevaluated argument nodes, the calling scope and the current depth
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// Name the operation is bound to in a fresh environment
    pub id: &'static str,
    pub op_kind: OpKind,
    /// Accepted argument counts
    pub arity: Arity,
    /// One-line description shown by the REPL
    pub summary: &'static str,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// The function wrapped with this op's arity check. Arity errors name
    /// the op. `None` for special forms.
    pub(crate) fn checked_function(&self) -> Option<Arc<OperationFn>> {
        let OpKind::Function(func) = &self.op_kind else {
            return None;
        };
        let func = Arc::clone(func);
        let (id, arity) = (self.id, self.arity);
        Some(Arc::new(move |args: Vec<Value>| {
            arity
                .validate(args.len())
                .and_then(|()| func(args))
                .map_err(|err| err.with_callee(id))
        }))
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(first: NumberType, rest: NumIter<'_>) -> NumberType {
    rest.fold(first, |acc, n| acc + n)
}

fn builtin_multi(args: NumIter<'_>) -> NumberType {
    args.fold(1.0, |acc, n| acc * n)
}

fn builtin_eq(a: Value, b: Value) -> bool {
    a == b
}

/// Order two numbers or two strings
fn compare(op: &str, a: &Value, b: &Value) -> Result<Ordering, Error> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).ok_or_else(|| {
            Error::TypeError(format!("{op}: cannot order {x} and {y}"))
        }),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(Error::TypeError(format!(
            "{op} expects two numbers or two strings, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn builtin_gt(a: Value, b: Value) -> Result<bool, Error> {
    compare("gt", &a, &b).map(Ordering::is_gt)
}

fn builtin_lt(a: Value, b: Value) -> Result<bool, Error> {
    compare("lt", &a, &b).map(Ordering::is_lt)
}

/// Unary: negation. Binary: subtraction.
fn builtin_min(first: NumberType, mut rest: NumIter<'_>) -> NumberType {
    match rest.next() {
        Some(second) => first - second,
        None => -first,
    }
}

fn builtin_inc(n: NumberType) -> NumberType {
    n + 1.0
}

fn builtin_dec(n: NumberType) -> NumberType {
    n - 1.0
}

fn builtin_str(args: ValueIter<'_>) -> String {
    args.map(|value| value.to_text()).collect()
}

/// `print`: `str`, then one line to `output`. Returns the printed text.
pub(crate) fn print_operation(output: SharedPrintHandler) -> Arc<OperationFn> {
    Arc::new(move |args: Vec<Value>| {
        Arity::AtLeast(1)
            .validate(args.len())
            .map_err(|err| err.with_callee(PRINT_ID))?;
        let text = builtin_str(ValueIter::new(&args));
        output.println(&text);
        Ok(Value::String(text))
    })
}

/// Global registry of all built-in operations.
///
/// Typed implementations are converted to the erased signature once, when
/// the registry is first used.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn builtin_variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    vec![
        // Arithmetic
        BuiltinOp {
            id: "add",
            op_kind: OpKind::Function(builtin_variadic::<(NumberType, NumIter<'static>), _>(
                builtin_add,
            )),
            arity: Arity::AtLeast(1),
            summary: "sum of one or more numbers",
        },
        BuiltinOp {
            id: "multi",
            op_kind: OpKind::Function(builtin_variadic::<(NumIter<'static>,), _>(builtin_multi)),
            arity: Arity::Any,
            summary: "product of the numbers (1 for none)",
        },
        BuiltinOp {
            id: "min",
            op_kind: OpKind::Function(builtin_variadic::<(NumberType, NumIter<'static>), _>(
                builtin_min,
            )),
            arity: Arity::Range(1, 2),
            summary: "a - b, or -a with one argument",
        },
        BuiltinOp {
            id: "inc",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType,), _>(builtin_inc)),
            arity: Arity::Exact(1),
            summary: "n + 1",
        },
        BuiltinOp {
            id: "dec",
            op_kind: OpKind::Function(builtin_fixed::<(NumberType,), _>(builtin_dec)),
            arity: Arity::Exact(1),
            summary: "n - 1",
        },
        // Comparison
        BuiltinOp {
            id: "eq",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_eq)),
            arity: Arity::Exact(2),
            summary: "equality of any two values",
        },
        BuiltinOp {
            id: "gt",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_gt)),
            arity: Arity::Exact(2),
            summary: "a > b for two numbers or two strings",
        },
        BuiltinOp {
            id: "lt",
            op_kind: OpKind::Function(builtin_fixed::<(Value, Value), _>(builtin_lt)),
            arity: Arity::Exact(2),
            summary: "a < b for two numbers or two strings",
        },
        // Strings
        BuiltinOp {
            id: "str",
            op_kind: OpKind::Function(builtin_variadic::<(ValueIter<'static>,), _>(builtin_str)),
            arity: Arity::AtLeast(1),
            summary: "concatenate the text of every argument",
        },
        // Special forms
        BuiltinOp {
            id: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            arity: Arity::Range(2, 3),
            summary: "(if cond then [else])",
        },
        BuiltinOp {
            id: "do",
            op_kind: OpKind::SpecialForm(eval_do),
            arity: Arity::Any,
            summary: "(do expr...) evaluates in order, returns the last",
        },
        BuiltinOp {
            id: "def",
            op_kind: OpKind::SpecialForm(eval_def),
            arity: Arity::AtLeast(2),
            summary: "(def name value body...) binds in the current scope",
        },
        BuiltinOp {
            id: "let",
            op_kind: OpKind::SpecialForm(eval_let),
            arity: Arity::AtLeast(2),
            summary: "(let name literal body...) binds for the body only",
        },
        BuiltinOp {
            id: "defn",
            op_kind: OpKind::SpecialForm(eval_defn),
            arity: Arity::Exact(3),
            summary: "(defn name (args a b) body) defines a function",
        },
        BuiltinOp {
            id: "and",
            op_kind: OpKind::SpecialForm(eval_and),
            arity: Arity::Any,
            summary: "false at the first false argument, else true",
        },
        BuiltinOp {
            id: "or",
            op_kind: OpKind::SpecialForm(eval_or),
            arity: Arity::Any,
            summary: "true at the first true argument, else false",
        },
    ]
});

/// Lazy static map from id to BuiltinOp
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::output::buffer_handler;

    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(value.into())
    }

    /// Invoke a builtin through the registry, including its arity check.
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_op(name).unwrap_or_else(|| panic!("builtin not found: {name}"));
        let func = op
            .checked_function()
            .unwrap_or_else(|| panic!("expected function builtin, got special form: {name}"));
        func(args.to_vec())
    }

    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    fn v<T: Into<Value>>(value: T) -> Value {
        value.into()
    }

    #[test]
    fn test_builtin_ops_registry() {
        for name in ["add", "multi", "eq", "gt", "lt", "min", "inc", "dec", "str"] {
            let op = find_op(name).unwrap();
            assert!(!op.is_special_form(), "{name} should be a function");
        }
        for name in ["if", "do", "def", "let", "defn", "and", "or"] {
            let op = find_op(name).unwrap();
            assert!(op.is_special_form(), "{name} should be a special form");
            assert!(op.checked_function().is_none());
        }
        assert!(find_op(PRINT_ID).is_none());
        assert!(find_op("sub").is_none());

        let mut ids: Vec<_> = get_builtin_ops().iter().map(|op| op.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), get_builtin_ops().len(), "duplicate builtin id");
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let many_ones: Vec<Value> = (0..100).map(|_| v(1)).collect();

        let test_cases: Vec<TestCase> = vec![
            // Arithmetic
            test!("add", &[v(4), v(3), v(10)], success(17)),
            test!("add", &[v(5)], success(5)),
            test!("add", &[v(0.1), v(0.2)], success(0.1 + 0.2)),
            test!("add", &many_ones, success(100)),
            test!("add", &[], None),
            test!("add", &[v(1), v("2")], None),
            test!("multi", &[v(2), v(3), v(4)], success(24)),
            test!("multi", &[], success(1)),
            test!("multi", &[v(2), v(true)], None),
            test!("min", &[v(10), v(4)], success(6)),
            test!("min", &[v(10), v(22)], success(-12)),
            test!("min", &[v(5)], success(-5)),
            test!("min", &[], None),
            test!("min", &[v(1), v(2), v(3)], None),
            test!("inc", &[v(41)], success(42)),
            test!("dec", &[v(0)], success(-1)),
            test!("inc", &[v("a")], None),
            test!("dec", &[], None),
            // Comparison
            test!("eq", &[v(1), v(1)], success(true)),
            test!("eq", &[v(false), v(true)], success(false)),
            test!("eq", &[v("a"), v("a")], success(true)),
            test!("eq", &[v(1), v("1")], success(false)),
            test!("eq", &[v(1)], None),
            test!("gt", &[v(10), v(5)], success(true)),
            test!("gt", &[v(5), v(5)], success(false)),
            test!("lt", &[v(-1), v(0)], success(true)),
            test!("gt", &[v("b"), v("a")], success(true)),
            test!("lt", &[v("abc"), v("abd")], success(true)),
            test!("gt", &[v(1), v("a")], None),
            test!("lt", &[v(true), v(false)], None),
            test!("gt", &[v(1), v(2), v(3)], None),
            // Strings
            test!("str", &[v("Hello "), v("World!")], success("Hello World!")),
            test!("str", &[v("n="), v(10), v(true)], success("n=10true")),
            test!("str", &[v(1.5), v(-0.0)], success("1.50")),
            test!("str", &[v("")], success("")),
            test!("str", &[], None),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            match (result, expected) {
                (Ok(actual), Some(expected)) => {
                    assert_eq!(actual, expected, "case #{} ({name})", i + 1);
                }
                (Err(_), None) => {}
                (result, expected) => {
                    panic!("case #{} ({name}): got {result:?}, expected {expected:?}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_error_variants() {
        assert_eq!(
            call_builtin("eq", &[v(1)]),
            Err(Error::named_arity_error("eq", 2, 1))
        );
        assert_eq!(
            call_builtin("min", &[v(1), v(2), v(3)]),
            Err(Error::named_arity_error("min", 2, 3))
        );
        assert!(matches!(
            call_builtin("add", &[v(1), v("x")]),
            Err(Error::TypeError(msg)) if msg.contains("expected number")
        ));
        assert!(matches!(
            call_builtin("gt", &[v(1), v("x")]),
            Err(Error::TypeError(msg)) if msg == "gt expects two numbers or two strings, got number and string"
        ));
    }

    #[test]
    fn test_print_operation_writes_and_returns_text() {
        let output = buffer_handler();
        let print = print_operation(output.clone());

        assert_eq!(print(vec![v("a"), v(1)]), Ok(v("a1")));
        assert_eq!(print(vec![v(true)]), Ok(v("true")));
        assert_eq!(output.lines(), vec!["a1", "true"]);

        assert_eq!(
            print(vec![]),
            Err(Error::named_arity_error(PRINT_ID, 1, 0))
        );
        assert_eq!(output.lines().len(), 2);
    }
}

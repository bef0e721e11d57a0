//! This module defines the abstract syntax tree and the runtime values of the
//! interpreter. [`Node`] is the closed set of tree shapes produced by the
//! parser (literal, symbol, application). [`Value`] is the dynamic runtime
//! type: numbers, strings, booleans and callables. [`Callable`] separates the
//! two argument-evaluation protocols: special forms see unevaluated nodes,
//! builtins and user functions see evaluated values.
//!
//! Helpers [`lit`], [`sym`] and [`app`] build trees tersely in code and tests.

use crate::Error;
use crate::environment::Environment;
use crate::intooperation::OperationFn;
use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

/// Type alias for number values in interpreter
pub type NumberType = f64;

/// Whole numbers below this magnitude print without a fractional part.
const INTEGER_DISPLAY_LIMIT: NumberType = 1e15;

/// Signature of a special form: unevaluated argument nodes, the calling
/// scope and the current evaluation depth.
pub type SpecialFormFn = fn(&[Node], &Environment, usize) -> Result<Value, Error>;

/// A node of the syntax tree. Trees are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A resolved scalar (number or string)
    Literal(Value),
    /// An identifier resolved at evaluation time
    Symbol(String),
    /// Operator followed by unevaluated argument expressions. Never empty.
    Application(Vec<Node>),
}

/// Runtime value
#[derive(Clone)]
pub enum Value {
    Number(NumberType),
    String(String),
    Bool(bool),
    Callable(Callable),
}

/// Something that can sit in operator position.
#[derive(Clone)]
pub enum Callable {
    /// Receives unevaluated arguments and controls their evaluation
    SpecialForm {
        id: &'static str,
        form: SpecialFormFn,
    },
    /// Host function over evaluated arguments
    Builtin {
        id: String,
        // Arc so typed Rust functions can be wrapped once and shared by
        // every environment that registers them.
        func: Arc<OperationFn>,
    },
    /// Function defined with `defn`
    Function(Rc<UserFunction>),
}

/// A function defined by `defn`, closing over its defining scope.
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Node,
    pub env: Environment,
}

impl std::fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The captured scope usually contains this function again, so it is
        // left out.
        f.debug_struct("UserFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl Callable {
    /// Name used in error messages and display
    pub fn name(&self) -> &str {
        match self {
            Callable::SpecialForm { id, .. } => id,
            Callable::Builtin { id, .. } => id,
            Callable::Function(function) => &function.name,
        }
    }

    pub fn is_special_form(&self) -> bool {
        matches!(self, Callable::SpecialForm { .. })
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::SpecialForm { id, .. } => write!(f, "SpecialForm({id})"),
            Callable::Builtin { id, .. } => write!(f, "Builtin({id})"),
            Callable::Function(function) => write!(f, "Function({function:?})"),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Special forms and builtins compare by id string, not function pointer
            (Callable::SpecialForm { id: a, .. }, Callable::SpecialForm { id: b, .. }) => a == b,
            (Callable::Builtin { id: a, .. }, Callable::Builtin { id: b, .. }) => a == b,
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({})", format_number(*n)),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Callable(callable) => write!(f, "{callable:?}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false, // Different variants are never equal
        }
    }
}

impl Value {
    /// Everything except the boolean `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Text used when the value takes part in string concatenation
    /// (`str`, `print`). Strings are not quoted.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::String(s) => Cow::Borrowed(s),
            Value::Number(n) => Cow::Owned(format_number(*n)),
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Callable(_) => Cow::Owned(self.to_string()),
        }
    }

    /// Name of the variant, for type error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Callable(_) => "function",
        }
    }
}

/// Format a number the way the language prints it: whole numbers without a
/// fractional part, everything else in shortest round-trip form.
pub fn format_number(n: NumberType) -> String {
    if n.fract() == 0.0 && n.abs() < INTEGER_DISPLAY_LIMIT {
        // -0.0 prints as 0
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Callable(Callable::SpecialForm { id, .. }) => {
                write!(f, "#<special-form:{id}>")
            }
            Value::Callable(Callable::Builtin { id, .. }) => write!(f, "#<builtin:{id}>"),
            Value::Callable(Callable::Function(function)) => {
                write!(f, "#<function:{}>", function.name)
            }
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Literal(Value::String(s)) if s.contains('"') => write!(f, "'{s}'"),
            Node::Literal(value) => write!(f, "{value}"),
            Node::Symbol(name) => write!(f, "{name}"),
            Node::Application(elements) => {
                write!(f, "(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

// Fallible conversions from `Value` back into primitive Rust types.

impl std::convert::TryInto<NumberType> for Value {
    type Error = Error;

    fn try_into(self) -> Result<NumberType, Error> {
        if let Value::Number(n) = self {
            Ok(n)
        } else {
            Err(Error::TypeError(format!(
                "expected number, got {}: {self}",
                self.type_name()
            )))
        }
    }
}

impl std::convert::TryInto<bool> for Value {
    type Error = Error;

    fn try_into(self) -> Result<bool, Error> {
        if let Value::Bool(b) = self {
            Ok(b)
        } else {
            Err(Error::TypeError(format!(
                "expected boolean, got {}: {self}",
                self.type_name()
            )))
        }
    }
}

/// Helper for building literal nodes. Accepts anything convertible to Value.
pub fn lit<T: Into<Value>>(value: T) -> Node {
    Node::Literal(value.into())
}

/// Helper for building symbol nodes.
pub fn sym<S: AsRef<str>>(name: S) -> Node {
    Node::Symbol(name.as_ref().to_owned())
}

/// Helper for building application nodes.
pub fn app(elements: Vec<Node>) -> Node {
    Node::Application(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_functions_data_driven() {
        let test_cases = vec![
            (lit(42), Node::Literal(Value::Number(42.0))),
            (lit(-17), Node::Literal(Value::Number(-17.0))),
            (lit(2.5), Node::Literal(Value::Number(2.5))),
            (lit("hello"), Node::Literal(Value::String("hello".to_owned()))),
            (lit(""), Node::Literal(Value::String(String::new()))),
            (sym("minusTwenty"), Node::Symbol("minusTwenty".to_owned())),
            (sym(String::from("x")), Node::Symbol("x".to_owned())),
            (
                app(vec![sym("add"), lit(1), lit(2)]),
                Node::Application(vec![
                    Node::Symbol("add".to_owned()),
                    Node::Literal(Value::Number(1.0)),
                    Node::Literal(Value::Number(2.0)),
                ]),
            ),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn test_number_formatting() {
        let cases = vec![
            (17.0, "17"),
            (-12.0, "-12"),
            (-0.0, "0"),
            (1.5, "1.5"),
            (0.1 + 0.2, "0.30000000000000004"),
            (1e20, "100000000000000000000"),
        ];
        for (n, expected) in cases {
            assert_eq!(format_number(n), expected);
        }
    }

    #[test]
    fn test_to_text_and_display() {
        assert_eq!(Value::from("ab").to_text(), "ab");
        assert_eq!(Value::from("ab").to_string(), "\"ab\"");
        assert_eq!(Value::from(10).to_text(), "10");
        assert_eq!(Value::from(true).to_text(), "true");
        assert_eq!(Value::from(false).to_string(), "false");
    }

    #[test]
    fn test_value_equality_is_variant_strict() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::from(false), Value::from(0));
        assert_ne!(Value::from(""), Value::from(false));
    }

    #[test]
    fn test_node_display_is_source_text() {
        let tree = app(vec![
            sym("str"),
            lit("Hello "),
            lit("say \"hi\""),
            app(vec![sym("min"), lit(-3)]),
        ]);
        assert_eq!(tree.to_string(), "(str \"Hello \" 'say \"hi\"' (min -3))");
    }
}

//! minilisp - a minimal S-expression interpreter
//!
//! This crate reads a parenthesized prefix program, builds a small abstract
//! syntax tree and evaluates it with a tree-walking evaluator against a
//! chain of lexical scopes.
//!
//! ```text
//! (add 4 3 10)                                   ; 17
//! (str "Hello " 'World!')                        ; "Hello World!"
//! (do (def x 10 (if (gt x 5) "large" "small")))  ; "large"
//! (do (defn twice (args n) (multi n 2))
//!     (twice 21))                                ; 42
//! ```
//!
//! ## Truthiness
//!
//! Only the boolean `false` is falsy. `0` and the empty string both take the
//! then-branch of `if`, and `and`/`or` only short-circuit on the exact
//! booleans `false`/`true`.
//!
//! ## Modules
//!
//! - `parser`: character-driven reader from source text to [`ast::Node`]
//! - `evaluator`: dispatch on node kind and callable kind
//! - `specialforms`: `if`, `do`, `def`, `let`, `defn`, `and`, `or`
//! - `builtinops`: the primitive registry (`add`, `min`, `str`, `print`, ...)
//! - `environment`: scope chain and host registration API
//! - `interpreter`: the `run` driver and a persistent [`Interpreter`]
//! - `output`: print handlers (stdout, capture buffer, silent)
//! - `json` (feature `json`): JSON dumps of parsed trees

/// Maximum nesting depth accepted by the parser.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Maximum nesting of user-function calls.
///
/// Only calls count; syntactic nesting inside a body is already bounded by
/// [`MAX_PARSE_DEPTH`]. The evaluator grows its stack on demand, so the
/// limit is what stops runaway recursion, with an `EvalError`.
pub const MAX_CALL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of syntax errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SyntaxErrorKind {
    /// A token matched no lexical pattern, or the program does not start with `(`
    InvalidSyntax,
    /// Input ended before a form was closed
    Incomplete,
    /// `()` with nothing between the parentheses
    EmptyApplication,
    /// Nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input after the top-level form
    TrailingContent,
    /// A special form received arguments of the wrong shape or count
    MalformedForm,
}

/// A structured syntax error.
#[derive(Debug, PartialEq, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
    /// Snippet of the input around the failure (max 100 chars)
    pub context: Option<String>,
    /// The offending character or token, if identifiable
    pub found: Option<String>,
}

impl SyntaxError {
    pub fn new(
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        SyntaxError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    pub fn from_message(kind: SyntaxErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a SyntaxError with a context snippet taken from `input` around
    /// the byte offset `error_offset`.
    pub fn with_context(
        kind: SyntaxErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let char_offset = input
            .char_indices()
            .take_while(|(i, _)| *i < error_offset)
            .count();
        let context_start = char_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("SyntaxError: {0}")]
    SyntaxError(SyntaxError),
    #[error("ReferenceError: Undefined symbol: {0}")]
    ReferenceError(String),
    #[error("TypeError: {0}")]
    TypeError(String),
    #[error("ArityError: {}", arity_message(.name, .expected, .got))]
    ArityError {
        name: Option<String>,
        expected: usize,
        got: usize,
    },
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

fn arity_message(name: &Option<String>, expected: &usize, got: &usize) -> String {
    match name {
        Some(name) => format!("{name} expected {expected} arguments, got {got}"),
        None => format!("function expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityError without a function name
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            name: None,
            expected,
            got,
        }
    }

    /// Create an ArityError naming the called function
    pub fn named_arity_error(name: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ArityError {
            name: Some(name.into()),
            expected,
            got,
        }
    }

    /// Create a SyntaxError for a special form used with the wrong shape
    pub fn malformed_form(message: impl Into<String>) -> Self {
        Error::SyntaxError(SyntaxError::from_message(
            SyntaxErrorKind::MalformedForm,
            message,
        ))
    }

    /// Attach a function name to an unnamed ArityError; other errors pass through.
    pub(crate) fn with_callee(self, callee: &str) -> Self {
        match self {
            Error::ArityError {
                name: None,
                expected,
                got,
            } => Error::named_arity_error(callee, expected, got),
            other => other,
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod interpreter;
pub mod intooperation;
pub mod output;
pub mod parser;
pub mod specialforms;
mod stack;

#[cfg(feature = "json")]
pub mod json;

pub use ast::{Node, Value};
pub use environment::Environment;
pub use interpreter::{Interpreter, run, run_with_output};
pub use parser::parse;

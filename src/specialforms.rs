//! Special forms: operators that receive their arguments unevaluated.
//!
//! Each form has the [`crate::ast::SpecialFormFn`] signature and decides
//! itself which argument nodes are evaluated, in which scope and in which
//! order. Shape errors are reported as `SyntaxError` of kind
//! `MalformedForm`.

use crate::Error;
use crate::ast::{Callable, Node, UserFunction, Value};
use crate::environment::Environment;
use crate::evaluator::eval_with_depth_tracking;
use std::rc::Rc;
use tracing::{debug, trace};

/// Keyword opening a `defn` parameter list: `(args a b)`
const PARAMS_KEYWORD: &str = "args";

/// Evaluate nodes left to right, returning the last value or `false`.
pub(crate) fn eval_sequence(body: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut result = Value::Bool(false);
    for node in body {
        result = eval_with_depth_tracking(node, env, depth)?;
    }
    Ok(result)
}

/// `(if condition then [else])`
pub(crate) fn eval_if(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [condition, then_branch, else_branch @ ..] if else_branch.len() <= 1 => {
            let condition = eval_with_depth_tracking(condition, env, depth)?;
            if condition.is_truthy() {
                eval_with_depth_tracking(then_branch, env, depth)
            } else if let [else_branch] = else_branch {
                eval_with_depth_tracking(else_branch, env, depth)
            } else {
                Ok(Value::Bool(false))
            }
        }
        _ => Err(Error::malformed_form(format!(
            "'if' takes 2 or 3 arguments, got {}",
            args.len()
        ))),
    }
}

/// `(do expr...)`
pub(crate) fn eval_do(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    eval_sequence(args, env, depth)
}

/// `(def name value body...)`: binds in the current scope, then runs the body
pub(crate) fn eval_def(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Node::Symbol(name), value_expr, body @ ..] => {
            let value = eval_with_depth_tracking(value_expr, env, depth)?;
            trace!(name = %name, value = %value, "def");
            env.define(name.clone(), value);
            eval_sequence(body, env, depth)
        }
        [_, _, ..] => Err(Error::malformed_form(
            "'def' expects a symbol as its first argument",
        )),
        _ => Err(Error::malformed_form("'def' requires a name and a value")),
    }
}

/// `(let name literal body...)`: binds in a new child scope that only the
/// body sees
pub(crate) fn eval_let(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Node::Symbol(name), Node::Literal(value), body @ ..] => {
            let scope = Environment::with_parent(env);
            scope.define(name.clone(), value.clone());
            eval_sequence(body, &scope, depth)
        }
        [Node::Symbol(name), _, ..] => Err(Error::malformed_form(format!(
            "'let' value for '{name}' must be a number or string literal"
        ))),
        [_, _, ..] => Err(Error::malformed_form(
            "'let' expects a symbol as its first argument",
        )),
        _ => Err(Error::malformed_form("'let' requires a name and a value")),
    }
}

/// Parameter names from `(args a b ...)`
fn parse_params(name: &str, node: &Node) -> Result<Vec<String>, Error> {
    let missing = || Error::malformed_form(format!("Expected an arguments definition for: {name}"));

    let Node::Application(elements) = node else {
        return Err(missing());
    };
    let [Node::Symbol(keyword), params @ ..] = elements.as_slice() else {
        return Err(missing());
    };
    if keyword != PARAMS_KEYWORD {
        return Err(missing());
    }

    let mut names: Vec<String> = Vec::with_capacity(params.len());
    for param in params {
        match param {
            Node::Symbol(param) if names.contains(param) => {
                return Err(Error::malformed_form(format!(
                    "Duplicate parameter name in {name}: {param}"
                )));
            }
            Node::Symbol(param) => names.push(param.clone()),
            other => {
                return Err(Error::malformed_form(format!(
                    "Parameters of {name} must be symbols, got {other}"
                )));
            }
        }
    }
    Ok(names)
}

/// `(defn name (args a b) body)`: defines a function closing over the
/// current scope and returns its name
pub(crate) fn eval_defn(args: &[Node], env: &Environment, _depth: usize) -> Result<Value, Error> {
    let [name_node, params_node, rest @ ..] = args else {
        return Err(Error::malformed_form(
            "'defn' requires a name, an argument list and a body",
        ));
    };
    let Node::Symbol(name) = name_node else {
        return Err(Error::malformed_form(format!(
            "'defn' expects a symbol as the function name, got {name_node}"
        )));
    };
    let params = parse_params(name, params_node)?;
    let body = match rest {
        [body] => body,
        [] => {
            return Err(Error::malformed_form(format!(
                "Missing function body for: {name}"
            )));
        }
        _ => {
            return Err(Error::malformed_form(format!(
                "'defn' takes 3 arguments, got {}",
                args.len()
            )));
        }
    };
    if env.is_bound(name) {
        return Err(Error::malformed_form(format!(
            "Function already exists: {name}"
        )));
    }

    debug!(function = %name, params = ?params, "defn");
    let function = UserFunction {
        name: name.clone(),
        params,
        body: body.clone(),
        env: env.clone(),
    };
    env.define(
        name.clone(),
        Value::Callable(Callable::Function(Rc::new(function))),
    );
    Ok(Value::String(name.clone()))
}

// `and`/`or` stop at the first argument equal to `$short_circuit`; only
// the exact boolean counts, other values are skipped.
macro_rules! boolean_logic_op {
    ($name:ident, $short_circuit:literal, $default:literal) => {
        pub(crate) fn $name(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
            for arg in args {
                if let Value::Bool($short_circuit) = eval_with_depth_tracking(arg, env, depth)? {
                    return Ok(Value::Bool($short_circuit));
                }
            }
            Ok(Value::Bool($default))
        }
    };
}

boolean_logic_op!(eval_and, false, true);
boolean_logic_op!(eval_or, true, false);

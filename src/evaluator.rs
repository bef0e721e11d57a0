use crate::ast::{Callable, Node, UserFunction, Value};
use crate::builtinops::{OpKind, PRINT_ID, get_builtin_ops, print_operation};
use crate::environment::Environment;
use crate::output::SharedPrintHandler;
use crate::stack::ensure_sufficient_stack;
use crate::{Error, MAX_CALL_DEPTH};
use tracing::{debug, trace};

/// Marker separating an error message from its evaluation context
const CONTEXT_MARKER: &str = "\n  Context: ";

/// Evaluate a syntax tree node (public API)
pub fn eval(node: &Node, env: &Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(node, env, 0)
}

/// Evaluate a node. `depth` is the number of user-function calls currently
/// active; nested nodes inherit it unchanged.
pub(crate) fn eval_with_depth_tracking(
    node: &Node,
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    ensure_sufficient_stack(|| match node {
        Node::Literal(value) => Ok(value.clone()),

        Node::Symbol(name) => env
            .get(name)
            .ok_or_else(|| Error::ReferenceError(name.clone())),

        Node::Application(elements) => {
            eval_application(elements, env, depth).map_err(|err| add_context(err, node))
        }
    })
}

/// Attach the innermost failing application to type and evaluation errors
fn add_context(error: Error, node: &Node) -> Error {
    match error {
        Error::EvalError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::EvalError(format!("{msg}{CONTEXT_MARKER}while evaluating: {node}"))
        }
        Error::TypeError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::TypeError(format!("{msg}{CONTEXT_MARKER}while evaluating: {node}"))
        }
        // Syntax, reference and arity errors already name their subject
        other => other,
    }
}

/// Evaluate argument expressions left to right
fn eval_args(args: &[Node], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth))
        .collect()
}

/// Evaluate `(operator arg...)`: the operator decides whether the argument
/// nodes are evaluated first.
fn eval_application(elements: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    let [operator, arg_nodes @ ..] = elements else {
        return Err(Error::EvalError("Cannot evaluate empty application".to_owned()));
    };

    match eval_with_depth_tracking(operator, env, depth)? {
        Value::Callable(Callable::SpecialForm { id, form }) => {
            trace!(form = id, argc = arg_nodes.len(), "special form");
            form(arg_nodes, env, depth)
        }
        Value::Callable(Callable::Builtin { id, func }) => {
            let args = eval_args(arg_nodes, env, depth)?;
            trace!(builtin = %id, argc = args.len(), "builtin call");
            func(args)
        }
        Value::Callable(Callable::Function(function)) => {
            let args = eval_args(arg_nodes, env, depth)?;
            apply_function(&function, args, depth)
        }
        other => Err(Error::TypeError(format!(
            "Cannot apply non-function: {other}"
        ))),
    }
}

/// Run a user function body in a fresh child scope of its defining scope
fn apply_function(function: &UserFunction, args: Vec<Value>, depth: usize) -> Result<Value, Error> {
    if function.params.len() != args.len() {
        return Err(Error::named_arity_error(
            &function.name,
            function.params.len(),
            args.len(),
        ));
    }
    if depth >= MAX_CALL_DEPTH {
        return Err(Error::EvalError(format!(
            "Call depth limit exceeded (max: {MAX_CALL_DEPTH})"
        )));
    }
    debug!(function = %function.name, argc = args.len(), depth, "call");

    let scope = Environment::with_parent(&function.env);
    for (param, arg) in function.params.iter().zip(args) {
        scope.define(param.clone(), arg);
    }
    eval_with_depth_tracking(&function.body, &scope, depth + 1)
}

/// Create a global environment: `true`, `false`, every registered builtin
/// and special form, and `print` writing to `output`.
pub fn create_global_env(output: SharedPrintHandler) -> Environment {
    let env = Environment::new();
    env.define("true", Value::Bool(true));
    env.define("false", Value::Bool(false));

    for builtin_op in get_builtin_ops() {
        let callable = match &builtin_op.op_kind {
            OpKind::SpecialForm(form) => Callable::SpecialForm {
                id: builtin_op.id,
                form: *form,
            },
            OpKind::Function(_) => match builtin_op.checked_function() {
                Some(func) => Callable::Builtin {
                    id: builtin_op.id.to_owned(),
                    func,
                },
                None => continue,
            },
        };
        env.define(builtin_op.id, Value::Callable(callable));
    }

    env.define(
        PRINT_ID,
        Value::Callable(Callable::Builtin {
            id: PRINT_ID.to_owned(),
            func: print_operation(output),
        }),
    );
    env
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::SyntaxErrorKind;
    use crate::ast::{app, lit, sym};
    use crate::intooperation::{NumIter, ValueIter};
    use crate::output::{buffer_handler, silent_handler};
    use crate::parser::parse;
    use crate::environment::Arity;

    fn global() -> Environment {
        create_global_env(silent_handler())
    }

    fn eval_source(source: &str, env: &Environment) -> Result<Value, Error> {
        eval(&parse(source).unwrap(), env)
    }

    #[test]
    fn test_global_env_contents() {
        let env = global();
        assert_eq!(env.get("true"), Some(Value::Bool(true)));
        assert_eq!(env.get("false"), Some(Value::Bool(false)));
        for name in ["if", "do", "def", "let", "defn", "and", "or"] {
            assert!(
                matches!(env.get(name), Some(Value::Callable(c)) if c.is_special_form()),
                "{name} should be a special form"
            );
        }
        for name in ["add", "multi", "eq", "gt", "lt", "min", "inc", "dec", "str", "print"] {
            assert!(
                matches!(env.get(name), Some(Value::Callable(Callable::Builtin { .. }))),
                "{name} should be a builtin"
            );
        }
    }

    #[test]
    fn test_eval_node_kinds() {
        let env = global();
        assert_eq!(eval(&lit(5), &env), Ok(Value::from(5)));
        assert_eq!(eval(&lit("s"), &env), Ok(Value::from("s")));
        assert_eq!(eval(&sym("true"), &env), Ok(Value::Bool(true)));
        assert_eq!(
            eval(&sym("nope"), &env),
            Err(Error::ReferenceError("nope".to_owned()))
        );
        assert_eq!(
            eval(&app(vec![sym("add"), lit(1), app(vec![sym("inc"), lit(1)])]), &env),
            Ok(Value::from(3))
        );
        assert!(matches!(
            eval(&app(vec![]), &env),
            Err(Error::EvalError(_))
        ));
    }

    #[test]
    fn test_callables_are_values() {
        let env = global();
        assert_eq!(
            eval_source("(do (def plus add (plus 1 2)))", &env),
            Ok(Value::from(3))
        );
        assert_eq!(
            eval_source("(do (def when if (when true 1 2)))", &env),
            Ok(Value::from(1))
        );
        assert_eq!(
            eval_source("(do (defn twice (args f x) (f (f x))) (twice inc 5))", &env),
            Ok(Value::from(7))
        );
        assert_eq!(eval_source("(eq add add)", &env), Ok(Value::Bool(true)));
        assert_eq!(eval_source("(eq add multi)", &env), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_non_callable_operator_is_type_error() {
        let env = global();
        let err = eval_source("(5 1 2)", &env).unwrap_err();
        assert_eq!(
            err,
            Error::TypeError(
                "Cannot apply non-function: 5\n  Context: while evaluating: (5 1 2)".to_owned()
            )
        );

        // Only the innermost application is reported
        let err = eval_source("(add 1 (\"f\"))", &env).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot apply non-function: \"f\"\n  Context: while evaluating: (\"f\")"
        );
    }

    #[test]
    fn test_user_function_arity_and_scope() {
        let env = global();
        eval_source("(defn pair (args a b) (str a b))", &env).unwrap();

        assert_eq!(eval_source("(pair 1 2)", &env), Ok(Value::from("12")));
        assert_eq!(
            eval_source("(pair 1)", &env),
            Err(Error::named_arity_error("pair", 2, 1))
        );
        assert_eq!(
            eval_source("(pair 1 2 3)", &env),
            Err(Error::named_arity_error("pair", 2, 3))
        );
        // Parameters live in the call scope only
        assert_eq!(
            eval_source("(do a)", &env),
            Err(Error::ReferenceError("a".to_owned()))
        );
    }

    #[test]
    fn test_arguments_evaluated_in_caller_scope() {
        let env = global();
        let source = "(do (def x 1) (defn f (args y) (add x y)) (let x 100 (f x)))";
        // `x` inside f is the defining scope's x; the argument is the caller's
        assert_eq!(eval_source(source, &env), Ok(Value::from(101)));
    }

    #[test]
    fn test_recursion_does_not_clobber_caller_bindings() {
        let env = global();
        let source = "(do (defn f (args n) (if (eq n 0) 0 (do (f (dec n)) n))) (f 3))";
        assert_eq!(eval_source(source, &env), Ok(Value::from(3)));
    }

    #[test]
    fn test_malformed_special_form_is_syntax_error() {
        let env = global();
        assert!(matches!(
            eval_source("(if)", &env),
            Err(Error::SyntaxError(crate::SyntaxError {
                kind: SyntaxErrorKind::MalformedForm,
                ..
            }))
        ));
    }

    #[test]
    fn test_print_uses_injected_handler() {
        let output = buffer_handler();
        let env = create_global_env(output.clone());
        assert_eq!(
            eval_source("(print \"x=\" (add 1 2))", &env),
            Ok(Value::from("x=3"))
        );
        assert_eq!(output.get_output(), "x=3\n");
    }

    #[test]
    fn test_registered_host_functions() {
        fn hypot(a: f64, b: f64) -> f64 {
            (a * a + b * b).sqrt()
        }
        fn weighted(weight: f64, nums: NumIter<'_>) -> f64 {
            weight * nums.sum::<f64>()
        }
        fn count_strings(args: ValueIter<'_>) -> u32 {
            args.filter(|v| matches!(v, Value::String(_))).count() as u32
        }

        let env = global();
        env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
        env.register_variadic_builtin_operation::<_, (f64, NumIter<'static>)>(
            "weighted",
            Arity::AtLeast(1),
            weighted,
        );
        env.register_variadic_builtin_operation::<_, (ValueIter<'static>,)>(
            "count-strings",
            Arity::Any,
            count_strings,
        );

        assert_eq!(eval_source("(hypot 3 4)", &env), Ok(Value::from(5)));
        assert_eq!(eval_source("(weighted 2 1 2 3)", &env), Ok(Value::from(12)));
        assert_eq!(
            eval_source("(count-strings 1 \"a\" 'b' true)", &env),
            Ok(Value::from(2))
        );
        assert_eq!(
            eval_source("(hypot 3)", &env),
            Err(Error::named_arity_error("hypot", 2, 1))
        );
        assert!(matches!(
            eval_source("(hypot 3 \"4\")", &env),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_deep_recursion_completes() {
        let env = global();
        eval_source(
            "(defn count (args n) (if (eq n 0) 'done' (count (dec n))))",
            &env,
        )
        .unwrap();
        for n in [1000, 5000] {
            assert_eq!(
                eval_source(&format!("(count {n})"), &env),
                Ok(Value::from("done")),
                "count {n}"
            );
        }
    }

    #[test]
    fn test_call_depth_limit() {
        let env = global();
        let err = eval_source("(do (defn loop (args n) (loop (inc n))) (loop 0))", &env)
            .unwrap_err();
        let Error::EvalError(msg) = err else {
            panic!("expected EvalError, got {err:?}");
        };
        assert!(msg.starts_with("Call depth limit exceeded (max: 10000)"));
        assert_eq!(msg.matches("Context:").count(), 1);
    }

    #[test]
    fn test_nesting_inside_a_body_is_not_a_call() {
        // 2000 nested applications, zero user calls
        let node = (0..2000).fold(lit(0), |inner, _| app(vec![sym("inc"), inner]));
        assert_eq!(eval(&node, &global()), Ok(Value::from(2000)));
    }
}

//! Property-based tests for the reader and evaluator.
//!
//! Generated programs stay small so each property runs quickly.

use minilisp::ast::{Node, Value, app, lit, sym};
use minilisp::output::buffer_handler;
use minilisp::{Error, parse, run_with_output};
use proptest::prelude::*;

// ============================================================================
// Strategies for generating test inputs
// ============================================================================

/// Strategy for integer literals, including negatives
fn arb_int() -> impl Strategy<Value = i32> {
    prop_oneof![0i32..=1000, -1000i32..0]
}

/// Strategy for string literal contents; some contain a double quote and
/// must be written with single quotes
fn arb_string() -> impl Strategy<Value = String> {
    prop_oneof!["[a-zA-Z0-9 ]{0,12}", "[a-z]{0,4}\"[a-z]{0,4}"]
}

/// Strategy for symbols
fn arb_symbol() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,6}"
}

/// Strategy for arbitrary well-formed trees
fn arb_node() -> impl Strategy<Value = Node> {
    let leaf = prop_oneof![
        arb_int().prop_map(lit),
        arb_string().prop_map(lit),
        arb_symbol().prop_map(sym),
    ];
    leaf.prop_recursive(4, 32, 5, |inner| {
        prop::collection::vec(inner, 1..5).prop_map(app)
    })
    .prop_map(|node| match node {
        Node::Application(_) => node,
        other => app(vec![sym("do"), other]),
    })
}

/// Strategy for literal sources of every kind the reader knows
fn arb_condition() -> impl Strategy<Value = (String, bool)> {
    prop_oneof![
        arb_int().prop_map(|n| (n.to_string(), true)),
        "[a-z ]{0,8}".prop_map(|s| (format!("'{s}'"), true)),
        Just(("true".to_owned(), true)),
        Just(("false".to_owned(), false)),
        (arb_int(), arb_int()).prop_map(|(a, b)| (format!("(eq {a} {b})"), a == b)),
    ]
}

fn eval(source: &str) -> Result<Value, Error> {
    run_with_output(source, buffer_handler())
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The reader never panics, whatever the input
    #[test]
    fn parser_no_panic(input in ".{0,100}") {
        let _result = parse(&input);
    }

    /// Parsing the same text twice gives the same tree
    #[test]
    fn parse_is_deterministic(node in arb_node()) {
        let source = node.to_string();
        prop_assert_eq!(parse(&source), parse(&source));
    }

    /// Displaying a tree yields source text that reads back as the same tree
    #[test]
    fn display_round_trips(node in arb_node()) {
        let source = node.to_string();
        prop_assert_eq!(parse(&source), Ok(node), "source: {}", source);
    }

    /// Only `false` selects the else branch
    #[test]
    fn if_takes_else_only_on_false((condition, truthy) in arb_condition()) {
        let source = format!("(if {condition} 'then' 'else')");
        let expected = if truthy { "then" } else { "else" };
        prop_assert_eq!(eval(&source), Ok(Value::from(expected)));
    }

    /// `min` subtracts, and negates a single argument
    #[test]
    fn min_is_subtraction(a in arb_int(), b in arb_int()) {
        prop_assert_eq!(eval(&format!("(min {a} {b})")), Ok(Value::from(a - b)));
        prop_assert_eq!(eval(&format!("(min {a})")), Ok(Value::from(-a)));
    }

    /// `add` and `multi` fold over any number of arguments
    #[test]
    fn add_and_multi_fold(nums in prop::collection::vec(-20i32..20, 1..6)) {
        let args = nums.iter().map(i32::to_string).collect::<Vec<_>>().join(" ");
        let sum: i32 = nums.iter().sum();
        let product: i32 = nums.iter().product();
        prop_assert_eq!(eval(&format!("(add {args})")), Ok(Value::from(sum)));
        prop_assert_eq!(eval(&format!("(multi {args})")), Ok(Value::from(product)));
    }

    /// User functions always reject the wrong number of arguments
    #[test]
    fn arity_is_enforced(params in 0usize..4, given in 0usize..6) {
        prop_assume!(params != given);
        let names: Vec<String> = (0..params).map(|i| format!("p{i}")).collect();
        let args: Vec<String> = (0..given).map(|i| i.to_string()).collect();
        let source = format!(
            "(do (defn f (args {}) 0) (f {}))",
            names.join(" "),
            args.join(" ")
        );
        prop_assert_eq!(
            eval(&source),
            Err(Error::ArityError { name: Some("f".to_owned()), expected: params, got: given })
        );
    }
}

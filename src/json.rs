//! JSON form of parsed trees.
//!
//! ```text
//! (add 1 x)  =>  {"type":"apply","args":[{"type":"symbol","name":"add"},
//!                                        {"type":"value","value":1},
//!                                        {"type":"symbol","name":"x"}]}
//! ```

use crate::ast::{Node, Value};
use crate::{Error, MAX_PARSE_DEPTH, SyntaxError, SyntaxErrorKind};
use serde_json::json;

/// Convert a tree to its JSON form.
pub fn node_to_json(node: &Node) -> Result<serde_json::Value, Error> {
    match node {
        Node::Literal(value) => Ok(json!({ "type": "value", "value": value_to_json(value)? })),
        Node::Symbol(name) => Ok(json!({ "type": "symbol", "name": name })),
        Node::Application(elements) => {
            let args = elements
                .iter()
                .map(node_to_json)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(json!({ "type": "apply", "args": args }))
        }
    }
}

/// Convert a tree to a pretty-printed JSON string.
pub fn node_to_json_string(node: &Node) -> Result<String, Error> {
    serde_json::to_string_pretty(&node_to_json(node)?)
        .map_err(|e| Error::EvalError(format!("Failed to serialize tree: {e}")))
}

fn value_to_json(value: &Value) -> Result<serde_json::Value, Error> {
    match value {
        // Whole numbers print without a fraction
        Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            Ok(serde_json::Value::from(*n as i64))
        }
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::TypeError(format!("Cannot represent {n} in JSON"))),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Callable(_) => Err(Error::TypeError(format!(
            "Cannot represent {value} in JSON"
        ))),
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::SyntaxError(SyntaxError::from_message(
        SyntaxErrorKind::InvalidSyntax,
        message,
    ))
}

/// Read a tree back from its JSON form.
pub fn parse_json_tree(input: &str) -> Result<Node, Error> {
    let json: serde_json::Value =
        serde_json::from_str(input).map_err(|e| invalid(format!("Invalid JSON: {e}")))?;
    json_to_node(&json, 0)
}

fn json_to_node(json: &serde_json::Value, depth: usize) -> Result<Node, Error> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(Error::SyntaxError(SyntaxError::from_message(
            SyntaxErrorKind::TooDeeplyNested,
            format!("Tree too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
        )));
    }
    let kind = json.get("type").and_then(serde_json::Value::as_str);
    match kind {
        Some("value") => match json.get("value") {
            Some(serde_json::Value::Number(n)) => n
                .as_f64()
                .map(|n| Node::Literal(Value::Number(n)))
                .ok_or_else(|| invalid(format!("Unsupported number: {n}"))),
            Some(serde_json::Value::String(s)) => Ok(Node::Literal(Value::String(s.clone()))),
            Some(serde_json::Value::Bool(b)) => Ok(Node::Literal(Value::Bool(*b))),
            Some(other) => Err(invalid(format!("Unsupported literal value: {other}"))),
            None => Err(invalid("Value node without a 'value' field")),
        },
        Some("symbol") => match json.get("name").and_then(serde_json::Value::as_str) {
            Some(name) if !name.is_empty() => Ok(Node::Symbol(name.to_owned())),
            _ => Err(invalid("Symbol node without a 'name'")),
        },
        Some("apply") => match json.get("args").and_then(serde_json::Value::as_array) {
            Some(args) if args.is_empty() => Err(Error::SyntaxError(SyntaxError::from_message(
                SyntaxErrorKind::EmptyApplication,
                "Empty application '()'",
            ))),
            Some(args) => args
                .iter()
                .map(|arg| json_to_node(arg, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Node::Application),
            None => Err(invalid("Apply node without an 'args' array")),
        },
        _ => Err(invalid(format!("Unknown tree node: {json}"))),
    }
}

//! Program driver.
//!
//! [`run`] parses and evaluates a single program against a fresh global
//! scope. [`Interpreter`] keeps its global scope between runs, so
//! definitions made by one program are visible to the next.

use crate::ast::Value;
use crate::environment::Environment;
use crate::evaluator::{create_global_env, eval};
use crate::output::{SharedPrintHandler, stdout_handler};
use crate::parser::{ParseConfig, parse_with_config};
use crate::Error;
use tracing::debug;

/// Parse and evaluate `source` with `print` writing to stdout.
///
/// ```
/// use minilisp::{Value, run};
///
/// assert_eq!(run("(add 4 3 10)"), Ok(Value::from(17)));
/// assert_eq!(run("(str \"Hello \" 'World!')"), Ok(Value::from("Hello World!")));
/// ```
pub fn run(source: &str) -> Result<Value, Error> {
    run_with_output(source, stdout_handler())
}

/// Parse and evaluate `source` with `print` writing to `output`.
///
/// The global scope is released before returning, so a function value in
/// the result can no longer see the run's definitions.
pub fn run_with_output(source: &str, output: SharedPrintHandler) -> Result<Value, Error> {
    Interpreter::with_output(output).run(source)
}

/// An interpreter with a persistent global scope.
///
/// Dropping it releases every scope that binds a user function (see
/// [`Environment::release`]); scopes are otherwise kept alive by the
/// functions defined in them.
pub struct Interpreter {
    env: Environment,
    output: SharedPrintHandler,
    config: ParseConfig,
}

impl Interpreter {
    /// Create an interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(stdout_handler())
    }

    /// Create an interpreter printing to `output`.
    pub fn with_output(output: SharedPrintHandler) -> Self {
        Interpreter {
            env: create_global_env(output.clone()),
            output,
            config: ParseConfig::default(),
        }
    }

    /// Replace the parser configuration used by [`Interpreter::run`].
    pub fn with_config(mut self, config: ParseConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse and evaluate one program in the global scope.
    pub fn run(&self, source: &str) -> Result<Value, Error> {
        debug!(len = source.len(), "run");
        let node = parse_with_config(source, &self.config)?;
        let result = eval(&node, &self.env);
        match &result {
            Ok(value) => debug!(result = %value, "run finished"),
            Err(err) => debug!(error = %err, "run failed"),
        }
        result
    }

    /// The global scope, for inspection and host function registration.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn output(&self) -> &SharedPrintHandler {
        &self.output
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.env.release();
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("env", &self.env)
            .field("output", &self.output)
            .field("config", &self.config)
            .finish()
    }
}

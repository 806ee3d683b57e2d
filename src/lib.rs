//! Sandboxed expression parser.
//!
//! Parses a single side-effect-free expression and evaluates it against a
//! caller-supplied variable and function environment. Anything outside the
//! expression grammar (statements, attribute access, subscripts, lambdas)
//! is rejected, never silently ignored.

mod environment;
mod error;
mod evaluator;
mod parser;
mod value;

pub use environment::{CallError, Environment, Function};
pub use error::{Error, ErrorKind};
pub use parser::Location;
pub use value::Value;

use std::collections::HashMap;

/// Parses and evaluates single expressions against a fixed environment.
///
/// The environment is validated once at construction and reused, unchanged,
/// across any number of [`parse`](Self::parse) calls; a failed call leaves
/// it untouched.
pub struct ExpressionParser {
    environment: Environment,
}

impl ExpressionParser {
    /// Builds a parser over the given variables and functions. Fails with a
    /// name error when a variable name collides with one of the built-in
    /// constants `True`, `False`, `None`.
    pub fn new(
        variables: HashMap<String, Value>,
        functions: HashMap<String, Function>,
    ) -> Result<Self, Error> {
        Ok(Self {
            environment: Environment::new(variables, functions)?,
        })
    }

    /// Builds a parser around an already-validated environment.
    pub fn with_environment(environment: Environment) -> Self {
        Self { environment }
    }

    /// Parses `expression` and returns its value, labeling failures with the
    /// default `<expression>` source name.
    pub fn parse(&self, expression: &str) -> Result<Value, Error> {
        self.parse_named(expression, "<expression>")
    }

    /// Like [`parse`](Self::parse), with an explicit source label.
    ///
    /// Syntax and name errors keep the offending token's position; any other
    /// failure a callee raises is normalized into a syntax-shaped error whose
    /// message is prefixed with the originating kind name, so every failure
    /// renders with the same (label, line, column, text) shape.
    pub fn parse_named(&self, expression: &str, source_label: &str) -> Result<Value, Error> {
        parser::tokenize_string(expression)
            .and_then(|tokens| parser::parse_expression(&tokens))
            .and_then(|tree| {
                evaluator::evaluate(&tree, &self.environment)
                    .map_err(error::EvalError::normalize)
            })
            .map_err(|error| error.in_source(source_label, expression))
    }
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
        }
    }
}

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::Error;
use crate::parser::Location;
use crate::value::Value;

/// A failure raised by a callee or coercion. `kind` names the failure class
/// ("TypeError", "ValueError", ...); the parse boundary folds it into the
/// reported message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    pub(crate) kind: String,
    pub(crate) message: String,
}

impl CallError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A caller-supplied function: positional arguments plus keyword arguments
/// in, one value or a named failure out.
pub type Function = Box<dyn Fn(&[Value], &HashMap<String, Value>) -> Result<Value, CallError>>;

pub(crate) type BuiltinFunction =
    fn(&[Value], &HashMap<String, Value>) -> Result<Value, CallError>;

static BUILTIN_CONSTANTS: Lazy<HashMap<&'static str, Value>> = Lazy::new(|| {
    HashMap::from([
        ("True", Value::Bool(true)),
        ("False", Value::Bool(false)),
        ("None", Value::None),
    ])
});

/// The caller-supplied name resolution context. Read-only during evaluation
/// and reused across parse calls.
#[derive(Default)]
pub struct Environment {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Function>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("variables", &self.variables)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Environment {
    /// Caller variable names may not shadow the built-in constants; shadowing
    /// would silently change what `True` evaluates to, so the collision fails
    /// here rather than at evaluation time.
    pub fn new(
        variables: HashMap<String, Value>,
        functions: HashMap<String, Function>,
    ) -> Result<Self, Error> {
        let mut forbidden: Vec<&str> = variables
            .keys()
            .map(String::as_str)
            .filter(|name| BUILTIN_CONSTANTS.contains_key(*name))
            .collect();
        if !forbidden.is_empty() {
            forbidden.sort_unstable();
            let keyword = if forbidden.len() == 1 {
                "keyword"
            } else {
                "keywords"
            };
            return Err(Error::name(
                format!("Cannot override {keyword} {}", forbidden.join(", ")),
                Location::start_of_input(),
            ));
        }
        Ok(Self {
            variables,
            functions,
        })
    }

    /// Resolves a variable name: caller variables first, then the built-in
    /// constants.
    pub(crate) fn lookup_name(&self, name: &str) -> Option<Value> {
        self.variables
            .get(name)
            .or_else(|| BUILTIN_CONSTANTS.get(name))
            .cloned()
    }

    /// Resolves a call target among the caller-supplied functions; built-ins
    /// are consulted separately, after this misses.
    pub(crate) fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }
}

pub(crate) fn builtin_function(name: &str) -> Option<BuiltinFunction> {
    match name {
        "int" => Some(builtin_int),
        "float" => Some(builtin_float),
        "bool" => Some(builtin_bool),
        _ => None,
    }
}

fn coercion_argument<'a>(
    name: &str,
    args: &'a [Value],
    kwargs: &HashMap<String, Value>,
) -> Result<Option<&'a Value>, CallError> {
    if !kwargs.is_empty() {
        return Err(CallError::new(
            "TypeError",
            format!("{name}() takes no keyword arguments"),
        ));
    }
    match args {
        [] => Ok(None),
        [value] => Ok(Some(value)),
        _ => Err(CallError::new(
            "TypeError",
            format!("{name}() takes at most 1 argument ({} given)", args.len()),
        )),
    }
}

fn builtin_int(args: &[Value], kwargs: &HashMap<String, Value>) -> Result<Value, CallError> {
    match coercion_argument("int", args, kwargs)? {
        None => Ok(Value::Int(0)),
        Some(Value::Bool(b)) => Ok(Value::Int(i64::from(*b))),
        Some(Value::Int(n)) => Ok(Value::Int(*n)),
        Some(Value::Float(x)) => {
            if x.is_nan() {
                Err(CallError::new(
                    "ValueError",
                    "cannot convert float NaN to integer",
                ))
            } else if x.is_infinite() {
                Err(CallError::new(
                    "OverflowError",
                    "cannot convert float infinity to integer",
                ))
            } else {
                let truncated = x.trunc();
                if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
                    Err(CallError::new(
                        "OverflowError",
                        "float too large to convert to integer",
                    ))
                } else {
                    Ok(Value::Int(truncated as i64))
                }
            }
        }
        Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            CallError::new(
                "ValueError",
                format!("invalid literal for int() with base 10: '{s}'"),
            )
        }),
        Some(other) => Err(CallError::new(
            "TypeError",
            format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ),
        )),
    }
}

fn builtin_float(args: &[Value], kwargs: &HashMap<String, Value>) -> Result<Value, CallError> {
    match coercion_argument("float", args, kwargs)? {
        None => Ok(Value::Float(0.0)),
        Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            CallError::new(
                "ValueError",
                format!("could not convert string to float: '{s}'"),
            )
        }),
        Some(value) => match value.as_float() {
            Some(x) => Ok(Value::Float(x)),
            None => Err(CallError::new(
                "TypeError",
                format!(
                    "float() argument must be a string or a number, not '{}'",
                    value.type_name()
                ),
            )),
        },
    }
}

fn builtin_bool(args: &[Value], kwargs: &HashMap<String, Value>) -> Result<Value, CallError> {
    let argument = coercion_argument("bool", args, kwargs)?;
    Ok(Value::Bool(argument.map_or(false, Value::is_truthy)))
}

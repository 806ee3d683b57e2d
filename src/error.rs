use crate::environment::CallError;
use crate::parser::Location;

/// The two failure kinds the parse entry point surfaces directly. Any other
/// failure a call raises is folded into `Syntax` with its kind name as a
/// message prefix, so every error renders the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax => write!(f, "SyntaxError"),
            Self::Name => write!(f, "NameError"),
        }
    }
}

/// A failure of one `parse` call: kind, message and position, plus the
/// source label and text once the parse boundary has attached them.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    location: Location,
    label: Option<String>,
    text: Option<String>,
}

impl Error {
    pub(crate) fn syntax(message: impl Into<String>, location: Location) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            location,
            label: None,
            text: None,
        }
    }

    pub(crate) fn name(message: impl Into<String>, location: Location) -> Self {
        Self {
            kind: ErrorKind::Name,
            message: message.into(),
            location,
            label: None,
            text: None,
        }
    }

    pub(crate) fn in_source(mut self, label: &str, text: &str) -> Self {
        self.label = Some(label.to_string());
        self.text = Some(text.to_string());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn source_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn source_text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(label) = &self.label {
            writeln!(
                f,
                "  File \"{}\", line {}, column {}",
                label, self.location.line, self.location.column
            )?;
            if let Some(text) = &self.text {
                if let Some(line) = text.lines().nth(self.location.line.saturating_sub(1)) {
                    writeln!(f, "    {line}")?;
                    writeln!(f, "    {}^", " ".repeat(self.location.column))?;
                }
            }
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

/// Failures crossing the evaluator. Syntax and name failures keep their
/// position; call failures (from callees, coercions and arithmetic) carry a
/// kind name instead and are normalized at the parse boundary.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EvalError {
    Syntax { message: String, location: Location },
    Name { message: String, location: Location },
    Call { kind: String, message: String },
}

impl EvalError {
    pub(crate) fn raise(kind: &str, message: impl Into<String>) -> Self {
        Self::Call {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn normalize(self) -> Error {
        match self {
            Self::Syntax { message, location } => Error::syntax(message, location),
            Self::Name { message, location } => Error::name(message, location),
            Self::Call { kind, message } => Error::syntax(
                format!("{kind}: {message}"),
                Location::start_of_input(),
            ),
        }
    }
}

impl From<CallError> for EvalError {
    fn from(error: CallError) -> Self {
        Self::Call {
            kind: error.kind,
            message: error.message,
        }
    }
}

use thiserror::Error;

/// Syntax error raised by the filter parser
///
/// `column` is 1-based and counted in characters, so a UI can highlight the
/// offending position directly. `expected` lists the token kinds that would
/// have been accepted there, sorted and de-duplicated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unexpected {found} at column {column}, expected one of: {}", .expected.join(", "))]
pub struct ParseError {
    pub column: usize,
    pub expected: Vec<String>,
    pub found: String,
}

impl ParseError {
    pub fn new(column: usize, expected: &[&str], found: impl Into<String>) -> Self {
        let mut expected: Vec<String> = expected.iter().map(|e| e.to_string()).collect();
        expected.sort();
        expected.dedup();
        Self {
            column,
            expected,
            found: found.into(),
        }
    }

    /// Whether `kind` is one of the accepted token kinds
    pub fn expects(&self, kind: &str) -> bool {
        self.expected.iter().any(|e| e == kind)
    }
}

/// Main error type for filter operations
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Invalid wire expression: {0}")]
    InvalidWire(String),

    #[error("Object type '{object}' cannot be related to '{target}'")]
    UnmappedRelevance { object: String, target: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

impl FilterError {
    /// Column of the syntax error, if this is one
    pub fn column(&self) -> Option<usize> {
        match self {
            FilterError::Parse(e) => Some(e.column),
            _ => None,
        }
    }
}

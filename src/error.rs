use serde::Serialize;

/// A position in the dialog source the grammar could not match.
///
/// `line` and `column` are 1-based; `expected` and `found` are written for the
/// dialog author, not for someone reading the parser.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("line {line}, column {column}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub expected: String,
    pub found: String,
}

impl SyntaxError {
    pub fn new(
        line: usize,
        column: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self {
            line,
            column,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The source is not well-formed; nothing was generated.
    #[error("syntax error at {0}")]
    Syntax(#[from] SyntaxError),
}

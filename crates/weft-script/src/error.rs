//! Script engine error types.

/// Errors that can occur while lexing, parsing, or evaluating a payload.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Lexer error
    #[error("Lex error at byte {offset}: {message}")]
    Lex { offset: usize, message: String },

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Evaluation error (including values raised with `throw`)
    #[error("Eval error: {0}")]
    Eval(String),
}

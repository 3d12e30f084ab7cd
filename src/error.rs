//! Error types returned at the translation API boundary.
//!
//! Every failure surfaces here; the translator never emits partial SQL.

use thiserror::Error;

/// Errors produced while translating a FlowQL statement.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The input failed to lex or parse.
    #[error("malformed query: {0}")]
    Malformed(String),

    /// An identifier is not registered for the target database.
    #[error("unknown column '{name}' in database '{db}'")]
    UnknownColumn { db: String, name: String },

    /// A function name is not in the function table.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Function arity or argument type mismatch.
    #[error("invalid argument for {func}: {message}")]
    InvalidArgument { func: String, message: String },

    /// A projection would need to live in both the inner and the outer
    /// metrics tier at once.
    #[error("projection '{0}' conflicts with the query's metrics layering")]
    LayerConflict(String),
}

/// Result alias used throughout the translation pipeline.
pub type QueryResult<T> = Result<T, QueryError>;

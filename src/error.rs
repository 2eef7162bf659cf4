use thiserror::Error;

/// Boxed error type used for downstream and user-supplied transform failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while rewriting a response body.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The input is not valid for the declared media type.
    #[error("syntax error at byte {offset}: {message}")]
    Syntax {
        /// Offset of the offending byte in the input stream.
        offset: u64,
        /// Description of what was expected.
        message: &'static str,
    },

    /// A closing bracket or tag does not match the innermost open one.
    #[error("unbalanced nesting at byte {offset}")]
    Unbalanced {
        /// Offset of the offending byte in the input stream.
        offset: u64,
    },

    /// The input ended inside a construct that was never closed.
    #[error("unexpected end of input inside {context}")]
    UnexpectedEof {
        /// The construct that was left open.
        context: &'static str,
    },

    /// Failure reported by a user-supplied transform.
    #[error(transparent)]
    Other(BoxError),
}

impl TransformError {
    /// Wraps an arbitrary error as a transform failure.
    pub fn other<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Other(error.into())
    }
}

/// Errors produced while reading the middleware configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration block is empty.
    #[error("expected the `minify` directive")]
    MissingDirective,

    /// The directive is not `minify`.
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),

    /// The `minify` directive takes no arguments.
    #[error("unexpected argument `{0}`: `minify` takes no arguments")]
    UnexpectedArgument(String),
}

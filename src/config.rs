use crate::error::ConfigError;
use crate::pool::{DEFAULT_MAX_CAPACITY, DEFAULT_MAX_IDLE};
use serde::Deserialize;

const DIRECTIVE: &str = "minify";

/// How matched response bodies are rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Minify each body chunk as it passes through.
    ///
    /// Memory per response stays bounded. `Content-Length` is removed because
    /// the final size is unknown, and a minification failure aborts the
    /// response after some bytes may already have been sent.
    #[default]
    Streaming,
    /// Record the whole body, minify it in one go, then send it.
    ///
    /// `Content-Length` is set to the minified size, and a minification
    /// failure falls back to the original body. Costs one pooled buffer per
    /// in-flight response.
    Buffered,
}

/// Settings for [`MinifyLayer`](crate::MinifyLayer).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    /// Rewrite strategy.
    pub strategy: Strategy,
    /// Idle buffers kept by the buffered strategy's pool.
    pub max_idle_buffers: usize,
    /// Buffers that grew beyond this many bytes are freed instead of pooled.
    pub max_buffer_capacity: usize,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_idle_buffers: DEFAULT_MAX_IDLE,
            max_buffer_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl MinifyConfig {
    /// Parses the `minify` directive.
    ///
    /// The directive takes no arguments and enables the built-in registrations
    /// with default settings.
    pub fn from_directive(line: &str) -> Result<Self, ConfigError> {
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            None => return Err(ConfigError::MissingDirective),
            Some(DIRECTIVE) => {}
            Some(other) => return Err(ConfigError::UnknownDirective(other.to_string())),
        }

        if let Some(argument) = tokens.next() {
            return Err(ConfigError::UnexpectedArgument(argument.to_string()));
        }

        Ok(Self::default())
    }
}

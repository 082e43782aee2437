//! Error taxonomy shared by every opskit crate

use thiserror::Error;

/// Result alias used across the workspace
pub type OpsResult<T> = Result<T, OpsError>;

/// Errors raised while resolving, constructing or executing a strategy
#[derive(Debug, Error)]
pub enum OpsError {
    /// No registered strategy matches the requested name
    #[error("Strategy not found: {0}")]
    StrategyNotFound(String),

    /// Positional arguments did not fit the strategy's parameter list
    #[error("Invalid arguments for {strategy}: {message}")]
    InvalidArguments { strategy: String, message: String },

    /// Settings file or environment is missing something a client needs
    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend could not be reached or rejected the credentials
    #[error("{service} connection failed: {message}")]
    Connection { service: String, message: String },

    /// A backend answered with a non-success status
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: String,
        status: u16,
        body: String,
    },

    /// A backend answered with a body that could not be decoded
    #[error("{service} response parse error: {message}")]
    Parse { service: String, message: String },

    /// A CLI backend exited with a failure status
    #[error("{program} exited with code {code}: {stderr}")]
    Command {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpsError {
    pub fn invalid_args(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn connection(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error happened before the strategy could run
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::StrategyNotFound(_)
                | Self::InvalidArguments { .. }
                | Self::Config(_)
                | Self::Connection { .. }
        )
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigGenError {
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("IO error ({context}): {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("Connection timeout")]
    Timeout,
    #[error("VISA error: {0}")]
    Visa(String),
    #[error("Session is closed")]
    SessionClosed,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SigGenError {
    pub(crate) fn invalid(field: &'static str, value: impl ToString) -> Self {
        SigGenError::InvalidValue {
            field,
            value: value.to_string(),
        }
    }

    pub(crate) fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        if matches!(
            source.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) {
            return SigGenError::Timeout;
        }
        SigGenError::Io {
            source,
            context: context.into(),
        }
    }

    /// True for parameter validation failures, which are raised before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, SigGenError::InvalidValue { .. })
    }
}

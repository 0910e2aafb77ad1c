use thiserror::Error;

/// Errors surfaced by the pipeline.
///
/// Channel-level and numeric problems never reach this type: filtering and
/// feature extraction degrade to empty/NaN/zero results instead. What remains
/// is configuration parsing and snapshot I/O.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source<S: Into<String>>(message: S, source: serde_json::Error) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn io<S: Into<String>>(message: S, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn serialization<S: Into<String>>(message: S, source: serde_json::Error) -> Self {
        Self::Serialization {
            message: message.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

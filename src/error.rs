#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskdeckError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not signed in (run `taskdeck login <email> <password>`)")]
    NotSignedIn,

    #[error("this action requires an administrator account")]
    NotAuthorized,

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("failed to {action} task: {source}")]
    TaskWrite {
        action: &'static str,
        #[source]
        source: Box<TaskdeckError>,
    },

    #[error("feature '{0}' is disabled (set features.{0} = true)")]
    FeatureDisabled(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid config key '{0}'")]
    InvalidConfigKey(String),

    #[error("invalid config value for '{key}': {msg}")]
    InvalidConfigValue { key: String, msg: String },

    #[error("invalid storage key '{0}'")]
    InvalidStoreKey(String),

    #[error("io error at {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode stored value for '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl TaskdeckError {
    /// HTTP-style status recorded alongside logged errors.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredentials | Self::NotSignedIn => 401,
            Self::NotAuthorized | Self::FeatureDisabled(_) => 403,
            Self::TaskNotFound(_) => 404,
            Self::InvalidConfigKey(_) | Self::InvalidConfigValue { .. } => 400,
            Self::TaskWrite { source, .. } => source.status_code(),
            _ => 500,
        }
    }

    /// True when the error (or the failure it wraps) is a missing task.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::TaskNotFound(_) => true,
            Self::TaskWrite { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T, E = TaskdeckError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_wrapped_errors() {
        let err = TaskdeckError::TaskWrite {
            action: "update",
            source: Box::new(TaskdeckError::TaskNotFound("abc".to_owned())),
        };
        assert_eq!(err.status_code(), 404);
        assert!(err.is_not_found());
        assert_eq!(TaskdeckError::NotAuthorized.status_code(), 403);
        assert_eq!(TaskdeckError::Other("boom".to_owned()).status_code(), 500);
    }
}

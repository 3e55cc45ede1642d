//! Archive error types.

use thiserror::Error;

/// Archive operation errors.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unsupported label selector: {0}")]
    UnsupportedSelector(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("found {count} archived workflows with namespace/name: {namespace}/{name}")]
    AmbiguousResult {
        count: u64,
        namespace: String,
        name: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<wfarchive_core::Error> for ArchiveError {
    fn from(err: wfarchive_core::Error) -> Self {
        match err {
            wfarchive_core::Error::Encoding(msg) => Self::Encoding(msg),
            wfarchive_core::Error::UnsupportedSelector(msg) => Self::UnsupportedSelector(msg),
        }
    }
}

/// Result type for archive operations.
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_result_message() {
        let err = ArchiveError::AmbiguousResult {
            count: 2,
            namespace: "argo".to_string(),
            name: "dup".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "found 2 archived workflows with namespace/name: argo/dup"
        );
    }

    #[test]
    fn test_core_errors_keep_their_kind() {
        let err: ArchiveError = wfarchive_core::Error::Encoding("bad".to_string()).into();
        assert!(matches!(err, ArchiveError::Encoding(_)));
        let err: ArchiveError =
            wfarchive_core::Error::UnsupportedSelector("op".to_string()).into();
        assert!(matches!(err, ArchiveError::UnsupportedSelector(_)));
    }
}

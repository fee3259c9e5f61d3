use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failed job, shared by both front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    FolderNotFound,
    ToolUnavailable,
    DownloadError,
    Timeout,
    InternalError,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Folder does not exist: {0}")]
    FolderNotFound(String),

    #[error("yt-dlp is not available ({0}). Install it with: brew install yt-dlp")]
    ToolUnavailable(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Download timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::FolderNotFound(_) => ErrorKind::FolderNotFound,
            AppError::ToolUnavailable(_) => ErrorKind::ToolUnavailable,
            AppError::Download(_) => ErrorKind::DownloadError,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// The raw detail without the kind-specific prefix.
    pub fn detail(&self) -> &str {
        match self {
            AppError::InvalidInput(detail)
            | AppError::FolderNotFound(detail)
            | AppError::ToolUnavailable(detail)
            | AppError::Download(detail)
            | AppError::Timeout(detail)
            | AppError::Internal(detail) => detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_detail() {
        let err = AppError::Download("network error".to_string());
        assert_eq!(err.kind(), ErrorKind::DownloadError);
        assert_eq!(err.detail(), "network error");
        assert_eq!(err.to_string(), "Download failed: network error");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ToolUnavailable).unwrap();
        assert_eq!(json, "\"tool_unavailable\"");
    }
}

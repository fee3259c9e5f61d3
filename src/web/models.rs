use serde::{Deserialize, Serialize};

use crate::domain::{DownloadRequest, ErrorKind, JobOutcome};

/// Body of `POST /download`. Absent or null fields become empty strings so
/// they fail validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
}

impl From<DownloadBody> for DownloadRequest {
    fn from(body: DownloadBody) -> Self {
        DownloadRequest::new(body.url.unwrap_or_default(), body.folder.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl From<JobOutcome> for DownloadResponse {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Success => Self {
                success: true,
                message: Some(JobOutcome::Success.user_message()),
                error: None,
                kind: None,
            },
            JobOutcome::Failure(err) => Self {
                success: false,
                message: None,
                error: Some(err.to_string()),
                kind: Some(err.kind()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppError;
    use serde_json::json;

    #[test]
    fn test_body_with_missing_fields() {
        let body: DownloadBody = serde_json::from_value(json!({ "url": null })).unwrap();
        let request = DownloadRequest::from(body);
        assert_eq!(request.url, "");
        assert_eq!(request.destination_folder, "");
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(DownloadResponse::from(JobOutcome::Success)).unwrap();
        assert_eq!(
            ok,
            json!({ "success": true, "message": "Video downloaded successfully" })
        );

        let failed = serde_json::to_value(DownloadResponse::from(JobOutcome::Failure(
            AppError::Download("network error".into()),
        )))
        .unwrap();
        assert_eq!(
            failed,
            json!({
                "success": false,
                "error": "Download failed: network error",
                "kind": "download_error"
            })
        );
    }
}

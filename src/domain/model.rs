use std::path::PathBuf;

use super::error::{AppError, ErrorKind};

/// Label shown by the desktop form before a folder has been picked.
pub const NO_FOLDER_SELECTED: &str = "No folder selected";

/// One user submission: what to fetch and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination_folder: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, destination_folder: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
            destination_folder: destination_folder.into(),
        }
    }

    pub fn folder_path(&self) -> PathBuf {
        PathBuf::from(&self.destination_folder)
    }
}

/// Result of a single job. Produced exactly once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure(AppError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success)
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            JobOutcome::Success => None,
            JobOutcome::Failure(err) => Some(err.kind()),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            JobOutcome::Success => "Video downloaded successfully".to_string(),
            JobOutcome::Failure(err) => err.to_string(),
        }
    }
}

/// Something the tool reported while running, parsed from its stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A `[download]  45.2% of 12.3MiB at 1.2MiB/s ETA 00:10` line
    Percent {
        percent: f32,
        speed: Option<String>,
        eta: Option<String>,
    },
    /// A phase change worth showing, e.g. extracting or merging
    Status(String),
}

/// Items of a job stream: any number of progress events, then one outcome.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Progress(ProgressEvent),
    Finished(JobOutcome),
}

impl From<Result<(), AppError>> for JobOutcome {
    fn from(result: Result<(), AppError>) -> Self {
        match result {
            Ok(()) => JobOutcome::Success,
            Err(err) => JobOutcome::Failure(err),
        }
    }
}

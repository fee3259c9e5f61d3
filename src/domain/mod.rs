pub mod error;
pub mod model;

pub use error::{AppError, ErrorKind};
pub use model::{DownloadRequest, JobEvent, JobOutcome, ProgressEvent, NO_FOLDER_SELECTED};

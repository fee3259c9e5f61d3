use crate::application::DownloadJobRunner;
use crate::domain::{DownloadRequest, JobEvent, JobOutcome, ProgressEvent};
use crate::ui::{DownloadMessage, DownloadPhase, DownloadView};
use futures::StreamExt;
use iced::time::{Duration, Instant};
use iced::{Subscription, Task};
use std::path::PathBuf;
use tracing::info;

const BUSY_TICK: Duration = Duration::from_millis(50);

pub struct DownloadApp {
    view: DownloadView,
    runner: DownloadJobRunner,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(DownloadJobRunner::default())
    }
}

impl DownloadApp {
    pub fn new(runner: DownloadJobRunner) -> Self {
        Self {
            view: DownloadView::default(),
            runner,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Folder chosen in the native dialog, None if cancelled
    FolderSelected(Option<PathBuf>),
    /// Percentage or phase reported by the running tool
    DownloadProgress(ProgressEvent),
    /// Final result of the background job
    DownloadFinished(JobOutcome),
    /// Drives the busy indicator
    Tick(Instant),
    DialogClosed,
}

impl From<JobEvent> for Message {
    fn from(event: JobEvent) -> Self {
        match event {
            JobEvent::Progress(progress) => Message::DownloadProgress(progress),
            JobEvent::Finished(outcome) => Message::DownloadFinished(outcome),
        }
    }
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::ChooseFolderPressed if !app.view.is_busy() => {
                    return Task::perform(
                        async {
                            rfd::AsyncFileDialog::new()
                                .set_title("Select download folder")
                                .pick_folder()
                                .await
                                .map(|handle| handle.path().to_path_buf())
                        },
                        Message::FolderSelected,
                    );
                }
                DownloadMessage::DownloadPressed if !app.view.is_busy() => {
                    let request =
                        DownloadRequest::new(app.view.video_url.clone(), app.view.folder_label());

                    // Cheap checks stay on the UI thread so bad input never shows as busy
                    if let Err(e) = DownloadJobRunner::validate(&request) {
                        app.view.status_message = e.to_string();
                        return Task::none();
                    }

                    app.view.start_busy();
                    app.view.status_message = "Starting download...".to_string();
                    info!(
                        url = %request.url,
                        folder = %request.destination_folder,
                        "Download requested"
                    );

                    // The job stream is polled on the background tokio executor
                    return Task::stream(app.runner.execute_stream(request).map(Message::from));
                }
                _ => {}
            }
        }
        Message::FolderSelected(folder) => {
            if let Some(folder) = folder {
                app.view.folder = Some(folder);
            }
        }
        Message::DownloadProgress(event) => {
            if app.view.is_busy() {
                app.view.apply_progress(event);
            }
        }
        Message::DownloadFinished(outcome) => {
            match &outcome {
                JobOutcome::Success => {
                    app.view.phase = DownloadPhase::Succeeded;
                    app.view.status_message = "Download complete!".to_string();
                }
                JobOutcome::Failure(e) => {
                    app.view.phase = DownloadPhase::Failed;
                    app.view.status_message = e.to_string();
                }
            }

            if outcome.is_success() {
                return Task::perform(
                    async {
                        rfd::AsyncMessageDialog::new()
                            .set_level(rfd::MessageLevel::Info)
                            .set_title("Success")
                            .set_description("Video downloaded successfully!")
                            .set_buttons(rfd::MessageButtons::Ok)
                            .show()
                            .await
                    },
                    |_| Message::DialogClosed,
                );
            }
        }
        Message::Tick(_) => {
            app.view.advance_busy();
        }
        Message::DialogClosed => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

pub fn subscription(app: &DownloadApp) -> Subscription<Message> {
    if app.view.is_indeterminate() {
        iced::time::every(BUSY_TICK).map(Message::Tick)
    } else {
        Subscription::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AppError;

    #[test]
    fn test_invalid_input_never_enters_busy_state() {
        let mut app = DownloadApp::default();
        let _ = update(&mut app, Message::UiMessage(DownloadMessage::DownloadPressed));

        assert!(!app.view.is_busy());
        assert_eq!(app.view.phase, DownloadPhase::Idle);
        assert_eq!(app.view.status_message, "Please enter a video URL");
    }

    #[test]
    fn test_placeholder_folder_is_rejected() {
        let mut app = DownloadApp::default();
        let _ = update(
            &mut app,
            Message::UiMessage(DownloadMessage::UrlChanged("https://example.com/v".into())),
        );
        let _ = update(&mut app, Message::UiMessage(DownloadMessage::DownloadPressed));

        assert!(!app.view.is_busy());
        assert_eq!(app.view.status_message, "Please select a download folder");
    }

    #[test]
    fn test_valid_request_enters_busy_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut app = DownloadApp::default();
        let _ = update(
            &mut app,
            Message::UiMessage(DownloadMessage::UrlChanged("https://example.com/v".into())),
        );
        let _ = update(&mut app, Message::FolderSelected(Some(dir.path().to_path_buf())));
        let _ = update(&mut app, Message::UiMessage(DownloadMessage::DownloadPressed));

        assert!(app.view.is_busy());
        assert_eq!(app.view.status_message, "Starting download...");
    }

    #[test]
    fn test_cancelled_folder_dialog_keeps_previous_folder() {
        let mut app = DownloadApp::default();
        let _ = update(&mut app, Message::FolderSelected(Some(PathBuf::from("/tmp"))));
        let _ = update(&mut app, Message::FolderSelected(None));
        assert_eq!(app.view.folder, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_every_outcome_clears_busy_state() {
        let outcomes = [
            JobOutcome::Success,
            JobOutcome::Failure(AppError::Download("network error".into())),
            JobOutcome::Failure(AppError::Timeout("exceeded 300-second limit".into())),
            JobOutcome::Failure(AppError::ToolUnavailable("missing".into())),
            JobOutcome::Failure(AppError::Internal("boom".into())),
        ];

        for outcome in outcomes {
            let mut app = DownloadApp::default();
            app.view.start_busy();
            let _ = update(&mut app, Message::DownloadFinished(outcome.clone()));
            assert!(!app.view.is_busy(), "still busy after {:?}", outcome);
        }
    }

    #[test]
    fn test_progress_updates_status_while_running() {
        let mut app = DownloadApp::default();
        app.view.start_busy();
        let _ = update(
            &mut app,
            Message::DownloadProgress(ProgressEvent::Percent {
                percent: 12.5,
                speed: None,
                eta: Some("01:10".to_string()),
            }),
        );
        assert_eq!(app.view.percent, Some(12.5));
        assert_eq!(app.view.status_message, "Downloading: 12.5%, ETA 01:10");

        let _ = update(&mut app, Message::DownloadFinished(JobOutcome::Success));
        assert_eq!(app.view.status_message, "Download complete!");

        // Late progress after the outcome is ignored
        let _ = update(
            &mut app,
            Message::DownloadProgress(ProgressEvent::Status("Merging files...".to_string())),
        );
        assert_eq!(app.view.status_message, "Download complete!");
    }

    #[test]
    fn test_failure_message_is_shown() {
        let mut app = DownloadApp::default();
        app.view.start_busy();
        let _ = update(
            &mut app,
            Message::DownloadFinished(JobOutcome::Failure(AppError::Download(
                "network error".into(),
            ))),
        );
        assert_eq!(app.view.phase, DownloadPhase::Failed);
        assert_eq!(app.view.status_message, "Download failed: network error");
    }
}

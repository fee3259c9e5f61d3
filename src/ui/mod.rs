use std::path::PathBuf;

use iced::{
    widget::{button, column, progress_bar, row, text, text_input, Space},
    Element, Length,
};

use crate::domain::{ProgressEvent, NO_FOLDER_SELECTED};

/// Where the form is in its submit cycle. Owned by the form, not the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Main view state
pub struct DownloadView {
    pub video_url: String,
    pub folder: Option<PathBuf>,
    pub status_message: String,
    pub phase: DownloadPhase,
    /// Last percentage reported by the tool, None until the first one arrives
    pub percent: Option<f32>,
    /// Position of the indeterminate busy bar, 0.0..1.0
    pub busy_phase: f32,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            video_url: String::new(),
            folder: None,
            status_message: String::new(),
            phase: DownloadPhase::Idle,
            percent: None,
            busy_phase: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    ChooseFolderPressed,
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.video_url = url;
            }
            DownloadMessage::ChooseFolderPressed | DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.phase == DownloadPhase::Running
    }

    /// Folder as entered into the request; the placeholder when nothing was picked.
    pub fn folder_label(&self) -> String {
        match &self.folder {
            Some(path) => path.display().to_string(),
            None => NO_FOLDER_SELECTED.to_string(),
        }
    }

    pub fn start_busy(&mut self) {
        self.phase = DownloadPhase::Running;
        self.percent = None;
        self.busy_phase = 0.0;
    }

    /// The sweeping bar is only shown until the tool reports a percentage.
    pub fn is_indeterminate(&self) -> bool {
        self.is_busy() && self.percent.is_none()
    }

    pub fn apply_progress(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Percent {
                percent,
                speed,
                eta,
            } => {
                self.percent = Some(percent);
                let mut status = format!("Downloading: {:.1}%", percent);
                if let Some(speed) = speed {
                    status.push_str(&format!(" at {}", speed));
                }
                if let Some(eta) = eta {
                    status.push_str(&format!(", ETA {}", eta));
                }
                self.status_message = status;
            }
            ProgressEvent::Status(status) => {
                self.status_message = status;
            }
        }
    }

    pub fn advance_busy(&mut self) {
        if self.is_indeterminate() {
            self.busy_phase = (self.busy_phase + 0.02) % 1.0;
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let busy = self.is_busy();

        let download_label = if busy { "Downloading..." } else { "Download Video" };
        let bar_value = match (self.phase, self.percent) {
            (DownloadPhase::Running, Some(percent)) => percent / 100.0,
            // Triangle wave so the bar sweeps back and forth
            (DownloadPhase::Running, None) => 1.0 - (2.0 * self.busy_phase - 1.0).abs(),
            (DownloadPhase::Succeeded, _) => 1.0,
            _ => 0.0,
        };

        column![
            text("Video Downloader").size(32),
            Space::new().height(Length::Fixed(20.0)),
            text("Video URL:").size(16),
            text_input("Paste the video URL here...", &self.video_url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            text("Download folder:").size(16),
            row![
                text(self.folder_label()).size(14).width(Length::Fill),
                button("Choose Folder")
                    .on_press_maybe((!busy).then_some(DownloadMessage::ChooseFolderPressed))
                    .padding([6, 12]),
            ]
            .spacing(10),
            Space::new().height(Length::Fixed(20.0)),
            button(download_label)
                .on_press_maybe((!busy).then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
            progress_bar(0.0..=1.0, bar_value),
            text(&self.status_message).size(14),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_label_placeholder() {
        let mut view = DownloadView::default();
        assert_eq!(view.folder_label(), NO_FOLDER_SELECTED);

        view.folder = Some(PathBuf::from("/tmp/videos"));
        assert_eq!(view.folder_label(), "/tmp/videos");
    }

    #[test]
    fn test_busy_bar_only_moves_while_running() {
        let mut view = DownloadView::default();
        view.advance_busy();
        assert_eq!(view.busy_phase, 0.0);

        view.start_busy();
        view.advance_busy();
        assert!(view.busy_phase > 0.0);
        assert!(view.is_busy());
    }

    #[test]
    fn test_percent_replaces_sweep() {
        let mut view = DownloadView::default();
        view.start_busy();
        assert!(view.is_indeterminate());

        view.apply_progress(ProgressEvent::Percent {
            percent: 45.2,
            speed: Some("1.23MiB/s".to_string()),
            eta: Some("00:45".to_string()),
        });
        assert!(!view.is_indeterminate());
        assert_eq!(view.percent, Some(45.2));
        assert_eq!(view.status_message, "Downloading: 45.2% at 1.23MiB/s, ETA 00:45");

        let phase = view.busy_phase;
        view.advance_busy();
        assert_eq!(view.busy_phase, phase);

        view.apply_progress(ProgressEvent::Status("Merging files...".to_string()));
        assert_eq!(view.status_message, "Merging files...");
        assert_eq!(view.percent, Some(45.2));
    }

    #[test]
    fn test_new_job_resets_percent() {
        let mut view = DownloadView::default();
        view.start_busy();
        view.apply_progress(ProgressEvent::Percent {
            percent: 100.0,
            speed: None,
            eta: None,
        });
        view.start_busy();
        assert_eq!(view.percent, None);
    }
}

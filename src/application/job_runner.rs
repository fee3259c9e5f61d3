use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::{future::BoxFuture, stream::BoxStream, FutureExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    domain::{AppError, DownloadRequest, JobEvent, JobOutcome, ProgressEvent, NO_FOLDER_SELECTED},
    utils::{clean_tool_output, parse_progress_line, url_host},
};

pub const DEFAULT_TOOL: &str = "yt-dlp";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where package managers put the tool when it is not on the inherited `PATH`,
/// which is the usual case for a desktop app started from Finder.
pub const TOOL_SEARCH_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// How long to keep reading output after the tool exited. Grandchildren that
/// inherited the pipes can otherwise hold them open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_secs(5);

/// The program used to launch the downloader, optionally behind a wrapper
/// such as `python3 -m yt_dlp`.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// A plain name like `yt-dlp` that is resolved through `PATH`.
    fn is_bare_name(&self) -> bool {
        Path::new(&self.program).components().count() == 1
            && !self.program.to_string_lossy().contains(std::path::MAIN_SEPARATOR)
    }

    fn in_dir(&self, dir: &Path) -> ToolCommand {
        ToolCommand {
            program: dir.join(&self.program).into_os_string(),
            leading_args: self.leading_args.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down helpers like ffmpeg too
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

/// Configuration for the job runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub tool: ToolCommand,
    /// Tried in order when a bare tool name cannot be run from `PATH`
    pub search_dirs: Vec<PathBuf>,
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tool: ToolCommand::default(),
            search_dirs: TOOL_SEARCH_DIRS.iter().map(PathBuf::from).collect(),
            timeout: DEFAULT_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Turns a [`DownloadRequest`] into a [`JobOutcome`] by shelling out to the
/// external downloader. Holds no per-job state, so one instance can be
/// cloned into every worker.
#[derive(Debug, Clone, Default)]
pub struct DownloadJobRunner {
    config: RunnerConfig,
}

impl DownloadJobRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Checks the request fields and that the destination folder exists.
    pub fn validate(request: &DownloadRequest) -> Result<(), AppError> {
        if request.url.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Please enter a video URL".to_string(),
            ));
        }

        let folder = request.destination_folder.trim();
        if folder.is_empty() || folder == NO_FOLDER_SELECTED {
            return Err(AppError::InvalidInput(
                "Please select a download folder".to_string(),
            ));
        }

        if !Path::new(&request.destination_folder).is_dir() {
            return Err(AppError::FolderNotFound(
                request.destination_folder.clone(),
            ));
        }

        Ok(())
    }

    /// True when some candidate of the configured tool answers `--version`.
    pub async fn probe_tool(&self) -> bool {
        self.locate_tool().await.is_some()
    }

    /// The configured tool as given, then (for bare names) the same name in
    /// each search directory. The first candidate whose probe succeeds wins.
    pub async fn locate_tool(&self) -> Option<ToolCommand> {
        for candidate in self.candidates() {
            if self.probe(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    fn candidates(&self) -> Vec<ToolCommand> {
        let tool = &self.config.tool;
        let mut candidates = vec![tool.clone()];
        if tool.is_bare_name() {
            candidates.extend(
                self.config
                    .search_dirs
                    .iter()
                    .map(|dir| tool.in_dir(dir))
                    .filter(|candidate| Path::new(&candidate.program).is_file()),
            );
        }
        candidates
    }

    /// Runs `<tool> --version`. Missing binary, non-zero exit and a hung
    /// probe all count as unavailable.
    async fn probe(&self, tool: &ToolCommand) -> bool {
        let mut child = match tool
            .command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!(tool = %tool.name(), error = %e, "Probe could not start tool");
                return false;
            }
        };

        match wait_with_deadline(&mut child, self.config.probe_timeout).await {
            Ok(Some(status)) => {
                debug!(tool = %tool.name(), %status, "Probe finished");
                status.success()
            }
            Ok(None) => {
                warn!(
                    tool = %tool.name(),
                    timeout_secs = self.config.probe_timeout.as_secs(),
                    "Probe timed out"
                );
                false
            }
            Err(e) => {
                debug!(tool = %tool.name(), error = %e, "Probe failed while waiting");
                false
            }
        }
    }

    /// Runs one job to completion. Never panics on tool behaviour and never
    /// returns an error past this point: every failure becomes a [`JobOutcome`].
    pub async fn execute(&self, request: &DownloadRequest) -> JobOutcome {
        self.execute_with_progress(request, None).await
    }

    /// Like [`execute`](Self::execute), additionally sending what the tool
    /// reports on stdout to `progress`.
    pub async fn execute_with_progress(
        &self,
        request: &DownloadRequest,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> JobOutcome {
        let span = info_span!(
            "download_job",
            url = %request.url,
            folder = %request.destination_folder,
            host = url_host(&request.url).as_deref().unwrap_or("-")
        );

        async {
            let outcome = JobOutcome::from(self.run(request, progress).await);
            match &outcome {
                JobOutcome::Success => info!("Download completed"),
                JobOutcome::Failure(err) => {
                    warn!(kind = ?err.kind(), error = %err.detail(), "Download failed")
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// The job as a stream: progress events while it runs, then exactly one
    /// [`JobEvent::Finished`]. Dropping the stream kills the tool.
    pub fn execute_stream(&self, request: DownloadRequest) -> BoxStream<'static, JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = self.clone();
        let job = async move { runner.execute_with_progress(&request, Some(tx)).await }.boxed();

        futures::stream::unfold(
            JobStreamState::Running { progress: rx, job },
            |state| async move {
                match state {
                    JobStreamState::Running {
                        mut progress,
                        mut job,
                    } => {
                        let next = tokio::select! {
                            // Queued progress goes out before the outcome
                            biased;
                            Some(event) = progress.recv() => JobEvent::Progress(event),
                            outcome = &mut job => JobEvent::Finished(outcome),
                        };

                        let state = if matches!(next, JobEvent::Finished(_)) {
                            JobStreamState::Finished
                        } else {
                            JobStreamState::Running { progress, job }
                        };
                        Some((next, state))
                    }
                    JobStreamState::Finished => None,
                }
            },
        )
        .boxed()
    }

    async fn run(
        &self,
        request: &DownloadRequest,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> Result<(), AppError> {
        Self::validate(request)?;

        let Some(tool) = self.locate_tool().await else {
            return Err(AppError::ToolUnavailable(format!(
                "`{} --version` did not succeed",
                self.config.tool.name()
            )));
        };

        let template = output_template(&request.folder_path());
        info!(tool = %tool.name(), template = %template.display(), "Starting download");

        let mut child = tool
            .command()
            .arg("--hls-prefer-native")
            .arg(&request.url)
            .arg("-o")
            .arg(&template)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                AppError::ToolUnavailable(format!("failed to start {}: {}", tool.name(), e))
            })?;

        let mut stdout_task = tokio::spawn(forward_stdout(child.stdout.take(), progress));
        let mut stderr_task = tokio::spawn(collect_stderr(child.stderr.take()));

        let status = match wait_with_deadline(&mut child, self.config.timeout).await {
            Ok(Some(status)) => status,
            Ok(None) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(AppError::Timeout(format!(
                    "exceeded {}-second limit",
                    self.config.timeout.as_secs()
                )));
            }
            Err(e) => {
                stdout_task.abort();
                stderr_task.abort();
                // Best effort: the process may already be gone
                let _ = child.kill().await;
                return Err(AppError::Internal(format!(
                    "failed to wait for {}: {}",
                    tool.name(),
                    e
                )));
            }
        };

        // Let the last progress lines through before reporting the outcome
        if tokio::time::timeout(OUTPUT_GRACE, &mut stdout_task).await.is_err() {
            stdout_task.abort();
        }

        if status.success() {
            stderr_task.abort();
            return Ok(());
        }

        let stderr = match tokio::time::timeout(OUTPUT_GRACE, &mut stderr_task).await {
            Ok(Ok(Ok(bytes))) => clean_tool_output(&String::from_utf8_lossy(&bytes)),
            Ok(Ok(Err(e))) => {
                return Err(AppError::Internal(format!(
                    "failed to read error output: {}",
                    e
                )));
            }
            Ok(Err(e)) => {
                return Err(AppError::Internal(format!(
                    "error output reader failed: {}",
                    e
                )));
            }
            Err(_) => {
                stderr_task.abort();
                String::new()
            }
        };

        if stderr.is_empty() {
            Err(AppError::Download(format!(
                "{} exited with {} without an error message",
                tool.name(),
                status
            )))
        } else {
            Err(AppError::Download(stderr))
        }
    }
}

enum JobStreamState {
    Running {
        progress: UnboundedReceiver<ProgressEvent>,
        job: BoxFuture<'static, JobOutcome>,
    },
    Finished,
}

/// `<folder>/%(title)s.%(ext)s`; the placeholders are filled in by the tool.
pub fn output_template(folder: &Path) -> PathBuf {
    folder.join("%(title)s.%(ext)s")
}

/// Waits for the child up to `limit`. On expiry the child's process group is
/// killed, the child is reaped and `None` is returned.
async fn wait_with_deadline(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => status.map(Some),
        Err(_) => {
            #[cfg(unix)]
            kill_process_group(child);
            // kill() sends SIGKILL and then waits, so no zombie is left behind
            child.kill().await?;
            Ok(None)
        }
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };

    // The child leads its own group (see ToolCommand::command)
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "Failed to kill tool process group"),
    }
}

/// Splits on `\n` and `\r`: without a terminal the tool may still redraw its
/// progress line with carriage returns.
async fn forward_stdout(
    stdout: Option<ChildStdout>,
    progress: Option<UnboundedSender<ProgressEvent>>,
) -> io::Result<()> {
    let Some(stdout) = stdout else {
        return Ok(());
    };

    let mut reader = BufReader::new(stdout);
    let mut pending = Vec::new();
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }

        let consumed = chunk.len();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                report_line(&pending, progress.as_ref());
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
        reader.consume(consumed);
    }
    report_line(&pending, progress.as_ref());
    Ok(())
}

fn report_line(raw: &[u8], progress: Option<&UnboundedSender<ProgressEvent>>) {
    let line = clean_tool_output(&String::from_utf8_lossy(raw));
    if line.is_empty() {
        return;
    }

    debug!(target: "yt_dlp", "{}", line);
    if let Some(tx) = progress {
        if let Some(event) = parse_progress_line(&line) {
            // The receiver is gone once the caller stopped listening
            let _ = tx.send(event);
        }
    }
}

async fn collect_stderr(stderr: Option<ChildStderr>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut stderr) = stderr {
        stderr.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Duration;

use crate::application::{
    job_runner::{DEFAULT_TIMEOUT, DEFAULT_TOOL},
    RunnerConfig, ToolCommand,
};

#[derive(Parser, Debug)]
#[command(name = "video-downloader")]
#[command(about = "Download videos with yt-dlp from a desktop form or a local web page", long_about = None)]
pub struct Cli {
    /// Downloader program to run
    #[arg(long, global = true, default_value = DEFAULT_TOOL)]
    pub tool: String,

    /// Extra arguments placed before the downloader's own, e.g. `-m yt_dlp` for `--tool python3`
    #[arg(long = "tool-arg", global = true, allow_hyphen_values = true)]
    pub tool_args: Vec<String>,

    /// Wall-clock limit for a single download, in seconds
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the desktop form (default)
    Desktop,
    /// Serve the download page on a local HTTP port
    Web(WebArgs),
}

#[derive(clap::Args, Debug)]
pub struct WebArgs {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub address: SocketAddr,

    /// Maximum number of downloads running at once (unbounded if omitted)
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Do not open the page in the default browser on startup
    #[arg(long)]
    pub no_browser: bool,
}

impl Cli {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            tool: ToolCommand::new(&self.tool).with_args(&self.tool_args),
            timeout: Duration::from_secs(self.timeout_secs),
            ..RunnerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_desktop() {
        let cli = Cli::parse_from(["video-downloader"]);
        assert!(cli.command.is_none());

        let config = cli.runner_config();
        assert_eq!(config.tool.program, "yt-dlp");
        assert!(config.tool.leading_args.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_web_with_wrapped_tool() {
        let cli = Cli::parse_from([
            "video-downloader",
            "web",
            "--address",
            "0.0.0.0:9000",
            "--max-concurrent",
            "2",
            "--tool",
            "python3",
            "--tool-arg",
            "-m",
            "--tool-arg",
            "yt_dlp",
            "--timeout-secs",
            "60",
        ]);

        match &cli.command {
            Some(Commands::Web(args)) => {
                assert_eq!(args.address.port(), 9000);
                assert_eq!(args.max_concurrent, Some(2));
                assert!(!args.no_browser);
            }
            other => panic!("expected web command, got {:?}", other),
        }

        let config = cli.runner_config();
        assert_eq!(config.tool.program, "python3");
        assert_eq!(config.tool.leading_args, vec!["-m", "yt_dlp"]);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = Cli::try_parse_from(["video-downloader", "--timeout-secs", "0"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["video-downloader", "--timeout-secs", "1"]).unwrap();
        assert_eq!(cli.timeout_secs, 1);
    }

    #[test]
    fn test_headless_web() {
        let cli = Cli::parse_from(["video-downloader", "web", "--no-browser"]);
        match cli.command {
            Some(Commands::Web(args)) => {
                assert!(args.no_browser);
                assert_eq!(args.address.to_string(), "127.0.0.1:8000");
            }
            other => panic!("expected web command, got {:?}", other),
        }
    }
}

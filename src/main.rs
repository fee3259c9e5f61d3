mod app;
mod application;
mod cli;
mod domain;
mod ui;
mod utils;
mod web;

use application::DownloadJobRunner;
use clap::Parser;
use cli::{Cli, Commands};
use iced::window;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let runner = DownloadJobRunner::new(cli.runner_config());
    info!(
        tool = %runner.config().tool.name(),
        timeout_secs = runner.config().timeout.as_secs(),
        "Using downloader"
    );

    match cli.command {
        None | Some(Commands::Desktop) => run_desktop(runner)?,
        Some(Commands::Web(args)) => {
            let state = web::WebState::new(runner, args.max_concurrent);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime
                .block_on(web::run(args.address, state, !args.no_browser))
                .map_err(|e| e as Box<dyn std::error::Error>)?;
        }
    }

    Ok(())
}

fn run_desktop(runner: DownloadJobRunner) -> iced::Result {
    let icon_data = include_bytes!("../assets/icon.png");

    let icon = match image::load_from_memory(icon_data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            window::icon::from_rgba(rgba.into_raw(), width, height).ok()
        }
        Err(_) => None,
    };

    iced::application(
        move || app::DownloadApp::new(runner.clone()),
        app::update,
        app::view,
    )
    .title("Video Downloader")
    .subscription(app::subscription)
    .window(window::Settings {
        icon,
        ..Default::default()
    })
    .run()
}

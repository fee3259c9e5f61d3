use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use super::models::{DownloadBody, DownloadResponse};
use crate::application::DownloadJobRunner;
use crate::domain::{AppError, DownloadRequest, JobOutcome};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Clone)]
pub struct WebState {
    runner: DownloadJobRunner,
    /// Caps simultaneous downloads when set
    limiter: Option<Arc<Semaphore>>,
}

impl WebState {
    pub fn new(runner: DownloadJobRunner, max_concurrent: Option<usize>) -> Self {
        Self {
            runner,
            limiter: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
        }
    }
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route("/download", post(download))
        .with_state(state)
}

pub async fn run(address: SocketAddr, state: WebState, open_browser: bool) -> Result<(), AnyError> {
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    let url = page_url(listener.local_addr()?);
    info!(%address, %url, "Video downloader listening");

    if open_browser {
        // A missing browser is not a reason to stop serving
        if let Err(e) = open::that_detached(&url) {
            warn!(%url, error = %e, "Failed to open browser, open the page manually");
        }
    }

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Browsable URL for the bound address; wildcard binds are reached via loopback.
fn page_url(local: SocketAddr) -> String {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}/", SocketAddr::new(ip, local.port()))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Every outcome, including a malformed body, is answered with 200 and a JSON
/// result so the page only has one response shape to render.
async fn download(
    State(state): State<WebState>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> Json<DownloadResponse> {
    let request = match body {
        Ok(Json(body)) => DownloadRequest::from(body),
        Err(rejection) => {
            let err = AppError::Internal(format!("Invalid JSON data: {}", rejection.body_text()));
            return Json(JobOutcome::Failure(err).into());
        }
    };

    let _permit = match &state.limiter {
        Some(limiter) => match limiter.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                error!(error = %e, "Download limiter closed");
                return Json(JobOutcome::Failure(AppError::Internal(e.to_string())).into());
            }
        },
        None => None,
    };

    // The runner awaits the subprocess without blocking the executor, so each
    // request simply runs on its own task
    let outcome = state.runner.execute(&request).await;
    info!(success = outcome.is_success(), kind = ?outcome.kind(), "Download request answered");
    Json(outcome.into())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

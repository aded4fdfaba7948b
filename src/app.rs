use std::{
    future::{Future, IntoFuture},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    http::{header, HeaderName, Request, Version},
    routing::get,
    Router,
};
use tokio::{net::TcpListener, sync::Notify};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{auth, state::AppState};

/// How long in-flight requests get after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let meta = RequestMeta::from_request(req);
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        version = ?meta.version,
                        host = meta.host,
                        user_agent = meta.user_agent,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis();
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

/// Request attributes recorded on the access-log span; missing headers read as "-".
#[derive(Debug, PartialEq, Eq)]
struct RequestMeta<'a> {
    version: Version,
    host: &'a str,
    user_agent: &'a str,
}

impl<'a> RequestMeta<'a> {
    fn from_request<B>(req: &'a Request<B>) -> Self {
        let read = move |name: HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
        };
        Self {
            version: req.version(),
            host: read(header::HOST),
            user_agent: read(header::USER_AGENT),
        }
    }
}

/// How the serving loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Every in-flight request finished inside the grace period.
    Drained,
    /// The grace period ran out; remaining connections were abandoned.
    Forced,
}

/// Serves until SIGINT/SIGTERM, then drains for at most [`SHUTDOWN_GRACE`].
pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<Shutdown> {
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, "Starting HTTP API server");
    let outcome = serve_with_shutdown(listener, app, shutdown_signal(), SHUTDOWN_GRACE).await?;
    info!(?outcome, "Server exiting");
    Ok(outcome)
}

/// Stops accepting once `signal` resolves and returns when in-flight requests
/// finish or `grace` elapses, whichever comes first.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    grace: Duration,
) -> std::io::Result<Shutdown>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stopping = Arc::new(Notify::new());
    let signalled = stopping.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        signal.await;
        info!("Shutting down server...");
        signalled.notify_one();
    });

    let outcome = tokio::select! {
        res = server.into_future() => {
            res?;
            Shutdown::Drained
        }
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(?grace, "Server forced to shutdown");
            Shutdown::Forced
        }
    };
    Ok(outcome)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "shutdown listener failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM listener failed");
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
}

// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use axum::{
    body::Bytes,
    extract::{MatchedPath, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use locust_service_api::{ApiError, CloudEvent, TEST_TRIGGERED};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::state::AppState;
use crate::worker::{self, EnqueueError, RunQueue};

async fn health_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": app_state.config.service.name,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Receives a structured CloudEvent and queues test triggers for the worker.
async fn event_handler(
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let event: CloudEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid CloudEvent: {e}")))?;

    if event.event_type != TEST_TRIGGERED {
        debug!(event_type = %event.event_type, id = %event.id, "Ignoring event");
        return Ok(accepted(&event.id, "ignored"));
    }

    let id = event.id.clone();
    let trigger = event.into_trigger()?;
    info!(
        event_id = %id,
        scope = %trigger.scope,
        strategy = %trigger.test_strategy,
        "Received test.triggered event"
    );

    app_state.queue.enqueue(trigger).map_err(|e| match e {
        EnqueueError::Full => AppError::Unavailable("Run queue is full".to_string()),
        EnqueueError::Closed => AppError::Unavailable("Service is shutting down".to_string()),
    })?;

    Ok(accepted(&id, "queued"))
}

fn accepted(id: &str, status: &str) -> Response {
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "id": id, "status": status }))).into_response()
}

pub fn create_app(config: Config, queue: RunQueue) -> (Router, Arc<AppState>) {
    let app_state = Arc::new(AppState { config: Arc::new(config), queue });

    let router = Router::new()
        .route("/", post(event_handler))
        .route("/events", post(event_handler))
        .route("/healthz", get(health_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::clone(&app_state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let route = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map_or_else(|| request.uri().path(), |matched| matched.as_str());
                    tracing::info_span!(
                        "http_request",
                        http_method = %request.method(),
                        http_route = %route
                    )
                })
                .on_response(DefaultOnResponse::new().level(tracing::Level::DEBUG))
                .on_failure(DefaultOnFailure::new().level(tracing::Level::WARN)),
        );

    (router, app_state)
}

/// Starts the receiver and the run worker, and serves until Ctrl-C or SIGTERM.
///
/// On shutdown the receiver stops accepting events first; queued runs and the
/// run in flight are completed before this returns.
///
/// # Errors
///
/// Returns an error if the address is invalid, the listener cannot be bound or
/// the runner cannot be built.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed.
pub async fn start_server(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runner = worker::build_runner(config)?;
    let (queue, worker_handle) = worker::spawn_worker(runner, config.server.queue_capacity);
    let (app, app_state) = create_app(config.clone(), queue);

    let addr: SocketAddr = config.server.address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // These expect() calls are documented in the function's # Panics section
    #[allow(clippy::expect_used)]
    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {
                info!("Received CTRL-C signal, initiating graceful shutdown");
            },
            () = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown");
            },
        }
    };

    info!(address = %addr, "Starting HTTP event receiver");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| {
            error!(error = %e, "API server error");
            e
        })?;

    // Dropping the last queue handle lets the worker drain and stop
    drop(app_state);
    info!("Waiting for queued runs to finish");
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "Run worker terminated abnormally");
    }
    Ok(())
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            Self::BadRequest(e) => (StatusCode::BAD_REQUEST, e),
            Self::Unavailable(e) => (StatusCode::SERVICE_UNAVAILABLE, e),
        };
        (status, msg).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

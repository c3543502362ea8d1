//! HTTP status API for dualstream
//!
//! Exposes the registry over HTTP for frontends and monitoring tools:
//! bulk and per-camera status, mode control, and a per-camera SSE feed that
//! pushes the fresh status on every mode change.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::info;

use crate::broadcast::SubscriberId;
use crate::manager::StreamManager;
use crate::stream::{CameraStream, StreamStatus};
use crate::tcp_server::ServerError;

/// Interval between SSE keepalive comments
const SSE_KEEPALIVE: Duration = Duration::from_secs(15);

/// Error payload of non-2xx API responses
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// API error carrying the status code and the wire error message
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unknown_stream(id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("unknown stream: {}", id),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn lookup(
    manager: &StreamManager,
    id: &str,
) -> Result<Arc<CameraStream>, ApiError> {
    manager.get(id).ok_or_else(|| ApiError::unknown_stream(id))
}

/// Handler for GET /api/streams
async fn list_streams(State(manager): State<Arc<StreamManager>>) -> Json<Vec<StreamStatus>> {
    Json(manager.all_status())
}

/// Handler for GET /api/streams/:id
async fn get_stream(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError> {
    let stream = lookup(&manager, &id)?;
    Ok(Json(stream.status()))
}

/// Handler for POST /api/streams/:id/live
async fn set_live(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError> {
    let stream = lookup(&manager, &id)?;
    stream.set_live();
    Ok(Json(stream.status()))
}

/// Handler for POST /api/streams/:id/standby
async fn set_standby(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError> {
    let stream = lookup(&manager, &id)?;
    stream.set_standby();
    Ok(Json(stream.status()))
}

/// Handler for POST /api/streams/:id/toggle
async fn toggle(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> Result<Json<StreamStatus>, ApiError> {
    let stream = lookup(&manager, &id)?;
    stream.toggle();
    Ok(Json(stream.status()))
}

/// SSE stream of one camera's status updates
///
/// Emits the current status immediately, then one event per mode change.
/// Dropping the stream (peer disconnect) releases the subscriber handle.
struct ModeEvents {
    stream: Arc<CameraStream>,
    subscriber: SubscriberId,
    rx: mpsc::Receiver<String>,
    initial: Option<String>,
}

impl Stream for ModeEvents {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(payload) = this.initial.take() {
            return Poll::Ready(Some(Ok(Event::default().data(payload))));
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(payload)) => Poll::Ready(Some(Ok(Event::default().data(payload)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ModeEvents {
    fn drop(&mut self) {
        self.stream.unsubscribe(self.subscriber);
    }
}

/// Handler for GET /api/streams/:id/events
async fn stream_events(
    State(manager): State<Arc<StreamManager>>,
    Path(id): Path<String>,
) -> Result<Sse<ModeEvents>, ApiError> {
    let stream = lookup(&manager, &id)?;
    let subscription = stream.subscribe();
    let initial = serde_json::to_string(&stream.status())
        .map_err(|e| ApiError::internal(format!("failed to serialize status: {}", e)))?;

    let events = ModeEvents {
        stream,
        subscriber: subscription.id,
        rx: subscription.rx,
        initial: Some(initial),
    };
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(SSE_KEEPALIVE).text("keepalive")))
}

/// Creates the axum Router with all API endpoints
pub fn create_api_router(manager: Arc<StreamManager>) -> Router {
    Router::new()
        .route("/api/streams", get(list_streams))
        .route("/api/streams/:id", get(get_stream))
        .route("/api/streams/:id/live", post(set_live))
        .route("/api/streams/:id/standby", post(set_standby))
        .route("/api/streams/:id/toggle", post(toggle))
        .route("/api/streams/:id/events", get(stream_events))
        .with_state(manager)
}

/// Runs the HTTP API server on the given address
pub async fn run_http_server(
    manager: Arc<StreamManager>,
    addr: SocketAddr,
) -> Result<(), ServerError> {
    let app = create_api_router(manager);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("http server on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

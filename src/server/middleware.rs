//! Request span and access log for the sync endpoints
//!
//! Every request runs inside an `http_request` span tagged with the sync id
//! it targets, so the engine's own run logs nest under the request that
//! triggered them.

use axum::{extract::Request, middleware::Next, response::Response};
use tokio::time::Instant;
use tracing::{debug, error, field, info, info_span, warn, Instrument};

/// Part of the API a request path targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Health,
    Serialize,
    Events,
    Unknown,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Health => "health",
            RouteKind::Serialize => "serialize",
            RouteKind::Events => "events",
            RouteKind::Unknown => "unknown",
        }
    }
}

/// Split a request path into the route it hits and the sync id it names
pub fn classify_path(path: &str) -> (RouteKind, Option<&str>) {
    let mut segments = path.trim_start_matches('/').split('/');
    let kind = match segments.next() {
        Some("health") => RouteKind::Health,
        Some("serialize") => RouteKind::Serialize,
        Some("events") => RouteKind::Events,
        _ => RouteKind::Unknown,
    };

    let sync_id = match kind {
        RouteKind::Serialize | RouteKind::Events => segments.next().filter(|s| !s.is_empty()),
        RouteKind::Health | RouteKind::Unknown => None,
    };
    (kind, sync_id)
}

/// Wrap the request in a span and log its outcome
///
/// Successful health checks log at debug.
pub async fn request_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let (route, sync_id) = classify_path(&path);

    let span = info_span!(
        "http_request",
        http.method = %method,
        http.route = route.as_str(),
        sync_id = field::Empty,
        http.status_code = field::Empty,
    );
    if let Some(sync_id) = sync_id {
        span.record("sync_id", sync_id);
    }

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;
    span.record("http.status_code", status.as_u16());

    span.in_scope(|| {
        if status.is_server_error() {
            error!(path = %path, status = status.as_u16(), duration_ms, "Request failed");
        } else if status.is_client_error() {
            warn!(path = %path, status = status.as_u16(), duration_ms, "Request rejected");
        } else if route == RouteKind::Health {
            debug!(status = status.as_u16(), duration_ms, "Health check");
        } else {
            info!(path = %path, status = status.as_u16(), duration_ms, "Request completed");
        }
    });

    response
}

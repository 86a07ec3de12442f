//! The `api` module exposes the device registry over HTTP.
//!
//! Routes:
//! - `GET /devices?ids=a,b&state=online&type=t&ref=r`
//! - `GET | PATCH | DELETE /devices/:id` (PATCH replaces the user annotation)
//! - `GET /info`, `GET /health-check`
//!
//! With provisioning enabled, devices can also be written directly:
//! - `PUT /devices/:id` upserts a device
//! - `PUT /refs/:ref/state` sets the liveness of every device under a reference
//!
//! Registry errors map to 400 / 404 / 409 / 500.
//!
//! Every request gets an `x-request-id` (kept when the client sent one) that
//! is echoed on the response and recorded on the request span. Requests are
//! logged at `info` when they complete, except `/health-check`.

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::middleware::map_response;
use axum::response::Response;
use axum::routing::{get, put};
use chrono::{DateTime, Utc};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, info, info_span};

pub use error::ApiError;

use crate::persistence::DeviceStore;
use crate::registry::{Deadline, DeviceRegistry};

/// State shared across handlers.
pub struct AppState<S> {
    pub registry: Arc<DeviceRegistry<S>>,
    /// Deadline applied to every request's registry call.
    pub request_timeout: Duration,
    pub started: DateTime<Utc>,
}

impl<S> AppState<S> {
    pub fn new(registry: Arc<DeviceRegistry<S>>, request_timeout: Duration) -> Self {
        Self {
            registry,
            request_timeout,
            started: Utc::now(),
        }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            request_timeout: self.request_timeout,
            started: self.started,
        }
    }
}

const HEALTH_CHECK_PATH: &str = "/health-check";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the HTTP router.
pub fn router<S: DeviceStore>(state: AppState<S>, provisioning: bool) -> Router {
    let mut table = vec![
        "GET /devices",
        "GET|PATCH|DELETE /devices/:id",
        "GET /info",
        "GET /health-check",
    ];
    let mut device = get(routes::get_device::<S>)
        .patch(routes::update_user_data::<S>)
        .delete(routes::delete_device::<S>);
    if provisioning {
        device = device.put(routes::put_device::<S>);
    }

    let mut app = Router::new()
        .route("/devices", get(routes::list_devices::<S>))
        .route("/devices/:id", device)
        .route("/info", get(routes::service_info::<S>))
        .route(HEALTH_CHECK_PATH, get(routes::health_check::<S>));
    if provisioning {
        app = app.route("/refs/:ref/state", put(routes::put_reference_state::<S>));
        table.extend(["PUT /devices/:id", "PUT /refs/:ref/state"]);
    }
    debug!(routes = ?table, "http routes");

    // the last layer added runs first
    app.layer(map_response(service_headers))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(())
                .on_response(log_response),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

fn request_span(request: &Request<Body>) -> Span {
    let path = request.uri().path();
    if path == HEALTH_CHECK_PATH {
        return Span::none();
    }
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    info_span!("http", method = %request.method(), path, request_id)
}

fn log_response(response: &Response, latency: Duration, span: &Span) {
    if span.is_disabled() {
        return;
    }
    info!(
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "request handled"
    );
}

async fn service_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert("x-service", HeaderValue::from_static(routes::SERVICE_NAME));
    headers.insert("x-api-version", HeaderValue::from_static(routes::SERVICE_VERSION));
    response
}

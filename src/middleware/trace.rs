//! Request tracing middleware.

use std::time::Instant;

use tracing::{Instrument, field, info, info_span};

use super::Next;
use crate::request::Request;
use crate::response::Response;

/// Per-request span with method, path, status and latency.
///
/// Attach it like any other middleware, usually at class scope so it wraps
/// everything else on the route:
///
/// ```rust,ignore
/// def.use_middleware(tsu_controller::middleware::trace);
/// ```
pub async fn trace(req: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        method = %req.method(),
        path = %req.path(),
        status = field::Empty,
        latency_ms = field::Empty,
    );
    let started = Instant::now();

    let res = next.run(req).instrument(span.clone()).await;

    let latency_ms = started.elapsed().as_millis() as u64;
    span.record("status", res.status_code().as_u16());
    span.record("latency_ms", latency_ms);
    info!(parent: &span, status = res.status_code().as_u16(), latency_ms, "request completed");
    res
}

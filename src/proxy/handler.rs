//! Per-request forwarding orchestration.
//!
//! One request runs the pipeline independently of all others:
//! config snapshot → body read (capped) → HeaderPolicy → ProxyTransport
//! under the forwarding deadline → ResponseRewriter → response written.
//! Failures are converted to the gateway error taxonomy here; nothing below
//! this boundary reaches the caller as a raw network error.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{header, Method, Request};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::http::server::{AppState, Inner};
use crate::proxy::error::{GatewayError, GatewayResult};
use crate::proxy::policy;
use crate::proxy::transport::UpstreamResponse;

/// Main forwarding handler, mounted under the wildcard route.
pub async fn forward(State(state): State<AppState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let inner = state.inner.load_full();
    state.requests.fetch_add(1, Ordering::Relaxed);

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        target = %inner.config.target.hostname,
        "Forwarding request"
    );

    match forward_inner(&inner, &method, &path_and_query, request).await {
        Ok(response) => {
            tracing::info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                target = %inner.config.target.hostname,
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request forwarded"
            );
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                target = %inner.config.target.hostname,
                kind = e.kind(),
                error = %e,
                "Forwarding failed"
            );
            error_response(&e)
        }
    }
}

async fn forward_inner(
    inner: &Inner,
    method: &Method,
    path_and_query: &str,
    request: Request<Body>,
) -> GatewayResult<Response> {
    let config = &inner.config;
    let (parts, body) = request.into_parts();

    // The body is read to completion before any upstream dispatch, bounded
    // by the configured cap.
    let limit = config.forwarding.max_body_bytes;
    if let Some(declared) = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > limit {
            return Err(GatewayError::RequestTooLarge { limit });
        }
    }
    let body = to_bytes(body, limit)
        .await
        .map_err(|_| GatewayError::RequestTooLarge { limit })?;

    let outbound = policy::outbound_request_headers(
        &parts.headers,
        &config.target,
        config.forwarding.header_mode,
    )?;

    // One deadline bounds connect + request + full response drain.
    let deadline = Duration::from_secs(config.timeouts.forward_secs);
    let exchange = async {
        let mut channel = inner.transport.connect(&config.target).await?;
        inner
            .transport
            .send(&mut channel, method, path_and_query, &outbound, &body)
            .await
    };
    let upstream: UpstreamResponse = tokio::time::timeout(deadline, exchange)
        .await
        .map_err(|_| GatewayError::Timeout(deadline))??;

    let public_origin = config.forwarding.public_origin.clone().or_else(|| {
        parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(|host| format!("http://{host}"))
    });
    let headers = policy::outbound_response_headers(
        &upstream.headers,
        &config.target,
        public_origin.as_deref(),
    );

    let mut response = Response::new(Body::from(upstream.body));
    *response.status_mut() = upstream.status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Structured JSON error body; no response bytes have been flushed at this
/// point, so the status line is still ours to choose.
fn error_response(error: &GatewayError) -> Response {
    let status = error.status();
    let body = serde_json::json!({
        "status": status.as_u16(),
        "error": error.kind(),
        "message": error.to_string(),
    });
    (status, Json(body)).into_response()
}

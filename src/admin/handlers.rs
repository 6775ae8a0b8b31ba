use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::config::loader::save_config;
use crate::config::validation::validate_config;
use crate::config::GatewayConfig;
use crate::http::server::{AppState, Inner};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub requests_forwarded: usize,
    pub target: TargetStatus,
    pub upstream_proxy: UpstreamStatus,
}

#[derive(Serialize)]
pub struct TargetStatus {
    pub scheme: &'static str,
    pub hostname: String,
}

/// Proxy identity only; credentials never appear on this surface.
#[derive(Serialize)]
pub struct UpstreamStatus {
    pub host: String,
    pub port: u16,
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthStatus> {
    let inner = state.inner.load_full();

    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        requests_forwarded: state.requests.load(Ordering::Relaxed),
        target: TargetStatus {
            scheme: inner.config.target.scheme.as_str(),
            hostname: inner.config.target.hostname.clone(),
        },
        upstream_proxy: UpstreamStatus {
            host: inner.config.upstream_proxy.host.clone(),
            port: inner.config.upstream_proxy.port,
        },
    })
}

pub async fn get_config(State(state): State<AppState>) -> Json<GatewayConfig> {
    Json(state.inner.load().config.redacted())
}

/// Replace the configuration wholesale: validate, persist, swap the
/// snapshot. In-flight requests finish on the snapshot they started with.
pub async fn put_config(
    State(state): State<AppState>,
    Json(new_config): Json<GatewayConfig>,
) -> Result<Json<GatewayConfig>, (StatusCode, Json<serde_json::Value>)> {
    if let Err(errors) = validate_config(&new_config) {
        let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "status": 422,
                "error": "configuration_invalid",
                "message": "configuration rejected by validation",
                "details": details,
            })),
        ));
    }

    if let Err(e) = save_config(&state.config_path, &new_config) {
        tracing::error!(error = %e, path = ?state.config_path, "Failed to persist configuration");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": 500,
                "error": "internal",
                "message": format!("could not persist configuration: {e}"),
            })),
        ));
    }

    tracing::info!(
        target = %new_config.target.origin(),
        proxy = %format!("{}:{}", new_config.upstream_proxy.host, new_config.upstream_proxy.port),
        "Configuration replaced via admin surface"
    );
    let redacted = new_config.redacted();
    state.inner.store(Arc::new(Inner::new(new_config)));

    Ok(Json(redacted))
}

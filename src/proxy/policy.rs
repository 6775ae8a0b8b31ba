//! Header policy for both directions of the relay.
//!
//! One declarative table drives what is stripped on the way to the backend
//! and on the way back to the caller, so the two sides stay symmetric and
//! independently testable.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::{HeaderMode, Target};
use crate::proxy::error::{GatewayError, GatewayResult};

/// Headers that must never reach the backend: hop-by-hop and proxy-control
/// headers that would leak the existence of the gateway or the proxy chain.
const REQUEST_STRIP: &[&str] = &[
    "host",
    "connection",
    "proxy-connection",
    "proxy-authorization",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-forwarded-host",
];

/// Headers not safe to replay to the caller: the gateway re-frames the body
/// itself, and `Connection` is hop-by-hop.
const RESPONSE_STRIP: &[&str] = &["transfer-encoding", "connection"];

/// Semantically important caller headers that pass-through mode relays
/// verbatim when present.
pub const PASS_THROUGH_ALLOWED: &[&str] = &[
    "cookie",
    "referer",
    "content-type",
    "content-length",
    "authorization",
];

/// Fixed identity presented in spoofed-identity mode, regardless of what the
/// caller sent.
pub const SPOOFED_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

const SPOOFED_IDENTITY: &[(&str, &str)] = &[
    ("user-agent", SPOOFED_USER_AGENT),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("accept-encoding", "gzip, deflate"),
];

fn is_request_stripped(name: &HeaderName) -> bool {
    REQUEST_STRIP.contains(&name.as_str())
}

fn is_response_stripped(name: &HeaderName) -> bool {
    RESPONSE_STRIP.contains(&name.as_str())
}

/// Compute the header set sent to the backend.
///
/// The inbound map is never mutated; the result is a fresh request-scoped
/// set.
pub fn outbound_request_headers(
    inbound: &HeaderMap,
    target: &Target,
    mode: HeaderMode,
) -> GatewayResult<HeaderMap> {
    let mut out = HeaderMap::new();

    match mode {
        HeaderMode::PassThrough => {
            for (name, value) in inbound.iter() {
                if is_request_stripped(name) {
                    continue;
                }
                out.append(name.clone(), value.clone());
            }
        }
        HeaderMode::SpoofedIdentity => {
            for &(name, value) in SPOOFED_IDENTITY {
                out.insert(
                    HeaderName::from_static(name),
                    HeaderValue::from_static(value),
                );
            }
            // Bodies must stay interpretable even under a spoofed identity.
            if let Some(content_type) = inbound.get(header::CONTENT_TYPE) {
                out.insert(header::CONTENT_TYPE, content_type.clone());
            }
        }
    }

    let host = HeaderValue::from_str(&target.hostname)
        .map_err(|_| GatewayError::Internal(format!("invalid target hostname: {:?}", target.hostname)))?;
    out.insert(header::HOST, host);
    out.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

    Ok(out)
}

/// Compute the header set answered to the caller.
///
/// All backend headers are copied (duplicates preserved in order) except the
/// response strip table, and a `Location` pointing at the backend origin is
/// rewritten to the gateway's public origin.
pub fn outbound_response_headers(
    upstream: &HeaderMap,
    target: &Target,
    public_origin: Option<&str>,
) -> HeaderMap {
    let backend_origin = target.origin();
    let mut out = HeaderMap::new();

    for (name, value) in upstream.iter() {
        if is_response_stripped(name) {
            continue;
        }
        if *name == header::LOCATION {
            if let Some(rewritten) = rewrite_location(value, &backend_origin, public_origin) {
                out.append(header::LOCATION, rewritten);
                continue;
            }
        }
        out.append(name.clone(), value.clone());
    }

    out
}

/// Literal prefix replacement of the backend origin; anything else (including
/// third-party absolute redirects) is left untouched.
fn rewrite_location(
    value: &HeaderValue,
    backend_origin: &str,
    public_origin: Option<&str>,
) -> Option<HeaderValue> {
    let public_origin = public_origin?;
    let location = value.to_str().ok()?;
    let rest = location.strip_prefix(backend_origin)?;
    HeaderValue::from_str(&format!("{}{}", public_origin.trim_end_matches('/'), rest)).ok()
}

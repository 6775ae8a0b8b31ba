//! Observability subsystem.
//!
//! Structured logging via `tracing`; every forwarded request is logged with
//! method, path, target, status and elapsed time, and every failure with its
//! error kind. The request ID set by the middleware flows through all log
//! events of a request.

pub mod logging;

//! Access records emitted by controllers, and the log functions that consume them.

use crate::context::Context;
use crate::request::Method;
use crate::status::StatusCode;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Byte count reported when the size of a result is unknown.
pub const UNKNOWN_BYTES: i64 = -1;

/// Flag set when the rate limiter denied the call.
pub const RATE_LIMITED_FLAG: &str = "RL";
/// Flag set when the timeout fired.
pub const TIMEOUT_FLAG: &str = "TO";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Ingress => "ingress",
            Direction::Egress => "egress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub uri: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub code: StatusCode,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccessRecord {
    pub direction: Direction,
    pub start: DateTime<Utc>,
    pub elapsed: Duration,
    pub request: RequestDescriptor,
    pub response: ResponseDescriptor,
    pub bytes: i64,
    pub flags: String,
}

pub type AccessLogFn = Arc<dyn Fn(&AccessRecord) + Send + Sync>;

/// Controller-supplied function wins; otherwise the context's; otherwise none.
pub fn resolve_access_fn<'a>(
    ctx: &'a Context,
    controller_fn: Option<&'a AccessLogFn>,
) -> Option<&'a AccessLogFn> {
    controller_fn.or_else(|| ctx.access_log())
}

/// Log function writing each record as a structured tracing event.
pub fn tracing_access_log() -> AccessLogFn {
    Arc::new(|r: &AccessRecord| {
        tracing::info!(
            target: "pgsql_shim::access",
            traffic = %r.direction,
            start = %r.start.to_rfc3339(),
            duration_ms = r.elapsed.as_millis() as u64,
            method = %r.request.method,
            uri = %r.request.uri,
            status = r.response.code.http_status(),
            code = %r.response.code,
            bytes = r.bytes,
            flags = %r.flags,
            "access"
        );
    })
}

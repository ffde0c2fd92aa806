//! Resiliency controllers: rate-limit admission, timeout, latency measurement and access logging
//! around the query and exec operations.

use crate::access::{
    resolve_access_fn, AccessLogFn, AccessRecord, Direction, RequestDescriptor, ResponseDescriptor,
    RATE_LIMITED_FLAG, TIMEOUT_FLAG, UNKNOWN_BYTES,
};
use crate::client::ClientHandle;
use crate::config::Threshold;
use crate::context::Context;
use crate::cursor::{CommandTag, RowCursor};
use crate::error::SqlError;
use crate::ops::{self, EXEC_LOC, QUERY_LOC};
use crate::request::Request;
use crate::status::Status;
use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Token source built from a `Threshold`.
#[derive(Clone)]
enum Admission {
    /// Infinite limit: every call is admitted.
    Open,
    /// Negative or NaN limit, or zero burst: every call is denied.
    Closed,
    /// Zero limit: the initial burst is admitted and never refilled.
    Budget(Arc<AtomicU32>),
    Limited(Arc<DefaultDirectRateLimiter>),
}

impl Admission {
    fn from_threshold(t: &Threshold) -> Self {
        if t.limit == f64::INFINITY {
            return Admission::Open;
        }
        let Some(burst) = NonZeroU32::new(t.burst) else {
            return Admission::Closed;
        };
        if t.limit == 0.0 {
            return Admission::Budget(Arc::new(AtomicU32::new(burst.get())));
        }
        // NaN and negative limits admit nothing.
        if !(t.limit > 0.0) {
            return Admission::Closed;
        }
        let Ok(period) = Duration::try_from_secs_f64(1.0 / t.limit) else {
            return Admission::Closed;
        };
        match Quota::with_period(period) {
            Some(quota) => Admission::Limited(Arc::new(RateLimiter::direct(quota.allow_burst(burst)))),
            // Sub-nanosecond period: faster than anything can ask.
            None => Admission::Open,
        }
    }

    fn admit(&self) -> bool {
        match self {
            Admission::Open => true,
            Admission::Closed => false,
            Admission::Budget(left) => left
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok(),
            Admission::Limited(limiter) => limiter.check().is_ok(),
        }
    }
}

/// Configuration and limiter shared by both controller kinds. Clones share the limiter.
#[derive(Clone)]
struct Policy {
    name: Arc<str>,
    threshold: Threshold,
    log_fn: Option<AccessLogFn>,
    admission: Admission,
    client: ClientHandle,
}

impl Policy {
    fn new(name: &str, threshold: Threshold, log_fn: Option<AccessLogFn>) -> Self {
        Policy {
            name: Arc::from(name),
            admission: Admission::from_threshold(&threshold),
            threshold,
            log_fn,
            client: ClientHandle::empty(),
        }
    }

    /// Admit, bound and log `call`. `call` is not polled when admission is denied.
    async fn apply<T, F>(
        &self,
        ctx: &Context,
        req: &Request,
        location: &'static str,
        call: F,
        zero: impl FnOnce() -> T,
    ) -> (T, Status)
    where
        F: Future<Output = (T, Status)>,
    {
        let start = Utc::now();
        let started = Instant::now();
        let mut flags = "";

        let (result, status) = if !self.admission.admit() {
            flags = RATE_LIMITED_FLAG;
            tracing::warn!(controller = %self.name, uri = %req.uri(), "rate limit denied call");
            let status = Status::from_cause(location, SqlError::RateLimited(self.name.to_string()))
                .with_request_id(ctx);
            (zero(), status)
        } else if self.threshold.timeout.is_zero() {
            call.await
        } else {
            match tokio::time::timeout(self.threshold.timeout, call).await {
                Ok(out) => out,
                Err(_) => {
                    flags = TIMEOUT_FLAG;
                    tracing::warn!(
                        controller = %self.name,
                        uri = %req.uri(),
                        timeout_ms = self.threshold.timeout.as_millis() as u64,
                        "call timed out"
                    );
                    let status = Status::from_cause(location, SqlError::Timeout(self.threshold.timeout))
                        .with_request_id(ctx);
                    (zero(), status)
                }
            }
        };

        if let Some(log) = resolve_access_fn(ctx, self.log_fn.as_ref()) {
            log(&AccessRecord {
                direction: Direction::Egress,
                start,
                elapsed: started.elapsed(),
                request: RequestDescriptor {
                    method: req.method(),
                    uri: req.uri().to_string(),
                },
                response: ResponseDescriptor {
                    code: status.code(),
                },
                bytes: UNKNOWN_BYTES,
                flags: flags.to_string(),
            });
        }
        (result, status)
    }
}

/// Governs `query` calls.
#[derive(Clone)]
pub struct QueryController {
    inner: Policy,
}

impl QueryController {
    pub fn new(name: &str, threshold: Threshold, log_fn: Option<AccessLogFn>) -> Self {
        QueryController {
            inner: Policy::new(name, threshold, log_fn),
        }
    }

    pub fn with_client(mut self, client: ClientHandle) -> Self {
        self.inner.client = client;
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn threshold(&self) -> &Threshold {
        &self.inner.threshold
    }

    pub async fn apply(&self, ctx: &Context, req: &Request) -> (Option<Box<dyn RowCursor>>, Status) {
        let call = ops::query(ctx, &self.inner.client, req);
        self.inner.apply(ctx, req, QUERY_LOC, call, || None).await
    }
}

/// Governs `exec` calls.
#[derive(Clone)]
pub struct ExecController {
    inner: Policy,
}

impl ExecController {
    pub fn new(name: &str, threshold: Threshold, log_fn: Option<AccessLogFn>) -> Self {
        ExecController {
            inner: Policy::new(name, threshold, log_fn),
        }
    }

    pub fn with_client(mut self, client: ClientHandle) -> Self {
        self.inner.client = client;
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn threshold(&self) -> &Threshold {
        &self.inner.threshold
    }

    pub async fn apply(&self, ctx: &Context, req: &Request) -> (CommandTag, Status) {
        let call = ops::exec(ctx, &self.inner.client, req);
        self.inner.apply(ctx, req, EXEC_LOC, call, CommandTag::default).await
    }
}

//! Caller context: correlation id, access-log function, backend override, cancellation and deadline.
//!
//! Derived contexts (`with_*`) inherit every value of their parent. Overrides attached to a derived
//! context are invisible to the parent and to unrelated contexts.

use crate::access::AccessLogFn;
use crate::backend::Backend;
use crate::cursor::{CommandTag, RowCursor};
use crate::error::SqlError;
use crate::request::Request;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub type QueryProxyFn = Arc<dyn Fn(&Request) -> Result<Box<dyn RowCursor>, SqlError> + Send + Sync>;
pub type ExecProxyFn = Arc<dyn Fn(&Request) -> Result<CommandTag, SqlError> + Send + Sync>;

/// Stand-in for the real database call, attached to a context.
#[derive(Clone)]
pub enum Proxy {
    /// Replaces query calls only; exec calls still reach the real client.
    Query(QueryProxyFn),
    /// Replaces exec calls only; query calls still reach the real client.
    Exec(ExecProxyFn),
    /// Replaces the whole backend.
    Backend(Arc<dyn Backend>),
}

#[derive(Clone)]
pub struct Context {
    request_id: Option<Arc<str>>,
    access_log: Option<AccessLogFn>,
    proxy: Option<Proxy>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for Context {
    fn default() -> Self {
        Context::background()
    }
}

impl Context {
    /// Empty context: no values, never cancelled, no deadline.
    pub fn background() -> Self {
        Context {
            request_id: None,
            access_log: None,
            proxy: None,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_request_id(&self, id: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.request_id = Some(Arc::from(id.into()));
        ctx
    }

    /// Attach a fresh v4 uuid as the correlation id unless one is already present.
    pub fn with_new_request_id(&self) -> Self {
        if self.request_id.is_some() {
            return self.clone();
        }
        self.with_request_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_access_log(&self, log_fn: AccessLogFn) -> Self {
        let mut ctx = self.clone();
        ctx.access_log = Some(log_fn);
        ctx
    }

    /// Attach a query-shaped stand-in, replacing any override already present.
    pub fn with_query_proxy<F>(&self, f: F) -> Self
    where
        F: Fn(&Request) -> Result<Box<dyn RowCursor>, SqlError> + Send + Sync + 'static,
    {
        self.with_proxy(Proxy::Query(Arc::new(f)))
    }

    /// Attach an exec-shaped stand-in, replacing any override already present.
    pub fn with_exec_proxy<F>(&self, f: F) -> Self
    where
        F: Fn(&Request) -> Result<CommandTag, SqlError> + Send + Sync + 'static,
    {
        self.with_proxy(Proxy::Exec(Arc::new(f)))
    }

    pub fn with_backend(&self, backend: Arc<dyn Backend>) -> Self {
        self.with_proxy(Proxy::Backend(backend))
    }

    pub fn with_proxy(&self, proxy: Proxy) -> Self {
        let mut ctx = self.clone();
        ctx.proxy = Some(proxy);
        ctx
    }

    /// Derived context with its own cancellation: cancelling it leaves the parent running, while
    /// cancelling the parent cancels it.
    pub fn with_cancel(&self) -> Self {
        let mut ctx = self.clone();
        ctx.cancel = self.cancel.child_token();
        ctx
    }

    /// Bound the context by `timeout` from now; an earlier existing deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let mut ctx = self.clone();
        ctx.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        ctx
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn access_log(&self) -> Option<&AccessLogFn> {
        self.access_log.as_ref()
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Error describing why the context is finished, if it is.
    pub fn err(&self) -> Option<SqlError> {
        if self.cancel.is_cancelled() {
            return Some(SqlError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(SqlError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> SqlError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => SqlError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => SqlError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                SqlError::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first. A context that is already finished never
    /// polls `fut`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, SqlError>
    where
        F: Future<Output = Result<T, SqlError>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => out,
        }
    }
}

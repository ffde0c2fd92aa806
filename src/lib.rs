//! pgsql-shim: resiliency and observability layer over a PostgreSQL client.
//!
//! Queries and execs return a uniform [`Status`] instead of driver errors, run under a controller's
//! rate/timeout policy, emit access records, and can be redirected to a stand-in backend attached
//! to the caller's [`Context`].

pub mod access;
pub mod backend;
pub mod bind;
pub mod client;
pub mod config;
pub mod context;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod lifecycle;
pub mod ops;
pub mod request;
pub mod status;

pub use access::{tracing_access_log, AccessLogFn, AccessRecord, Direction};
pub use backend::{Backend, PgBackend, PoolStat};
pub use client::{install, shutdown, startup, ClientHandle};
pub use config::{ClientConfig, Threshold};
pub use context::{Context, Proxy};
pub use controller::{ExecController, QueryController};
pub use cursor::{require_rows, scan_rows, CommandTag, Row, RowCursor, VecCursor};
pub use error::SqlError;
pub use lifecycle::Lifecycle;
pub use ops::{exec, ping, query, stat};
pub use request::{
    build_delete_uri, build_insert_uri, build_query_uri, build_update_uri, Attr, Method, Request,
};
pub use status::{Status, StatusCode};

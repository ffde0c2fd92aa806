//! Top-level operations: check readiness, resolve the backend call, normalize into a `Status`.

use crate::backend::{call_exec, call_query, PoolStat};
use crate::client::ClientHandle;
use crate::context::{Context, Proxy};
use crate::cursor::{CommandTag, RowCursor};
use crate::error::SqlError;
use crate::request::Request;
use crate::status::Status;

pub const QUERY_LOC: &str = "query";
pub const EXEC_LOC: &str = "exec";
pub const PING_LOC: &str = "ping";
pub const STAT_LOC: &str = "stat";

fn failure(ctx: &Context, location: &'static str, uri: &str, err: SqlError) -> Status {
    tracing::warn!(location, uri, request_id = ctx.request_id(), error = %err, "pgsql call failed");
    Status::from_cause(location, err).with_request_id(ctx)
}

fn check_sql(req: &Request) -> Result<(), SqlError> {
    if req.sql().trim().is_empty() {
        return Err(SqlError::InvalidRequest(format!("sql is empty for {}", req.uri())));
    }
    Ok(())
}

/// Run a query. The cursor is `Some` exactly when the status is `Ok`.
pub async fn query(
    ctx: &Context,
    client: &ClientHandle,
    req: &Request,
) -> (Option<Box<dyn RowCursor>>, Status) {
    if let Err(e) = check_sql(req) {
        return (None, failure(ctx, QUERY_LOC, req.uri(), e));
    }
    match ctx.run(call_query(ctx, client, req)).await {
        Ok(cursor) => (Some(cursor), Status::ok()),
        Err(e) => (None, failure(ctx, QUERY_LOC, req.uri(), e)),
    }
}

/// Run an insert/update/delete. A failed call returns the zero `CommandTag`.
pub async fn exec(ctx: &Context, client: &ClientHandle, req: &Request) -> (CommandTag, Status) {
    if let Err(e) = check_sql(req) {
        return (CommandTag::default(), failure(ctx, EXEC_LOC, req.uri(), e));
    }
    match ctx.run(call_exec(ctx, client, req)).await {
        Ok(tag) => (tag, Status::ok()),
        Err(e) => (CommandTag::default(), failure(ctx, EXEC_LOC, req.uri(), e)),
    }
}

/// Round trip to the database. A context holding a full backend override pings that instead.
pub async fn ping(ctx: &Context, client: &ClientHandle) -> Status {
    let backend = match ctx.proxy() {
        Some(Proxy::Backend(b)) => Some(b.clone()),
        _ => client.backend(),
    };
    let Some(backend) = backend else {
        return failure(ctx, PING_LOC, "", SqlError::ClientUnavailable);
    };
    match ctx.run(backend.ping()).await {
        Ok(()) => Status::ok(),
        Err(e) => failure(ctx, PING_LOC, "", e),
    }
}

/// Pool counters of the shared client.
pub fn stat(client: &ClientHandle) -> (Option<PoolStat>, Status) {
    match client.backend() {
        Some(backend) => (backend.stat(), Status::ok()),
        None => (None, Status::from_cause(STAT_LOC, SqlError::ClientUnavailable)),
    }
}

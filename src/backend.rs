//! The database capability the operations depend on, its PostgreSQL implementation, and the
//! per-call resolution between a context override and the shared client.

use crate::bind::PgBindValue;
use crate::client::ClientHandle;
use crate::context::{Context, Proxy};
use crate::cursor::{CommandTag, Row, RowCursor};
use crate::error::SqlError;
use crate::request::{Method, Request};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio_util::task::AbortOnDropHandle;

/// Rows buffered ahead of the reader by the production cursor.
const CURSOR_BUFFER: usize = 64;

/// Connection pool counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStat {
    pub size: u32,
    pub idle: usize,
    pub closed: bool,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn query(&self, req: &Request) -> Result<Box<dyn RowCursor>, SqlError>;

    async fn exec(&self, req: &Request) -> Result<CommandTag, SqlError>;

    async fn ping(&self) -> Result<(), SqlError> {
        Ok(())
    }

    fn stat(&self) -> Option<PoolStat> {
        None
    }

    /// Release underlying resources. Called once by shutdown.
    async fn close(&self) {}
}

/// Query through the context's override when it has a query-capable one, else the shared client.
pub(crate) async fn call_query(
    ctx: &Context,
    client: &ClientHandle,
    req: &Request,
) -> Result<Box<dyn RowCursor>, SqlError> {
    match ctx.proxy() {
        Some(Proxy::Query(f)) => return f(req),
        Some(Proxy::Backend(b)) => return b.query(req).await,
        _ => {}
    }
    let backend = client.backend().ok_or(SqlError::ClientUnavailable)?;
    backend.query(req).await
}

/// Exec through the context's override when it has an exec-capable one, else the shared client.
pub(crate) async fn call_exec(
    ctx: &Context,
    client: &ClientHandle,
    req: &Request,
) -> Result<CommandTag, SqlError> {
    match ctx.proxy() {
        Some(Proxy::Exec(f)) => return f(req),
        Some(Proxy::Backend(b)) => return b.exec(req).await,
        _ => {}
    }
    let backend = client.backend().ok_or(SqlError::ClientUnavailable)?;
    backend.exec(req).await
}

/// `Backend` over a sqlx PostgreSQL pool.
#[derive(Clone, Debug)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        PgBackend { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn query(&self, req: &Request) -> Result<Box<dyn RowCursor>, SqlError> {
        tracing::debug!(uri = %req.uri(), sql = %req.sql(), params = ?req.args(), "query");
        let pool = self.pool.clone();
        let sql = req.sql().to_string();
        let args: Vec<PgBindValue> = req.args().iter().map(PgBindValue::from_json).collect();
        let (tx, mut rx) = mpsc::channel(CURSOR_BUFFER);
        // Dropping this future (deadline, cancellation, controller timeout) must stop the fetch
        // and release its connection, so the handle aborts on drop from here on.
        let task = AbortOnDropHandle::new(tokio::spawn(async move {
            let mut query = sqlx::query(&sql);
            for a in args {
                query = query.bind(a);
            }
            let mut rows = query.fetch(&pool);
            while let Some(item) = rows.next().await {
                let failed = item.is_err();
                let item = item.map(|r| decode_row(&r)).map_err(SqlError::from);
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        }));

        // The driver reports statement errors before the first row; surface them as the
        // query's own failure rather than from the cursor.
        let first = rx.recv().await;
        let pending = match first {
            Some(Err(e)) => return Err(e),
            Some(Ok(row)) => Some(row),
            None => None,
        };
        let exhausted = pending.is_none();
        Ok(Box::new(PgCursor {
            pending,
            rx,
            task,
            read: 0,
            exhausted,
        }))
    }

    async fn exec(&self, req: &Request) -> Result<CommandTag, SqlError> {
        tracing::debug!(uri = %req.uri(), sql = %req.sql(), params = ?req.args(), "exec");
        let mut query = sqlx::query(req.sql());
        for p in req.args() {
            query = query.bind(PgBindValue::from_json(p));
        }
        let result = query.execute(&self.pool).await?;
        Ok(CommandTag::for_method(req.method(), result.rows_affected()))
    }

    async fn ping(&self) -> Result<(), SqlError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn stat(&self) -> Option<PoolStat> {
        Some(PoolStat {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            closed: self.pool.is_closed(),
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Cursor fed by a task streaming rows from the driver. Dropping or closing it stops the task.
struct PgCursor {
    pending: Option<Row>,
    rx: mpsc::Receiver<Result<Row, SqlError>>,
    task: AbortOnDropHandle<()>,
    read: u64,
    exhausted: bool,
}

#[async_trait]
impl RowCursor for PgCursor {
    async fn next(&mut self) -> Option<Result<Row, SqlError>> {
        if let Some(row) = self.pending.take() {
            self.read += 1;
            return Some(Ok(row));
        }
        if self.exhausted {
            return None;
        }
        match self.rx.recv().await {
            Some(Ok(row)) => {
                self.read += 1;
                Some(Ok(row))
            }
            Some(Err(e)) => {
                self.exhausted = true;
                Some(Err(e))
            }
            None => {
                self.exhausted = true;
                None
            }
        }
    }

    fn command_tag(&self) -> CommandTag {
        CommandTag::for_method(Method::Select, self.read)
    }

    fn close(&mut self) {
        self.exhausted = true;
        self.pending = None;
        self.rx.close();
        self.task.abort();
    }
}

fn decode_row(row: &PgRow) -> Row {
    use sqlx::{Column, TypeInfo};
    use sqlx::Row as _;
    let (columns, values) = row
        .columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.ordinal(), col.type_info().name())))
        .unzip();
    Row::new(columns, values)
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Decode one cell by its column type. NULLs and types without a JSON rendering become `null`.
fn cell_to_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    use sqlx::Row as _;
    let cell = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(|v| v.map(|n| number(n as f64))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| v.map(number)),
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Value::Bool)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx),
        _ => row.try_get::<Option<String>, _>(idx).map(|v| v.map(Value::String)),
    };
    match cell {
        Ok(Some(v)) => v,
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::debug!(column = idx, type_name, error = %e, "cell not decodable, using null");
            Value::Null
        }
    }
}

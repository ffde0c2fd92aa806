//! Forward-only row cursors, decoded rows, and command tags.

use crate::error::SqlError;
use crate::request::Method;
use crate::status::{Status, StatusCode};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;

const SCAN_LOC: &str = "scan";

/// One result row: column names in select order and their decoded values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Extra values or columns beyond the shorter of the two are dropped.
    pub fn new(columns: Vec<String>, mut values: Vec<Value>) -> Self {
        let mut columns = columns;
        let n = columns.len().min(values.len());
        columns.truncate(n);
        values.truncate(n);
        Row { columns, values }
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Row { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    pub fn to_json(&self) -> Value {
        let map: serde_json::Map<String, Value> = self
            .columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect();
        Value::Object(map)
    }

    /// Deserialize the row (as a JSON object keyed by column name) into `T`.
    pub fn scan<T: DeserializeOwned>(&self) -> Result<T, SqlError> {
        serde_json::from_value(self.to_json()).map_err(|e| SqlError::Decode(e.to_string()))
    }
}

/// Summary of an exec call: rows affected and which verb ran.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommandTag {
    pub rows_affected: u64,
    pub insert: bool,
    pub update: bool,
    pub delete: bool,
    pub select: bool,
}

impl CommandTag {
    pub fn for_method(method: Method, rows_affected: u64) -> Self {
        CommandTag {
            rows_affected,
            insert: method == Method::Insert,
            update: method == Method::Update,
            delete: method == Method::Delete,
            select: method == Method::Select,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == CommandTag::default()
    }
}

/// Renders the PostgreSQL command tag form (`INSERT 0 1`, `UPDATE 3`); empty for the zero value.
impl fmt::Display for CommandTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.insert {
            write!(f, "INSERT 0 {}", self.rows_affected)
        } else if self.update {
            write!(f, "UPDATE {}", self.rows_affected)
        } else if self.delete {
            write!(f, "DELETE {}", self.rows_affected)
        } else if self.select {
            write!(f, "SELECT {}", self.rows_affected)
        } else {
            Ok(())
        }
    }
}

/// Lazy, forward-only, non-restartable sequence of rows.
#[async_trait]
pub trait RowCursor: Send {
    /// Next row; `None` once exhausted or closed. An error ends the sequence.
    async fn next(&mut self) -> Option<Result<Row, SqlError>>;

    /// Tag describing what was read so far.
    fn command_tag(&self) -> CommandTag {
        CommandTag::default()
    }

    /// Stop reading; further `next` calls return `None`.
    fn close(&mut self) {}
}

/// In-memory cursor, for stand-in backends and proxies.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: VecDeque<Result<Row, SqlError>>,
    read: u64,
    closed: bool,
}

impl VecCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        VecCursor {
            rows: rows.into_iter().map(Ok).collect(),
            read: 0,
            closed: false,
        }
    }

    /// Rows followed by a failure, as a driver reports a mid-stream error.
    pub fn with_error(rows: Vec<Row>, err: SqlError) -> Self {
        let mut c = VecCursor::new(rows);
        c.rows.push_back(Err(err));
        c
    }

    pub fn boxed(self) -> Box<dyn RowCursor> {
        Box::new(self)
    }
}

#[async_trait]
impl RowCursor for VecCursor {
    async fn next(&mut self) -> Option<Result<Row, SqlError>> {
        if self.closed {
            return None;
        }
        match self.rows.pop_front() {
            Some(Ok(row)) => {
                self.read += 1;
                Some(Ok(row))
            }
            Some(Err(e)) => {
                self.closed = true;
                Some(Err(e))
            }
            None => None,
        }
    }

    fn command_tag(&self) -> CommandTag {
        CommandTag::for_method(Method::Select, self.read)
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }
}

/// Drain `cursor`, decoding each row into `T`. A missing cursor is `InvalidArgument`; a driver or
/// decode failure is `Internal` and discards what was read.
pub async fn scan_rows<T: DeserializeOwned>(cursor: Option<Box<dyn RowCursor>>) -> (Vec<T>, Status) {
    let Some(mut cursor) = cursor else {
        return (
            Vec::new(),
            Status::error(
                StatusCode::InvalidArgument,
                SCAN_LOC,
                SqlError::InvalidRequest("row cursor is empty".into()),
            ),
        );
    };
    let mut out = Vec::new();
    while let Some(next) = cursor.next().await {
        let decoded = next.and_then(|row| row.scan::<T>());
        match decoded {
            Ok(v) => out.push(v),
            Err(e) => {
                cursor.close();
                return (Vec::new(), Status::error(StatusCode::Internal, SCAN_LOC, e));
            }
        }
    }
    (out, Status::ok())
}

/// Consumer convention: an `Ok` scan that produced no rows becomes `NotFound`.
pub fn require_rows<T>(rows: Vec<T>, status: Status) -> (Vec<T>, Status) {
    if status.is_ok() && rows.is_empty() {
        return (rows, Status::not_found(SCAN_LOC));
    }
    (rows, status)
}

// Stand-in backends and log sinks shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use pgsql_shim::{AccessLogFn, AccessRecord, Backend, CommandTag, Request, Row, RowCursor, SqlError, VecCursor};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend that counts calls, optionally sleeps, and answers from fixed data.
#[derive(Default)]
pub struct RecordingBackend {
    pub queries: AtomicUsize,
    pub execs: AtomicUsize,
    pub delay: Option<Duration>,
    pub rows: Vec<Row>,
}

impl RecordingBackend {
    pub fn with_rows(rows: Vec<Row>) -> Self {
        RecordingBackend {
            rows,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        RecordingBackend {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst) + self.execs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn query(&self, _req: &Request) -> Result<Box<dyn RowCursor>, SqlError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(VecCursor::new(self.rows.clone()).boxed())
    }

    async fn exec(&self, req: &Request) -> Result<CommandTag, SqlError> {
        self.execs.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(CommandTag::for_method(req.method(), 1))
    }
}

pub fn condition(location: &str, temperature: f64) -> Row {
    Row::from_pairs([
        ("time", json!("2023-01-26T12:09:12.426535")),
        ("location", json!(location)),
        ("temperature", json!(temperature)),
    ])
}

pub fn three_conditions() -> Vec<Row> {
    vec![
        condition("office", 70.0),
        condition("basement", 66.5),
        condition("garage", 45.1234),
    ]
}

/// Log function collecting records for assertions.
pub fn recorder() -> (AccessLogFn, Arc<Mutex<Vec<AccessRecord>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let f: AccessLogFn = Arc::new(move |r: &AccessRecord| sink.lock().unwrap().push(r.clone()));
    (f, seen)
}

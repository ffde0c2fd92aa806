mod common;

use common::{three_conditions, RecordingBackend};
use pgsql_shim::{
    build_query_uri, query, scan_rows, ClientHandle, Context, Request, SqlError, StatusCode, VecCursor,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const QUERY_ERROR_RSC: &str = "error";
const QUERY_ROWS_RSC: &str = "rows";

#[derive(Debug, Deserialize, PartialEq)]
struct Condition {
    location: String,
    temperature: f64,
}

fn proxy_ctx() -> Context {
    Context::background().with_query_proxy(|req| {
        if req.uri() == build_query_uri(QUERY_ERROR_RSC) {
            return Err(SqlError::backend("pgsql query error"));
        }
        if req.uri() == build_query_uri(QUERY_ROWS_RSC) {
            return Ok(VecCursor::new(three_conditions()).boxed());
        }
        Ok(VecCursor::default().boxed())
    })
}

#[tokio::test]
async fn proxy_error_is_internal_with_no_cursor() {
    let req = Request::query(QUERY_ERROR_RSC, "select * from test", vec![]);
    let (cursor, status) = query(&proxy_ctx(), &ClientHandle::empty(), &req).await;
    assert!(cursor.is_none());
    assert_eq!(status.code(), StatusCode::Internal);
    assert_eq!(status.location(), "query");
    assert!(matches!(status.cause(), Some(SqlError::Backend(_))));
}

#[tokio::test]
async fn proxy_rows_drain_in_cursor_order() {
    let req = Request::query(QUERY_ROWS_RSC, "select * from table", vec![]);
    let (cursor, status) = query(&proxy_ctx(), &ClientHandle::empty(), &req).await;
    assert!(status.is_ok());

    let (rows, status) = scan_rows::<Condition>(cursor).await;
    assert!(status.is_ok());
    let locations: Vec<&str> = rows.iter().map(|c| c.location.as_str()).collect();
    assert_eq!(locations, ["office", "basement", "garage"]);
    assert_eq!(rows[2].temperature, 45.1234);
}

#[tokio::test]
async fn missing_client_is_invalid_argument() {
    let ctx = Context::background().with_request_id("abc-123");
    let req = Request::query(QUERY_ROWS_RSC, "select * from conditions", vec![]);
    let (cursor, status) = query(&ctx, &ClientHandle::empty(), &req).await;
    assert!(cursor.is_none());
    assert_eq!(status.code(), StatusCode::InvalidArgument);
    assert!(matches!(status.cause(), Some(SqlError::ClientUnavailable)));
    assert_eq!(status.request_id(), Some("abc-123"));
}

#[tokio::test]
async fn empty_sql_never_reaches_backend() {
    let backend = Arc::new(RecordingBackend::default());
    let client = ClientHandle::with_backend(backend.clone());
    let req = Request::query(QUERY_ROWS_RSC, "  ", vec![]);
    let (_, status) = query(&Context::background(), &client, &req).await;
    assert_eq!(status.code(), StatusCode::InvalidArgument);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn override_is_scoped_to_its_context() {
    let backend = Arc::new(RecordingBackend::with_rows(three_conditions()));
    let client = ClientHandle::with_backend(backend.clone());
    let req = Request::query(QUERY_ERROR_RSC, "select * from test", vec![]);

    let base = Context::background();
    let overridden = proxy_ctx();

    let (_, status) = query(&overridden, &client, &req).await;
    assert_eq!(status.code(), StatusCode::Internal);
    assert_eq!(backend.calls(), 0);

    let (cursor, status) = query(&base, &client, &req).await;
    assert!(status.is_ok());
    assert_eq!(backend.calls(), 1);
    let (rows, _) = scan_rows::<Condition>(cursor).await;
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn exec_shaped_override_does_not_intercept_queries() {
    let backend = Arc::new(RecordingBackend::default());
    let client = ClientHandle::with_backend(backend.clone());
    let ctx = Context::background().with_exec_proxy(|_| Err(SqlError::backend("exec only")));
    let req = Request::query(QUERY_ROWS_RSC, "select 1", vec![]);
    let (_, status) = query(&ctx, &client, &req).await;
    assert!(status.is_ok());
    assert_eq!(backend.queries.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn backend_override_replaces_client() {
    let stand_in = Arc::new(RecordingBackend::with_rows(three_conditions()));
    let ctx = Context::background().with_backend(stand_in.clone());
    let req = Request::query(QUERY_ROWS_RSC, "select * from conditions", vec![]);
    let (cursor, status) = query(&ctx, &ClientHandle::empty(), &req).await;
    assert!(status.is_ok());
    assert_eq!(stand_in.calls(), 1);
    let mut cursor = cursor.unwrap();
    let mut n = 0;
    while let Some(row) = cursor.next().await {
        row.unwrap();
        n += 1;
    }
    assert_eq!(n, 3);
    assert_eq!(cursor.command_tag().to_string(), "SELECT 3");
}

#[tokio::test]
async fn cancelled_context_reports_cancelled() {
    let backend = Arc::new(RecordingBackend::default());
    let client = ClientHandle::with_backend(backend.clone());
    let ctx = Context::background().with_cancel();
    ctx.cancel();
    let req = Request::query(QUERY_ROWS_RSC, "select 1", vec![]);
    let (cursor, status) = query(&ctx, &client, &req).await;
    assert!(cursor.is_none());
    assert_eq!(status.code(), StatusCode::Cancelled);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn context_deadline_interrupts_slow_backend() {
    let client = ClientHandle::with_backend(Arc::new(RecordingBackend::slow(Duration::from_secs(10))));
    let ctx = Context::background().with_timeout(Duration::from_millis(50));
    let req = Request::query(QUERY_ROWS_RSC, "select pg_sleep(10)", vec![]);
    let (_, status) = query(&ctx, &client, &req).await;
    assert_eq!(status.code(), StatusCode::DeadlineExceeded);
}

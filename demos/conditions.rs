//! Demo: starts the client from env (`DATABASE_URL`, `.env` honoured), then inserts, updates, reads
//! and deletes rows of a `conditions (time timestamptz, location text, temperature float8)` table
//! through governed controllers, logging access records via tracing.

use pgsql_shim::{
    require_rows, scan_rows, shutdown, startup, tracing_access_log, Attr, ClientConfig, ClientHandle,
    Context, ExecController, Lifecycle, QueryController, Request, Threshold,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Condition {
    location: String,
    temperature: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pgsql_shim=info")),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let client = ClientHandle::empty();
    let lifecycle = Lifecycle::new();
    startup(&config, &client, &lifecycle).await?;

    let threshold = Threshold::new(100.0, 10, Duration::from_secs(2));
    let exec_ctrl = ExecController::new("conditions-exec", threshold, Some(tracing_access_log()))
        .with_client(client.clone());
    let query_ctrl = QueryController::new("conditions-query", threshold, Some(tracing_access_log()))
        .with_client(client.clone());
    let ctx = Context::background().with_new_request_id();

    let insert = Request::insert(
        "conditions",
        "INSERT INTO conditions (time, location, temperature) VALUES (now(), $1, $2)",
        vec![vec![json!("plano"), json!(101.33)]],
    );
    let (tag, status) = exec_ctrl.apply(&ctx, &insert).await;
    tracing::info!(%status, %tag, "insert");

    let update = Request::update(
        "conditions",
        "UPDATE conditions SET temperature = $1 WHERE location = $2",
        vec![Attr::new("temperature", 45.1234)],
        vec![Attr::new("location", "plano")],
    );
    let (tag, status) = exec_ctrl.apply(&ctx, &update).await;
    tracing::info!(%status, %tag, "update");

    let select = Request::query(
        "conditions",
        "SELECT location, temperature FROM conditions ORDER BY temperature DESC",
        vec![],
    );
    let (cursor, status) = query_ctrl.apply(&ctx, &select).await;
    if status.is_ok() {
        let (rows, status) = scan_rows::<Condition>(cursor).await;
        let (rows, status) = require_rows(rows, status);
        tracing::info!(%status, count = rows.len(), "select");
        for row in &rows {
            tracing::info!(location = %row.location, temperature = row.temperature, "condition");
        }
    } else {
        tracing::warn!(%status, "select failed");
    }

    let delete = Request::delete(
        "conditions",
        "DELETE FROM conditions WHERE location = $1",
        vec![Attr::new("location", "plano")],
    );
    let (tag, status) = exec_ctrl.apply(&ctx, &delete).await;
    tracing::info!(%status, %tag, "delete");

    shutdown(&client, &lifecycle).await;
    Ok(())
}

//! Shared client handle plus the startup and shutdown calls that populate and clear it.

use crate::backend::{Backend, PgBackend};
use crate::config::ClientConfig;
use crate::error::SqlError;
use crate::lifecycle::Lifecycle;
use sqlx::postgres::PgPoolOptions;
use std::sync::{Arc, RwLock};

/// Explicitly owned reference to the live backend. Clones share the same slot, so a handle given
/// to controllers observes a later startup or shutdown.
#[derive(Clone, Default)]
pub struct ClientHandle {
    slot: Arc<RwLock<Option<Arc<dyn Backend>>>>,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("available", &self.is_available())
            .finish()
    }
}

impl ClientHandle {
    /// Handle with no client; every operation through it fails with `InvalidArgument`.
    pub fn empty() -> Self {
        ClientHandle::default()
    }

    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        let handle = ClientHandle::default();
        handle.set(backend);
        handle
    }

    /// Snapshot of the current backend for one operation.
    pub fn backend(&self) -> Option<Arc<dyn Backend>> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend().is_some()
    }

    /// Install `backend`, returning the one it replaced.
    pub fn set(&self, backend: Arc<dyn Backend>) -> Option<Arc<dyn Backend>> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.replace(backend)
    }

    pub fn clear(&self) -> Option<Arc<dyn Backend>> {
        let mut guard = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take()
    }
}

/// Connect a pool from `config`, verify it, install it in `handle`, and mark `lifecycle` started.
/// Fails with `AlreadyStarted` if `lifecycle` is already started.
pub async fn startup(
    config: &ClientConfig,
    handle: &ClientHandle,
    lifecycle: &Lifecycle,
) -> Result<(), SqlError> {
    if lifecycle.is_started() {
        return Err(SqlError::AlreadyStarted);
    }
    tracing::info!(url = %config.redacted_url(), max_connections = config.max_connections, "pgsql startup");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.database_url)
        .await?;
    let backend = PgBackend::new(pool);
    if let Err(e) = backend.ping().await {
        backend.close().await;
        return Err(e);
    }
    install(Arc::new(backend), handle, lifecycle).await
}

/// Install an already-built backend, as `startup` does after connecting.
pub async fn install(
    backend: Arc<dyn Backend>,
    handle: &ClientHandle,
    lifecycle: &Lifecycle,
) -> Result<(), SqlError> {
    if !lifecycle.try_start() {
        backend.close().await;
        return Err(SqlError::AlreadyStarted);
    }
    if let Some(previous) = handle.set(backend) {
        previous.close().await;
    }
    Ok(())
}

/// Clear `handle`, close the backend it held, and mark `lifecycle` stopped.
pub async fn shutdown(handle: &ClientHandle, lifecycle: &Lifecycle) {
    if let Some(backend) = handle.clear() {
        backend.close().await;
        tracing::info!("pgsql shutdown");
    }
    lifecycle.reset_started();
}

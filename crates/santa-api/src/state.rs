use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use santa_db::Database;
use santa_draw::DrawOrchestrator;
use santa_notify::ChannelNotifier;

use crate::error::ApiError;

pub type Orchestrator = DrawOrchestrator<Database, ChannelNotifier>;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub orchestrator: Orchestrator,
    pub admin_token: String,
    /// Registrations from this chat id get the admin flag.
    pub admin_telegram_id: Option<i64>,
}

/// Run a blocking DB call off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::Internal)
}

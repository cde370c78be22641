mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use santa_api::AppStateInner;
use santa_db::Database;
use santa_draw::DrawOrchestrator;
use santa_notify::{ChannelNotifier, LogNotifier, TelegramNotifier};

use crate::config::Config;

const DB_OPEN_ATTEMPTS: u32 = 20;
const DB_OPEN_DELAY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "santa_server=debug,santa_api=debug,santa_draw=debug,santa_notify=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("Starting with {:?}", config);

    let db = Arc::new(open_with_retry(&config.db_path).await?);

    let notifier = match &config.bot_token {
        Some(token) => ChannelNotifier::Telegram(TelegramNotifier::new(
            &config.telegram_api,
            token,
            config.draw.send_timeout,
        )?),
        None => {
            warn!("SANTA_BOT_TOKEN not set, notifications will only be logged");
            ChannelNotifier::Log(LogNotifier)
        }
    };

    let orchestrator = DrawOrchestrator::new(Arc::clone(&db), notifier, config.draw.clone());
    let shutdown = orchestrator.shutdown_token();

    let state = Arc::new(AppStateInner {
        db,
        orchestrator,
        admin_token: config.admin_token,
        admin_telegram_id: config.admin_telegram_id,
    });

    let app = santa_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Secret Santa server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested, stopping notification dispatch");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

/// The database file may sit on a volume that is not mounted yet at startup.
async fn open_with_retry(path: &Path) -> anyhow::Result<Database> {
    let mut attempt = 1;
    loop {
        match Database::open(path) {
            Ok(db) => return Ok(db),
            Err(e) if attempt < DB_OPEN_ATTEMPTS => {
                warn!(
                    "Opening {} failed (attempt {}/{}): {:#}",
                    path.display(),
                    attempt,
                    DB_OPEN_ATTEMPTS,
                    e
                );
                attempt += 1;
                tokio::time::sleep(DB_OPEN_DELAY).await;
            }
            Err(e) => return Err(e.context(format!("opening {}", path.display()))),
        }
    }
}

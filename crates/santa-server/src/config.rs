use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use santa_draw::DrawConfig;

const PLACEHOLDER_TOKENS: &[&str] = &["", "changeme", "change-me", "admin", "secret", "your-admin-token"];

/// Runtime settings, read from `SANTA_*` environment variables.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub admin_token: String,
    pub admin_telegram_id: Option<i64>,
    /// Without a bot token notifications are only logged.
    pub bot_token: Option<String>,
    pub telegram_api: String,
    pub draw: DrawConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_path", &self.db_path)
            .field("admin_token", &"[REDACTED]")
            .field("admin_telegram_id", &self.admin_telegram_id)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("telegram_api", &self.telegram_api)
            .field("draw", &self.draw)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let admin_token = var("SANTA_ADMIN_TOKEN").unwrap_or_default();
        if PLACEHOLDER_TOKENS.contains(&admin_token.to_lowercase().as_str()) {
            bail!("SANTA_ADMIN_TOKEN must be set to a real secret");
        }

        let defaults = DrawConfig::default();
        let draw = DrawConfig {
            notify_concurrency: parse(&var, "SANTA_NOTIFY_CONCURRENCY")?
                .unwrap_or(defaults.notify_concurrency)
                .max(1),
            send_timeout: parse(&var, "SANTA_SEND_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.send_timeout),
            storage_timeout: parse(&var, "SANTA_STORAGE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.storage_timeout),
            budget: var("SANTA_BUDGET").unwrap_or(defaults.budget),
            max_attempts: defaults.max_attempts,
        };

        Ok(Self {
            host: var("SANTA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&var, "SANTA_PORT")?.unwrap_or(3000),
            db_path: PathBuf::from(var("SANTA_DB_PATH").unwrap_or_else(|| "santa.db".into())),
            admin_token,
            admin_telegram_id: parse(&var, "SANTA_ADMIN_TELEGRAM_ID")?,
            bot_token: var("SANTA_BOT_TOKEN"),
            telegram_api: var("SANTA_TELEGRAM_API").unwrap_or_else(|| "https://api.telegram.org".into()),
            draw,
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|v| v.parse::<T>().with_context(|| format!("invalid {}: {:?}", key, v)))
        .transpose()
}

//! Outbound channels for draw notifications.

pub mod log;
pub mod telegram;

pub use log::LogNotifier;
pub use telegram::TelegramNotifier;

use santa_draw::{DeliveryError, Notifier};

/// The channel picked at startup.
pub enum ChannelNotifier {
    Telegram(TelegramNotifier),
    Log(LogNotifier),
}

impl Notifier for ChannelNotifier {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), DeliveryError> {
        match self {
            Self::Telegram(t) => t.send(recipient_id, text).await,
            Self::Log(l) => l.send(recipient_id, text).await,
        }
    }
}

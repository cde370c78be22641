use santa_draw::{DeliveryError, Notifier};
use tracing::info;

/// Dry-run channel: every notification is written to the log and counts as delivered.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), DeliveryError> {
        info!("[dry-run] notification for TG {}:\n{}", recipient_id, text);
        Ok(())
    }
}

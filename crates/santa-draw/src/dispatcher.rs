use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use santa_db::NewOutcome;
use santa_types::models::{DeliveryFailure, DeliveryStatus, ResolvedPair};

use crate::error::DeliveryError;
use crate::message;
use crate::store::DeliveryLedger;

/// The outbound channel: deliver `text` to the chat identified by `recipient_id`.
pub trait Notifier: Send + Sync + 'static {
    fn send(&self, recipient_id: i64, text: &str) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Aggregate of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// In input order, whatever order the sends completed in.
    pub failures: Vec<DeliveryFailure>,
    /// Some pairs were skipped because dispatch was cancelled.
    pub interrupted: bool,
}

/// Sends one notification per pair to the giver, describing the receiver.
///
/// Sends run with at most `concurrency` in flight. A failed or timed out
/// send is recorded and reported; it never stops the remaining sends and
/// is never retried within the same pass.
pub struct NotificationDispatcher<N, L> {
    notifier: Arc<N>,
    ledger: Arc<L>,
    concurrency: usize,
    send_timeout: Duration,
    budget: String,
}

enum Attempt {
    Delivered,
    Failed(DeliveryFailure),
    Skipped,
}

impl<N, L> NotificationDispatcher<N, L>
where
    N: Notifier,
    L: DeliveryLedger,
{
    pub fn new(
        notifier: Arc<N>,
        ledger: Arc<L>,
        concurrency: usize,
        send_timeout: Duration,
        budget: impl Into<String>,
    ) -> Self {
        Self {
            notifier,
            ledger,
            concurrency: concurrency.max(1),
            send_timeout,
            budget: budget.into(),
        }
    }

    pub fn budget(&self) -> &str {
        &self.budget
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Attempt every pair once. Pairs not yet started when `cancel` fires are
    /// skipped and leave no ledger entry.
    pub async fn dispatch(
        &self,
        draw_id: Uuid,
        pairs: &[ResolvedPair],
        cancel: &CancellationToken,
    ) -> DispatchReport {
        // `buffered` keeps results in input order.
        let attempts: Vec<Attempt> = stream::iter(pairs.to_vec())
            .map(|pair| self.attempt(draw_id, pair, cancel))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = DispatchReport::default();
        for attempt in attempts {
            match attempt {
                Attempt::Delivered => report.delivered += 1,
                Attempt::Failed(failure) => {
                    report.failed += 1;
                    report.failures.push(failure);
                }
                Attempt::Skipped => report.interrupted = true,
            }
        }
        report
    }

    async fn attempt(&self, draw_id: Uuid, pair: ResolvedPair, cancel: &CancellationToken) -> Attempt {
        if cancel.is_cancelled() {
            return Attempt::Skipped;
        }

        let recipient_id = pair.giver.telegram_id;
        let text = message::assignment_notice(&pair.receiver, &self.budget);

        let result = match tokio::time::timeout(self.send_timeout, self.notifier.send(recipient_id, &text)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout)),
        };

        let (status, reason) = match result {
            Ok(()) => {
                debug!("Notified TG {} of their recipient", recipient_id);
                (DeliveryStatus::Delivered, None)
            }
            Err(e) => {
                warn!("Failed to notify TG {}: {}", recipient_id, e);
                (DeliveryStatus::Failed, Some(e.to_string()))
            }
        };

        self.record(draw_id, &pair, status, reason.clone()).await;

        match reason {
            None => Attempt::Delivered,
            Some(reason) => Attempt::Failed(DeliveryFailure {
                recipient_id,
                participant_id: pair.giver.id,
                reason,
            }),
        }
    }

    /// Ledger writes are best effort: a failed write is logged, the delivery
    /// result still counts.
    async fn record(&self, draw_id: Uuid, pair: &ResolvedPair, status: DeliveryStatus, reason: Option<String>) {
        let ledger = Arc::clone(&self.ledger);
        let pair_id = pair.pair.id;
        let giver_id = pair.giver.id;
        let recipient_id = pair.giver.telegram_id;

        let written = tokio::task::spawn_blocking(move || {
            ledger.append_outcome(&NewOutcome {
                draw_id,
                pair_id,
                giver_id,
                recipient_id,
                status,
                failure_reason: reason.as_deref(),
                attempted_at: Utc::now(),
            })
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Could not record delivery outcome for pair {}: {}", pair_id, e),
            Err(e) => warn!("Ledger task for pair {} failed: {}", pair_id, e),
        }
    }
}

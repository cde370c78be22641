use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use santa_types::models::{DrawSummary, ResolvedPair};

use crate::derangement::{self, MAX_ATTEMPTS, MIN_PARTICIPANTS};
use crate::dispatcher::{DispatchReport, NotificationDispatcher, Notifier};
use crate::error::DrawError;
use crate::store::DrawStore;

#[derive(Debug, Clone)]
pub struct DrawConfig {
    pub max_attempts: usize,
    /// Notifications in flight at once.
    pub notify_concurrency: usize,
    pub send_timeout: Duration,
    /// Applies to each storage call; expiry is reported as a storage error.
    pub storage_timeout: Duration,
    /// Gift budget quoted in every notification.
    pub budget: String,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            notify_concurrency: 4,
            send_timeout: Duration::from_secs(10),
            storage_timeout: Duration::from_secs(5),
            budget: "not specified".into(),
        }
    }
}

/// Runs draws end to end: validate, generate, persist, read back, notify, summarize.
///
/// The random source lives behind the draw lock, so holding the lock is what
/// serializes draws. It is held from the first storage call to the read-back
/// and released before notifications go out.
pub struct DrawOrchestrator<S, N> {
    store: Arc<S>,
    dispatcher: NotificationDispatcher<N, S>,
    rng: Mutex<StdRng>,
    max_attempts: usize,
    storage_timeout: Duration,
    shutdown: CancellationToken,
}

impl<S, N> DrawOrchestrator<S, N>
where
    S: DrawStore,
    N: Notifier,
{
    pub fn new(store: Arc<S>, notifier: N, config: DrawConfig) -> Self {
        Self::with_rng(store, notifier, config, StdRng::from_os_rng())
    }

    /// Same as `new` with an explicit random source, e.g. a seeded one.
    pub fn with_rng(store: Arc<S>, notifier: N, config: DrawConfig, rng: StdRng) -> Self {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(notifier),
            Arc::clone(&store),
            config.notify_concurrency,
            config.send_timeout,
            config.budget,
        );

        Self {
            store,
            dispatcher,
            rng: Mutex::new(rng),
            max_attempts: config.max_attempts,
            storage_timeout: config.storage_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn budget(&self) -> &str {
        self.dispatcher.budget()
    }

    pub fn notifier(&self) -> &N {
        self.dispatcher.notifier()
    }

    /// Cancelling this token stops notification dispatch from starting new
    /// sends. Committed assignments are unaffected.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run_draw(&self) -> Result<DrawSummary, DrawError> {
        self.draw(false).await
    }

    /// Clear the stored set, then run a fresh draw. If the new draw fails the
    /// set stays empty.
    pub async fn restart_draw(&self) -> Result<DrawSummary, DrawError> {
        self.draw(true).await
    }

    /// Notify every giver in the stored set again. Used to retry after
    /// delivery failures or an interrupted dispatch.
    ///
    /// The set is read under the draw lock, so it is never one a running draw
    /// is about to replace. A draw that starts after the read can still
    /// supersede it while the re-send is in flight.
    pub async fn resend_notifications(&self) -> Result<DrawSummary, DrawError> {
        let pairs = {
            let _guard = self.rng.lock().await;
            self.blocking("read assignments", |s| s.list_assignments()).await?
        };
        let Some(first) = pairs.first() else {
            return Err(DrawError::NoAssignments);
        };
        let draw_id = first.pair.draw_id;

        info!("Re-sending {} notifications for draw {}", pairs.len(), draw_id);
        let report = self.dispatcher.dispatch(draw_id, &pairs, &self.shutdown).await;
        Ok(summarize(draw_id, pairs.len(), report))
    }

    pub async fn clear_assignments(&self) -> Result<usize, DrawError> {
        let _guard = self.rng.lock().await;
        let removed = self.write("clear assignments", |s| s.clear_assignments()).await?;
        info!("Cleared {} assignments", removed);
        Ok(removed)
    }

    pub async fn list_assignments(&self) -> Result<Vec<ResolvedPair>, DrawError> {
        self.blocking("read assignments", |s| s.list_assignments()).await
    }

    pub async fn assignment_for(&self, participant_id: i64) -> Result<Option<ResolvedPair>, DrawError> {
        self.blocking("read assignment", move |s| s.assignment_for(participant_id))
            .await
    }

    async fn draw(&self, clear_first: bool) -> Result<DrawSummary, DrawError> {
        let (draw_id, pairs) = {
            let mut rng = self.rng.lock().await;

            if clear_first {
                let removed = self.write("clear assignments", |s| s.clear_assignments()).await?;
                info!("Restart: cleared {} previous assignments", removed);
            }

            let participants = self.blocking("list participants", |s| s.list_participants()).await?;
            if participants.len() < MIN_PARTICIPANTS {
                return Err(DrawError::InsufficientParticipants {
                    found: participants.len(),
                    required: MIN_PARTICIPANTS,
                });
            }

            let ids: Vec<i64> = participants.iter().map(|p| p.id).collect();
            let derangement = derangement::derange(&ids, &mut *rng, self.max_attempts)?;
            debug!(
                "Derangement of {} found after {} attempts",
                ids.len(),
                derangement.attempts
            );

            let draw_id = Uuid::new_v4();
            let new_pairs = derangement.pairs;
            let deadline = Instant::now() + self.storage_timeout;
            self.write("store assignments", move |s| s.replace_assignments(draw_id, &new_pairs, deadline))
                .await?;

            // Notify from what was committed, not from the in-memory pairs.
            let stored = self.blocking("read back assignments", |s| s.list_assignments()).await?;
            (draw_id, stored)
        };

        info!("Draw {} committed with {} pairs", draw_id, pairs.len());

        let report = self.dispatcher.dispatch(draw_id, &pairs, &self.shutdown).await;
        let summary = summarize(draw_id, pairs.len(), report);
        info!(
            "Draw {} notifications: {} delivered, {} failed",
            draw_id, summary.delivered, summary.failed
        );
        Ok(summary)
    }

    /// Run a storage write on the blocking pool and wait for its real outcome.
    ///
    /// Callers hold the draw lock, so an overrunning write still finishes
    /// before the next draw can start. The replace step enforces the storage
    /// timeout itself by rolling back; past the timeout this only warns.
    async fn write<T, F>(&self, operation: &'static str, f: F) -> Result<T, DrawError>
    where
        F: FnOnce(&S) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let mut task = tokio::task::spawn_blocking(move || f(&store));

        let joined = match tokio::time::timeout(self.storage_timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    "Storage call to {} exceeded {:?}, waiting for its outcome",
                    operation, self.storage_timeout
                );
                task.await
            }
        };

        match joined {
            Ok(result) => result.map_err(|source| DrawError::Storage { operation, source }),
            Err(join) => Err(DrawError::Storage {
                operation,
                source: anyhow::anyhow!("storage task failed: {}", join),
            }),
        }
    }

    /// Run a storage read on the blocking pool under the storage timeout.
    /// An abandoned read changes nothing.
    async fn blocking<T, F>(&self, operation: &'static str, f: F) -> Result<T, DrawError>
    where
        F: FnOnce(&S) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(&store));

        match tokio::time::timeout(self.storage_timeout, task).await {
            Ok(Ok(result)) => result.map_err(|source| DrawError::Storage { operation, source }),
            Ok(Err(join)) => Err(DrawError::Storage {
                operation,
                source: anyhow::anyhow!("storage task failed: {}", join),
            }),
            Err(_) => Err(DrawError::Storage {
                operation,
                source: anyhow::anyhow!("timed out after {:?}", self.storage_timeout),
            }),
        }
    }
}

fn summarize(draw_id: Uuid, pairs_created: usize, report: DispatchReport) -> DrawSummary {
    DrawSummary {
        draw_id,
        pairs_created,
        delivered: report.delivered,
        failed: report.failed,
        failures: report.failures,
        interrupted: report.interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::store::{AssignmentStore, DeliveryLedger, ParticipantSource};
    use santa_db::{Database, NewOutcome, NewParticipant};
    use santa_types::models::Participant;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        sent: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        async fn send(&self, _recipient_id: i64, _text: &str) -> Result<(), DeliveryError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Wraps a real database and can be told to fail or stall the replace step.
    struct FlakyStore {
        db: Database,
        fail_replace: AtomicBool,
        replace_delay: Duration,
    }

    impl ParticipantSource for FlakyStore {
        fn list_participants(&self) -> anyhow::Result<Vec<Participant>> {
            self.db.list_participants()
        }
    }

    impl AssignmentStore for FlakyStore {
        fn replace_assignments(&self, draw_id: Uuid, pairs: &[(i64, i64)], deadline: Instant) -> anyhow::Result<usize> {
            if self.fail_replace.load(Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            std::thread::sleep(self.replace_delay);
            self.db.replace_assignments_before(draw_id, pairs, deadline)
        }

        fn clear_assignments(&self) -> anyhow::Result<usize> {
            self.db.clear_assignments()
        }

        fn list_assignments(&self) -> anyhow::Result<Vec<ResolvedPair>> {
            self.db.list_assignments()
        }

        fn assignment_for(&self, participant_id: i64) -> anyhow::Result<Option<ResolvedPair>> {
            self.db.assignment_for_giver(participant_id)
        }
    }

    impl DeliveryLedger for FlakyStore {
        fn append_outcome(&self, outcome: &NewOutcome<'_>) -> anyhow::Result<()> {
            self.db.append_outcome(outcome).map(|_| ())
        }
    }

    fn store_with(n: i64) -> Arc<FlakyStore> {
        slow_store_with(n, Duration::ZERO)
    }

    fn slow_store_with(n: i64, replace_delay: Duration) -> Arc<FlakyStore> {
        let db = Database::open_in_memory().unwrap();
        for i in 1..=n {
            let name = format!("Member {}", i);
            db.upsert_participant(&NewParticipant {
                telegram_id: 1000 + i,
                username: None,
                first_name: &name,
                last_name: None,
                full_name: &name,
                delivery_info: "Pickup point 7",
                gift_wishes: None,
                is_admin: false,
            })
            .unwrap();
        }
        Arc::new(FlakyStore {
            db,
            fail_replace: AtomicBool::new(false),
            replace_delay,
        })
    }

    fn orchestrator(store: Arc<FlakyStore>) -> DrawOrchestrator<FlakyStore, CountingNotifier> {
        DrawOrchestrator::with_rng(store, CountingNotifier::default(), DrawConfig::default(), StdRng::seed_from_u64(5))
    }

    #[tokio::test]
    async fn single_participant_is_rejected_before_generation() {
        let store = store_with(1);
        let orch = orchestrator(Arc::clone(&store));

        let err = orch.run_draw().await.unwrap_err();
        assert!(matches!(err, DrawError::InsufficientParticipants { found: 1, required: 2 }));
        assert!(!err.is_aborted());
        assert_eq!(err.to_string(), "at least 2 participants required, found 1");
        assert!(store.db.list_assignments().unwrap().is_empty());
        assert_eq!(orch.dispatcher.notifier_sent(), 0);
    }

    #[tokio::test]
    async fn storage_failure_keeps_previous_draw() {
        let store = store_with(4);
        let orch = orchestrator(Arc::clone(&store));

        let first = orch.run_draw().await.unwrap();
        assert_eq!(first.delivered, 4);

        store.fail_replace.store(true, Ordering::SeqCst);
        let err = orch.run_draw().await.unwrap_err();
        assert!(err.is_aborted());
        assert!(matches!(err, DrawError::Storage { operation: "store assignments", .. }));

        let pairs = orch.list_assignments().await.unwrap();
        assert_eq!(pairs.len(), 4);
        assert!(pairs.iter().all(|p| p.pair.draw_id == first.draw_id));
        // No notifications for the aborted draw.
        assert_eq!(orch.dispatcher.notifier_sent(), 4);
    }

    #[tokio::test]
    async fn slow_replace_is_rolled_back_not_committed_later() {
        let store = slow_store_with(4, Duration::from_millis(300));
        let config = DrawConfig {
            storage_timeout: Duration::from_millis(100),
            ..DrawConfig::default()
        };
        let orch = DrawOrchestrator::with_rng(Arc::clone(&store), CountingNotifier::default(), config, StdRng::seed_from_u64(9));

        let err = orch.run_draw().await.unwrap_err();
        assert!(matches!(err, DrawError::Storage { operation: "store assignments", .. }));
        assert!(err.to_string().contains("rolled back"));

        // The write has finished by the time the error is returned; give a
        // stray commit time to land anyway before checking.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(store.db.list_assignments().unwrap().is_empty());
        assert!(store.db.list_outcomes(None).unwrap().is_empty());
        assert_eq!(orch.dispatcher.notifier_sent(), 0);
    }

    #[tokio::test]
    async fn exhausted_generation_leaves_store_untouched() {
        let store = store_with(3);
        let config = DrawConfig { max_attempts: 0, ..DrawConfig::default() };
        let orch = DrawOrchestrator::with_rng(Arc::clone(&store), CountingNotifier::default(), config, StdRng::seed_from_u64(1));

        let err = orch.run_draw().await.unwrap_err();
        assert!(matches!(err, DrawError::GenerationExhausted { attempts: 0 }));
        assert!(store.db.list_assignments().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resend_requires_a_stored_draw() {
        let orch = orchestrator(store_with(3));
        assert!(matches!(orch.resend_notifications().await, Err(DrawError::NoAssignments)));

        let summary = orch.run_draw().await.unwrap();
        let again = orch.resend_notifications().await.unwrap();
        assert_eq!(again.draw_id, summary.draw_id);
        assert_eq!(again.delivered, 3);
        assert_eq!(orch.dispatcher.notifier_sent(), 6);
    }

    #[tokio::test]
    async fn resend_waits_for_a_running_draw() {
        let store = store_with(3);
        let orch = Arc::new(orchestrator(Arc::clone(&store)));
        let first = orch.run_draw().await.unwrap();

        // Stand in for a draw that is mid-way through replacing the set.
        let guard = orch.rng.lock().await;
        let resend = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.resend_notifications().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!resend.is_finished());

        let ids: Vec<i64> = store.db.list_participants().unwrap().iter().map(|p| p.id).collect();
        let replacement = Uuid::new_v4();
        store
            .db
            .replace_assignments(replacement, &[(ids[0], ids[2]), (ids[1], ids[0]), (ids[2], ids[1])])
            .unwrap();
        drop(guard);

        let summary = resend.await.unwrap().unwrap();
        assert_ne!(summary.draw_id, first.draw_id);
        assert_eq!(summary.draw_id, replacement);
        assert_eq!(summary.delivered, 3);
    }

    #[tokio::test]
    async fn lookup_by_giver() {
        let store = store_with(3);
        let orch = orchestrator(Arc::clone(&store));
        orch.run_draw().await.unwrap();

        let giver = store.db.list_participants().unwrap()[0].id;
        let pair = orch.assignment_for(giver).await.unwrap().unwrap();
        assert_eq!(pair.giver.id, giver);
        assert_ne!(pair.receiver.id, giver);
        assert!(orch.assignment_for(999).await.unwrap().is_none());
    }

    impl NotificationDispatcher<CountingNotifier, FlakyStore> {
        fn notifier_sent(&self) -> usize {
            self.notifier().sent.load(Ordering::SeqCst)
        }
    }
}

use std::time::Instant;

use anyhow::Result;
use uuid::Uuid;

use santa_db::{Database, NewOutcome};
use santa_types::models::{Participant, ResolvedPair};

/// Read access to the registered participants.
pub trait ParticipantSource: Send + Sync + 'static {
    fn list_participants(&self) -> Result<Vec<Participant>>;
}

/// Persistence for the current assignment set.
pub trait AssignmentStore: Send + Sync + 'static {
    /// Swap the whole stored set for `pairs` atomically. Either the new set
    /// is fully visible afterwards or the old one is untouched. Past
    /// `deadline` the swap must not commit.
    fn replace_assignments(&self, draw_id: Uuid, pairs: &[(i64, i64)], deadline: Instant) -> Result<usize>;

    fn clear_assignments(&self) -> Result<usize>;

    /// Stored pairs with both participants resolved, in insertion order.
    fn list_assignments(&self) -> Result<Vec<ResolvedPair>>;

    /// The pair in which `participant_id` gives.
    fn assignment_for(&self, participant_id: i64) -> Result<Option<ResolvedPair>>;
}

/// Append-only record of notification attempts.
pub trait DeliveryLedger: Send + Sync + 'static {
    fn append_outcome(&self, outcome: &NewOutcome<'_>) -> Result<()>;
}

/// Everything a draw needs from storage.
pub trait DrawStore: ParticipantSource + AssignmentStore + DeliveryLedger {}

impl<T> DrawStore for T where T: ParticipantSource + AssignmentStore + DeliveryLedger {}

impl ParticipantSource for Database {
    fn list_participants(&self) -> Result<Vec<Participant>> {
        Database::list_participants(self)
    }
}

impl AssignmentStore for Database {
    fn replace_assignments(&self, draw_id: Uuid, pairs: &[(i64, i64)], deadline: Instant) -> Result<usize> {
        self.replace_assignments_before(draw_id, pairs, deadline)
    }

    fn clear_assignments(&self) -> Result<usize> {
        Database::clear_assignments(self)
    }

    fn list_assignments(&self) -> Result<Vec<ResolvedPair>> {
        Database::list_assignments(self)
    }

    fn assignment_for(&self, participant_id: i64) -> Result<Option<ResolvedPair>> {
        self.assignment_for_giver(participant_id)
    }
}

impl DeliveryLedger for Database {
    fn append_outcome(&self, outcome: &NewOutcome<'_>) -> Result<()> {
        Database::append_outcome(self, outcome).map(|_| ())
    }
}

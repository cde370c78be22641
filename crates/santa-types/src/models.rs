use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered member of the gift exchange.
///
/// `telegram_id` is the external chat id used to deliver notifications;
/// `id` is the internal key referenced by assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub delivery_info: String,
    pub gift_wishes: Option<String>,
    pub is_admin: bool,
    pub registered_at: DateTime<Utc>,
}

impl Participant {
    pub fn display_name(&self) -> &str {
        &self.full_name
    }

    /// A profile is complete once both the name and the delivery details are filled in.
    pub fn is_complete(&self) -> bool {
        !self.full_name.trim().is_empty() && !self.delivery_info.trim().is_empty()
    }
}

/// One giver -> receiver row produced by a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPair {
    pub id: i64,
    pub draw_id: Uuid,
    pub giver_id: i64,
    pub receiver_id: i64,
    pub created_at: DateTime<Utc>,
}

/// An assignment with both sides' profiles loaded from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPair {
    #[serde(flatten)]
    pub pair: AssignmentPair,
    pub giver: Participant,
    pub receiver: Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown delivery status '{}'", other)),
        }
    }
}

/// A ledger entry for one notification attempt. Never updated once written.
///
/// `pair_id` is kept as a plain reference: the pair itself disappears when a
/// later draw replaces the assignment set, the ledger entry does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub id: i64,
    pub draw_id: Uuid,
    pub pair_id: i64,
    pub giver_id: i64,
    pub recipient_id: i64,
    pub status: DeliveryStatus,
    pub failure_reason: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// A notification that could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    /// External chat id the notification was addressed to.
    pub recipient_id: i64,
    pub participant_id: i64,
    pub reason: String,
}

/// Result of a committed draw (or of a notification re-send over the current set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawSummary {
    pub draw_id: Uuid,
    pub pairs_created: usize,
    pub delivered: usize,
    pub failed: usize,
    /// In original pair order.
    pub failures: Vec<DeliveryFailure>,
    /// Dispatch was cancelled before every pair was attempted.
    pub interrupted: bool,
}

impl DrawSummary {
    /// Pairs that were neither delivered nor failed (only non-zero when interrupted).
    pub fn unattempted(&self) -> usize {
        self.pairs_created.saturating_sub(self.delivered + self.failed)
    }
}

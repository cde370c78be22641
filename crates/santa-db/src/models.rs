//! Database row types. These map directly to SQLite rows and are converted
//! into santa-types models at the edge of the crate.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use uuid::Uuid;

use santa_types::models::{AssignmentPair, DeliveryOutcome, DeliveryStatus, Participant, ResolvedPair};

pub(crate) const PARTICIPANT_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, \
     full_name, delivery_info, gift_wishes, is_admin, registered_at";

/// Number of columns read by `ParticipantRow::from_row`.
pub(crate) const PARTICIPANT_WIDTH: usize = 10;

pub struct ParticipantRow {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub delivery_info: String,
    pub gift_wishes: Option<String>,
    pub is_admin: bool,
    pub registered_at: String,
}

impl ParticipantRow {
    /// Reads the participant columns starting at `offset`, in `PARTICIPANT_COLUMNS` order.
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            telegram_id: row.get(offset + 1)?,
            username: row.get(offset + 2)?,
            first_name: row.get(offset + 3)?,
            last_name: row.get(offset + 4)?,
            full_name: row.get(offset + 5)?,
            delivery_info: row.get(offset + 6)?,
            gift_wishes: row.get(offset + 7)?,
            is_admin: row.get(offset + 8)?,
            registered_at: row.get(offset + 9)?,
        })
    }

    pub fn into_model(self) -> Result<Participant> {
        Ok(Participant {
            registered_at: parse_timestamp(&self.registered_at)
                .with_context(|| format!("participant {}: bad registered_at", self.id))?,
            id: self.id,
            telegram_id: self.telegram_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            full_name: self.full_name,
            delivery_info: self.delivery_info,
            gift_wishes: self.gift_wishes,
            is_admin: self.is_admin,
        })
    }
}

pub struct AssignmentRow {
    pub id: i64,
    pub draw_id: String,
    pub giver_id: i64,
    pub receiver_id: i64,
    pub created_at: String,
}

impl AssignmentRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            draw_id: row.get(1)?,
            giver_id: row.get(2)?,
            receiver_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn into_model(self) -> Result<AssignmentPair> {
        Ok(AssignmentPair {
            draw_id: self
                .draw_id
                .parse::<Uuid>()
                .with_context(|| format!("assignment {}: bad draw_id '{}'", self.id, self.draw_id))?,
            created_at: parse_timestamp(&self.created_at)
                .with_context(|| format!("assignment {}: bad created_at", self.id))?,
            id: self.id,
            giver_id: self.giver_id,
            receiver_id: self.receiver_id,
        })
    }
}

/// An assignment joined with both participants.
pub struct ResolvedPairRow {
    pub assignment: AssignmentRow,
    pub giver: ParticipantRow,
    pub receiver: ParticipantRow,
}

impl ResolvedPairRow {
    pub fn into_model(self) -> Result<ResolvedPair> {
        Ok(ResolvedPair {
            pair: self.assignment.into_model()?,
            giver: self.giver.into_model()?,
            receiver: self.receiver.into_model()?,
        })
    }
}

pub struct OutcomeRow {
    pub id: i64,
    pub draw_id: String,
    pub pair_id: i64,
    pub giver_id: i64,
    pub recipient_id: i64,
    pub status: String,
    pub failure_reason: Option<String>,
    pub attempted_at: String,
}

impl OutcomeRow {
    pub fn into_model(self) -> Result<DeliveryOutcome> {
        Ok(DeliveryOutcome {
            draw_id: self
                .draw_id
                .parse::<Uuid>()
                .with_context(|| format!("outcome {}: bad draw_id '{}'", self.id, self.draw_id))?,
            status: self
                .status
                .parse::<DeliveryStatus>()
                .map_err(|e| anyhow::anyhow!("outcome {}: {}", self.id, e))?,
            attempted_at: parse_timestamp(&self.attempted_at)
                .with_context(|| format!("outcome {}: bad attempted_at", self.id))?,
            id: self.id,
            pair_id: self.pair_id,
            giver_id: self.giver_id,
            recipient_id: self.recipient_id,
            failure_reason: self.failure_reason,
        })
    }
}

// -- Write-side inputs --

/// Profile fields supplied on registration. Re-registering the same
/// `telegram_id` updates the existing row in place.
#[derive(Debug, Clone)]
pub struct NewParticipant<'a> {
    pub telegram_id: i64,
    pub username: Option<&'a str>,
    pub first_name: &'a str,
    pub last_name: Option<&'a str>,
    pub full_name: &'a str,
    pub delivery_info: &'a str,
    pub gift_wishes: Option<&'a str>,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct NewOutcome<'a> {
    pub draw_id: Uuid,
    pub pair_id: i64,
    pub giver_id: i64,
    pub recipient_id: i64,
    pub status: DeliveryStatus,
    pub failure_reason: Option<&'a str>,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteParticipant {
    Deleted,
    NotFound,
    /// The participant is a giver or receiver in the current assignment set.
    InCurrentDraw,
}

/// Accepts RFC 3339 (what this crate writes) and SQLite's
/// `datetime('now')` format, which has no timezone and is UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .with_context(|| format!("unrecognised timestamp '{}'", raw))
}

use crate::Database;
use crate::models::{
    AssignmentRow, DeleteParticipant, NewOutcome, NewParticipant, OutcomeRow, PARTICIPANT_COLUMNS,
    PARTICIPANT_WIDTH, ParticipantRow, ResolvedPairRow,
};
use anyhow::{Result, anyhow, bail};
use chrono::Utc;
use rusqlite::{Connection, Row};
use std::time::Instant;
use santa_types::models::{DeliveryOutcome, Participant, ResolvedPair};
use tracing::debug;
use uuid::Uuid;

impl Database {
    // -- Participants --

    /// Insert a participant, or update the profile of an existing `telegram_id` in place.
    pub fn upsert_participant(&self, p: &NewParticipant<'_>) -> Result<Participant> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO participants
                    (telegram_id, username, first_name, last_name, full_name, delivery_info, gift_wishes, is_admin, registered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(telegram_id) DO UPDATE SET
                    username = excluded.username,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    full_name = excluded.full_name,
                    delivery_info = excluded.delivery_info,
                    gift_wishes = excluded.gift_wishes,
                    is_admin = excluded.is_admin",
                rusqlite::params![
                    p.telegram_id,
                    p.username,
                    p.first_name,
                    p.last_name,
                    p.full_name,
                    p.delivery_info,
                    p.gift_wishes,
                    p.is_admin,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            query_participant_by_telegram_id(conn, p.telegram_id)?
                .ok_or_else(|| anyhow!("Participant {} vanished after upsert", p.telegram_id))
        })
    }

    pub fn list_participants(&self) -> Result<Vec<Participant>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM participants ORDER BY id",
                PARTICIPANT_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], |row| ParticipantRow::from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(ParticipantRow::into_model).collect()
        })
    }

    pub fn get_participant_by_telegram_id(&self, telegram_id: i64) -> Result<Option<Participant>> {
        self.with_conn(|conn| query_participant_by_telegram_id(conn, telegram_id))
    }

    /// Explicit administrative removal. Refused while the participant is part
    /// of the stored assignment set, since removing them would break the bijection.
    pub fn delete_participant_by_telegram_id(&self, telegram_id: i64) -> Result<DeleteParticipant> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM participants WHERE telegram_id = ?1",
                    [telegram_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(id) = id else {
                return Ok(DeleteParticipant::NotFound);
            };

            let in_draw: i64 = tx.query_row(
                "SELECT COUNT(*) FROM assignments WHERE giver_id = ?1 OR receiver_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            if in_draw > 0 {
                return Ok(DeleteParticipant::InCurrentDraw);
            }

            tx.execute("DELETE FROM participants WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(DeleteParticipant::Deleted)
        })
    }

    // -- Assignments --

    /// Delete every stored assignment and insert `pairs` in one transaction.
    /// On error nothing changes: the previous set stays in place.
    pub fn replace_assignments(&self, draw_id: Uuid, pairs: &[(i64, i64)]) -> Result<usize> {
        self.replace(draw_id, pairs, None)
    }

    /// Like `replace_assignments`, but the transaction is rolled back instead
    /// of committed once `deadline` has passed. An `Err` always means the
    /// previous set is still the stored one.
    pub fn replace_assignments_before(&self, draw_id: Uuid, pairs: &[(i64, i64)], deadline: Instant) -> Result<usize> {
        self.replace(draw_id, pairs, Some(deadline))
    }

    fn replace(&self, draw_id: Uuid, pairs: &[(i64, i64)], deadline: Option<Instant>) -> Result<usize> {
        let draw = draw_id.to_string();
        let now = Utc::now().to_rfc3339();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM assignments", [])?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO assignments (draw_id, giver_id, receiver_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (giver_id, receiver_id) in pairs {
                    stmt.execute(rusqlite::params![draw, giver_id, receiver_id, now])?;
                }
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                // Dropping `tx` rolls back.
                bail!("write deadline passed before commit, draw {} rolled back", draw);
            }
            tx.commit()?;

            debug!("Replaced {} assignments with {} from draw {}", removed, pairs.len(), draw);
            Ok(pairs.len())
        })
    }

    /// Returns the number of pairs removed.
    pub fn clear_assignments(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM assignments", [])?))
    }

    /// All stored pairs in insertion order, with both participants resolved.
    pub fn list_assignments(&self) -> Result<Vec<ResolvedPair>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY a.id", resolved_select()))?;
            let rows = stmt
                .query_map([], resolved_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(ResolvedPairRow::into_model).collect()
        })
    }

    /// The pair in which `participant_id` is the giver.
    pub fn assignment_for_giver(&self, participant_id: i64) -> Result<Option<ResolvedPair>> {
        self.with_conn(|conn| {
            query_one_resolved(conn, &format!("{} WHERE a.giver_id = ?1", resolved_select()), participant_id)
        })
    }

    pub fn assignment_for_telegram_id(&self, telegram_id: i64) -> Result<Option<ResolvedPair>> {
        self.with_conn(|conn| {
            query_one_resolved(conn, &format!("{} WHERE g.telegram_id = ?1", resolved_select()), telegram_id)
        })
    }

    // -- Delivery ledger --

    pub fn append_outcome(&self, outcome: &NewOutcome<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO delivery_outcomes
                    (draw_id, pair_id, giver_id, recipient_id, status, failure_reason, attempted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    outcome.draw_id.to_string(),
                    outcome.pair_id,
                    outcome.giver_id,
                    outcome.recipient_id,
                    outcome.status.as_str(),
                    outcome.failure_reason,
                    outcome.attempted_at.to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Ledger entries in the order they were written, optionally for a single draw.
    pub fn list_outcomes(&self, draw_id: Option<Uuid>) -> Result<Vec<DeliveryOutcome>> {
        const SELECT: &str = "SELECT id, draw_id, pair_id, giver_id, recipient_id, status, failure_reason, attempted_at
             FROM delivery_outcomes";

        self.with_conn(|conn| {
            let rows = match draw_id {
                Some(draw_id) => {
                    let mut stmt = conn.prepare(&format!("{} WHERE draw_id = ?1 ORDER BY id", SELECT))?;
                    let rows = stmt
                        .query_map([draw_id.to_string()], outcome_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT))?;
                    let rows = stmt
                        .query_map([], outcome_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };

            rows.into_iter().map(OutcomeRow::into_model).collect()
        })
    }
}

fn query_participant_by_telegram_id(conn: &Connection, telegram_id: i64) -> Result<Option<Participant>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM participants WHERE telegram_id = ?1",
        PARTICIPANT_COLUMNS
    ))?;

    let row = stmt
        .query_row([telegram_id], |row| ParticipantRow::from_row(row, 0))
        .optional()?;

    row.map(ParticipantRow::into_model).transpose()
}

fn query_one_resolved(conn: &Connection, sql: &str, key: i64) -> Result<Option<ResolvedPair>> {
    let mut stmt = conn.prepare(sql)?;
    let row = stmt.query_row([key], resolved_from_row).optional()?;
    row.map(ResolvedPairRow::into_model).transpose()
}

/// JOIN both participants so callers get resolved profiles in a single query.
fn resolved_select() -> String {
    format!(
        "SELECT a.id, a.draw_id, a.giver_id, a.receiver_id, a.created_at, {}, {}
         FROM assignments a
         JOIN participants g ON g.id = a.giver_id
         JOIN participants r ON r.id = a.receiver_id",
        prefixed_columns("g"),
        prefixed_columns("r"),
    )
}

fn prefixed_columns(alias: &str) -> String {
    PARTICIPANT_COLUMNS
        .split(',')
        .map(|col| format!("{}.{}", alias, col.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn resolved_from_row(row: &Row<'_>) -> rusqlite::Result<ResolvedPairRow> {
    Ok(ResolvedPairRow {
        assignment: AssignmentRow::from_row(row)?,
        giver: ParticipantRow::from_row(row, 5)?,
        receiver: ParticipantRow::from_row(row, 5 + PARTICIPANT_WIDTH)?,
    })
}

fn outcome_from_row(row: &Row<'_>) -> rusqlite::Result<OutcomeRow> {
    Ok(OutcomeRow {
        id: row.get(0)?,
        draw_id: row.get(1)?,
        pair_id: row.get(2)?,
        giver_id: row.get(3)?,
        recipient_id: row.get(4)?,
        status: row.get(5)?,
        failure_reason: row.get(6)?,
        attempted_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

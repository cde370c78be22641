use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (participants, assignments)");
        conn.execute_batch(
            "
            CREATE TABLE participants (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id     INTEGER NOT NULL UNIQUE,
                username        TEXT,
                first_name      TEXT NOT NULL,
                last_name       TEXT,
                full_name       TEXT NOT NULL,
                delivery_info   TEXT NOT NULL,
                gift_wishes     TEXT,
                is_admin        INTEGER NOT NULL DEFAULT 0,
                registered_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One row per giver and per receiver: the stored set is always a bijection.
            CREATE TABLE assignments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                draw_id         TEXT NOT NULL,
                giver_id        INTEGER NOT NULL UNIQUE REFERENCES participants(id),
                receiver_id     INTEGER NOT NULL UNIQUE REFERENCES participants(id),
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (giver_id <> receiver_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (delivery ledger)");
        conn.execute_batch(
            "
            -- Append-only. pair_id is not a foreign key: pairs are replaced by later draws.
            CREATE TABLE delivery_outcomes (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                draw_id         TEXT NOT NULL,
                pair_id         INTEGER NOT NULL,
                giver_id        INTEGER NOT NULL,
                recipient_id    INTEGER NOT NULL,
                status          TEXT NOT NULL CHECK (status IN ('delivered', 'failed')),
                failure_reason  TEXT,
                attempted_at    TEXT NOT NULL
            );

            CREATE INDEX idx_delivery_outcomes_draw
                ON delivery_outcomes(draw_id, id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

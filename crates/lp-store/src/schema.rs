use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 2;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    conn.pragma_update(None, "wal_autocheckpoint", 100)?;

    // Fails on in-memory databases; harmless.
    if conn
        .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        .is_ok()
    {
        tracing::debug!("startup WAL checkpoint complete");
    }

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS topic_progress (
            topic              TEXT PRIMARY KEY,
            current_level      TEXT NOT NULL DEFAULT 'easy',
            is_easy_completed  INTEGER NOT NULL DEFAULT 0,
            is_medium_completed INTEGER NOT NULL DEFAULT 0,
            is_hard_completed  INTEGER NOT NULL DEFAULT 0,
            mastery_score      REAL NOT NULL DEFAULT 0,
            last_played        INTEGER
        );

        CREATE TABLE IF NOT EXISTS review_history (
            topic              TEXT NOT NULL REFERENCES topic_progress(topic) ON DELETE CASCADE,
            position           INTEGER NOT NULL,
            question_id        TEXT NOT NULL,
            difficulty         TEXT NOT NULL,
            last_correct       INTEGER NOT NULL,
            last_response_time REAL NOT NULL,
            attempts           INTEGER NOT NULL DEFAULT 1,
            repetitions        INTEGER NOT NULL,
            ease_factor        REAL NOT NULL,
            interval_days      INTEGER NOT NULL,
            last_reviewed      INTEGER NOT NULL,
            review_count       INTEGER NOT NULL DEFAULT 0,
            lapses             INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (topic, question_id)
        );

        CREATE TABLE IF NOT EXISTS difficulty_unlocks (
            topic      TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            PRIMARY KEY (topic, difficulty)
        );

        CREATE TABLE IF NOT EXISTS module_unlocks (
            module TEXT PRIMARY KEY
        );
        ",
    )?;

    // v1 databases predate per-answer bookkeeping
    for (column, ddl) in [
        ("attempts", "INTEGER NOT NULL DEFAULT 1"),
        ("review_count", "INTEGER NOT NULL DEFAULT 0"),
        ("lapses", "INTEGER NOT NULL DEFAULT 0"),
    ] {
        if conn
            .prepare(&format!("SELECT {column} FROM review_history LIMIT 0"))
            .is_err()
        {
            conn.execute_batch(&format!(
                "ALTER TABLE review_history ADD COLUMN {column} {ddl};"
            ))?;
            tracing::info!("added review_history.{column}");
        }
    }

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}

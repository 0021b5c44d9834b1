use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::parse_datetime,
    models::{ErrorEntry, ErrorSource},
};

/// The log is append-only and keeps only the newest entries.
pub const MAX_ERROR_ENTRIES: i64 = 50;

fn row_to_entry(row: &Row) -> Result<ErrorEntry> {
    let recorded_at: String = row.get("recorded_at")?;
    let source: String = row.get("source")?;

    Ok(ErrorEntry {
        id: row.get("id")?,
        recorded_at: parse_datetime(&recorded_at, "recorded_at")?,
        source: ErrorSource::parse(&source)?,
        message: row.get("message")?,
        session_id: row.get("session_id")?,
    })
}

impl Database {
    /// Append an entry, evicting the oldest ones beyond [`MAX_ERROR_ENTRIES`].
    pub async fn append_error(&self, entry: &ErrorEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO error_log (recorded_at, source, message, session_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.recorded_at.to_rfc3339(),
                    record.source.as_str(),
                    record.message,
                    record.session_id,
                ],
            )
            .with_context(|| "failed to insert error log entry")?;

            // Same transaction as the insert so concurrent appends cannot overshoot the cap.
            tx.execute(
                "DELETE FROM error_log
                 WHERE id NOT IN (SELECT id FROM error_log ORDER BY id DESC LIMIT ?1)",
                params![MAX_ERROR_ENTRIES],
            )
            .with_context(|| "failed to evict old error log entries")?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Newest entries first.
    pub async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorEntry>> {
        let limit = i64::try_from(limit).unwrap_or(MAX_ERROR_ENTRIES);
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, recorded_at, source, message, session_id
                 FROM error_log
                 ORDER BY id DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                entries.push(row_to_entry(row)?);
            }
            Ok(entries)
        })
        .await
    }

    pub async fn count_errors(&self) -> Result<i64> {
        self.execute(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM error_log", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }
}

use rusqlite::{Connection, OptionalExtension};

use super::Store;
use crate::error::{Error, Result};

impl Store {
    /// The last update id the dispatch loop processed, or 0 when none was recorded.
    pub async fn last_update_id(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        read_marker(&conn)
    }

    /// Record `update_id` as processed: insert the row if absent, update it otherwise.
    ///
    /// Read-then-write is not atomic; only one dispatch loop may run per database.
    pub async fn set_last_update_id(&self, update_id: i64) -> Result<()> {
        let conn = self.conn.lock().await;

        let has_row: bool =
            conn.query_row("SELECT COUNT(*) > 0 FROM lastupdate", [], |row| row.get(0))?;

        let sql = if has_row {
            "UPDATE lastupdate SET last_update_id = ?1"
        } else {
            "INSERT INTO lastupdate (last_update_id) VALUES (?1)"
        };
        conn.execute(sql, rusqlite::params![update_id.to_string()])?;
        Ok(())
    }
}

fn read_marker(conn: &Connection) -> Result<i64> {
    let raw: Option<String> = conn
        .query_row("SELECT last_update_id FROM lastupdate LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?;

    match raw {
        None => Ok(0),
        Some(value) if value.trim().is_empty() => Ok(0),
        Some(value) => value.trim().parse().map_err(|_| Error::CorruptMarker(value)),
    }
}

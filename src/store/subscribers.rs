use rusqlite::{Connection, ErrorCode, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use super::Store;
use crate::error::{Error, Result};

/// A registered bridge user and the bearer token issued to them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct Subscriber {
    /// Telegram user id, string-encoded
    pub user_id: String,
    pub username: String,
    pub token: String,
}

impl Subscriber {
    /// Private chats share their id with the user, so replies go to this chat.
    pub fn chat_id(&self) -> std::result::Result<i64, std::num::ParseIntError> {
        self.user_id.trim().parse()
    }
}

impl Store {
    /// Look up the subscriber that owns `token`.
    pub async fn subscriber_by_token(&self, token: &str) -> Result<Option<Subscriber>> {
        let conn = self.conn.lock().await;
        let subscriber = conn
            .query_row(
                "SELECT telegram_user_id, username, token FROM subscribers WHERE token = ?1",
                rusqlite::params![token],
                parse_subscriber_row,
            )
            .optional()?;
        Ok(subscriber)
    }

    #[allow(dead_code)]
    pub async fn subscriber_exists(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        exists(&conn, user_id)
    }

    /// Register a new subscriber and return its freshly generated token.
    ///
    /// Fails with [`Error::Conflict`] when the user id is already registered;
    /// the existing row is left untouched.
    pub async fn insert_subscriber(&self, user_id: &str, username: &str) -> Result<String> {
        let conn = self.conn.lock().await;

        if exists(&conn, user_id)? {
            return Err(Error::Conflict);
        }

        let token = Uuid::new_v4().to_string();
        match conn.execute(
            "INSERT INTO subscribers (telegram_user_id, username, token) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, username, &token],
        ) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(Error::Conflict);
            }
            Err(e) => return Err(e.into()),
        }

        info!("Registered subscriber {} ({})", user_id, username);
        Ok(token)
    }

    /// Whether `token` belongs to any subscriber.
    pub async fn authorize_token(&self, token: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscribers WHERE token = ?1",
            rusqlite::params![token],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Append an outbound text to the message log.
    pub async fn insert_message(&self, user_id: &str, text: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO messages (telegram_user_id, message) VALUES (?1, ?2)",
            rusqlite::params![user_id, text],
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn messages_for(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT message FROM messages WHERE telegram_user_id = ?1 ORDER BY id ASC",
        )?;
        let messages = stmt
            .query_map(rusqlite::params![user_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(messages)
    }

    #[cfg(test)]
    pub(crate) async fn subscriber_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        Ok(conn.query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))?)
    }
}

fn exists(conn: &Connection, user_id: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT username FROM subscribers WHERE telegram_user_id = ?1",
            rusqlite::params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn parse_subscriber_row(row: &rusqlite::Row) -> rusqlite::Result<Subscriber> {
    Ok(Subscriber {
        user_id: row.get(0)?,
        username: row.get(1)?,
        token: row.get(2)?,
    })
}

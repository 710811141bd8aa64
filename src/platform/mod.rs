pub mod telegram;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::error::Result;

/// One inbound event from the messaging service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUpdate {
    /// Monotonically increasing id assigned by the service
    pub update_id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    /// Display name of the originating chat
    pub username: String,
    /// Message text; empty for non-text updates
    pub text: String,
}

/// The two Bot API calls the bridge relies on.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Fetch the pending updates, oldest first.
    async fn get_updates(&self) -> Result<Vec<RemoteUpdate>>;

    /// Send `text` to `chat_id`. Exactly one attempt is made.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

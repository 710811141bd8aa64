use tracing::info;

use super::command::Command;
use crate::error::{Error, Result};
use crate::platform::MessagingApi;
use crate::store::Store;

pub const ALREADY_SUBSCRIBED: &str = "already subbed";

pub fn token_reply(token: &str) -> String {
    format!("your token to use with the bridge {}", token)
}

/// Chat commands the bridge answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Identify,
    Register,
}

impl Handler {
    /// Match a root token exactly; anything else has no handler.
    pub fn for_root(root: &str) -> Option<Self> {
        match root {
            "/getid" | "/identify" => Some(Handler::Identify),
            "/subscribe" | "/register" => Some(Handler::Register),
            _ => None,
        }
    }

    pub async fn run(self, store: &Store, api: &dyn MessagingApi, command: &Command) -> Result<()> {
        match self {
            Handler::Identify => identify(api, command).await,
            Handler::Register => register(store, api, command).await,
        }
    }
}

/// Reply with the caller's user id.
pub async fn identify(api: &dyn MessagingApi, command: &Command) -> Result<()> {
    api.send_message(command.chat_id, &command.user_id.to_string())
        .await
}

/// Register the caller and reply with a fresh token, or with a fixed notice
/// when they are already registered. An existing token is never resent.
pub async fn register(store: &Store, api: &dyn MessagingApi, command: &Command) -> Result<()> {
    let user_id = command.user_id.to_string();
    match store.insert_subscriber(&user_id, &command.username).await {
        Ok(token) => api.send_message(command.chat_id, &token_reply(&token)).await,
        Err(Error::Conflict) => {
            info!("User {} is already subscribed", user_id);
            api.send_message(command.chat_id, ALREADY_SUBSCRIBED).await
        }
        Err(e) => Err(e),
    }
}

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{MessagingApi, RemoteUpdate};
use crate::error::{Error, Result};

/// Envelope returned by `getUpdates`.
#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[serde(default)]
    from: Option<TelegramUser>,
    chat: TelegramChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

impl From<TelegramUpdate> for RemoteUpdate {
    fn from(update: TelegramUpdate) -> Self {
        match update.message {
            Some(msg) => RemoteUpdate {
                update_id: update.update_id,
                user_id: msg.from.map(|u| u.id).unwrap_or_default(),
                chat_id: msg.chat.id,
                username: msg.chat.username.unwrap_or_default(),
                text: msg.text.unwrap_or_default(),
            },
            // Non-message updates still advance the dedup state, they just carry no text.
            None => RemoteUpdate {
                update_id: update.update_id,
                user_id: 0,
                chat_id: 0,
                username: String::new(),
                text: String::new(),
            },
        }
    }
}

/// Plain HTTP client for the Telegram Bot API.
pub struct TelegramClient {
    client: reqwest::Client,
    /// `https://api.telegram.org/bot<TOKEN>`, without trailing slash
    base_url: String,
}

impl TelegramClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MessagingApi for TelegramClient {
    async fn get_updates(&self) -> Result<Vec<RemoteUpdate>> {
        let url = format!("{}/getUpdates", self.base_url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                method: "getUpdates",
                status,
            });
        }

        let body = response.bytes().await?;
        let parsed: UpdatesResponse = serde_json::from_slice(&body)?;

        debug!("getUpdates returned {} update(s)", parsed.result.len());
        Ok(parsed.result.into_iter().map(RemoteUpdate::from).collect())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/sendMessage", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("chat_id", chat_id.to_string().as_str()), ("text", text)])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Status {
                method: "sendMessage",
                status,
            });
        }

        debug!("Sent message to chat {}", chat_id);
        Ok(())
    }
}

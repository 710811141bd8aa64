//! In-process stand-in for the Bot API used by the pipeline and HTTP tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{MessagingApi, RemoteUpdate};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct FakeApi {
    batches: Mutex<VecDeque<Result<Vec<RemoteUpdate>>>>,
    sent: Mutex<Vec<(i64, String)>>,
    fail_sends: AtomicBool,
    send_delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch for a future `get_updates`; an exhausted queue yields empty batches.
    pub fn push_batch(&self, batch: Vec<RemoteUpdate>) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self, err: Error) {
        self.batches.lock().unwrap().push_back(Err(err));
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Make every `send_message` take `delay` before it is recorded.
    pub fn delay_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingApi for FakeApi {
    async fn get_updates(&self) -> Result<Vec<RemoteUpdate>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Status {
                method: "sendMessage",
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// A private-chat text update from `user_id`.
pub fn update(update_id: i64, user_id: i64, text: &str) -> RemoteUpdate {
    RemoteUpdate {
        update_id,
        user_id,
        chat_id: user_id,
        username: format!("user{}", user_id),
        text: text.to_string(),
    }
}

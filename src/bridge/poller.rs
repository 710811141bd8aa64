use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::command::{Command, Handoff};
use super::sink::ErrorSink;
use crate::config::BatchMode;
use crate::error::Result;
use crate::platform::{MessagingApi, RemoteUpdate};

/// Fetches update batches and turns new updates into commands.
///
/// `last_seen` lives only here; the dispatch loop never sees it.
pub struct Poller {
    api: Arc<dyn MessagingApi>,
    sink: ErrorSink,
    mode: BatchMode,
    interval: Duration,
    last_seen: i64,
}

impl Poller {
    pub fn new(
        api: Arc<dyn MessagingApi>,
        sink: ErrorSink,
        mode: BatchMode,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            sink,
            mode,
            interval,
            last_seen: 0,
        }
    }

    /// Start from an already processed update id instead of 0.
    pub fn with_last_seen(mut self, update_id: i64) -> Self {
        self.last_seen = update_id;
        self
    }

    #[cfg(test)]
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    /// One fetch: returns the commands to emit for this batch.
    pub async fn poll_once(&mut self) -> Result<Vec<Command>> {
        let batch = self.api.get_updates().await?;
        Ok(self.select(batch))
    }

    fn select(&mut self, mut batch: Vec<RemoteUpdate>) -> Vec<Command> {
        match self.mode {
            BatchMode::Tail => {
                let Some(last) = batch.pop() else {
                    return Vec::new();
                };
                if last.update_id == self.last_seen {
                    return Vec::new();
                }
                self.last_seen = last.update_id;
                Command::from_update(&last).into_iter().collect()
            }
            BatchMode::Suffix => {
                let mut commands = Vec::new();
                for update in batch {
                    if update.update_id <= self.last_seen {
                        continue;
                    }
                    self.last_seen = update.update_id;
                    commands.extend(Command::from_update(&update));
                }
                commands
            }
        }
    }

    /// Poll forever, handing each command to `tx` and waiting until the
    /// dispatch loop has handled it. Fetch errors go to the error sink and
    /// the next iteration retries after the poll interval.
    pub async fn run(mut self, tx: mpsc::Sender<Handoff>, cancel: CancellationToken) {
        info!(mode = %self.mode, last_seen = self.last_seen, "Update poller started");

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.poll_once() => polled,
            };

            match polled {
                Ok(commands) => {
                    for command in commands {
                        debug!(
                            update_id = command.update_id,
                            root = %command.root,
                            "Emitting command"
                        );
                        match self.hand_off(&tx, command, &cancel).await {
                            Delivery::Handled => {}
                            Delivery::Cancelled => break,
                            Delivery::Closed => {
                                info!("Dispatch loop is gone, stopping poller");
                                return;
                            }
                        }
                    }
                }
                Err(e) => self.sink.report("poll", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Update poller stopped");
    }

    async fn hand_off(
        &self,
        tx: &mpsc::Sender<Handoff>,
        command: Command,
        cancel: &CancellationToken,
    ) -> Delivery {
        let (handoff, handled) = Handoff::new(command);
        tokio::select! {
            _ = cancel.cancelled() => return Delivery::Cancelled,
            sent = tx.send(handoff) => {
                if sent.is_err() {
                    return Delivery::Closed;
                }
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => Delivery::Cancelled,
            done = handled => match done {
                Ok(()) => Delivery::Handled,
                Err(_) => Delivery::Closed,
            },
        }
    }
}

enum Delivery {
    Handled,
    Cancelled,
    Closed,
}

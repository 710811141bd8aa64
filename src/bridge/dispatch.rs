use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::command::{Command, Handoff};
use super::handlers::Handler;
use super::sink::ErrorSink;
use crate::platform::MessagingApi;
use crate::store::Store;

/// What happened to a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The persisted marker already equals this update id.
    Duplicate,
    /// The marker could not be read or written; nothing else ran.
    Abandoned,
    /// Marker advanced, no handler for the root token.
    Ignored,
    Handled,
    /// Marker advanced, the handler ran and failed.
    HandlerFailed,
}

/// Consumes commands one at a time, deduplicating against the persisted marker.
pub struct Dispatcher {
    store: Store,
    api: Arc<dyn MessagingApi>,
    sink: ErrorSink,
}

impl Dispatcher {
    pub fn new(store: Store, api: Arc<dyn MessagingApi>, sink: ErrorSink) -> Self {
        Self { store, api, sink }
    }

    /// Run one command through dedup, marker persistence and its handler.
    /// Errors are reported to the sink, never returned.
    pub async fn dispatch(&self, command: &Command) -> Outcome {
        let marker = match self.store.last_update_id().await {
            Ok(marker) => marker,
            Err(e) => {
                self.sink.report("marker read", e);
                return Outcome::Abandoned;
            }
        };

        if marker == command.update_id {
            debug!(update_id = command.update_id, "Update already processed, skipping");
            return Outcome::Duplicate;
        }

        if let Err(e) = self.store.set_last_update_id(command.update_id).await {
            self.sink.report("marker write", e);
            return Outcome::Abandoned;
        }

        let Some(handler) = Handler::for_root(&command.root) else {
            debug!(root = %command.root, "No handler for command");
            return Outcome::Ignored;
        };

        info!(
            update_id = command.update_id,
            user_id = command.user_id,
            ?handler,
            "Handling command"
        );

        match handler.run(&self.store, self.api.as_ref(), command).await {
            Ok(()) => Outcome::Handled,
            Err(e) => {
                self.sink.report("handler", e);
                Outcome::HandlerFailed
            }
        }
    }

    /// Process commands in arrival order until cancelled or the poller is gone.
    ///
    /// Cancellation is only observed between commands: a command whose
    /// marker is already persisted always runs to the end of its handler.
    pub async fn run(self, mut rx: mpsc::Receiver<Handoff>, cancel: CancellationToken) {
        info!("Dispatch loop started");

        loop {
            let handoff = tokio::select! {
                _ = cancel.cancelled() => break,
                handoff = rx.recv() => match handoff {
                    Some(handoff) => handoff,
                    None => break,
                },
            };

            self.dispatch(&handoff.command).await;
            handoff.complete();
        }

        info!("Dispatch loop stopped");
    }
}

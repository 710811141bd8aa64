//! Update ingestion and command dispatch.
//!
//! Three tasks: the poller fetches updates and hands each command to the
//! dispatcher, waiting until it is handled before fetching again; the
//! dispatcher handles them one by one; and the error sink drain logs every
//! failure either of them reports.

pub mod command;
pub mod dispatch;
pub mod handlers;
pub mod poller;
pub mod sink;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::PollerConfig;
use crate::platform::MessagingApi;
use crate::store::Store;

pub use command::Handoff;
pub use dispatch::Dispatcher;
pub use poller::Poller;
pub use sink::ErrorSink;

/// Join handles of the running pipeline tasks.
pub struct Pipeline {
    pub poller: JoinHandle<()>,
    pub dispatcher: JoinHandle<()>,
    pub sink: JoinHandle<()>,
}

impl Pipeline {
    /// Spawn the poller, dispatcher and error-sink drain.
    ///
    /// `last_seen` seeds the poller's in-memory dedup, usually with the
    /// persisted marker.
    pub fn spawn(
        api: Arc<dyn MessagingApi>,
        store: Store,
        config: &PollerConfig,
        last_seen: i64,
        cancel: CancellationToken,
    ) -> Self {
        let (sink, errors) = ErrorSink::channel();
        // Each handoff is acknowledged, so at most one command is ever in flight.
        let (tx, rx) = mpsc::channel::<Handoff>(1);

        let poller = Poller::new(
            Arc::clone(&api),
            sink.clone(),
            config.batch_mode,
            config.poll_interval(),
        )
        .with_last_seen(last_seen);
        let dispatcher = Dispatcher::new(store, api, sink);

        Self {
            sink: tokio::spawn(sink::drain(errors, cancel.clone())),
            poller: tokio::spawn(poller.run(tx, cancel.clone())),
            dispatcher: tokio::spawn(dispatcher.run(rx, cancel)),
        }
    }

    /// Wait for every task to finish, logging any that panicked.
    pub async fn join(self) {
        let (poller, dispatcher, sink) = tokio::join!(self.poller, self.dispatcher, self.sink);
        for (task, result) in [("poller", poller), ("dispatcher", dispatcher), ("error sink", sink)] {
            if let Err(e) = result {
                error!(task, "Pipeline task failed: {}", e);
            }
        }
    }
}

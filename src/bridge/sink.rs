use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::Error;

/// A failure observed somewhere in the pipeline.
#[derive(Debug)]
pub struct Report {
    /// Pipeline stage that produced the error, e.g. "poll" or "reply"
    pub stage: &'static str,
    pub error: Error,
}

/// Producer side of the error channel. Reporting never blocks.
#[derive(Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<Report>,
}

impl ErrorSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn report(&self, stage: &'static str, error: Error) {
        if let Err(mpsc::error::SendError(lost)) = self.tx.send(Report { stage, error }) {
            warn!(stage = lost.stage, "error sink closed, dropping: {}", lost.error);
        }
    }
}

/// Log every report until cancelled or until all producers are gone.
pub async fn drain(mut rx: mpsc::UnboundedReceiver<Report>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            report = rx.recv() => match report {
                Some(report) => log_report(&report),
                None => return,
            },
        }
    }

    // Flush whatever was queued before shutdown.
    while let Ok(report) = rx.try_recv() {
        log_report(&report);
    }
}

fn log_report(report: &Report) {
    error!(stage = report.stage, "{}", report.error);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrupt_marker() -> Error {
        Error::CorruptMarker("not-a-number".to_string())
    }

    #[tokio::test]
    async fn test_report_does_not_block_without_consumer() {
        let (sink, mut rx) = ErrorSink::channel();
        for _ in 0..1000 {
            sink.report("poll", corrupt_marker());
        }
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 1000);
    }

    #[tokio::test]
    async fn test_report_after_receiver_dropped_is_harmless() {
        let (sink, rx) = ErrorSink::channel();
        drop(rx);
        sink.report("reply", corrupt_marker());
    }

    #[tokio::test]
    async fn test_drain_stops_when_producers_gone() {
        let (sink, rx) = ErrorSink::channel();
        sink.report("poll", corrupt_marker());
        drop(sink);
        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            drain(rx, CancellationToken::new()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_drain_stops_on_cancel() {
        let (_sink, rx) = ErrorSink::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), drain(rx, cancel))
            .await
            .unwrap();
    }
}

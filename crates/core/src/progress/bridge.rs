//! Throttled single-writer channel.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::sink::ProgressSink;
use crate::delivery::DeliveryError;
use crate::metrics;

/// Longest pause honored when the display surface asks us to slow down.
const MAX_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(30);

/// A byte-progress sample from the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub bytes_transferred: u64,
    /// Total size, or the best estimate the fetcher has.
    pub total_bytes: Option<u64>,
    pub at: Instant,
    /// Set on the final event of a fetch.
    pub complete: bool,
}

impl ProgressEvent {
    pub fn new(bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
            at: Instant::now(),
            complete: false,
        }
    }

    pub fn at(mut self, at: Instant) -> Self {
        self.at = at;
        self
    }

    /// Percentage in `0.0..=100.0`. Unknown or zero totals count as one byte.
    pub fn percent(&self) -> f64 {
        let total = self.total_bytes.unwrap_or(0).max(1);
        ((self.bytes_transferred as f64 / total as f64) * 100.0).min(100.0)
    }
}

/// Creates a connected reporter/pump pair.
pub fn progress_bridge(interval: Duration) -> (ProgressReporter, ProgressPump) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressReporter {
            tx,
            interval,
            last_sent: None,
            finished: false,
        },
        ProgressPump { rx },
    )
}

/// Worker side of the bridge.
///
/// Not `Clone`: one worker, one writer. Dropping it closes the bridge.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    interval: Duration,
    last_sent: Option<Instant>,
    finished: bool,
}

impl ProgressReporter {
    /// Offers an event. Returns whether it passed the throttle.
    pub fn notify(&mut self, event: ProgressEvent) -> bool {
        if self.finished {
            return false;
        }
        if event.complete {
            return self.send(event);
        }
        if let Some(last) = self.last_sent {
            if event.at.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.send(event)
    }

    /// Sends the final event. Always forwarded, at most once.
    pub fn complete(&mut self, bytes_transferred: u64, total_bytes: Option<u64>) -> bool {
        let mut event = ProgressEvent::new(bytes_transferred, total_bytes.or(Some(bytes_transferred)));
        event.complete = true;
        self.notify(event)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn send(&mut self, event: ProgressEvent) -> bool {
        self.last_sent = Some(event.at);
        if event.complete {
            self.finished = true;
        }
        // A closed receiver means nobody is watching any more.
        self.tx.send(event).is_ok()
    }
}

/// What the pump did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpSummary {
    pub received: usize,
    pub delivered: usize,
    /// The sink reported its target gone and was abandoned.
    pub detached: bool,
}

/// Caller side of the bridge.
#[derive(Debug)]
pub struct ProgressPump {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressPump {
    /// Forwards events to `sink` until the reporter is dropped.
    ///
    /// Sink failures never end the pump early: a vanished target detaches the
    /// sink and the remaining events are drained silently.
    pub async fn run<S>(mut self, sink: S) -> PumpSummary
    where
        S: ProgressSink,
    {
        let mut summary = PumpSummary::default();

        while let Some(event) = self.rx.recv().await {
            summary.received += 1;
            if summary.detached {
                continue;
            }

            match sink.show(&event).await {
                Ok(()) => {
                    summary.delivered += 1;
                    metrics::PROGRESS_UPDATES.with_label_values(&["delivered"]).inc();
                }
                Err(DeliveryError::TargetGone { reason }) => {
                    debug!(reason = %reason, "Progress target gone, detaching");
                    metrics::PROGRESS_UPDATES.with_label_values(&["detached"]).inc();
                    summary.detached = true;
                }
                Err(DeliveryError::NotModified) => {}
                Err(DeliveryError::RateLimited { retry_after_secs }) => {
                    let pause = Duration::from_secs(retry_after_secs).min(MAX_RATE_LIMIT_PAUSE);
                    debug!(pause_secs = pause.as_secs(), "Progress updates rate limited");
                    metrics::PROGRESS_UPDATES.with_label_values(&["rate_limited"]).inc();
                    tokio::time::sleep(pause).await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to show progress");
                    metrics::PROGRESS_UPDATES.with_label_values(&["failed"]).inc();
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    #[test]
    fn test_throttle_drops_events_inside_window() {
        let (mut reporter, _pump) = progress_bridge(Duration::from_secs(1));
        let base = Instant::now();

        assert!(reporter.notify(ProgressEvent::new(10, Some(100)).at(base)));
        assert!(!reporter.notify(
            ProgressEvent::new(20, Some(100)).at(base + Duration::from_millis(400))
        ));
        assert!(!reporter.notify(
            ProgressEvent::new(30, Some(100)).at(base + Duration::from_millis(999))
        ));
        assert!(reporter.notify(
            ProgressEvent::new(40, Some(100)).at(base + Duration::from_millis(1000))
        ));
    }

    #[test]
    fn test_complete_bypasses_throttle_once() {
        let (mut reporter, _pump) = progress_bridge(Duration::from_secs(60));

        assert!(reporter.notify(ProgressEvent::new(1, Some(100))));
        assert!(reporter.complete(100, Some(100)));
        assert!(reporter.is_finished());
        assert!(!reporter.complete(100, Some(100)));
        assert!(!reporter.notify(ProgressEvent::new(100, Some(100))));
    }

    #[test]
    fn test_percent_handles_unknown_total() {
        assert_eq!(ProgressEvent::new(50, Some(200)).percent(), 25.0);
        assert_eq!(ProgressEvent::new(0, None).percent(), 0.0);
        assert_eq!(ProgressEvent::new(500, Some(100)).percent(), 100.0);
    }

    #[tokio::test]
    async fn test_pump_forwards_from_blocking_thread() {
        let (mut reporter, pump) = progress_bridge(Duration::from_millis(0));
        let sink = RecordingSink::new();

        let worker = std::thread::spawn(move || {
            for i in 1..=5u64 {
                reporter.notify(ProgressEvent::new(i * 10, Some(50)));
            }
            reporter.complete(50, Some(50));
        });

        let summary = pump.run(sink.clone()).await;
        worker.join().unwrap();

        assert_eq!(summary.received, 6);
        assert_eq!(summary.delivered, 6);
        let shown = sink.shown();
        assert!(shown.last().unwrap().complete);
        assert!(shown.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[tokio::test]
    async fn test_pump_detaches_when_target_gone() {
        let (mut reporter, pump) = progress_bridge(Duration::from_millis(0));
        let sink = RecordingSink::new();
        sink.set_next_error(DeliveryError::target_gone("message to edit not found"));

        reporter.notify(ProgressEvent::new(1, Some(3)));
        reporter.notify(ProgressEvent::new(2, Some(3)));
        reporter.complete(3, Some(3));
        drop(reporter);

        let summary = pump.run(sink.clone()).await;

        assert_eq!(summary.received, 3);
        assert_eq!(summary.delivered, 0);
        assert!(summary.detached);
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test]
    async fn test_pump_survives_transient_sink_errors() {
        let (mut reporter, pump) = progress_bridge(Duration::from_millis(0));
        let sink = RecordingSink::new();
        sink.set_next_error(DeliveryError::Network("connection reset".to_string()));

        reporter.notify(ProgressEvent::new(1, Some(2)));
        reporter.complete(2, Some(2));
        drop(reporter);

        let summary = pump.run(sink.clone()).await;
        assert_eq!(summary.delivered, 1);
        assert!(!summary.detached);
    }
}

//! Background flush loop for queued telemetry

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::service::Telemetry;
use super::sink::WebhookSink;

/// Shortest accepted flush period; `interval_at` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a running flush loop. Dropping it without calling
/// [`shutdown`](FlushLoop::shutdown) also ends the loop after a last flush.
pub struct FlushLoop {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl FlushLoop {
    pub(crate) fn spawn<S: WebhookSink>(telemetry: Arc<Telemetry<S>>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = period.max(MIN_PERIOD);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => {
                        tracing::debug!("Telemetry flush loop stopping");
                        telemetry.flush().await;
                        break;
                    }

                    _ = ticker.tick() => {
                        telemetry.flush().await;
                    }
                }
            }
        });

        FlushLoop {
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Stop the loop after a final flush and wait for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Telemetry flush loop ended abnormally");
        }
    }
}

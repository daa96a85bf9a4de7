//! Periodic sample, store and evaluate loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::alerts::{Evaluation, ThresholdEvaluator};
use crate::sampler::{sample_off_thread, Sampler};
use crate::storage::MetricStore;

/// Production collection period
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(30);

/// What one cycle managed to do
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Id of the stored row, `None` if sampling or the write failed
    pub row_id: Option<u64>,
    /// `None` if no reading was produced
    pub evaluation: Option<Evaluation>,
}

/// Drives the sampler, the store and the threshold evaluator
pub struct Collector {
    sampler: Arc<dyn Sampler>,
    store: Arc<MetricStore>,
    evaluator: Arc<ThresholdEvaluator>,
}

impl Collector {
    pub fn new(
        sampler: Arc<dyn Sampler>,
        store: Arc<MetricStore>,
        evaluator: Arc<ThresholdEvaluator>,
    ) -> Self {
        Self {
            sampler,
            store,
            evaluator,
        }
    }

    /// Run one cycle. Every failure is logged and absorbed here.
    pub async fn run_cycle(&self) -> CycleReport {
        let reading = match sample_off_thread(Arc::clone(&self.sampler)).await {
            Ok(reading) => reading,
            Err(e) => {
                tracing::error!(error = %e, "Error in metrics collection");
                return CycleReport::default();
            }
        };

        let row_id = match self.store.insert(&reading) {
            Ok(row) => Some(row.id),
            Err(e) => {
                tracing::error!(error = %e, "Error storing metrics, reading dropped");
                None
            }
        };

        tracing::debug!(
            cpu = reading.cpu_pct,
            memory = reading.memory_pct,
            disk = reading.disk_pct,
            "Checking metrics against thresholds"
        );
        let evaluation = self.evaluator.evaluate(&reading).await;

        CycleReport {
            row_id,
            evaluation: Some(evaluation),
        }
    }

    /// Run one cycle immediately, then every `period` until the returned
    /// handle is shut down. Missed ticks are delayed rather than bunched, so
    /// the CPU measurement window stretches the cadence instead of
    /// stacking cycles.
    pub fn start(self: Arc<Self>, period: Duration) -> CollectorHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let period = period.max(Duration::from_millis(1));

        let join = tokio::spawn(async move {
            tracing::info!("Starting metrics collection every {:?}", period);

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // Shutdown wins over a tick that came due during a slow cycle
                tokio::select! {
                    biased;

                    _ = shutdown_rx.recv() => {
                        tracing::info!("Metrics collection shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                }
            }
        });

        CollectorHandle {
            shutdown_tx,
            join,
        }
    }
}

/// Cancellation handle for a running collector
pub struct CollectorHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl CollectorHandle {
    /// Stop scheduling cycles and wait up to `grace` for the in-flight one.
    ///
    /// Returns `false` if the cycle had to be abandoned.
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        let _ = self.shutdown_tx.send(()).await;

        match tokio::time::timeout(grace, &mut self.join).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Collector task failed");
                false
            }
            Err(_) => {
                tracing::warn!("Collector did not stop within {:?}, abandoning cycle", grace);
                self.join.abort();
                false
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

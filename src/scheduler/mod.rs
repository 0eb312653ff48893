//! Polling scheduler.
//!
//! A single ticker drives pipeline runs. Runs never overlap: each run is
//! awaited before the next tick is honored, and a tick that came due
//! during a long run fires once the run finishes instead of bursting.
//! Shutdown lets the current run finish.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::pipeline::PipelineRunner;

pub struct PollScheduler {
    runner: Arc<dyn PipelineRunner>,
    config: SchedulerConfig,
}

impl PollScheduler {
    pub fn new(runner: Arc<dyn PipelineRunner>, config: SchedulerConfig) -> Self {
        Self { runner, config }
    }

    /// Run until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.config.poll_interval.as_secs(), "poll scheduler started");

        loop {
            tokio::select! {
                // Shutdown wins over a tick that is due at the same time.
                biased;
                _ = cancel.cancelled() => {
                    info!("poll scheduler stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            match self.runner.run(Utc::now()).await {
                Ok(report) => {
                    if report.fetched > 0 {
                        info!(
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            accepted = report.accepted,
                            dispatched = report.dispatched,
                            "run finished"
                        );
                    }
                }
                Err(err) => error!(error = %err, "run failed, next tick will retry"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::pipeline::{PipelineRunner, RunReport};
    use crate::Result;

    struct SlowRunner {
        runs: AtomicUsize,
        run_time: Duration,
    }

    #[async_trait]
    impl PipelineRunner for SlowRunner {
        async fn run(&self, _now: DateTime<Utc>) -> Result<RunReport> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.run_time).await;
            Ok(RunReport::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn long_run_defers_the_next_tick_instead_of_overlapping() {
        // Each run takes 12s against a 5s interval. Runs must start
        // back-to-back (t=0, 12, 24), never concurrently, and the ticks
        // missed during a run must not burst.
        let runner = Arc::new(SlowRunner {
            runs: AtomicUsize::new(0),
            run_time: Duration::from_secs(12),
        });
        let scheduler = PollScheduler::new(
            Arc::clone(&runner) as Arc<dyn PipelineRunner>,
            SchedulerConfig {
                poll_interval: Duration::from_secs(5),
            },
        );
        let cancel = CancellationToken::new();

        let stop = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(stop).await });

        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(runner.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_runs() {
        let runner = Arc::new(SlowRunner {
            runs: AtomicUsize::new(0),
            run_time: Duration::from_secs(1),
        });
        let scheduler = PollScheduler::new(
            Arc::clone(&runner) as Arc<dyn PipelineRunner>,
            SchedulerConfig {
                poll_interval: Duration::from_secs(5),
            },
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler.run(cancel).await;
        assert_eq!(runner.runs.load(Ordering::SeqCst), 0);
    }
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Result;
use crate::metrics::CollectorMetrics;

/// Outcome of one successful cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub batches: usize,
    pub records: usize,
    /// Where the next cycle starts from.
    pub watermark: Option<DateTime<Utc>>,
}

/// One unit of recurring work. A cycle returning a transient error must have persisted the
/// progress it made before failing.
#[trait_variant::make(PollTask: Send)]
pub trait LocalPollTask {
    fn name(&self) -> &str;

    async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport>;
}

/// Runs a [PollTask] every `frequency` until cancelled or until a cycle fails with a
/// non-transient error. A cycle running longer than `frequency` is followed immediately by the
/// next one.
pub struct PollLoop<T> {
    task: T,
    frequency: Duration,
    cancel: CancellationToken,
    metrics: Option<CollectorMetrics>,
}

impl<T> PollLoop<T>
where
    T: PollTask,
{
    pub fn new(task: T, frequency: Duration, cancel: CancellationToken) -> Self {
        Self {
            task,
            frequency,
            cancel,
            metrics: None,
        }
    }

    /// Records the duration of every cycle in `metrics`.
    pub fn with_metrics(mut self, metrics: CollectorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(mut self) -> Result<()> {
        info!(collector = self.task.name(), frequency = ?self.frequency, "Starting poll loop");

        loop {
            if self.cancel.is_cancelled() {
                info!(collector = self.task.name(), "Poll loop stopped");
                return Ok(());
            }

            let started = Instant::now();
            let outcome = self.task.run_cycle(&self.cancel).await;
            if let Some(metrics) = &self.metrics {
                metrics.observe_cycle(started.elapsed());
            }
            match outcome {
                Ok(report) => info!(
                    collector = self.task.name(),
                    batches = report.batches,
                    records = report.records,
                    watermark = ?report.watermark,
                    elapsed = ?started.elapsed(),
                    "Cycle complete"
                ),
                Err(e) if e.is_transient() => {
                    warn!(collector = self.task.name(), error = %e, "Cycle ended early, retrying next cycle");
                }
                Err(e) => {
                    error!(collector = self.task.name(), error = %e, "Cycle failed, stopping");
                    return Err(e);
                }
            }

            let Some(remaining) = self.frequency.checked_sub(started.elapsed()) else {
                continue;
            };
            if remaining.is_zero() {
                continue;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(remaining) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{CycleReport, PollLoop, PollTask};
    use crate::metrics::CollectorMetrics;
    use crate::{Error, Result};
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use std::time::Duration;

    /// Replays scripted cycle outcomes, cancelling the loop when the script runs out.
    struct ScriptedTask {
        outcomes: VecDeque<Result<CycleReport>>,
        cycle_duration: Duration,
        started_at: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedTask {
        fn new(outcomes: impl IntoIterator<Item = Result<CycleReport>>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                cycle_duration: Duration::ZERO,
                started_at: Arc::default(),
            }
        }
    }

    impl PollTask for ScriptedTask {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run_cycle(&mut self, cancel: &CancellationToken) -> Result<CycleReport> {
            self.started_at.lock().push(Instant::now());
            tokio::time::sleep(self.cycle_duration).await;
            let outcome = self.outcomes.pop_front();
            if self.outcomes.is_empty() {
                cancel.cancel();
            }
            outcome.unwrap_or_else(|| Ok(CycleReport::default()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_paced_by_frequency() {
        let task = ScriptedTask {
            cycle_duration: Duration::from_secs(3),
            ..ScriptedTask::new([
                Ok(CycleReport::default()),
                Ok(CycleReport::default()),
                Ok(CycleReport::default()),
            ])
        };
        let started_at = Arc::clone(&task.started_at);

        PollLoop::new(task, Duration::from_secs(10), CancellationToken::new())
            .run()
            .await
            .unwrap();

        let started_at = started_at.lock().clone();
        assert_eq!(started_at.len(), 3);
        for pair in started_at.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(10));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_not_followed_by_sleep() {
        let task = ScriptedTask {
            cycle_duration: Duration::from_secs(15),
            ..ScriptedTask::new([Ok(CycleReport::default()), Ok(CycleReport::default())])
        };
        let started_at = Arc::clone(&task.started_at);

        PollLoop::new(task, Duration::from_secs(10), CancellationToken::new())
            .run()
            .await
            .unwrap();

        let started_at = started_at.lock().clone();
        assert_eq!(started_at[1] - started_at[0], Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_continues() {
        let task = ScriptedTask::new([
            Err(Error::TransientFetch("503".to_string())),
            Err(Error::TransientFetch("timeout".to_string())),
            Ok(CycleReport::default()),
        ]);
        let started_at = Arc::clone(&task.started_at);

        PollLoop::new(task, Duration::from_secs(1), CancellationToken::new())
            .run()
            .await
            .unwrap();
        assert_eq!(started_at.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops() {
        let task = ScriptedTask::new([
            Ok(CycleReport::default()),
            Err(Error::StorageUnavailable("disk gone".to_string())),
            Ok(CycleReport::default()),
        ]);
        let started_at = Arc::clone(&task.started_at);

        let result = PollLoop::new(task, Duration::from_secs(1), CancellationToken::new())
            .run()
            .await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
        assert_eq!(started_at.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_sleep_short() {
        // the script never runs out, only the external cancel stops the loop
        let task = ScriptedTask::new((0..10).map(|_| Ok(CycleReport::default())));
        let started_at = Arc::clone(&task.started_at);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cancel.cancel();
            })
        };

        let begin = Instant::now();
        PollLoop::new(task, Duration::from_secs(3600), cancel)
            .run()
            .await
            .unwrap();
        canceller.await.unwrap();

        assert_eq!(started_at.lock().len(), 1);
        assert!(begin.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_durations_recorded() {
        let task = ScriptedTask {
            cycle_duration: Duration::from_secs(2),
            ..ScriptedTask::new([
                Err(Error::TransientFetch("503".to_string())),
                Ok(CycleReport::default()),
            ])
        };
        let metrics = CollectorMetrics::new("scripted.default");

        PollLoop::new(task, Duration::from_secs(5), CancellationToken::new())
            .with_metrics(metrics.clone())
            .run()
            .await
            .unwrap();

        let text = metrics.encode().unwrap();
        assert!(text.contains(
            r#"tidemark_cycle_duration_seconds_count{collector="scripted.default"} 2"#
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let task = ScriptedTask::new([Ok(CycleReport::default())]);
        let started_at = Arc::clone(&task.started_at);
        let cancel = CancellationToken::new();
        cancel.cancel();

        PollLoop::new(task, Duration::from_secs(1), cancel)
            .run()
            .await
            .unwrap();
        assert!(started_at.lock().is_empty());
    }
}

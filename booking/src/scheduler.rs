//! Periodic low-attendance sweep.

use crate::engine::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Run [`Engine::sweep_low_attendance`] every `interval` until `shutdown` fires.
///
/// The first sweep runs one full interval after start.
#[must_use]
pub fn spawn_sweeper(
    engine: Arc<Engine>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = interval.as_secs(), "Low-attendance sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = engine.sweep_low_attendance().await;
                    if !summary.cancelled.is_empty() {
                        tracing::info!(cancelled = ?summary.cancelled, "Sweep called off sessions");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Low-attendance sweeper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::course_book::CourseEnvironment;
    use crate::credits::InMemoryCreditLedger;
    use crate::deadlines::StudioTime;
    use crate::notifications::RecordingNotifier;
    use classbook_testing::{InMemoryEventStore, test_clock};

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let env = CourseEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryCreditLedger::default()),
            Arc::new(RecordingNotifier::new()),
            StudioTime::utc(),
        );
        let engine = Arc::new(Engine::new(env));
        let (tx, rx) = broadcast::channel(1);

        let handle = spawn_sweeper(engine, Duration::from_millis(10), rx);
        tokio::time::sleep(Duration::from_millis(35)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

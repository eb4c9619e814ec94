//! Background maintenance: periodic truncation of the tegrastats log.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::collector::traits::{CommandRunner, FileSystem};
use crate::exporter::JetsonExporter;

/// Truncates the log every `interval`, forever. The first truncation
/// happens one full interval after start.
pub async fn cleanup_loop<F, R>(exporter: Arc<JetsonExporter<F, R>>, interval: Duration)
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // interval() fires immediately; skip that tick
    tick.tick().await;

    loop {
        tick.tick().await;
        cleanup_once(exporter.clone()).await;
    }
}

async fn cleanup_once<F, R>(exporter: Arc<JetsonExporter<F, R>>)
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    let result = tokio::task::spawn_blocking(move || exporter.collector().cleanup()).await;
    match result {
        Ok(Ok(())) => debug!("log cleanup done"),
        Ok(Err(e)) => error!(error = %e, "log cleanup failed"),
        Err(e) => error!(error = %e, "log cleanup panicked in spawn_blocking"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner, SCENARIO_LOG, samples};
    use crate::config::ExporterConfig;
    use std::path::PathBuf;

    fn exporter(fs: &MockFs) -> Arc<JetsonExporter<MockFs, MockRunner>> {
        let config = ExporterConfig {
            logfile: PathBuf::from(SCENARIO_LOG),
            ..Default::default()
        };
        Arc::new(JetsonExporter::launch(fs.clone(), MockRunner::new(), &config).unwrap())
    }

    #[tokio::test]
    async fn test_cleanup_loop_truncates_on_cadence() {
        let fs = MockFs::jetson_nano();
        let handle = tokio::spawn(cleanup_loop(exporter(&fs), Duration::from_millis(200)));

        // The immediate first tick is skipped.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_ne!(fs.content(SCENARIO_LOG).as_deref(), Some(""));

        wait_for_empty(&fs).await;

        fs.append(SCENARIO_LOG, &format!("{}\n", samples::NANO));
        wait_for_empty(&fs).await;

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_once_without_log() {
        let fs = MockFs::jetson_nano();
        fs.remove_file(SCENARIO_LOG);
        cleanup_once(exporter(&fs)).await;
        assert!(fs.content(SCENARIO_LOG).is_none());
    }

    async fn wait_for_empty(fs: &MockFs) {
        for _ in 0..500 {
            if fs.content(SCENARIO_LOG).as_deref() == Some("") {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("log was not truncated");
    }
}

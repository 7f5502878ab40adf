//! When sweeps run.
//!
//! The host decides whether its platform needs sweeping at all and hands
//! the sweeper to a [`SweepScheduler`]. The sweeper itself knows nothing
//! about timers or platforms.

use crate::services::sweep_service::{SweepError, Sweeper};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time};
use tracing::{debug, info, warn};

/// Delay before the startup sweep, so the live graph is hydrated first.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Desktop,
    Web,
    Mobile,
}

impl Platform {
    /// Desktop builds keep blobs on local disk with room to spare.
    pub fn needs_sweep(&self) -> bool {
        !matches!(self, Platform::Desktop)
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Platform::Desktop),
            "web" => Ok(Platform::Web),
            "mobile" => Ok(Platform::Mobile),
            other => Err(format!("unknown platform `{other}`")),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Desktop => "desktop",
            Platform::Web => "web",
            Platform::Mobile => "mobile",
        })
    }
}

pub trait SweepScheduler {
    fn should_sweep_on_startup(&self) -> bool;

    /// Run a sweep after `delay`, in the background.
    fn schedule_sweep(&self, delay: Duration) -> JoinHandle<()>;
}

/// Schedules sweeps as tokio tasks, optionally repeating on an interval.
pub struct TokioScheduler {
    sweeper: Arc<Sweeper>,
    platform: Platform,
    interval: Option<Duration>,
}

impl TokioScheduler {
    pub fn new(sweeper: Arc<Sweeper>, platform: Platform, interval: Option<Duration>) -> Self {
        Self {
            sweeper,
            platform,
            interval,
        }
    }

    /// Schedule the startup sweep if this platform wants one.
    pub fn start(&self, delay: Duration) -> Option<JoinHandle<()>> {
        if !self.should_sweep_on_startup() {
            info!(platform = %self.platform, "startup sweep disabled for platform");
            return None;
        }
        Some(self.schedule_sweep(delay))
    }
}

impl SweepScheduler for TokioScheduler {
    fn should_sweep_on_startup(&self) -> bool {
        self.platform.needs_sweep()
    }

    fn schedule_sweep(&self, delay: Duration) -> JoinHandle<()> {
        let sweeper = self.sweeper.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            time::sleep(delay).await;
            run_logged(&sweeper).await;

            let Some(period) = interval else {
                return;
            };
            let mut ticker = time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                run_logged(&sweeper).await;
            }
        })
    }
}

/// Run one sweep and log the outcome; errors stop here.
async fn run_logged(sweeper: &Sweeper) {
    match sweeper.run_sweep().await {
        Ok(report) if !report.failed.is_empty() => warn!(
            failed = report.failed.len(),
            deleted = report.deleted.len(),
            "scheduled sweep left blobs behind"
        ),
        Ok(_) => {}
        Err(SweepError::AlreadyRunning) => debug!("sweep already running, skipping tick"),
        Err(err) => warn!(error = %err, "scheduled sweep failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        graph_source::InMemoryGraph, storage_service::BlobStore, sweep_service::SweepOptions,
    };
    use crate::{
        models::{blob::BlobKey, graph::LiveGraph},
        services::storage_service::StorageResult,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct OneOrphan(Mutex<Vec<BlobKey>>);

    #[async_trait]
    impl BlobStore for OneOrphan {
        async fn list_blob_keys(&self) -> StorageResult<Vec<BlobKey>> {
            Ok(self.0.lock().unwrap().clone())
        }

        async fn delete_blob(&self, key: &BlobKey) -> StorageResult<bool> {
            let mut keys = self.0.lock().unwrap();
            let before = keys.len();
            keys.retain(|k| k != key);
            Ok(keys.len() != before)
        }
    }

    fn scheduler(platform: Platform) -> (TokioScheduler, Arc<OneOrphan>) {
        let store = Arc::new(OneOrphan(Mutex::new(vec![BlobKey::new("file:3")])));
        let sweeper = Arc::new(Sweeper::new(
            store.clone(),
            Arc::new(InMemoryGraph::new(LiveGraph::default())),
            SweepOptions::default(),
        ));
        (TokioScheduler::new(sweeper, platform, None), store)
    }

    #[test]
    fn parses_platform_names() {
        assert_eq!("Web".parse::<Platform>(), Ok(Platform::Web));
        assert_eq!("desktop".parse::<Platform>(), Ok(Platform::Desktop));
        assert!("toaster".parse::<Platform>().is_err());
    }

    #[tokio::test]
    async fn desktop_does_not_sweep_on_startup() {
        let (sched, store) = scheduler(Platform::Desktop);
        assert!(sched.start(Duration::ZERO).is_none());
        assert_eq!(store.0.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn web_sweeps_after_delay() {
        let (sched, store) = scheduler(Platform::Web);
        let handle = sched.start(DEFAULT_STARTUP_DELAY).unwrap();

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.0.lock().unwrap().len(), 1);

        handle.await.unwrap();
        assert!(store.0.lock().unwrap().is_empty());
    }
}

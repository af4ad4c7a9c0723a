//! Worker supervision.
//!
//! One supervisor per bundle route. It spawns the worker task, consumes its
//! message channel (making it the route's single cache writer), and
//! respawns the worker after abnormal termination with a fixed backoff -
//! indefinitely, logging each failure. Worker construction errors surface
//! as a single error message and are not retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::build::BuildWorker;
use super::cache::ResponseCache;
use super::messages::WorkerMsg;
use crate::bundler::Bundler;
use crate::config::BundleConfig;
use crate::utils::human_size;

/// Fixed respawn backoff. No growth, no circuit breaker.
const RESPAWN_DELAY: Duration = Duration::from_secs(1);

const CHANNEL_BUFFER: usize = 32;

/// Supervisory record for the current worker incarnation.
#[derive(Debug, Default)]
struct WorkerHandle {
    /// Times the worker was respawned after abnormal termination
    restarts: u32,
    /// Description of the most recent abnormal exit
    last_failure: Option<String>,
}

pub struct WorkerSupervisor {
    bundle: Arc<BundleConfig>,
    bundler: Arc<dyn Bundler>,
    cache: Arc<ResponseCache>,
}

impl WorkerSupervisor {
    pub fn new(
        bundle: Arc<BundleConfig>,
        bundler: Arc<dyn Bundler>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self {
            bundle,
            bundler,
            cache,
        }
    }

    /// Run the supervision loop.
    ///
    /// Returns when a one-shot worker has delivered its message, or when a
    /// watch worker cannot even be constructed. Crashes respawn instead.
    pub async fn run(self) {
        let watch = self.bundle.cache.watch_enabled();
        let mut handle = WorkerHandle::default();

        loop {
            let (tx, mut rx) = mpsc::channel(CHANNEL_BUFFER);

            let worker = if watch {
                match BuildWorker::watching(
                    Arc::clone(&self.bundle),
                    Arc::clone(&self.bundler),
                ) {
                    Ok(worker) => worker,
                    Err(e) => {
                        // Construction failure is a configuration-level
                        // problem: report once, do not retry.
                        self.apply(WorkerMsg::BuildError {
                            message: format!("failed to watch sources: {e}"),
                        });
                        return;
                    }
                }
            } else {
                BuildWorker::one_shot(Arc::clone(&self.bundle), Arc::clone(&self.bundler))
            };

            let mut task = tokio::spawn(worker.run(tx));

            let exit = loop {
                tokio::select! {
                    Some(msg) = rx.recv() => self.apply(msg),
                    res = &mut task => break res,
                }
            };
            // The channel is closed now; drain anything sent before exit.
            while let Ok(msg) = rx.try_recv() {
                self.apply(msg);
            }

            match exit {
                // One message delivered; the worker's job is done.
                Ok(()) if !watch => return,
                // A watch worker has no legitimate way to finish.
                Ok(()) => handle.last_failure = Some("watch stream closed".into()),
                Err(err) => handle.last_failure = Some(err.to_string()),
            }

            handle.restarts += 1;
            crate::log!(
                "worker";
                "worker for {} died ({}), respawning in {:?} (restart #{})",
                self.bundle.route,
                handle.last_failure.as_deref().unwrap_or("unknown"),
                RESPAWN_DELAY,
                handle.restarts
            );
            tokio::time::sleep(RESPAWN_DELAY).await;
        }
    }

    /// Single writer for this route's cache entry.
    fn apply(&self, msg: WorkerMsg) {
        let outcome = match &msg {
            WorkerMsg::LatestBundle { contents } => Ok(human_size(contents.len())),
            WorkerMsg::BuildError { message } => Err(message.clone()),
        };

        self.cache.apply(msg);

        match outcome {
            Ok(size) => crate::logger::status_success(&format!(
                "built {} #{} ({})",
                self.bundle.route,
                self.cache.generation(),
                size
            )),
            Err(message) => crate::logger::status_error(
                &format!("build failed: {}", self.bundle.route),
                &message,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::BundleError;
    use crate::config::CacheMode;
    use crate::response::PrepareOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBundler {
        calls: AtomicUsize,
    }

    impl Bundler for CountingBundler {
        fn bundle(&self) -> Result<Vec<u8>, BundleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(b"console.log(1);".to_vec())
        }
    }

    /// Panics on the first call, succeeds afterwards.
    struct FlakyBundler {
        calls: AtomicUsize,
    }

    impl Bundler for FlakyBundler {
        fn bundle(&self) -> Result<Vec<u8>, BundleError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("simulated worker crash");
            }
            Ok(b"console.log(2);".to_vec())
        }
    }

    struct FailingBundler;

    impl Bundler for FailingBundler {
        fn bundle(&self) -> Result<Vec<u8>, BundleError> {
            Err(BundleError::Failed {
                entry: "src/app.js".into(),
                status: "exit status: 1".into(),
                stderr: "syntax error".into(),
            })
        }
    }

    fn static_bundle() -> Arc<BundleConfig> {
        Arc::new(BundleConfig {
            route: "/app.js".into(),
            cache: CacheMode::Static("public, max-age=60".into()),
            ..Default::default()
        })
    }

    fn supervisor_for(
        bundle: Arc<BundleConfig>,
        bundler: Arc<dyn Bundler>,
    ) -> (WorkerSupervisor, Arc<ResponseCache>) {
        let cache = Arc::new(ResponseCache::new(PrepareOptions::for_bundle(&bundle)));
        (
            WorkerSupervisor::new(bundle, bundler, Arc::clone(&cache)),
            cache,
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_one_shot_builds_exactly_once() {
        let bundler = Arc::new(CountingBundler {
            calls: AtomicUsize::new(0),
        });
        let (supervisor, cache) =
            supervisor_for(static_bundle(), Arc::clone(&bundler) as Arc<dyn Bundler>);

        supervisor.run().await;

        assert_eq!(bundler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.generation(), 1);

        let prepared = cache.response().unwrap();
        assert_eq!(prepared.body(), b"console.log(1);");
        assert_eq!(prepared.cache_control(), Some("public, max-age=60"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_crash_respawns_and_recovers() {
        let bundler = Arc::new(FlakyBundler {
            calls: AtomicUsize::new(0),
        });
        let (supervisor, cache) =
            supervisor_for(static_bundle(), Arc::clone(&bundler) as Arc<dyn Bundler>);

        // First incarnation panics; the respawned worker succeeds.
        supervisor.run().await;

        assert_eq!(bundler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.response().unwrap().body(), b"console.log(2);");
        assert!(cache.last_error().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_build_failure_recorded_not_retried() {
        let (supervisor, cache) =
            supervisor_for(static_bundle(), Arc::new(FailingBundler) as Arc<dyn Bundler>);

        supervisor.run().await;

        assert!(cache.response().is_none());
        assert!(cache.last_error().unwrap().contains("syntax error"));
        assert_eq!(cache.generation(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watch_worker_construction_failure_reports_once() {
        let bundle = Arc::new(BundleConfig {
            route: "/app.js".into(),
            cache: CacheMode::Dynamic,
            // Watch root (the entry's directory) does not exist
            entry: std::path::PathBuf::from("/definitely/not/real/app.js"),
            ..Default::default()
        });
        let (supervisor, cache) = supervisor_for(
            bundle,
            Arc::new(CountingBundler {
                calls: AtomicUsize::new(0),
            }) as Arc<dyn Bundler>,
        );

        // Returns instead of retrying forever.
        supervisor.run().await;

        assert!(cache.last_error().unwrap().contains("failed to watch"));
    }
}

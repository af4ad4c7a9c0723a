//! Build worker task.
//!
//! One worker per bundle route, running inside the worker runtime. The
//! worker owns the bundler use for its route: the request-serving side only
//! ever sees the messages it emits.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::debounce::RebuildDebouncer;
use super::messages::WorkerMsg;
use super::pipeline;
use crate::bundler::{BundleWatcher, Bundler};
use crate::config::BundleConfig;

pub(super) struct BuildWorker {
    bundle: Arc<BundleConfig>,
    bundler: Arc<dyn Bundler>,
    /// Present only in watch-and-rebuild mode
    events: Option<mpsc::Receiver<notify::Event>>,
}

impl BuildWorker {
    /// One-shot worker: build once, report, exit.
    pub(super) fn one_shot(bundle: Arc<BundleConfig>, bundler: Arc<dyn Bundler>) -> Self {
        Self {
            bundle,
            bundler,
            events: None,
        }
    }

    /// Watch worker: build, then rebuild on debounced source changes.
    ///
    /// The watcher attaches before the initial build so edits made while it
    /// runs are buffered rather than lost.
    pub(super) fn watching(
        bundle: Arc<BundleConfig>,
        bundler: Arc<dyn Bundler>,
    ) -> notify::Result<Self> {
        let watcher = BundleWatcher::new(&bundle.watch_roots())?;
        Ok(Self {
            bundle,
            bundler,
            events: Some(watcher.into_event_stream()),
        })
    }

    /// Run the worker loop.
    pub(super) async fn run(mut self, tx: mpsc::Sender<WorkerMsg>) {
        if self.build_and_send(&tx).await.is_err() {
            return;
        }

        let Some(mut events) = self.events.take() else {
            return;
        };

        let mut debouncer = RebuildDebouncer::new();
        loop {
            tokio::select! {
                biased;
                maybe = events.recv() => match maybe {
                    Some(_) => debouncer.notify(),
                    None => return, // watch subscription gone
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if let Some(changes) = debouncer.take_if_ready() {
                        crate::debug!("worker"; "{} change(s), rebuilding {}", changes, self.bundle.route);
                        // Exactly one in-flight build: further change events
                        // queue in the channel until this await completes.
                        if self.build_and_send(&tx).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Run the pipeline once and deliver the result message.
    ///
    /// `Err` means the supervisor side is gone and the worker should stop.
    async fn build_and_send(&self, tx: &mpsc::Sender<WorkerMsg>) -> Result<(), ()> {
        let bundler = Arc::clone(&self.bundler);
        let bundle = Arc::clone(&self.bundle);
        let outcome =
            tokio::task::spawn_blocking(move || pipeline::run(&*bundler, &bundle)).await;

        let msg = match outcome {
            Ok(Ok(contents)) => WorkerMsg::LatestBundle { contents },
            Ok(Err(e)) => WorkerMsg::BuildError {
                message: e.to_string(),
            },
            // A panicking pipeline is a worker crash: unwind into the
            // supervisor so it can respawn this worker.
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(_) => return Err(()), // cancelled at shutdown
        };

        tx.send(msg).await.map_err(|_| ())
    }
}

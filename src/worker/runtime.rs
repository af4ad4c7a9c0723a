//! Worker runtime hosting.
//!
//! The supervisors run on a dedicated OS thread with their own tokio
//! runtime, isolated from the blocking request loop. Communication with the
//! serving side is strictly through each route's `ResponseCache`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;

use super::service::BundleRegistry;

/// Spawn the worker runtime.
///
/// Returns `None` when no bundle uses a worker-backed cache mode.
pub fn spawn_workers(
    registry: Arc<BundleRegistry>,
    shutdown_rx: Receiver<()>,
) -> Option<JoinHandle<()>> {
    if !registry.services().any(|s| s.cache().is_some()) {
        return None;
    }

    Some(thread::spawn(move || {
        run_worker_system(registry, shutdown_rx);
    }))
}

fn run_worker_system(registry: Arc<BundleRegistry>, shutdown_rx: Receiver<()>) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    rt.block_on(async {
        let mut tasks = Vec::new();
        for service in registry.services() {
            if let Some(supervisor) = service.supervisor() {
                crate::debug!("worker"; "starting worker for {}", service.bundle().route);
                tasks.push(tokio::spawn(supervisor.run()));
            }
        }

        loop {
            if shutdown_rx.try_recv().is_ok() {
                crate::debug!("worker"; "shutdown signal received");
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        // Aborting a supervisor drops its worker task and event receiver,
        // which tears down the watch subscription thread.
        for task in &tasks {
            task.abort();
        }
    });

    // Requests still parked on a first build must not hang at shutdown.
    registry.close();
}

//! Build worker system.
//!
//! Message-passing concurrency for bundle builds:
//!
//! ```text
//! BundleWatcher --> BuildWorker --> WorkerSupervisor --> ResponseCache
//!   (notify)        (pipeline)      (respawn + apply)     (arc-swap)
//! ```
//!
//! Request threads never touch the bundler: they read the route's
//! `ResponseCache`, which only the route's supervisor writes.
//!
//! # Module Structure
//!
//! - `messages` - worker → supervisor protocol
//! - `debounce` - rebuild coalescing
//! - `pipeline` - bundle → hooks → minify transform chain
//! - `build` - worker task (one-shot and watch-and-rebuild)
//! - `supervisor` - spawn/monitor/respawn, single cache writer
//! - `cache` - per-route response cache
//! - `service` - cache-mode wiring and route registry
//! - `runtime` - dedicated thread hosting the supervisors

mod build;
pub mod cache;
pub mod debounce;
pub mod messages;
pub mod pipeline;
pub mod runtime;
pub mod service;
pub mod supervisor;

pub use service::{BundleRegistry, BundleService};

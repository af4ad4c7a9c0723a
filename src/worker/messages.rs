//! Worker Message Definitions
//!
//! The worker → supervisor protocol. Delivery is FIFO per worker, and every
//! `LatestBundle` carries one complete, internally consistent build - never
//! a partial artifact.

/// Messages from a BuildWorker to its supervisor.
#[derive(Debug)]
pub enum WorkerMsg {
    /// A build finished; these are the final artifact bytes.
    LatestBundle { contents: Vec<u8> },
    /// A build failed. The previous artifact (if any) stays servable.
    BuildError { message: String },
}

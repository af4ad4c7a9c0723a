//! Process-wide state (serving/shutdown flags, graceful shutdown wiring).

mod state;

pub use state::*;

// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod metrics;
pub mod report;
pub mod scan;
pub mod signal;
pub mod sources;

pub use crate::api::router;
pub use crate::scan::{Scanner, SignalTable};
pub use crate::signal::{Category, Signal};

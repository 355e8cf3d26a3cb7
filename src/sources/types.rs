// src/sources/types.rs
use anyhow::Result;

use crate::signal::Signal;

/// One data source. Implementations must not panic on network or parse trouble; they
/// return `Err` (or an empty list) and the scan carries on with the other sources.
#[async_trait::async_trait]
pub trait SignalSource: Send + Sync {
    async fn gather_signals(&self, company: &str) -> Result<Vec<Signal>>;
    fn name(&self) -> &'static str;
}

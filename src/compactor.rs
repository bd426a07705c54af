use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{Engine, EngineError};
use crate::observability::COMPACTIONS_TOTAL;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact once at least `threshold` events were appended since the last compaction.
/// Returns the number of events in the new journal, or None when below threshold.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> Result<Option<usize>, EngineError> {
    let appends = engine.journal_appends_since_compact().await;
    if appends < threshold {
        return Ok(None);
    }
    let result = engine.compact_journal().await;
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(COMPACTIONS_TOTAL, "status" => status).increment(1);
    let written = result?;
    info!(appends, written, "journal compacted");
    Ok(Some(written))
}

/// Background task: check the journal every 30s and compact when it grew past `threshold`.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&engine, threshold).await {
            warn!("journal compaction failed: {e}");
        }
    }
}

//! Operational surface: bulk reset and read-only statistics.

use serde::Serialize;
use tracing::info;

use super::gate::CompositeGate;
use super::limiter::Dimension;

/// Snapshot of one dimension's store.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionStats {
    pub dimension: Dimension,
    /// Live counter entries.
    pub entries: usize,
    /// Coarse resident-memory estimate in bytes.
    pub approx_bytes: usize,
}

/// Snapshot of every dimension's store.
#[derive(Debug, Clone, Serialize)]
pub struct GateStats {
    pub dimensions: Vec<DimensionStats>,
    pub total_entries: usize,
    pub total_approx_bytes: usize,
}

impl CompositeGate {
    /// Clear every dimension's store.
    ///
    /// Safe to call concurrently with live traffic: a reset racing an
    /// in-flight request may transiently drop that request's counted usage,
    /// which only loosens enforcement. Intended for test isolation and
    /// operational recovery rather than routine use.
    pub fn reset_all(&self) {
        for limiter in self.registry().limiters() {
            limiter.clear();
        }
        info!("All rate limit counters reset");
    }

    /// Read-only snapshot of per-dimension entry counts and memory use.
    pub fn stats(&self) -> GateStats {
        let dimensions: Vec<DimensionStats> = self
            .registry()
            .limiters()
            .iter()
            .map(|limiter| DimensionStats {
                dimension: limiter.dimension(),
                entries: limiter.entry_count(),
                approx_bytes: limiter.approx_bytes(),
            })
            .collect();

        GateStats {
            total_entries: dimensions.iter().map(|d| d.entries).sum(),
            total_approx_bytes: dimensions.iter().map(|d| d.approx_bytes).sum(),
            dimensions,
        }
    }
}

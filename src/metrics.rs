//! Metrics produced by a completed run (spec §6).

use std::collections::HashMap;

/// Recognized-keys metrics mapping, serializable for downstream reporting
/// tools outside the core (e.g. an experiment driver).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct MetricsReport {
    pub completed: u64,
    pub avg_latency: f64,
    pub wasted_tokens: u64,
    pub throttled: u64,
    pub per_user_tokens: HashMap<String, u64>,
}

/// Immutable, read-only view of engine state handed to schedulers each tick.
/// Schedulers must never peek past this snapshot into engine internals
/// (spec's two-layer composition design note).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineSnapshot {
    pub time: f64,
    pub num_active_decodes: usize,
    pub has_active_prefill: bool,
    pub kv_tokens_used: u64,
    pub kv_tokens_capacity: u64,
    pub num_pending_prefills: usize,
    pub num_completed_requests: usize,
}

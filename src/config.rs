//! Typed configuration knobs, one struct per subsystem, in the style of the
//! teacher's `backend/src/config.rs`: every field documents its purpose and
//! tuning tradeoff, and every struct ships a `::default()` that matches the
//! values spec'd for a default run.

/// Engine parameters: capacity, per-step token budget, chunking, and the
/// timing model used to turn token counts into simulated latency.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Total KV-cache budget, in tokens. Hard cap: `0 <= kv_tokens <=
    /// max_kv_tokens` at all times.
    pub max_kv_tokens: u64,

    /// Per-step token budget shared between decode and prefill. Decode
    /// always gets first claim on this budget (decode-maximal scheduling).
    pub max_num_batched_tokens: u64,

    /// Maximum tokens advanced per prefill chunk in a single step.
    pub chunk_size: u64,

    /// Prefill cost coefficients: `cost = a_p * L^2 + b_p * L + c_p` for
    /// chunk length `L`.
    pub a_prefill: f64,
    pub b_prefill: f64,
    pub c_prefill: f64,

    /// Decode cost coefficients: `cost = a_d * kv_used * batch + b_d`.
    pub a_decode: f64,
    pub b_decode: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_kv_tokens: 20_000,
            max_num_batched_tokens: 16,
            chunk_size: 256,
            a_prefill: 0.0001,
            b_prefill: 0.01,
            c_prefill: 0.1,
            a_decode: 0.00005,
            b_decode: 0.05,
        }
    }
}

/// Weights for the Virtual Token Counter scheduler.
#[derive(Clone, Debug)]
pub struct VtcConfig {
    /// Weight applied to prefill tokens when incrementing a user's counter.
    pub w_p: f64,
    /// Weight applied per served decode token.
    pub w_q: f64,
    /// Whether a newly-arriving user's counter is lifted to the minimum of
    /// the populated counters, preventing an idle user from bursting in
    /// with a zero counter. On by default; see spec's counter-lift rule.
    pub counter_lift: bool,
}

impl Default for VtcConfig {
    fn default() -> Self {
        Self {
            w_p: 1.0,
            w_q: 1.0,
            counter_lift: true,
        }
    }
}

/// Weights for the Weighted Service Counter ("FairServe") scheduler.
/// `alpha`/`beta`/`gamma` double as the default stage-weight coefficients
/// used by `Application::stage_weight` unless an application overrides them.
#[derive(Clone, Debug)]
pub struct WscConfig {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub counter_lift: bool,
}

impl Default for WscConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 2.0,
            gamma: 1.0,
            counter_lift: true,
        }
    }
}

/// Overload & Interaction-aware Throttle configuration.
#[derive(Clone, Debug)]
pub struct OitConfig {
    /// Sliding window, in simulated time units, over which per-user/app
    /// arrival rates are measured.
    pub window: i64,
    /// KV usage above which the engine is considered overloaded.
    pub kv_threshold: u64,
    /// Number of active decodes at/above which the engine is considered
    /// overloaded (the orchestrator's notion of "running").
    pub max_batch: usize,
}

impl Default for OitConfig {
    fn default() -> Self {
        Self {
            window: 60,
            kv_threshold: 5_000,
            max_batch: 32,
        }
    }
}

/// Top-level run configuration for the orchestrator.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Tick at which the run loop is force-stopped regardless of remaining
    /// work; anything left waiting is counted into `wasted_tokens`.
    pub max_time: i64,

    /// Maximum number of requests the scheduler may release to the engine
    /// in a single tick (the orchestrator's `max_batch` argument to
    /// `select_next_requests`).
    pub max_batch: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_time: 2_000,
            max_batch: 16,
        }
    }
}

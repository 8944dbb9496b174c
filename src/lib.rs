//! Discrete-event simulator of a multi-tenant LLM inference service, for
//! studying fair scheduling policies (FCFS, VTC, WSC) over a
//! continuous-batching, chunked-prefill execution engine.
//!
//! The crate has two layers: an outer fairness scheduler decides *who* to
//! admit next; an inner [`engine`] decides *how* admitted requests execute,
//! sharing a fixed KV-cache and token-batch budget. [`orchestrator::Simulator`]
//! wires the two together and drives the run loop.

pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod model;
pub mod oit;
pub mod orchestrator;
pub mod scheduler;

pub use error::SimError;
pub use metrics::MetricsReport;
pub use orchestrator::Simulator;

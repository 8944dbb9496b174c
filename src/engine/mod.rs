//! Continuous-batching execution engine: chunked prefill, decode-maximal
//! token budget, paged KV accounting, and the event stream the outer
//! fairness layer consumes (spec §4.1).

mod events;
mod snapshot;

pub use events::{EngineEvent, EngineEventType};
pub use snapshot::EngineSnapshot;

use std::collections::VecDeque;

use tracing::instrument;

use crate::config::EngineConfig;
use crate::model::Request;

struct ActivePrefill {
    request: Request,
    remaining: u64,
    chunk_id: u64,
}

/// vLLM-style continuous batcher. Requests are moved into the engine by
/// `submit_request` and never handed back except through completion events;
/// the outer scheduler only ever sees an [`EngineSnapshot`].
pub struct Engine {
    config: EngineConfig,
    time: f64,
    pending_prefill: VecDeque<Request>,
    active_prefill: Option<ActivePrefill>,
    active_decodes: Vec<Request>,
    kv_tokens: u64,
    completed_count: usize,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            time: 0.0,
            pending_prefill: VecDeque::new(),
            active_prefill: None,
            active_decodes: Vec::new(),
            kv_tokens: 0,
            completed_count: 0,
        }
    }

    /// Queue a request for prefill. No admission check beyond enqueueing;
    /// capacity is enforced inside `step`.
    pub fn submit_request(&mut self, req: Request) {
        self.pending_prefill.push_back(req);
    }

    pub fn has_pending_work(&self) -> bool {
        !self.pending_prefill.is_empty() || self.active_prefill.is_some() || !self.active_decodes.is_empty()
    }

    pub fn get_state_snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            time: self.time,
            num_active_decodes: self
                .active_decodes
                .iter()
                .filter(|r| r.remaining_decode > 0)
                .count(),
            has_active_prefill: self.active_prefill.is_some(),
            kv_tokens_used: self.kv_tokens,
            kv_tokens_capacity: self.config.max_kv_tokens,
            num_pending_prefills: self.pending_prefill.len(),
            num_completed_requests: self.completed_count,
        }
    }

    fn prefill_cost(&self, chunk_len: u64) -> f64 {
        let l = chunk_len as f64;
        self.config.a_prefill * l * l + self.config.b_prefill * l + self.config.c_prefill
    }

    fn decode_cost(&self, batch_tokens: u64) -> f64 {
        self.config.a_decode * self.kv_tokens as f64 * batch_tokens as f64 + self.config.b_decode
    }

    /// Starts a new prefill if none is active and one fits, or continues the
    /// active one; returns the chunk length advanced, the events it
    /// produced, and its timing cost. Returns `None` if nothing could
    /// advance (budget exhausted, capacity blocked, or nothing pending).
    fn maybe_start_prefill(&mut self, token_budget: u64) -> Option<(u64, Vec<EngineEvent>, f64)> {
        if self.active_prefill.is_none() {
            let candidate = self.pending_prefill.front()?;
            let remaining = candidate.input_tokens + candidate.system_tokens;
            if self.kv_tokens + remaining > self.config.max_kv_tokens {
                return None;
            }
            let chunk_len = self.config.chunk_size.min(remaining).min(token_budget);
            if chunk_len == 0 {
                return None;
            }
            let request = self.pending_prefill.pop_front()?;
            self.active_prefill = Some(ActivePrefill {
                request,
                remaining,
                chunk_id: 0,
            });
        }

        let active = self.active_prefill.as_mut()?;
        let chunk_len = self.config.chunk_size.min(active.remaining).min(token_budget);
        if chunk_len == 0 {
            return None;
        }

        let request_id = active.request.request_id;
        let chunk_id = active.chunk_id;
        let mut events = vec![EngineEvent::prefill_chunk_started(self.time, request_id, chunk_id, chunk_len)];

        active.remaining -= chunk_len;
        active.chunk_id += 1;
        let finish_time = self.prefill_cost(chunk_len);
        events.push(EngineEvent::prefill_chunk_finished(
            self.time + finish_time,
            request_id,
            chunk_id,
            chunk_len,
        ));
        self.kv_tokens += chunk_len;
        if active.request.start_time.is_none() {
            active.request.start_time = Some(self.time);
        }

        if active.remaining == 0 {
            let finished = self.active_prefill.take().unwrap();
            self.active_decodes.push(finished.request);
        }

        Some((chunk_len, events, finish_time))
    }

    /// Advances the engine one step. Ordering is exact: decode phase, then
    /// at most one prefill chunk, then completions, then the clock advances.
    /// Returns no events (and does not advance time) if nothing happened.
    #[instrument(skip(self), fields(time = self.time))]
    pub fn step(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        let mut token_budget = self.config.max_num_batched_tokens;

        let mut batch_tokens = 0u64;
        if token_budget > 0 {
            let take = self
                .active_decodes
                .iter()
                .filter(|r| r.remaining_decode > 0)
                .count()
                .min(token_budget as usize);
            let mut served = 0u64;
            for req in self.active_decodes.iter_mut().filter(|r| r.remaining_decode > 0) {
                if served as usize >= take {
                    break;
                }
                req.remaining_decode -= 1;
                let token_index = req.output_tokens_target - req.remaining_decode;
                events.push(EngineEvent::decode_step(self.time, req.request_id, token_index));
                self.kv_tokens += 1;
                served += 1;
            }
            batch_tokens = served;
            token_budget -= batch_tokens;
        }
        let decode_cost = if batch_tokens > 0 { self.decode_cost(batch_tokens) } else { 0.0 };

        let mut prefill_cost = 0.0;
        if token_budget > 0 {
            if let Some((_chunk_len, prefill_events, cost)) = self.maybe_start_prefill(token_budget) {
                prefill_cost = cost;
                events.extend(prefill_events);
            }
        }

        let completion_time = self.time + decode_cost + prefill_cost;
        let mut i = 0;
        while i < self.active_decodes.len() {
            if self.active_decodes[i].remaining_decode == 0 {
                let req = self.active_decodes.remove(i);
                events.push(EngineEvent::request_completed(completion_time, req.request_id));
                self.completed_count += 1;
            } else {
                i += 1;
            }
        }

        let time_advance = decode_cost + prefill_cost;
        if time_advance == 0.0 && events.is_empty() {
            return Vec::new();
        }
        self.time += time_advance.max(1e-4);
        events
    }
}

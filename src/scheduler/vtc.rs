use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::VtcConfig;
use crate::engine::EngineSnapshot;
use crate::model::{Interaction, Request};
use crate::scheduler::{remove_by_id, FairnessScheduler};

/// Virtual Token Counter fairness scheduler. Per-user counter `C[u]` rises
/// with every prefill token and every served decode token; selection always
/// favors the least-served user.
///
/// Counters live in a `BTreeMap` (not a `HashMap`) so that counter-lift's
/// "minimum over the populated set" and tie-broken selection are both
/// deterministic without a separate sort step.
pub struct VtcScheduler {
    config: VtcConfig,
    counters: BTreeMap<String, f64>,
}

impl VtcScheduler {
    pub fn new(config: VtcConfig) -> Self {
        Self {
            config,
            counters: BTreeMap::new(),
        }
    }

    fn counter(&self, user_id: &str) -> f64 {
        *self.counters.get(user_id).unwrap_or(&0.0)
    }
}

impl FairnessScheduler for VtcScheduler {
    fn on_request_arrival(&mut self, req: &Request) {
        if self.config.counter_lift {
            if let Some(&minimum) = self.counters.values().min_by(|a, b| a.total_cmp(b)) {
                let entry = self.counters.entry(req.user.user_id.clone()).or_insert(0.0);
                *entry = entry.max(minimum);
            }
        }
    }

    fn on_prefill_added(&mut self, req: &Request) {
        let inc = self.config.w_p * (req.input_tokens + req.system_tokens) as f64;
        *self.counters.entry(req.user.user_id.clone()).or_insert(0.0) += inc;
    }

    fn on_decode_iteration(&mut self, served: &[Request]) {
        for req in served {
            *self.counters.entry(req.user.user_id.clone()).or_insert(0.0) += self.config.w_q;
        }
    }

    fn select_next_requests(
        &mut self,
        waiting: &mut VecDeque<Request>,
        _interactions: &HashMap<u64, Interaction>,
        snapshot: &EngineSnapshot,
        max_to_release: usize,
    ) -> Vec<Request> {
        let mut kv_tokens = snapshot.kv_tokens_used;
        let kv_capacity = snapshot.kv_tokens_capacity;
        let mut selected = Vec::new();

        while selected.len() < max_to_release {
            let mut head_by_user: BTreeMap<String, u64> = BTreeMap::new();
            for req in waiting.iter() {
                head_by_user
                    .entry(req.user.user_id.clone())
                    .or_insert(req.request_id);
            }
            if head_by_user.is_empty() {
                break;
            }

            let (_, candidate_id) = head_by_user
                .iter()
                .min_by(|(ua, _), (ub, _)| self.counter(ua).total_cmp(&self.counter(ub)).then_with(|| ua.cmp(ub)))
                .map(|(u, id)| (u.clone(), *id))
                .unwrap();
            let candidate = waiting.iter().find(|r| r.request_id == candidate_id).unwrap();

            if kv_tokens + candidate.input_tokens + candidate.system_tokens > kv_capacity {
                break;
            }
            let req = remove_by_id(waiting, candidate_id).unwrap();
            kv_tokens += req.input_tokens + req.system_tokens;
            selected.push(req);
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::test_app;
    use crate::model::{InteractionStage, User};

    fn req(id: u64, user: &str, input: i64) -> Request {
        Request::new(id, User::new(user), test_app(), 0, InteractionStage::UserPrompt, input, 0, 1, 0).unwrap()
    }

    fn snapshot() -> EngineSnapshot {
        EngineSnapshot {
            time: 0.0,
            num_active_decodes: 0,
            has_active_prefill: false,
            kv_tokens_used: 0,
            kv_tokens_capacity: 1_000_000,
            num_pending_prefills: 0,
            num_completed_requests: 0,
        }
    }

    #[test]
    fn picks_least_served_user_first() {
        let mut sched = VtcScheduler::new(VtcConfig::default());
        sched.on_prefill_added(&req(0, "a", 100));
        let mut waiting = VecDeque::from([req(1, "a", 10), req(2, "b", 10)]);
        let selected = sched.select_next_requests(&mut waiting, &HashMap::new(), &snapshot(), 1);
        assert_eq!(selected[0].user.user_id, "b");
    }

    #[test]
    fn ties_break_lexicographically_on_user_id() {
        let mut sched = VtcScheduler::new(VtcConfig::default());
        let mut waiting = VecDeque::from([req(1, "zeta", 10), req(2, "alpha", 10)]);
        let selected = sched.select_next_requests(&mut waiting, &HashMap::new(), &snapshot(), 1);
        assert_eq!(selected[0].user.user_id, "alpha");
    }

    #[test]
    fn counter_lift_raises_new_arrival_to_populated_minimum() {
        let mut sched = VtcScheduler::new(VtcConfig::default());
        sched.on_prefill_added(&req(0, "a", 100));
        assert_eq!(sched.counter("a"), 100.0);
        sched.on_request_arrival(&req(1, "b", 10));
        assert_eq!(sched.counter("b"), 100.0);
    }

    #[test]
    fn lift_never_decreases_an_existing_counter() {
        let mut sched = VtcScheduler::new(VtcConfig::default());
        sched.on_prefill_added(&req(0, "a", 100));
        sched.on_request_arrival(&req(1, "a", 10));
        assert_eq!(sched.counter("a"), 100.0);
    }
}

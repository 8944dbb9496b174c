use std::collections::{HashMap, VecDeque};

use crate::engine::EngineSnapshot;
use crate::model::{Interaction, Request};
use crate::scheduler::FairnessScheduler;

/// Strict head-of-line scheduler: no fairness accounting at all.
#[derive(Default)]
pub struct FcfsScheduler;

impl FcfsScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl FairnessScheduler for FcfsScheduler {
    fn on_request_arrival(&mut self, _req: &Request) {}
    fn on_prefill_added(&mut self, _req: &Request) {}
    fn on_decode_iteration(&mut self, _served: &[Request]) {}

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

        while selected.len() < max_to_release && kv_tokens < kv_capacity {
            let Some(next) = waiting.front() else { break };
            if kv_tokens + next.input_tokens + next.system_tokens > kv_capacity {
                break;
            }
            let req = waiting.pop_front().unwrap();
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

    fn req(id: u64, input: i64) -> Request {
        Request::new(id, User::new("a"), test_app(), 0, InteractionStage::UserPrompt, input, 0, 1, 0).unwrap()
    }

    fn snapshot(used: u64, capacity: u64) -> EngineSnapshot {
        EngineSnapshot {
            time: 0.0,
            num_active_decodes: 0,
            has_active_prefill: false,
            kv_tokens_used: used,
            kv_tokens_capacity: capacity,
            num_pending_prefills: 0,
            num_completed_requests: 0,
        }
    }

    #[test]
    fn releases_in_arrival_order_until_capacity() {
        let mut waiting = VecDeque::from([req(1, 60), req(2, 60), req(3, 60)]);
        let mut sched = FcfsScheduler::new();
        let selected = sched.select_next_requests(&mut waiting, &HashMap::new(), &snapshot(0, 100), 10);
        assert_eq!(selected.iter().map(|r| r.request_id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(waiting.len(), 2);
    }

    #[test]
    fn stops_on_max_to_release() {
        let mut waiting = VecDeque::from([req(1, 10), req(2, 10)]);
        let mut sched = FcfsScheduler::new();
        let selected = sched.select_next_requests(&mut waiting, &HashMap::new(), &snapshot(0, 1000), 1);
        assert_eq!(selected.len(), 1);
    }
}

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::WscConfig;
use crate::engine::EngineSnapshot;
use crate::model::{Interaction, InteractionStage, Request};
use crate::scheduler::{remove_by_id, FairnessScheduler};

/// Weighted Service Counter ("FairServe") scheduler. Identical skeleton to
/// VTC, but every counter increment is normalized by the request's
/// application stage weight, so a user whose application issues cheap
/// stages isn't penalized against one whose stages are expensive.
///
/// Selection additionally prefers in-flight interaction continuations over
/// brand-new `USER_PROMPT` arrivals, to avoid starting new work ahead of
/// finishing what is already running.
pub struct WscScheduler {
    config: WscConfig,
    service: BTreeMap<String, f64>,
}

impl WscScheduler {
    pub fn new(config: WscConfig) -> Self {
        Self {
            config,
            service: BTreeMap::new(),
        }
    }

    fn service_of(&self, user_id: &str) -> f64 {
        *self.service.get(user_id).unwrap_or(&0.0)
    }

    fn weight(&self, req: &Request) -> Result<f64, crate::error::SimError> {
        req.application
            .stage_weight(req.stage, self.config.alpha, self.config.beta, self.config.gamma)
    }
}

impl FairnessScheduler for WscScheduler {
    fn on_request_arrival(&mut self, req: &Request) {
        if self.config.counter_lift {
            if let Some(&minimum) = self.service.values().min_by(|a, b| a.total_cmp(b)) {
                let entry = self.service.entry(req.user.user_id.clone()).or_insert(0.0);
                *entry = entry.max(minimum);
            }
        }
    }

    fn on_prefill_added(&mut self, req: &Request) {
        let w = match self.weight(req) {
            Ok(w) => w,
            Err(_) => return,
        };
        let tokens = self.config.alpha * req.input_tokens as f64 + self.config.beta * req.system_tokens as f64;
        let inc = req.user.priority * tokens / w;
        *self.service.entry(req.user.user_id.clone()).or_insert(0.0) += inc;
    }

    fn on_decode_iteration(&mut self, served: &[Request]) {
        for req in served {
            let w = match self.weight(req) {
                Ok(w) => w,
                Err(_) => continue,
            };
            let inc = req.user.priority * self.config.gamma / w;
            *self.service.entry(req.user.user_id.clone()).or_insert(0.0) += inc;
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

        while selected.len() < max_to_release && kv_tokens < kv_capacity {
            if waiting.is_empty() {
                break;
            }

            let continuation_ids: Vec<u64> = waiting
                .iter()
                .filter(|r| r.stage != InteractionStage::UserPrompt)
                .map(|r| r.request_id)
                .collect();
            let pool_ids: Vec<u64> = if !continuation_ids.is_empty() {
                continuation_ids
            } else {
                waiting.iter().map(|r| r.request_id).collect()
            };

            let mut head_by_user: BTreeMap<String, u64> = BTreeMap::new();
            for &id in &pool_ids {
                let req = waiting.iter().find(|r| r.request_id == id).unwrap();
                head_by_user.entry(req.user.user_id.clone()).or_insert(id);
            }

            let (_, candidate_id) = head_by_user
                .iter()
                .min_by(|(ua, _), (ub, _)| {
                    self.service_of(ua).total_cmp(&self.service_of(ub)).then_with(|| ua.cmp(ub))
                })
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

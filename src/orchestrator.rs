//! Simulator orchestrator (spec §4.4): ties arrivals, fairness scheduling,
//! engine stepping, and per-interaction continuation together, and records
//! metrics.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, instrument};

use crate::config::SimulatorConfig;
use crate::engine::{Engine, EngineEventType};
use crate::metrics::MetricsReport;
use crate::model::{Interaction, Request};
use crate::oit::Oit;
use crate::scheduler::{FairnessScheduler, SchedulerKind};

/// Drives ticks, routes engine events back to the scheduler, and advances
/// interactions to their next stage on completion.
pub struct Simulator {
    config: SimulatorConfig,
    scheduler: SchedulerKind,
    oit: Option<Oit>,
    engine: Engine,
    current_tick: i64,
    waiting: VecDeque<Request>,
    interactions: HashMap<u64, Interaction>,
    completed_requests: Vec<Request>,
    throttled_requests: Vec<Request>,
    wasted_tokens: u64,
    /// Non-owning handle keyed by `request_id`, used only to correlate
    /// engine events back to a request's static fields (application, user,
    /// stage) once the engine itself owns the mutable copy.
    id_to_request: HashMap<u64, Request>,
    /// Prevents double-counting `on_prefill_added` across a request's
    /// multiple prefill chunks; only `chunk_id == 0` triggers it.
    accounted_prefill: HashSet<u64>,
}

impl Simulator {
    pub fn new(
        config: SimulatorConfig,
        scheduler: SchedulerKind,
        oit: Option<Oit>,
        engine: Engine,
    ) -> Self {
        Self {
            config,
            scheduler,
            oit,
            engine,
            current_tick: 0,
            waiting: VecDeque::new(),
            interactions: HashMap::new(),
            completed_requests: Vec::new(),
            throttled_requests: Vec::new(),
            wasted_tokens: 0,
            id_to_request: HashMap::new(),
            accounted_prefill: HashSet::new(),
        }
    }

    pub fn current_tick(&self) -> i64 {
        self.current_tick
    }

    fn accept_request(&mut self, req: Request) {
        self.scheduler.on_request_arrival(&req);
        self.id_to_request.insert(req.request_id, req.clone());
        self.waiting.push_back(req);
    }

    /// Registers a freshly-arrived interaction; its first stage enters the
    /// waiting queue directly (OIT only gates `inject_requests`).
    pub fn submit_interaction(&mut self, interaction: Interaction) {
        let first = interaction.next_request().cloned();
        self.interactions.insert(interaction.interaction_id, interaction);
        if let Some(req) = first {
            self.accept_request(req);
        }
    }

    /// Alternate arrival path: each request is checked against OIT before
    /// being accepted.
    pub fn inject_requests(&mut self, new_requests: Vec<Request>) {
        for mut req in new_requests {
            let snapshot = self.engine.get_state_snapshot();
            if let Some(oit) = self.oit.as_mut() {
                if oit.should_throttle(&req, snapshot.kv_tokens_used, snapshot.num_active_decodes) {
                    oit.throttle(&mut req);
                    self.throttled_requests.push(req);
                    continue;
                }
                oit.record_arrival(&req);
            }
            self.accept_request(req);
        }
    }

    fn admit_to_engine(&mut self) {
        let snapshot = self.engine.get_state_snapshot();
        let selected = self.scheduler.select_next_requests(
            &mut self.waiting,
            &self.interactions,
            &snapshot,
            self.config.max_batch,
        );
        for req in selected {
            self.engine.submit_request(req);
        }
    }

    fn process_events(&mut self, events: Vec<crate::engine::EngineEvent>) {
        let mut decode_served: Vec<Request> = Vec::new();

        for ev in events {
            let Some(req) = self.id_to_request.get(&ev.request_id).cloned() else {
                continue;
            };

            match ev.event_type {
                EngineEventType::PrefillChunkStarted => {
                    if ev.chunk_id == Some(0) && !self.accounted_prefill.contains(&req.request_id) {
                        self.scheduler.on_prefill_added(&req);
                        self.accounted_prefill.insert(req.request_id);
                    }
                }
                EngineEventType::DecodeStep => {
                    decode_served.push(req);
                }
                EngineEventType::RequestCompleted => {
                    let mut completed = req;
                    completed.completion_time = Some(ev.time);
                    self.id_to_request.insert(completed.request_id, completed.clone());
                    self.completed_requests.push(completed.clone());

                    let mut next_to_accept = None;
                    if let Some(inter) = self.interactions.get_mut(&completed.interaction_id) {
                        inter.mark_stage_complete();
                        if let Some(nxt) = inter.next_request_mut() {
                            nxt.arrival_time = ev.time.floor() as i64;
                            next_to_accept = Some(nxt.clone());
                        }
                    }
                    if let Some(nxt) = next_to_accept {
                        self.accept_request(nxt);
                    }
                }
                EngineEventType::PrefillChunkFinished => {}
            }
        }

        if !decode_served.is_empty() {
            self.scheduler.on_decode_iteration(&decode_served);
        }
    }

    /// One orchestrator tick: admit -> engine.step -> process events ->
    /// tick++.
    #[instrument(skip(self), fields(tick = self.current_tick))]
    pub fn step(&mut self) {
        self.admit_to_engine();
        let events = self.engine.step();
        if !events.is_empty() {
            self.process_events(events);
        }
        self.current_tick += 1;
    }

    fn has_incomplete_interaction(&self) -> bool {
        self.interactions.values().any(|i| !i.complete)
    }

    /// Runs until `max_time` or all work drains, whichever comes first.
    pub fn run(&mut self) -> MetricsReport {
        while self.current_tick < self.config.max_time
            && (!self.waiting.is_empty() || self.engine.has_pending_work() || self.has_incomplete_interaction())
        {
            self.step();
        }
        debug!(tick = self.current_tick, "run loop terminated");

        for req in &self.waiting {
            self.wasted_tokens += req.input_tokens + req.system_tokens + req.remaining_decode;
        }
        self.gather_metrics()
    }

    fn gather_metrics(&self) -> MetricsReport {
        let mut per_user_tokens: HashMap<String, u64> = HashMap::new();
        for req in &self.completed_requests {
            *per_user_tokens.entry(req.user.user_id.clone()).or_insert(0) +=
                req.input_tokens + req.system_tokens + req.output_tokens_target;
        }
        let latencies: Vec<f64> = self
            .completed_requests
            .iter()
            .filter_map(|r| r.latency())
            .collect();
        let avg_latency = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };

        MetricsReport {
            completed: self.completed_requests.len() as u64,
            avg_latency,
            wasted_tokens: self.wasted_tokens,
            throttled: self.throttled_requests.len() as u64,
            per_user_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, OitConfig, VtcConfig};
    use crate::model::request::test_app;
    use crate::model::{InteractionStage, User};
    use crate::scheduler::{FcfsScheduler, VtcScheduler};

    fn interaction_for(user: &str, id: u64) -> Interaction {
        let req = Request::new(
            id,
            User::new(user),
            test_app(),
            id,
            InteractionStage::UserPrompt,
            10,
            2,
            5,
            0,
        )
        .unwrap();
        Interaction::new(id, vec![req]).unwrap()
    }

    #[test]
    fn two_user_vtc_run_completes_both_with_close_counters() {
        let engine = Engine::new(EngineConfig {
            max_kv_tokens: 200,
            max_num_batched_tokens: 1,
            ..EngineConfig::default()
        });
        let scheduler = SchedulerKind::Vtc(VtcScheduler::new(VtcConfig::default()));
        let mut sim = Simulator::new(
            SimulatorConfig {
                max_time: 50,
                max_batch: 1,
            },
            scheduler,
            None,
            engine,
        );
        sim.submit_interaction(interaction_for("a", 1));
        sim.submit_interaction(interaction_for("b", 2));
        let metrics = sim.run();
        assert_eq!(metrics.completed, 2);
    }

    #[test]
    fn oit_never_throttles_mid_interaction_under_perpetual_overload() {
        let engine = Engine::new(EngineConfig::default());
        let scheduler = SchedulerKind::Fcfs(FcfsScheduler::new());
        let oit = Oit::new(OitConfig {
            kv_threshold: 1,
            max_batch: 1,
            ..OitConfig::default()
        });
        let mut sim = Simulator::new(
            SimulatorConfig {
                max_time: 200,
                max_batch: 16,
            },
            scheduler,
            Some(oit),
            engine,
        );

        let stage0 = Request::new(1, User::new("a"), test_app(), 1, InteractionStage::UserPrompt, 10, 2, 3, 0).unwrap();
        let stage1 = Request::new(2, User::new("a"), test_app(), 1, InteractionStage::Agent1, 10, 2, 3, 0).unwrap();
        sim.submit_interaction(Interaction::new(1, vec![stage0, stage1]).unwrap());

        let metrics = sim.run();
        assert_eq!(metrics.completed, 2);
        assert_eq!(metrics.throttled, 0);
    }
}

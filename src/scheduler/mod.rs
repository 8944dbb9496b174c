//! Fairness schedulers: FCFS, Virtual Token Counter (VTC), and Weighted
//! Service Counter / "FairServe" (WSC). Each picks which waiting requests to
//! release to the engine this tick; none may peek past the engine's
//! [`EngineSnapshot`] (spec §4.2, §9 two-layer composition).

mod fcfs;
mod vtc;
mod wsc;

pub use fcfs::FcfsScheduler;
pub use vtc::VtcScheduler;
pub use wsc::WscScheduler;

use std::collections::{HashMap, VecDeque};

use crate::engine::EngineSnapshot;
use crate::model::{Interaction, Request};

/// Four-hook contract shared by every fairness policy. `select_next_requests`
/// may pop from `waiting`; anything left there at return is preserved for
/// the next tick.
pub trait FairnessScheduler {
    fn on_request_arrival(&mut self, req: &Request);
    fn on_prefill_added(&mut self, req: &Request);
    fn on_decode_iteration(&mut self, served: &[Request]);
    fn select_next_requests(
        &mut self,
        waiting: &mut VecDeque<Request>,
        interactions: &HashMap<u64, Interaction>,
        snapshot: &EngineSnapshot,
        max_to_release: usize,
    ) -> Vec<Request>;
}

/// Swappable scheduler identity, chosen once at construction (spec §9:
/// "Dynamic polymorphism -> tagged variant").
pub enum SchedulerKind {
    Fcfs(FcfsScheduler),
    Vtc(VtcScheduler),
    Wsc(WscScheduler),
}

impl FairnessScheduler for SchedulerKind {
    fn on_request_arrival(&mut self, req: &Request) {
        match self {
            SchedulerKind::Fcfs(s) => s.on_request_arrival(req),
            SchedulerKind::Vtc(s) => s.on_request_arrival(req),
            SchedulerKind::Wsc(s) => s.on_request_arrival(req),
        }
    }

    fn on_prefill_added(&mut self, req: &Request) {
        match self {
            SchedulerKind::Fcfs(s) => s.on_prefill_added(req),
            SchedulerKind::Vtc(s) => s.on_prefill_added(req),
            SchedulerKind::Wsc(s) => s.on_prefill_added(req),
        }
    }

    fn on_decode_iteration(&mut self, served: &[Request]) {
        match self {
            SchedulerKind::Fcfs(s) => s.on_decode_iteration(served),
            SchedulerKind::Vtc(s) => s.on_decode_iteration(served),
            SchedulerKind::Wsc(s) => s.on_decode_iteration(served),
        }
    }

    fn select_next_requests(
        &mut self,
        waiting: &mut VecDeque<Request>,
        interactions: &HashMap<u64, Interaction>,
        snapshot: &EngineSnapshot,
        max_to_release: usize,
    ) -> Vec<Request> {
        match self {
            SchedulerKind::Fcfs(s) => s.select_next_requests(waiting, interactions, snapshot, max_to_release),
            SchedulerKind::Vtc(s) => s.select_next_requests(waiting, interactions, snapshot, max_to_release),
            SchedulerKind::Wsc(s) => s.select_next_requests(waiting, interactions, snapshot, max_to_release),
        }
    }
}

/// Removes and returns the first request in `waiting` matching `id`,
/// preserving the relative order of the rest. `VecDeque` has no
/// linear-scan-remove-by-value, so schedulers share this helper instead of
/// each re-deriving it.
fn remove_by_id(waiting: &mut VecDeque<Request>, request_id: u64) -> Option<Request> {
    let pos = waiting.iter().position(|r| r.request_id == request_id)?;
    waiting.remove(pos)
}

//! Overload & Interaction-aware Throttle (spec §4.3): rejects only *new*
//! interactions, and only under overload, bounded by per-user and per-app
//! request-rate limits. A continuation of an in-flight interaction is never
//! throttled.

use std::collections::{HashMap, VecDeque};

use tracing::instrument;

use crate::config::OitConfig;
use crate::model::{InteractionStage, Request};

/// Sliding-window arrival tracker plus the throttle decision itself.
/// Windows are keyed by `user_id` / `app_id` and evicted lazily on access.
pub struct Oit {
    config: OitConfig,
    user_windows: HashMap<String, VecDeque<i64>>,
    app_windows: HashMap<String, VecDeque<i64>>,
    throttled: u64,
}

impl Oit {
    pub fn new(config: OitConfig) -> Self {
        Self {
            config,
            user_windows: HashMap::new(),
            app_windows: HashMap::new(),
            throttled: 0,
        }
    }

    pub fn throttled_count(&self) -> u64 {
        self.throttled
    }

    fn evict(window: &mut VecDeque<i64>, now: i64, span: i64) {
        while matches!(window.front(), Some(&t) if t <= now - span) {
            window.pop_front();
        }
    }

    pub fn record_arrival(&mut self, req: &Request) {
        self.user_windows
            .entry(req.user.user_id.clone())
            .or_default()
            .push_back(req.arrival_time);
        self.app_windows
            .entry(req.application.app_id.clone())
            .or_default()
            .push_back(req.arrival_time);
    }

    pub fn is_overloaded(&self, kv_usage: u64, running: usize) -> bool {
        kv_usage > self.config.kv_threshold || running >= self.config.max_batch
    }

    /// `true` iff `req` should be rejected outright. Stage-0 only: a
    /// continuation (`stage != USER_PROMPT`) is never throttled regardless
    /// of overload.
    #[instrument(skip(self, req), fields(request_id = req.request_id))]
    pub fn should_throttle(&mut self, req: &Request, kv_usage: u64, running: usize) -> bool {
        let window = self.config.window;
        let user_window = self.user_windows.entry(req.user.user_id.clone()).or_default();
        Self::evict(user_window, req.arrival_time, window);
        let user_count = user_window.len();

        let app_window = self.app_windows.entry(req.application.app_id.clone()).or_default();
        Self::evict(app_window, req.arrival_time, window);
        let app_count = app_window.len();

        if !self.is_overloaded(kv_usage, running) {
            return false;
        }
        if req.stage != InteractionStage::UserPrompt {
            return false;
        }
        user_count >= req.application.user_rpm_limit || app_count >= req.application.app_rpm_limit
    }

    pub fn throttle(&mut self, req: &mut Request) {
        req.throttled = true;
        self.throttled += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::test_app;
    use crate::model::User;

    fn req_at(id: u64, stage: InteractionStage, arrival: i64) -> Request {
        Request::new(id, User::new("a"), test_app(), 0, stage, 10, 2, 1, arrival).unwrap()
    }

    fn req_with_limit(id: u64, stage: InteractionStage, arrival: i64, rpm: usize) -> Request {
        use std::collections::HashMap;
        use std::sync::Arc;
        let app = Arc::new(crate::model::Application::new(
            "tight",
            HashMap::from([(InteractionStage::UserPrompt, 10)]),
            HashMap::from([(InteractionStage::UserPrompt, 2)]),
            HashMap::from([(InteractionStage::UserPrompt, 1)]),
            rpm,
            rpm,
        ));
        Request::new(id, User::new("a"), app, 0, stage, 10, 2, 1, arrival).unwrap()
    }

    #[test]
    fn never_throttles_continuations() {
        let mut oit = Oit::new(OitConfig {
            kv_threshold: 0,
            max_batch: 0,
            ..OitConfig::default()
        });
        let req = req_at(1, InteractionStage::Agent1, 0);
        assert!(!oit.should_throttle(&req, 10_000, 100));
    }

    #[test]
    fn throttles_new_interactions_once_rpm_exceeded_under_overload() {
        let mut oit = Oit::new(OitConfig {
            kv_threshold: 0,
            max_batch: 0,
            window: 60,
            ..OitConfig::default()
        });
        let first = req_with_limit(1, InteractionStage::UserPrompt, 0, 1);
        oit.record_arrival(&first);
        assert!(!oit.should_throttle(&first, 10_000, 100));

        let second = req_with_limit(2, InteractionStage::UserPrompt, 1, 1);
        assert!(oit.should_throttle(&second, 10_000, 100));
    }

    #[test]
    fn does_not_throttle_when_not_overloaded() {
        let mut oit = Oit::new(OitConfig::default());
        let req = req_at(1, InteractionStage::UserPrompt, 0);
        assert!(!oit.should_throttle(&req, 0, 0));
    }

    #[test]
    fn window_eviction_resets_rate_after_elapsed_time() {
        let mut oit = Oit::new(OitConfig {
            kv_threshold: 0,
            max_batch: 0,
            window: 5,
            ..OitConfig::default()
        });
        let first = req_at(1, InteractionStage::UserPrompt, 0);
        oit.record_arrival(&first);

        let later = req_at(2, InteractionStage::UserPrompt, 10);
        assert!(!oit.should_throttle(&later, 10_000, 100));
    }
}

use std::sync::Arc;

use crate::error::SimError;
use crate::model::{Application, InteractionStage, User};

/// One stage's execution unit. `remaining_decode` is initialized to
/// `output_tokens_target` and only ever decreases; `done` holds iff it has
/// reached zero.
///
/// `application` is shared (`Arc`) rather than cloned per-request: many
/// requests across many interactions reference the same `Application`, and
/// schedulers need its `stage_weight` without the orchestrator threading a
/// side lookup table through every call.
#[derive(Clone, Debug)]
pub struct Request {
    pub request_id: u64,
    pub user: User,
    pub application: Arc<Application>,
    pub interaction_id: u64,
    pub stage: InteractionStage,
    pub input_tokens: u64,
    pub system_tokens: u64,
    pub output_tokens_target: u64,
    pub arrival_time: i64,
    pub remaining_decode: u64,
    pub start_time: Option<f64>,
    pub completion_time: Option<f64>,
    pub throttled: bool,
    pub stalled: bool,
}

impl Request {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: u64,
        user: User,
        application: Arc<Application>,
        interaction_id: u64,
        stage: InteractionStage,
        input_tokens: i64,
        system_tokens: i64,
        output_tokens_target: i64,
        arrival_time: i64,
    ) -> Result<Self, SimError> {
        if input_tokens < 0 {
            let err = SimError::NegativeTokenCount {
                field: "input_tokens",
                value: input_tokens,
            };
            tracing::warn!(request_id, %err, "rejected request construction");
            return Err(err);
        }
        if system_tokens < 0 {
            let err = SimError::NegativeTokenCount {
                field: "system_tokens",
                value: system_tokens,
            };
            tracing::warn!(request_id, %err, "rejected request construction");
            return Err(err);
        }
        if output_tokens_target < 1 {
            let err = SimError::ZeroOutputTarget {
                value: output_tokens_target,
            };
            tracing::warn!(request_id, %err, "rejected request construction");
            return Err(err);
        }

        Ok(Self {
            request_id,
            user,
            application,
            interaction_id,
            stage,
            input_tokens: input_tokens as u64,
            system_tokens: system_tokens as u64,
            output_tokens_target: output_tokens_target as u64,
            arrival_time,
            remaining_decode: output_tokens_target as u64,
            start_time: None,
            completion_time: None,
            throttled: false,
            stalled: false,
        })
    }

    pub fn done(&self) -> bool {
        self.remaining_decode == 0
    }

    /// `completion_time - arrival_time`, once completed.
    pub fn latency(&self) -> Option<f64> {
        self.completion_time.map(|c| c - self.arrival_time as f64)
    }

    /// Sum of prompt and still-unserved decode tokens; used to compute
    /// `wasted_tokens` for requests still waiting at `max_time`.
    pub fn unserved_tokens(&self) -> u64 {
        self.input_tokens + self.system_tokens + self.remaining_decode
    }
}

#[cfg(test)]
pub(crate) fn test_app() -> Arc<Application> {
    use std::collections::HashMap;
    Arc::new(Application::new(
        "toy",
        HashMap::from([(InteractionStage::UserPrompt, 10)]),
        HashMap::from([(InteractionStage::UserPrompt, 2)]),
        HashMap::from([(InteractionStage::UserPrompt, 5)]),
        120,
        2000,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("a")
    }

    #[test]
    fn remaining_decode_initialized_to_target() {
        let r = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, 10, 2, 5, 0).unwrap();
        assert_eq!(r.remaining_decode, 5);
        assert!(!r.done());
    }

    #[test]
    fn done_iff_remaining_decode_zero() {
        let mut r = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, 10, 2, 1, 0).unwrap();
        assert!(!r.done());
        r.remaining_decode = 0;
        assert!(r.done());
    }

    #[test]
    fn rejects_negative_input_tokens() {
        let err = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, -1, 2, 5, 0);
        assert!(matches!(
            err,
            Err(SimError::NegativeTokenCount { field: "input_tokens", .. })
        ));
    }

    #[test]
    fn rejects_negative_system_tokens() {
        let err = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, 10, -2, 5, 0);
        assert!(matches!(
            err,
            Err(SimError::NegativeTokenCount { field: "system_tokens", .. })
        ));
    }

    #[test]
    fn rejects_zero_output_target() {
        let err = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, 10, 2, 0, 0);
        assert!(matches!(err, Err(SimError::ZeroOutputTarget { .. })));
    }

    #[test]
    fn latency_is_none_until_completed() {
        let r = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, 10, 2, 5, 3).unwrap();
        assert_eq!(r.latency(), None);
    }

    #[test]
    fn latency_after_completion() {
        let mut r = Request::new(0, user(), test_app(), 0, InteractionStage::UserPrompt, 10, 2, 5, 3).unwrap();
        r.completion_time = Some(10.5);
        assert_eq!(r.latency(), Some(7.5));
    }
}

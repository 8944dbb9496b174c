use std::collections::HashSet;

use crate::error::SimError;
use crate::model::Request;

/// A chain of stage-ordered `Request`s belonging to one logical interaction
/// (e.g. user prompt -> agent -> agent -> final response). Only one request
/// in the chain is ever runnable at a time; `next_request` exposes it.
#[derive(Clone, Debug)]
pub struct Interaction {
    pub interaction_id: u64,
    requests: Vec<Request>,
    next_index: usize,
    pub complete: bool,
}

impl Interaction {
    /// Rejects an empty chain and duplicate `request_id`s within the chain;
    /// both would leave the orchestrator unable to address requests
    /// unambiguously.
    pub fn new(interaction_id: u64, requests: Vec<Request>) -> Result<Self, SimError> {
        if requests.is_empty() {
            let err = SimError::EmptyInteraction { interaction_id };
            tracing::warn!(interaction_id, %err, "rejected interaction construction");
            return Err(err);
        }
        let mut seen = HashSet::with_capacity(requests.len());
        for r in &requests {
            if !seen.insert(r.request_id) {
                let err = SimError::DuplicateRequestId {
                    request_id: r.request_id,
                };
                tracing::warn!(interaction_id, %err, "rejected interaction construction");
                return Err(err);
            }
        }
        Ok(Self {
            interaction_id,
            requests,
            next_index: 0,
            complete: false,
        })
    }

    /// The one request currently eligible to run, if the chain isn't done.
    pub fn next_request(&self) -> Option<&Request> {
        self.requests.get(self.next_index)
    }

    pub fn next_request_mut(&mut self) -> Option<&mut Request> {
        self.requests.get_mut(self.next_index)
    }

    /// Advances past the current stage once the engine reports it done,
    /// marking the whole interaction complete once the chain is exhausted.
    pub fn mark_stage_complete(&mut self) {
        self.next_index += 1;
        if self.next_index >= self.requests.len() {
            self.complete = true;
        }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::request::test_app;
    use crate::model::{InteractionStage, User};

    fn req(id: u64, stage: InteractionStage) -> Request {
        Request::new(id, User::new("a"), test_app(), 0, stage, 10, 2, 5, 0).unwrap()
    }

    #[test]
    fn rejects_empty_interaction() {
        let err = Interaction::new(0, vec![]);
        assert!(matches!(err, Err(SimError::EmptyInteraction { .. })));
    }

    #[test]
    fn rejects_duplicate_request_ids() {
        let err = Interaction::new(
            0,
            vec![req(1, InteractionStage::UserPrompt), req(1, InteractionStage::Agent1)],
        );
        assert!(matches!(err, Err(SimError::DuplicateRequestId { request_id: 1 })));
    }

    #[test]
    fn next_request_advances_and_completes() {
        let mut it = Interaction::new(
            0,
            vec![req(1, InteractionStage::UserPrompt), req(2, InteractionStage::Agent1)],
        )
        .unwrap();
        assert_eq!(it.next_request().unwrap().request_id, 1);
        assert!(!it.complete);

        it.mark_stage_complete();
        assert_eq!(it.next_request().unwrap().request_id, 2);
        assert!(!it.complete);

        it.mark_stage_complete();
        assert!(it.next_request().is_none());
        assert!(it.complete);
    }
}

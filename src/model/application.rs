use std::collections::HashMap;

use crate::error::SimError;
use crate::model::InteractionStage;

/// An application's expected per-stage token triples, plus the rate limits
/// OIT enforces for it. `stage_weight` turns a stage into a single positive
/// real used by the WSC fairness counter.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Application {
    pub app_id: String,
    expected_input_tokens: HashMap<u8, u64>,
    expected_system_tokens: HashMap<u8, u64>,
    expected_output_tokens: HashMap<u8, u64>,
    pub user_rpm_limit: usize,
    pub app_rpm_limit: usize,
}

impl Application {
    pub fn new(
        app_id: impl Into<String>,
        expected_input_tokens: HashMap<InteractionStage, u64>,
        expected_system_tokens: HashMap<InteractionStage, u64>,
        expected_output_tokens: HashMap<InteractionStage, u64>,
        user_rpm_limit: usize,
        app_rpm_limit: usize,
    ) -> Self {
        let to_raw = |m: HashMap<InteractionStage, u64>| -> HashMap<u8, u64> {
            m.into_iter().map(|(k, v)| (k as u8, v)).collect()
        };
        Self {
            app_id: app_id.into(),
            expected_input_tokens: to_raw(expected_input_tokens),
            expected_system_tokens: to_raw(expected_system_tokens),
            expected_output_tokens: to_raw(expected_output_tokens),
            user_rpm_limit,
            app_rpm_limit,
        }
    }

    fn expected(&self, map: &HashMap<u8, u64>, stage: InteractionStage, default: u64) -> u64 {
        *map.get(&(stage as u8)).unwrap_or(&default)
    }

    pub fn expected_input(&self, stage: InteractionStage) -> u64 {
        self.expected(&self.expected_input_tokens, stage, 1)
    }

    pub fn expected_system(&self, stage: InteractionStage) -> u64 {
        self.expected(&self.expected_system_tokens, stage, 0)
    }

    pub fn expected_output(&self, stage: InteractionStage) -> u64 {
        self.expected(&self.expected_output_tokens, stage, 1)
    }

    /// `w(stage) = alpha * E[input] + beta * E[system] + gamma * E[output]`.
    /// Rejects non-positive weights: every stage an application can be asked
    /// to serve must carry positive work, or WSC's division by `w(req)`
    /// would be undefined.
    pub fn stage_weight(
        &self,
        stage: InteractionStage,
        alpha: f64,
        beta: f64,
        gamma: f64,
    ) -> Result<f64, SimError> {
        let w = alpha * self.expected_input(stage) as f64
            + beta * self.expected_system(stage) as f64
            + gamma * self.expected_output(stage) as f64;
        if w <= 0.0 {
            let err = SimError::NonPositiveStageWeight { stage, value: w };
            tracing::warn!(app_id = %self.app_id, ?stage, %err, "rejected stage weight");
            return Err(err);
        }
        Ok(w)
    }
}

/// Four application profiles ported from the original prototype's
/// `experiments.py::default_apps()`, used by integration tests to exercise
/// the full 4-stage pipeline instead of only single-stage toy interactions.
/// Not used by the simulation core itself; exported for test/tool use only.
pub fn sample_applications() -> Vec<Application> {
    use InteractionStage::*;

    fn triples(vals: [(InteractionStage, u64); 4]) -> HashMap<InteractionStage, u64> {
        vals.into_iter().collect()
    }

    vec![
        Application::new(
            "summarization",
            triples([(UserPrompt, 500), (Agent1, 100), (Agent2, 50), (Final, 20)]),
            triples([(UserPrompt, 10), (Agent1, 10), (Agent2, 10), (Final, 5)]),
            triples([(UserPrompt, 80), (Agent1, 40), (Agent2, 40), (Final, 20)]),
            120,
            2000,
        ),
        Application::new(
            "chat",
            triples([(UserPrompt, 200), (Agent1, 150), (Agent2, 100), (Final, 50)]),
            triples([(UserPrompt, 20), (Agent1, 10), (Agent2, 10), (Final, 5)]),
            triples([(UserPrompt, 150), (Agent1, 100), (Agent2, 80), (Final, 50)]),
            120,
            2000,
        ),
        Application::new(
            "coding",
            triples([(UserPrompt, 120), (Agent1, 80), (Agent2, 80), (Final, 20)]),
            triples([(UserPrompt, 30), (Agent1, 10), (Agent2, 10), (Final, 5)]),
            triples([(UserPrompt, 300), (Agent1, 120), (Agent2, 120), (Final, 60)]),
            120,
            2000,
        ),
        Application::new(
            "multiagent",
            triples([(UserPrompt, 80), (Agent1, 60), (Agent2, 60), (Final, 40)]),
            triples([(UserPrompt, 10), (Agent1, 20), (Agent2, 20), (Final, 10)]),
            triples([(UserPrompt, 100), (Agent1, 80), (Agent2, 80), (Final, 60)]),
            120,
            2000,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> Application {
        Application::new(
            "toy",
            [(InteractionStage::UserPrompt, 10), (InteractionStage::Agent1, 5)]
                .into_iter()
                .collect(),
            [(InteractionStage::UserPrompt, 2), (InteractionStage::Agent1, 2)]
                .into_iter()
                .collect(),
            [(InteractionStage::UserPrompt, 5), (InteractionStage::Agent1, 5)]
                .into_iter()
                .collect(),
            120,
            2000,
        )
    }

    #[test]
    fn stage_weight_matches_formula() {
        let app = toy();
        // alpha=1, beta=2, gamma=1: 1*10 + 2*2 + 1*5 = 19
        let w = app
            .stage_weight(InteractionStage::UserPrompt, 1.0, 2.0, 1.0)
            .unwrap();
        assert_eq!(w, 19.0);
    }

    #[test]
    fn missing_stage_falls_back_to_defaults() {
        let app = toy();
        assert_eq!(app.expected_input(InteractionStage::Final), 1);
        assert_eq!(app.expected_system(InteractionStage::Final), 0);
        assert_eq!(app.expected_output(InteractionStage::Final), 1);
    }

    #[test]
    fn zero_weight_application_is_rejected() {
        let app = Application::new(
            "degenerate",
            [(InteractionStage::UserPrompt, 0)].into_iter().collect(),
            HashMap::new(),
            [(InteractionStage::UserPrompt, 0)].into_iter().collect(),
            120,
            2000,
        );
        let err = app.stage_weight(InteractionStage::UserPrompt, 1.0, 2.0, 1.0);
        assert!(matches!(err, Err(SimError::NonPositiveStageWeight { .. })));
    }

    #[test]
    fn sample_applications_cover_all_stages() {
        for app in sample_applications() {
            for stage in [
                InteractionStage::UserPrompt,
                InteractionStage::Agent1,
                InteractionStage::Agent2,
                InteractionStage::Final,
            ] {
                assert!(app.stage_weight(stage, 1.0, 2.0, 1.0).unwrap() > 0.0);
            }
        }
    }
}

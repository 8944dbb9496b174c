/// A tenant of the inference service. `user_id` is the fairness key used by
/// every scheduler's per-user counter map.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub user_id: String,
    /// Positive weight used by WSC to scale service counter increments.
    pub priority: f64,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            priority: 1.0,
        }
    }

    pub fn with_priority(user_id: impl Into<String>, priority: f64) -> Self {
        Self {
            user_id: user_id.into(),
            priority,
        }
    }
}

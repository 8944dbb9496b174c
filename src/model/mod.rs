//! Core data model: entities, invariants, and stage weights (spec.md §3).

mod application;
mod interaction;
pub(crate) mod request;
mod user;

pub use application::{sample_applications, Application};
pub use interaction::Interaction;
pub use request::Request;
pub use user::User;

/// Closed enumeration of the four stages an interaction can carry. Ordering
/// by numeric value defines the stage pipeline: a later stage's request is
/// only released after the previous stage's request has completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum InteractionStage {
    UserPrompt = 0,
    Agent1 = 1,
    Agent2 = 2,
    Final = 3,
}

impl InteractionStage {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_continuation(self) -> bool {
        self != InteractionStage::UserPrompt
    }
}

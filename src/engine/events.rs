/// Event stream emitted by a single `Engine::step` call. Consumers must
/// preserve emission order: decode events precede prefill-start events
/// precede completion events (spec §5, ordering guarantees).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EngineEventType {
    PrefillChunkStarted,
    PrefillChunkFinished,
    DecodeStep,
    RequestCompleted,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineEvent {
    pub event_type: EngineEventType,
    pub time: f64,
    pub request_id: u64,
    pub chunk_id: Option<u64>,
    pub chunk_len: Option<u64>,
    pub token_index: Option<u64>,
}

impl EngineEvent {
    pub fn decode_step(time: f64, request_id: u64, token_index: u64) -> Self {
        Self {
            event_type: EngineEventType::DecodeStep,
            time,
            request_id,
            chunk_id: None,
            chunk_len: None,
            token_index: Some(token_index),
        }
    }

    pub fn prefill_chunk_started(time: f64, request_id: u64, chunk_id: u64, chunk_len: u64) -> Self {
        Self {
            event_type: EngineEventType::PrefillChunkStarted,
            time,
            request_id,
            chunk_id: Some(chunk_id),
            chunk_len: Some(chunk_len),
            token_index: None,
        }
    }

    pub fn prefill_chunk_finished(time: f64, request_id: u64, chunk_id: u64, chunk_len: u64) -> Self {
        Self {
            event_type: EngineEventType::PrefillChunkFinished,
            time,
            request_id,
            chunk_id: Some(chunk_id),
            chunk_len: Some(chunk_len),
            token_index: None,
        }
    }

    pub fn request_completed(time: f64, request_id: u64) -> Self {
        Self {
            event_type: EngineEventType::RequestCompleted,
            time,
            request_id,
            chunk_id: None,
            chunk_len: None,
            token_index: None,
        }
    }
}

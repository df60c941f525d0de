use std::any::Any;

use thiserror::Error;

use crate::wire::WireError;

/// Failures that abort a source or a whole aggregation.
///
/// Token-level problems never show up here; they are recovered inside the
/// tokenizer and only counted.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("source {id} unavailable: {reason}")]
    SourceUnavailable { id: String, reason: String },
    #[error("chunk {chunk} of source {id} panicked: {message}")]
    ChunkPanicked {
        id: String,
        chunk: usize,
        message: String,
    },
    #[error("worker for source {id} panicked: {message}")]
    SourcePanicked { id: String, message: String },
    #[error("failed to spawn {what}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("worker for source {id} exited with {status}: {stderr}")]
    WorkerFailed {
        id: String,
        status: String,
        stderr: String,
    },
    #[error("failed to transfer table for source {id}")]
    Transfer {
        id: String,
        #[source]
        source: WireError,
    },
}

impl EngineError {
    /// True for failures of an execution unit rather than of its input.
    pub fn is_concurrency_failure(&self) -> bool {
        !matches!(self, EngineError::SourceUnavailable { .. })
    }

    pub(crate) fn source_unavailable(id: &str, err: &anyhow::Error) -> Self {
        EngineError::SourceUnavailable {
            id: id.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

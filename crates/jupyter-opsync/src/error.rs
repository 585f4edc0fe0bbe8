use thiserror::Error;

use crate::editor::EditorError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("editor apply failed: {0}")]
    Editor(#[from] EditorError),

    #[error("document broker error: {0}")]
    Broker(String),

    #[error("cell index {index} out of bounds (table length {len})")]
    IndexDesync { index: usize, len: usize },

    #[error("operation error: {0}")]
    Op(#[from] json0::OpError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;

//! The local-editor collaborator contract.
//!
//! One injected adapter owns every call into the host editor and every
//! native mutation event coming back out. Type-change detection is part of
//! the event contract: a host that converts a cell by delete-and-reinsert
//! must emit a single [`EditorEvent::CellTypeChanged`] instead of the raw
//! insert/delete pair.

use serde_json::Value;
use thiserror::Error;

use crate::doc::{CellKind, CellState, ExecutionCount};

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("invalid cell index: {0}")]
    InvalidIndex(usize),

    #[error("editor call failed: {0}")]
    Failed(String),
}

/// Native mutation events emitted by the local editor.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// A cell appeared at `index`; `cell` is its snapshot.
    CellInserted { index: usize, cell: CellState },
    /// The cell at `index` was removed; `cell` is the removed snapshot.
    CellDeleted { index: usize, cell: CellState },
    /// The user requested execution of the cell at `index`.
    CellExecuted { index: usize },
    /// Execution of the cell at `index` finished and its outputs are final.
    CellExecutionFinished { index: usize },
    /// The cell at `index` was converted to a different kind in place.
    CellTypeChanged { index: usize },
}

impl EditorEvent {
    /// The structural position the event refers to.
    pub fn index(&self) -> usize {
        match self {
            EditorEvent::CellInserted { index, .. }
            | EditorEvent::CellDeleted { index, .. }
            | EditorEvent::CellExecuted { index }
            | EditorEvent::CellExecutionFinished { index }
            | EditorEvent::CellTypeChanged { index } => *index,
        }
    }
}

/// Adapter over the host notebook editor.
///
/// Mutation calls made by the engine may cause the host to fire its own
/// native events; the adapter queues every native event and the engine
/// drains them through [`LocalEditor::drain_events`]. Events drained while a
/// remote apply is in progress are recognized as echoes and ignored, so the
/// adapter must make engine-caused events visible to `drain_events` before
/// the mutation call returns.
pub trait LocalEditor {
    /// Number of cells currently in the editor.
    fn cell_count(&self) -> usize;

    /// Snapshot of the cell at `index`, if present.
    fn cell_at(&self, index: usize) -> Option<CellState>;

    /// Insert a new cell of `kind` before `index`.
    fn insert_cell_at(&mut self, index: usize, kind: CellKind) -> Result<(), EditorError>;

    /// Delete the cell at `index`.
    fn delete_cell_at(&mut self, index: usize) -> Result<(), EditorError>;

    /// Convert the cell at `index` to `kind` in place.
    fn convert_cell_type(&mut self, index: usize, kind: CellKind) -> Result<(), EditorError>;

    /// Set the displayed execution count of the cell at `index`.
    fn set_execution_count(
        &mut self,
        index: usize,
        value: ExecutionCount,
    ) -> Result<(), EditorError>;

    /// Clear the rendered outputs of the cell at `index`.
    fn clear_outputs(&mut self, index: usize) -> Result<(), EditorError>;

    /// Append one output item to the cell at `index`. Items arrive strictly
    /// in list order; the editor must not batch or reorder them.
    fn append_output(&mut self, index: usize, item: Value) -> Result<(), EditorError>;

    /// Trigger actual execution of the cell at `index`. Only invoked on the
    /// privileged (host-role) session in response to a pending-execution
    /// marker from another participant.
    fn request_execution(&mut self, index: usize) -> Result<(), EditorError>;

    /// Take all native events queued since the last drain, in order.
    fn drain_events(&mut self) -> Vec<EditorEvent>;
}

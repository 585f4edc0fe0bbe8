//! The notebook binding: routes remote operations into the local editor and
//! local mutation events back out as operations.

use std::time::Instant;

use json0::{path, Operation};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cells::CellIndexTable;
use crate::classify::{classify, OpKind};
use crate::doc::{keys, paths, CellState, DocEvent, DocEventKind, ExecutionCount, OriginTag, SharedDoc, SubDoc};
use crate::editor::{EditorEvent, LocalEditor};
use crate::error::{Result, SyncError};
use crate::gate::SyncGate;
use crate::resync::{DeferredPrompts, FixedDelay, PromptSyncPolicy};

/// Which participant this session is.
///
/// Execution requests from guests surface as the pending marker; only the
/// host actually runs cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

/// Configuration for a notebook binding.
pub struct BindingConfig {
    role: Role,
    origin: OriginTag,
    prompt_sync: Box<dyn PromptSyncPolicy>,
}

impl BindingConfig {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            origin: OriginTag::random(),
            prompt_sync: Box::new(FixedDelay::default()),
        }
    }

    /// Set the origin tag this binding submits under.
    pub fn with_origin(mut self, origin: OriginTag) -> Self {
        self.origin = origin;
        self
    }

    /// Replace the deferred prompt-resync policy.
    pub fn with_prompt_sync(mut self, policy: impl PromptSyncPolicy + 'static) -> Self {
        self.prompt_sync = Box::new(policy);
        self
    }
}

/// One collaborative session's binding between a local editor and the
/// shared document.
///
/// The binding owns the cell index table and both suppression gates. The
/// host event loop feeds it from two sides: shared-document events go to
/// [`handle_doc_event`](Self::handle_doc_event), native editor events to
/// [`handle_editor_event`](Self::handle_editor_event) (or in bulk via
/// [`pump_editor_events`](Self::pump_editor_events)). Every entry point is
/// synchronous; one remote application runs to completion between gate set
/// and gate clear.
pub struct NotebookBinding<E: LocalEditor, D: SharedDoc> {
    editor: E,
    doc: D,
    table: CellIndexTable<D::Sub>,
    gate: SyncGate,
    convert_gate: SyncGate,
    origin: OriginTag,
    role: Role,
    prompt_sync: Box<dyn PromptSyncPolicy>,
    deferred: DeferredPrompts,
    closed: bool,
}

impl<E: LocalEditor, D: SharedDoc> NotebookBinding<E, D> {
    /// Create a binding and seed the index table from the editor's current
    /// cells, one sub-document per position.
    pub fn new(editor: E, doc: D, config: BindingConfig) -> Self {
        let mut binding = Self {
            editor,
            doc,
            table: CellIndexTable::new(),
            gate: SyncGate::new(),
            convert_gate: SyncGate::new(),
            origin: config.origin,
            role: config.role,
            prompt_sync: config.prompt_sync,
            deferred: DeferredPrompts::new(),
            closed: false,
        };
        binding.seed_table();
        binding
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn origin(&self) -> &OriginTag {
        &self.origin
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of cells the index table currently tracks.
    pub fn cell_count(&self) -> usize {
        self.table.len()
    }

    /// Current table positions, in order. Always contiguous `0..n-1`.
    pub fn positions(&self) -> Vec<usize> {
        self.table.positions()
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn doc(&self) -> &D {
        &self.doc
    }

    /// Tear the session down: drop every cell binding and stop reacting to
    /// events. Unsubscribing from the two event sources is the host's side
    /// of the contract; anything still delivered to a closed binding is
    /// swallowed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.deferred.clear();
        self.table.clear();
    }

    // ---- remote path -----------------------------------------------------

    /// Handle one event from the shared document's stream.
    pub fn handle_doc_event(&mut self, event: &DocEvent) {
        if self.closed || event.kind != DocEventKind::Op {
            return;
        }
        if event.origin == self.origin {
            return;
        }
        for op in &event.ops {
            self.apply_remote(op);
        }
    }

    /// Apply one remote operation onto the local editor under the gate.
    fn apply_remote(&mut self, op: &Operation) {
        let _guard = self.gate.hold();
        match self.apply_remote_inner(op) {
            Ok(()) => {}
            Err(SyncError::IndexDesync { index, len }) => {
                warn!(index, len, "operation outside index bounds; rebuilding table from document state");
                self.rebuild_table();
            }
            Err(e) => {
                warn!(error = %e, "remote operation not applied");
            }
        }
        // Consume native events the apply provoked. The held gate makes the
        // handler treat them as echoes.
        for event in self.editor.drain_events() {
            self.handle_editor_event(event);
        }
    }

    fn apply_remote_inner(&mut self, op: &Operation) -> Result<()> {
        match classify(op) {
            OpKind::StructuralInsert { index, cell } => {
                if index > self.table.len() {
                    return Err(SyncError::IndexDesync { index, len: self.table.len() });
                }
                let snapshot: CellState = serde_json::from_value(cell.clone())?;
                self.editor.insert_cell_at(index, snapshot.kind)?;
                let doc = &self.doc;
                self.table.insert(index, snapshot.id, |p| doc.sub_doc(p));
                Ok(())
            }
            OpKind::StructuralDelete { index, .. } => {
                self.check_live(index)?;
                self.editor.delete_cell_at(index)?;
                let doc = &self.doc;
                self.table.remove(index, |p| doc.sub_doc(p));
                Ok(())
            }
            OpKind::ExecutionCountChange { index, new, .. } => {
                self.check_live(index)?;
                let count: ExecutionCount = serde_json::from_value(new.clone())?;
                self.editor.set_execution_count(index, count)?;
                // A guest's execution request arrives as the pending marker;
                // the host runs the cell and its completion handler later
                // emits the real count.
                if count.is_pending() && self.role == Role::Host {
                    self.editor.request_execution(index)?;
                }
                Ok(())
            }
            OpKind::OutputsChange { index, new, .. } => {
                self.check_live(index)?;
                let items = new.as_array().ok_or_else(|| {
                    SyncError::Op(json0::OpError::Malformed(
                        "outputs replacement must be a list".to_string(),
                    ))
                })?;
                self.editor.clear_outputs(index)?;
                // Output order is externally observable; append one at a
                // time, strictly in list order.
                for item in items {
                    self.editor.append_output(index, item.clone())?;
                }
                Ok(())
            }
            OpKind::TypeChange { index, new, .. } => {
                self.check_live(index)?;
                let snapshot: CellState = serde_json::from_value(new.clone())?;
                {
                    // The editor's own conversion routine fires insert/delete
                    // events that are already applied, not new local edits.
                    let _convert = self.convert_gate.hold();
                    self.editor.convert_cell_type(index, snapshot.kind)?;
                    for event in self.editor.drain_events() {
                        self.handle_editor_event(event);
                    }
                }
                if let Some(binding) = self.table.get_mut(index) {
                    binding.set_cell_id(snapshot.id);
                }
                Ok(())
            }
            OpKind::Unclassified => {
                warn!(path = %path::display(op.path()), "unclassified operation dropped");
                Ok(())
            }
        }
    }

    // ---- local path ------------------------------------------------------

    /// Drain the editor's queued native events and handle each.
    pub fn pump_editor_events(&mut self) {
        for event in self.editor.drain_events() {
            self.handle_editor_event(event);
        }
    }

    /// Handle one native mutation event from the local editor.
    pub fn handle_editor_event(&mut self, event: EditorEvent) {
        if self.closed {
            return;
        }
        if self.gate.is_held() || self.convert_gate.is_held() {
            debug!(index = event.index(), "editor event suppressed during remote apply");
            return;
        }
        if let Err(e) = self.handle_editor_event_inner(event) {
            warn!(error = %e, "local event not propagated");
        }
    }

    fn handle_editor_event_inner(&mut self, event: EditorEvent) -> Result<()> {
        match event {
            EditorEvent::CellInserted { index, cell } => {
                if index > self.table.len() {
                    self.rebuild_table();
                    return Ok(());
                }
                let doc = &self.doc;
                self.table.insert(index, cell.id.clone(), |p| doc.sub_doc(p));
                let op = Operation::list_insert(paths::cell(index), serde_json::to_value(&cell)?);
                self.submit(op)
            }
            EditorEvent::CellDeleted { index, cell } => {
                if index >= self.table.len() {
                    self.rebuild_table();
                    return Ok(());
                }
                let doc = &self.doc;
                self.table.remove(index, |p| doc.sub_doc(p));
                let op = Operation::list_delete(paths::cell(index), serde_json::to_value(&cell)?);
                self.submit(op)
            }
            EditorEvent::CellExecuted { index } => self.sync_input_prompt(index),
            EditorEvent::CellExecutionFinished { index } => {
                let Some(cell) = self.editor.cell_at(index) else {
                    debug!(index, "execution finished for a cell no longer present");
                    return Ok(());
                };
                let old = self.shared_cell_field(index, keys::OUTPUTS);
                let new = Value::Array(cell.outputs);
                self.submit(Operation::obj_replace(paths::outputs(index), old, new))?;

                // The editor's prompt number lags the outputs; re-read it
                // shortly after.
                if let Some(delay) = self.prompt_sync.delay() {
                    self.deferred.schedule(index, Instant::now() + delay);
                }
                Ok(())
            }
            EditorEvent::CellTypeChanged { index } => {
                let Some(cell) = self.editor.cell_at(index) else {
                    debug!(index, "type change for a cell no longer present");
                    return Ok(());
                };
                let old = self.shared_cell(index);
                let new = serde_json::to_value(&cell)?;
                // One atomic whole-cell replacement, never a separate
                // delete and insert.
                self.submit(Operation::list_replace(paths::cell(index), old, new))?;
                if let Some(binding) = self.table.get_mut(index) {
                    binding.set_cell_id(cell.id);
                }
                Ok(())
            }
        }
    }

    // ---- deferred prompt resync -----------------------------------------

    /// Run every deferred prompt resync that is due at `now`. Entries whose
    /// cell is gone since scheduling are dropped.
    pub fn flush_due_prompt_syncs(&mut self, now: Instant) {
        if self.closed {
            return;
        }
        for index in self.deferred.take_due(now) {
            if index >= self.table.len() {
                debug!(index, "stale prompt resync dropped");
                continue;
            }
            if let Err(e) = self.sync_input_prompt(index) {
                warn!(error = %e, "deferred prompt resync failed");
            }
        }
    }

    /// Earliest due time among pending prompt resyncs, for host scheduling.
    pub fn next_prompt_sync_due(&self) -> Option<Instant> {
        self.deferred.next_due()
    }

    /// Re-read the cell's execution count from the editor and submit a
    /// field replace against the value currently in the shared document.
    fn sync_input_prompt(&mut self, index: usize) -> Result<()> {
        let Some(cell) = self.editor.cell_at(index) else {
            debug!(index, "prompt sync for a cell no longer present");
            return Ok(());
        };
        let old = self.shared_cell_field(index, keys::EXECUTION_COUNT);
        let new = serde_json::to_value(cell.execution_count)?;
        self.submit(Operation::obj_replace(paths::execution_count(index), old, new))
    }

    // ---- internals -------------------------------------------------------

    fn submit(&mut self, op: Operation) -> Result<()> {
        self.doc.submit_ops(&[op], &self.origin)
    }

    fn check_live(&self, index: usize) -> Result<()> {
        if index >= self.table.len() {
            return Err(SyncError::IndexDesync { index, len: self.table.len() });
        }
        Ok(())
    }

    /// The shared document's current snapshot of one cell.
    fn shared_cell(&self, index: usize) -> Value {
        self.table
            .get(index)
            .map(|b| b.sub().data())
            .unwrap_or(Value::Null)
    }

    fn shared_cell_field(&self, index: usize, field: &str) -> Value {
        self.shared_cell(index)
            .get(field)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn seed_table(&mut self) {
        let ids: Vec<String> = (0..self.editor.cell_count())
            .map(|i| {
                self.editor
                    .cell_at(i)
                    .map(|c| c.id)
                    .unwrap_or_else(|| Uuid::new_v4().to_string())
            })
            .collect();
        let doc = &self.doc;
        self.table.rebuild(ids, |p| doc.sub_doc(p));
    }

    /// IndexDesync recovery: reconstruct the table from the document's
    /// current materialized state rather than proceeding with a stale index.
    fn rebuild_table(&mut self) {
        let data = self.doc.data();
        let cells = json0::value_at(&data, &paths::cells())
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let ids: Vec<String> = cells
            .iter()
            .map(|cell| {
                cell.get(keys::ID)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| Uuid::new_v4().to_string())
            })
            .collect();
        let doc = &self.doc;
        self.table.rebuild(ids, |p| doc.sub_doc(p));
    }
}

//! End-to-end tests for the notebook binding over the in-memory broker.
//!
//! The recording editor plays the host's side of the editor contract: it
//! mutates a cell list, queues the native events a real editor would fire
//! (including echoes of engine-initiated mutations), and logs every call so
//! tests can assert exactly what the engine did.

use std::time::Instant;

use json0::Operation;
use jupyter_opsync::{
    paths, BindingConfig, CellKind, CellState, DocEvent, DocEventKind, EditorError, EditorEvent,
    ExecutionCount, Immediate, LocalEditor, MemoryDoc, NotebookBinding, OriginTag, Role,
};
use serde_json::{json, Value};

#[derive(Default)]
struct RecordingEditor {
    cells: Vec<CellState>,
    queued: Vec<EditorEvent>,
    calls: Vec<String>,
    fail_mutations: bool,
}

impl RecordingEditor {
    fn with_cells(cells: Vec<CellState>) -> Self {
        Self {
            cells,
            ..Self::default()
        }
    }

    fn check(&self, index: usize, len: usize) -> Result<(), EditorError> {
        if self.fail_mutations {
            return Err(EditorError::Failed("editor unavailable".into()));
        }
        if index >= len {
            return Err(EditorError::InvalidIndex(index));
        }
        Ok(())
    }
}

impl LocalEditor for RecordingEditor {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_at(&self, index: usize) -> Option<CellState> {
        self.cells.get(index).cloned()
    }

    fn insert_cell_at(&mut self, index: usize, kind: CellKind) -> Result<(), EditorError> {
        self.check(index, self.cells.len() + 1)?;
        self.calls.push(format!("insert@{index}:{kind}"));
        let cell = CellState::new(kind);
        self.cells.insert(index, cell.clone());
        self.queued.push(EditorEvent::CellInserted { index, cell });
        Ok(())
    }

    fn delete_cell_at(&mut self, index: usize) -> Result<(), EditorError> {
        self.check(index, self.cells.len())?;
        self.calls.push(format!("delete@{index}"));
        let cell = self.cells.remove(index);
        self.queued.push(EditorEvent::CellDeleted { index, cell });
        Ok(())
    }

    fn convert_cell_type(&mut self, index: usize, kind: CellKind) -> Result<(), EditorError> {
        self.check(index, self.cells.len())?;
        self.calls.push(format!("convert@{index}:{kind}"));
        self.cells[index].kind = kind;
        // A real editor's conversion routine independently fires its own
        // mutation events.
        self.queued.push(EditorEvent::CellTypeChanged { index });
        Ok(())
    }

    fn set_execution_count(
        &mut self,
        index: usize,
        value: ExecutionCount,
    ) -> Result<(), EditorError> {
        self.check(index, self.cells.len())?;
        self.calls.push(format!("count@{index}"));
        self.cells[index].execution_count = value;
        Ok(())
    }

    fn clear_outputs(&mut self, index: usize) -> Result<(), EditorError> {
        self.check(index, self.cells.len())?;
        self.calls.push(format!("clear@{index}"));
        self.cells[index].outputs.clear();
        Ok(())
    }

    fn append_output(&mut self, index: usize, item: Value) -> Result<(), EditorError> {
        self.check(index, self.cells.len())?;
        let label = item.as_str().map(str::to_string).unwrap_or(item.to_string());
        self.calls.push(format!("append@{index}:{label}"));
        self.cells[index].outputs.push(item);
        Ok(())
    }

    fn request_execution(&mut self, index: usize) -> Result<(), EditorError> {
        self.check(index, self.cells.len())?;
        self.calls.push(format!("execute@{index}"));
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.queued)
    }
}

type Binding = NotebookBinding<RecordingEditor, MemoryDoc>;

fn three_cell_session(role: Role) -> (MemoryDoc, Binding) {
    let cells = vec![
        CellState::code("a = 1"),
        CellState::code("b = 2"),
        CellState::markdown("# notes"),
    ];
    let doc = MemoryDoc::notebook(&cells).unwrap();
    let editor = RecordingEditor::with_cells(cells);
    let binding = NotebookBinding::new(
        editor,
        doc.clone(),
        BindingConfig::new(role).with_prompt_sync(Immediate),
    );
    (doc, binding)
}

fn doc_cell_count(doc: &MemoryDoc) -> usize {
    use jupyter_opsync::SharedDoc;
    doc.data()["notebook"]["cells"].as_array().unwrap().len()
}

/// Submit ops as a remote participant and deliver the resulting events.
fn remote_submit(doc: &MemoryDoc, binding: &mut Binding, ops: Vec<Operation>) {
    use jupyter_opsync::SharedDoc;
    let mut remote = doc.clone();
    remote.submit_ops(&ops, &OriginTag::new("remote-peer")).unwrap();
    deliver(doc, binding);
}

/// Drain the broker's event queue into the binding.
fn deliver(doc: &MemoryDoc, binding: &mut Binding) {
    for event in doc.take_events() {
        binding.handle_doc_event(&event);
    }
}

fn assert_invariant(doc: &MemoryDoc, binding: &Binding) {
    let n = doc_cell_count(doc);
    assert_eq!(binding.cell_count(), n, "table length must match document");
    assert_eq!(binding.editor().cell_count(), n, "editor must match document");
    assert_eq!(binding.positions(), (0..n).collect::<Vec<_>>());
}

#[test]
fn test_echo_suppression_on_remote_insert() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    let cell = serde_json::to_value(CellState::code("c = 3")).unwrap();
    remote_submit(&doc, &mut binding, vec![Operation::list_insert(paths::cell(2), cell)]);

    let inserts: Vec<_> = binding
        .editor()
        .calls
        .iter()
        .filter(|c| c.starts_with("insert@"))
        .collect();
    assert_eq!(inserts, vec!["insert@2:code"]);

    // The editor's echo event was consumed under the gate; nothing came back
    // out as a submission.
    assert!(doc.take_events().is_empty());
    assert_invariant(&doc, &binding);
}

#[test]
fn test_remote_insert_then_delete_round_trip() {
    let (doc, mut binding) = three_cell_session(Role::Guest);
    let before_sources: Vec<String> =
        binding.editor().cells.iter().map(|c| c.source.clone()).collect();
    let before_len = binding.cell_count();

    let cell = serde_json::to_value(CellState::markdown("transient")).unwrap();
    remote_submit(
        &doc,
        &mut binding,
        vec![Operation::list_insert(paths::cell(1), cell.clone())],
    );
    assert_eq!(binding.cell_count(), before_len + 1);

    remote_submit(&doc, &mut binding, vec![Operation::list_delete(paths::cell(1), cell)]);

    let after_sources: Vec<String> =
        binding.editor().cells.iter().map(|c| c.source.clone()).collect();
    assert_eq!(after_sources, before_sources);
    assert_eq!(binding.cell_count(), before_len);
    assert_invariant(&doc, &binding);
}

#[test]
fn test_index_invariant_under_mixed_traffic() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    // Local insert at 1.
    binding.editor_mut().insert_cell_at(1, CellKind::Code).unwrap();
    binding.pump_editor_events();
    assert_invariant(&doc, &binding);

    // The binding's own submission comes back around and is ignored.
    deliver(&doc, &mut binding);
    assert_invariant(&doc, &binding);

    // Remote insert at 0.
    let cell = serde_json::to_value(CellState::code("remote")).unwrap();
    remote_submit(&doc, &mut binding, vec![Operation::list_insert(paths::cell(0), cell)]);
    assert_invariant(&doc, &binding);

    // Local delete at 2.
    binding.editor_mut().delete_cell_at(2).unwrap();
    binding.pump_editor_events();
    deliver(&doc, &mut binding);
    assert_invariant(&doc, &binding);

    // Remote delete at 0.
    remote_submit(&doc, &mut binding, vec![Operation::list_delete(paths::cell(0), json!({}))]);
    assert_invariant(&doc, &binding);
}

#[test]
fn test_output_ordering_preserved_exactly() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    let op = Operation::obj_replace(paths::outputs(0), json!([]), json!(["A", "B", "C"]));
    remote_submit(&doc, &mut binding, vec![op]);

    let output_calls: Vec<_> = binding
        .editor()
        .calls
        .iter()
        .filter(|c| c.starts_with("clear@") || c.starts_with("append@"))
        .collect();
    assert_eq!(
        output_calls,
        vec!["clear@0", "append@0:A", "append@0:B", "append@0:C"]
    );
    assert_eq!(
        binding.editor().cells[0].outputs,
        vec![json!("A"), json!("B"), json!("C")]
    );
}

#[test]
fn test_local_type_change_submits_one_atomic_op() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    // The user converts cell 1 from code to markdown; the adapter reports
    // one type-change event, not an insert/delete pair.
    binding.editor_mut().convert_cell_type(1, CellKind::Markdown).unwrap();
    binding.pump_editor_events();

    let events = doc.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].ops.len(), 1);

    let wire = serde_json::to_value(&events[0].ops[0]).unwrap();
    assert_eq!(wire["p"], json!(["notebook", "cells", 1]));
    assert!(wire.get("li").is_some(), "replacement must carry the new cell");
    assert!(wire.get("ld").is_some(), "replacement must carry the old cell");
    assert_eq!(wire["li"]["cell_type"], json!("markdown"));
}

#[test]
fn test_remote_type_change_applies_without_resubmission() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    let old = serde_json::to_value(binding.editor().cells[1].clone()).unwrap();
    let mut converted = binding.editor().cells[1].clone();
    converted.kind = CellKind::Markdown;
    let new = serde_json::to_value(&converted).unwrap();

    remote_submit(
        &doc,
        &mut binding,
        vec![Operation::list_replace(paths::cell(1), old, new)],
    );

    assert_eq!(binding.editor().cells[1].kind, CellKind::Markdown);
    let converts: Vec<_> = binding
        .editor()
        .calls
        .iter()
        .filter(|c| c.starts_with("convert@"))
        .collect();
    assert_eq!(converts, vec!["convert@1:markdown"]);

    // The conversion routine's own events were treated as already applied.
    assert!(doc.take_events().is_empty());
    assert_invariant(&doc, &binding);
}

#[test]
fn test_role_gated_execution() {
    // The host sees a pending marker and actually runs the cell.
    let (doc, mut host) = three_cell_session(Role::Host);
    let op = Operation::obj_replace(paths::execution_count(0), json!(null), json!("*"));
    remote_submit(&doc, &mut host, vec![op.clone()]);

    let executes: Vec<_> = host
        .editor()
        .calls
        .iter()
        .filter(|c| c.starts_with("execute@"))
        .collect();
    assert_eq!(executes, vec!["execute@0"]);
    assert_eq!(host.editor().cells[0].execution_count, ExecutionCount::Pending);

    // A guest seeing the identical change only displays the marker.
    let (doc, mut guest) = three_cell_session(Role::Guest);
    remote_submit(&doc, &mut guest, vec![op]);
    assert!(guest.editor().calls.iter().all(|c| !c.starts_with("execute@")));

    // A real count never triggers execution, on either role.
    let (doc, mut host) = three_cell_session(Role::Host);
    let op = Operation::obj_replace(paths::execution_count(0), json!("*"), json!(7));
    remote_submit(&doc, &mut host, vec![op]);
    assert!(host.editor().calls.iter().all(|c| !c.starts_with("execute@")));
    assert_eq!(host.editor().cells[0].execution_count, ExecutionCount::Done(7));
}

#[test]
fn test_guest_execution_request_reaches_host() {
    let cells = vec![CellState::code("x = 1")];
    let doc = MemoryDoc::notebook(&cells).unwrap();

    let mut host = NotebookBinding::new(
        RecordingEditor::with_cells(cells.clone()),
        doc.clone(),
        BindingConfig::new(Role::Host).with_origin(OriginTag::new("host")),
    );
    let mut guest = NotebookBinding::new(
        RecordingEditor::with_cells(cells),
        doc.clone(),
        BindingConfig::new(Role::Guest).with_origin(OriginTag::new("guest")),
    );

    // The guest requests execution: its editor shows the pending marker and
    // fires the execute event.
    guest.editor_mut().cells[0].execution_count = ExecutionCount::Pending;
    guest.editor_mut().queued.push(EditorEvent::CellExecuted { index: 0 });
    guest.pump_editor_events();

    for event in doc.take_events() {
        host.handle_doc_event(&event);
        guest.handle_doc_event(&event);
    }

    // Exactly one actual execution, on the host.
    assert_eq!(
        host.editor().calls.iter().filter(|c| c.starts_with("execute@")).count(),
        1
    );
    assert_eq!(
        guest.editor().calls.iter().filter(|c| c.starts_with("execute@")).count(),
        0
    );
}

#[test]
fn test_index_desync_rebuilds_table() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    // An operation referencing a position far outside the table. Delivered
    // directly: a desynced upstream can hand us anything.
    let event = DocEvent {
        kind: DocEventKind::Op,
        ops: vec![Operation::list_delete(paths::cell(10), json!({}))],
        origin: OriginTag::new("remote-peer"),
    };
    binding.handle_doc_event(&event);

    // No editor call was made for the bogus index, and the table was rebuilt
    // to match the document.
    assert!(binding.editor().calls.iter().all(|c| !c.starts_with("delete@")));
    assert_eq!(binding.cell_count(), doc_cell_count(&doc));
    assert_eq!(binding.positions(), vec![0, 1, 2]);
}

#[test]
fn test_apply_failure_clears_gate_and_processing_continues() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    binding.editor_mut().fail_mutations = true;
    let cell = serde_json::to_value(CellState::code("nope")).unwrap();
    let event = DocEvent {
        kind: DocEventKind::Op,
        ops: vec![Operation::list_insert(paths::cell(1), cell)],
        origin: OriginTag::new("remote-peer"),
    };
    binding.handle_doc_event(&event);

    // The operation went unapplied and the table did not drift.
    assert_eq!(binding.editor().cell_count(), 3);
    assert_eq!(binding.cell_count(), 3);

    // The gate was still cleared: the next local event submits normally.
    binding.editor_mut().fail_mutations = false;
    binding.editor_mut().delete_cell_at(0).unwrap();
    binding.pump_editor_events();
    assert_eq!(doc.take_events().len(), 1);
    assert_invariant(&doc, &binding);
}

#[test]
fn test_deferred_prompt_resync_submits_after_flush() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    binding.editor_mut().cells[0].execution_count = ExecutionCount::Done(5);
    binding.editor_mut().cells[0].outputs = vec![json!("out")];
    binding.editor_mut().queued.push(EditorEvent::CellExecutionFinished { index: 0 });
    binding.pump_editor_events();

    // The outputs replacement goes out immediately.
    let events = doc.take_events();
    assert_eq!(events.len(), 1);
    let wire = serde_json::to_value(&events[0].ops[0]).unwrap();
    assert_eq!(wire["p"], json!(["notebook", "cells", 0, "outputs"]));

    // The prompt resync is deferred until the flush.
    assert!(binding.next_prompt_sync_due().is_some());
    binding.flush_due_prompt_syncs(Instant::now());

    let events = doc.take_events();
    assert_eq!(events.len(), 1);
    let wire = serde_json::to_value(&events[0].ops[0]).unwrap();
    assert_eq!(wire["p"], json!(["notebook", "cells", 0, "execution_count"]));
    assert_eq!(wire["oi"], json!(5));
    assert!(binding.next_prompt_sync_due().is_none());
}

#[test]
fn test_stale_prompt_resync_is_dropped() {
    let (doc, mut binding) = three_cell_session(Role::Guest);

    binding.editor_mut().queued.push(EditorEvent::CellExecutionFinished { index: 2 });
    binding.pump_editor_events();
    doc.take_events();

    // The notebook shrinks below the scheduled index before the flush.
    remote_submit(&doc, &mut binding, vec![Operation::list_delete(paths::cell(2), json!({}))]);
    doc.take_events();

    binding.flush_due_prompt_syncs(Instant::now());
    assert!(doc.take_events().is_empty());
}

#[test]
fn test_closed_binding_swallows_both_streams() {
    let (doc, mut binding) = three_cell_session(Role::Guest);
    binding.close();
    assert!(binding.is_closed());

    let cell = serde_json::to_value(CellState::code("late")).unwrap();
    let event = DocEvent {
        kind: DocEventKind::Op,
        ops: vec![Operation::list_insert(paths::cell(0), cell)],
        origin: OriginTag::new("remote-peer"),
    };
    binding.handle_doc_event(&event);
    assert!(binding.editor().calls.is_empty());

    binding.editor_mut().queued.push(EditorEvent::CellExecuted { index: 0 });
    binding.pump_editor_events();
    assert!(doc.take_events().is_empty());
}

#[test]
fn test_two_writers_converge() {
    let cells = vec![CellState::code("shared")];
    let doc = MemoryDoc::notebook(&cells).unwrap();

    let mut host = NotebookBinding::new(
        RecordingEditor::with_cells(cells.clone()),
        doc.clone(),
        BindingConfig::new(Role::Host).with_origin(OriginTag::new("host")),
    );
    let mut guest = NotebookBinding::new(
        RecordingEditor::with_cells(cells),
        doc.clone(),
        BindingConfig::new(Role::Guest).with_origin(OriginTag::new("guest")),
    );

    // Guest adds a markdown cell locally; everyone syncs.
    guest.editor_mut().insert_cell_at(1, CellKind::Markdown).unwrap();
    guest.pump_editor_events();
    for event in doc.take_events() {
        host.handle_doc_event(&event);
        guest.handle_doc_event(&event);
    }
    assert_eq!(host.editor().cell_count(), 2);
    assert_eq!(host.editor().cells[1].kind, CellKind::Markdown);

    // Host deletes the original code cell; everyone syncs.
    host.editor_mut().delete_cell_at(0).unwrap();
    host.pump_editor_events();
    for event in doc.take_events() {
        host.handle_doc_event(&event);
        guest.handle_doc_event(&event);
    }

    assert_eq!(doc_cell_count(&doc), 1);
    assert_eq!(host.editor().cell_count(), 1);
    assert_eq!(guest.editor().cell_count(), 1);
    assert_eq!(host.cell_count(), 1);
    assert_eq!(guest.cell_count(), 1);
    assert_eq!(host.editor().cells[0].kind, CellKind::Markdown);
    assert_eq!(guest.editor().cells[0].kind, CellKind::Markdown);
}

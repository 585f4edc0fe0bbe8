//! Two collaborating sessions over one in-memory document.
//!
//! A host and a guest each own a tiny scripted editor bound to the same
//! shared document. The guest edits and requests an execution; the host's
//! "kernel" runs the cell and the outputs come back around to everyone.
//!
//! ```bash
//! cargo run -p jupyter-opsync --example two_writers
//! ```

use std::time::{Duration, Instant};

use jupyter_opsync::{
    BindingConfig, CellKind, CellState, EditorError, EditorEvent, ExecutionCount, LocalEditor,
    MemoryDoc, NotebookBinding, OriginTag, Role,
};
use serde_json::Value;

/// A minimal scripted editor: a cell list plus a queue of native events.
///
/// Execution is two-phase like a real kernel: `request_execution` only marks
/// the cell, and `run_pending` (driven from the event loop, outside any
/// remote apply) produces the outputs and the finished event.
#[derive(Default)]
struct ScriptedEditor {
    name: &'static str,
    cells: Vec<CellState>,
    queued: Vec<EditorEvent>,
    pending_run: Option<usize>,
}

impl ScriptedEditor {
    fn new(name: &'static str, cells: Vec<CellState>) -> Self {
        Self {
            name,
            cells,
            queued: Vec::new(),
            pending_run: None,
        }
    }

    fn index_ok(&self, index: usize, len: usize) -> Result<(), EditorError> {
        if index >= len {
            return Err(EditorError::InvalidIndex(index));
        }
        Ok(())
    }

    /// The kernel finishes whatever was requested.
    fn run_pending(&mut self) {
        if let Some(index) = self.pending_run.take() {
            println!("[{}] kernel ran cell {}", self.name, index);
            self.cells[index].execution_count = ExecutionCount::Done(1);
            self.cells[index].outputs = vec![serde_json::json!("hello from the kernel")];
            self.queued.push(EditorEvent::CellExecutionFinished { index });
        }
    }
}

impl LocalEditor for ScriptedEditor {
    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    fn cell_at(&self, index: usize) -> Option<CellState> {
        self.cells.get(index).cloned()
    }

    fn insert_cell_at(&mut self, index: usize, kind: CellKind) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len() + 1)?;
        println!("[{}] insert {} cell at {}", self.name, kind, index);
        let cell = CellState::new(kind);
        self.cells.insert(index, cell.clone());
        self.queued.push(EditorEvent::CellInserted { index, cell });
        Ok(())
    }

    fn delete_cell_at(&mut self, index: usize) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len())?;
        println!("[{}] delete cell at {}", self.name, index);
        let cell = self.cells.remove(index);
        self.queued.push(EditorEvent::CellDeleted { index, cell });
        Ok(())
    }

    fn convert_cell_type(&mut self, index: usize, kind: CellKind) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len())?;
        println!("[{}] convert cell {} to {}", self.name, index, kind);
        self.cells[index].kind = kind;
        self.queued.push(EditorEvent::CellTypeChanged { index });
        Ok(())
    }

    fn set_execution_count(
        &mut self,
        index: usize,
        value: ExecutionCount,
    ) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len())?;
        self.cells[index].execution_count = value;
        Ok(())
    }

    fn clear_outputs(&mut self, index: usize) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len())?;
        self.cells[index].outputs.clear();
        Ok(())
    }

    fn append_output(&mut self, index: usize, item: Value) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len())?;
        self.cells[index].outputs.push(item);
        Ok(())
    }

    fn request_execution(&mut self, index: usize) -> Result<(), EditorError> {
        self.index_ok(index, self.cells.len())?;
        println!("[{}] execution requested for cell {}", self.name, index);
        self.pending_run = Some(index);
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.queued)
    }
}

type Session = NotebookBinding<ScriptedEditor, MemoryDoc>;

/// Deliver pending document events to every session and let each flush its
/// local queue, until the traffic dies down.
fn settle(doc: &MemoryDoc, sessions: &mut [&mut Session]) {
    loop {
        let events = doc.take_events();
        if events.is_empty() {
            break;
        }
        for event in &events {
            for session in sessions.iter_mut() {
                session.handle_doc_event(event);
            }
        }
        for session in sessions.iter_mut() {
            session.pump_editor_events();
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cells = vec![CellState::code("x = 41 + 1")];
    let doc = MemoryDoc::notebook(&cells)?;

    let mut host = NotebookBinding::new(
        ScriptedEditor::new("host", cells.clone()),
        doc.clone(),
        BindingConfig::new(Role::Host).with_origin(OriginTag::new("host")),
    );
    let mut guest = NotebookBinding::new(
        ScriptedEditor::new("guest", cells),
        doc.clone(),
        BindingConfig::new(Role::Guest).with_origin(OriginTag::new("guest")),
    );

    // The guest writes a markdown cell.
    guest.editor_mut().insert_cell_at(1, CellKind::Markdown)?;
    guest.pump_editor_events();
    settle(&doc, &mut [&mut host, &mut guest]);

    // The guest asks for cell 0 to run; the pending marker propagates to the
    // host, whose role is to actually execute.
    guest.editor_mut().set_execution_count(0, ExecutionCount::Pending)?;
    guest.handle_editor_event(EditorEvent::CellExecuted { index: 0 });
    settle(&doc, &mut [&mut host, &mut guest]);

    // The host's kernel finishes asynchronously; its outputs sync back.
    host.editor_mut().run_pending();
    host.pump_editor_events();
    settle(&doc, &mut [&mut host, &mut guest]);

    // Give the deferred prompt resync its moment, then flush it.
    std::thread::sleep(Duration::from_millis(25));
    host.flush_due_prompt_syncs(Instant::now());
    settle(&doc, &mut [&mut host, &mut guest]);

    for session in [&host, &guest] {
        let editor = session.editor();
        println!("[{}] {} cells:", editor.name, editor.cell_count());
        for cell in &editor.cells {
            println!(
                "  {} {:?} outputs={:?}",
                cell.kind, cell.execution_count, cell.outputs
            );
        }
    }

    Ok(())
}

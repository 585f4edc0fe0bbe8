//! # jupyter-opsync
//!
//! Operation-based real-time sync engine keeping a local notebook editor
//! consistent with a shared, multi-writer document.
//!
//! ## What it does
//!
//! - **NotebookBinding**: routes remote operations into the local editor and
//!   translates native editor events into submitted operations
//! - **Echo suppression**: a reentrancy gate stops a just-applied remote
//!   change from being re-submitted as though it were a new local edit
//! - **CellIndexTable**: keeps per-cell bindings' structural positions
//!   contiguous as concurrent writers insert, delete, and replace cells
//! - **Classification**: maps each path-addressed operation to its semantic
//!   kind (structural insert/delete, execution count, outputs, type change)
//! - **MemoryDoc**: an in-memory broker for tests and in-process embedding
//!
//! The per-cell text binding, document persistence, and network transport
//! are external collaborators behind the [`SharedDoc`] and [`LocalEditor`]
//! traits; see `json0` for the operation format itself.
//!
//! ## Example
//!
//! ```rust,ignore
//! use jupyter_opsync::{BindingConfig, MemoryDoc, NotebookBinding, Role};
//!
//! let doc = MemoryDoc::notebook(&cells)?;
//! let mut binding = NotebookBinding::new(editor, doc.clone(), BindingConfig::new(Role::Host));
//!
//! // Host event loop:
//! // - forward shared-document events to binding.handle_doc_event(...)
//! // - forward native editor events via binding.pump_editor_events()
//! // - pump binding.flush_due_prompt_syncs(Instant::now()) for deferred work
//! ```

pub mod auxiliary;
pub mod binding;
pub mod cells;
pub mod classify;
pub mod doc;
pub mod editor;
pub mod error;
pub mod gate;
pub mod memory;
pub mod resync;

pub use binding::{BindingConfig, NotebookBinding, Role};
pub use cells::{CellBinding, CellIndexTable};
pub use classify::{classify, OpKind};
pub use doc::{
    keys, paths, CellKind, CellState, DocEvent, DocEventKind, ExecutionCount, OriginTag,
    SharedDoc, SubDoc, PENDING_SENTINEL,
};
pub use editor::{EditorError, EditorEvent, LocalEditor};
pub use error::{Result, SyncError};
pub use gate::{GateGuard, SyncGate};
pub use memory::{MemoryDoc, MemorySubDoc};
pub use resync::{Disabled, FixedDelay, Immediate, PromptSyncPolicy};

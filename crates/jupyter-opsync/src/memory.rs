//! An in-memory shared-document broker.
//!
//! `MemoryDoc` materializes the document as a JSON tree and applies
//! submitted operations directly. Clones share the same tree and event
//! queue, so several bindings can collaborate in one process; the embedder
//! pumps [`MemoryDoc::take_events`] and fans each event out to every
//! binding (a binding ignores batches tagged with its own origin).

use std::cell::RefCell;
use std::rc::Rc;

use json0::{Operation, Path, PathSegment};
use serde_json::{json, Value};

use crate::doc::{CellState, DocEvent, DocEventKind, OriginTag, SharedDoc, SubDoc};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct MemoryDoc {
    root: Rc<RefCell<Value>>,
    events: Rc<RefCell<Vec<DocEvent>>>,
}

impl MemoryDoc {
    pub fn new(initial: Value) -> Self {
        Self {
            root: Rc::new(RefCell::new(initial)),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A document holding a notebook with the given cells.
    pub fn notebook(cells: &[CellState]) -> Result<Self> {
        let cells = cells
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(json!({ "notebook": { "cells": cells } })))
    }

    /// Take every event queued since the last call, in submission order.
    pub fn take_events(&self) -> Vec<DocEvent> {
        self.events.borrow_mut().drain(..).collect()
    }
}

impl SharedDoc for MemoryDoc {
    type Sub = MemorySubDoc;

    fn submit_ops(&mut self, ops: &[Operation], origin: &OriginTag) -> Result<()> {
        {
            let mut root = self.root.borrow_mut();
            for op in ops {
                json0::apply_op(&mut root, op)?;
            }
        }
        self.events.borrow_mut().push(DocEvent {
            kind: DocEventKind::Op,
            ops: ops.to_vec(),
            origin: origin.clone(),
        });
        Ok(())
    }

    fn data(&self) -> Value {
        self.root.borrow().clone()
    }

    fn sub_doc(&self, path: Path) -> MemorySubDoc {
        MemorySubDoc {
            root: Rc::clone(&self.root),
            path,
        }
    }
}

/// A scoped read handle into a [`MemoryDoc`].
#[derive(Debug, Clone)]
pub struct MemorySubDoc {
    root: Rc<RefCell<Value>>,
    path: Path,
}

impl SubDoc for MemorySubDoc {
    fn path(&self) -> &[PathSegment] {
        &self.path
    }

    fn data(&self) -> Value {
        json0::value_at(&self.root.borrow(), &self.path)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

//! The ordered registry of per-cell bindings.

use json0::Path;

use crate::doc::{paths, SubDoc};

/// One cell's binding: its structural position, the local cell it mirrors,
/// and a scoped handle rooted at that position's path.
///
/// The content-level two-way text binding attached to the sub-document is an
/// opaque external collaborator; this registry only manages its lifecycle.
/// Dropping a `CellBinding` releases the handle, tearing the content sync
/// down.
#[derive(Debug)]
pub struct CellBinding<S: SubDoc> {
    position: usize,
    cell_id: String,
    sub: S,
}

impl<S: SubDoc> CellBinding<S> {
    pub fn new(position: usize, cell_id: String, sub: S) -> Self {
        Self {
            position,
            cell_id,
            sub,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn cell_id(&self) -> &str {
        &self.cell_id
    }

    pub fn sub(&self) -> &S {
        &self.sub
    }

    pub fn set_cell_id(&mut self, cell_id: String) {
        self.cell_id = cell_id;
    }

    /// Move this binding to a new position, swapping in the handle for the
    /// new path. Sub-document identity is path-derived, so the handle
    /// changes even though the underlying content does not move.
    fn rebind(&mut self, position: usize, sub: S) {
        self.position = position;
        self.sub = sub;
    }
}

/// Ordered sequence of cell bindings with unique, contiguous positions
/// `0..n-1`, always equal in length to the shared document's cell list.
#[derive(Debug, Default)]
pub struct CellIndexTable<S: SubDoc> {
    bindings: Vec<CellBinding<S>>,
}

impl<S: SubDoc> CellIndexTable<S> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CellBinding<S>> {
        self.bindings.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut CellBinding<S>> {
        self.bindings.get_mut(index)
    }

    /// Current positions, in table order.
    pub fn positions(&self) -> Vec<usize> {
        self.bindings.iter().map(|b| b.position()).collect()
    }

    /// Insert a binding for a new cell at `index`. Every existing binding at
    /// position >= `index` moves up by one and is rebound to its new path.
    /// Cost O(n - index).
    pub fn insert<F>(&mut self, index: usize, cell_id: String, mut make_sub: F)
    where
        F: FnMut(Path) -> S,
    {
        debug_assert!(index <= self.bindings.len());
        let binding = CellBinding::new(index, cell_id, make_sub(paths::cell(index)));
        self.bindings.insert(index, binding);

        for (offset, binding) in self.bindings[index + 1..].iter_mut().enumerate() {
            let position = index + 1 + offset;
            binding.rebind(position, make_sub(paths::cell(position)));
        }
        self.debug_check();
    }

    /// Remove the binding at `index`, tearing down its content-level sync.
    /// Every binding at position > `index` moves down by one and is rebound.
    pub fn remove<F>(&mut self, index: usize, mut make_sub: F) -> CellBinding<S>
    where
        F: FnMut(Path) -> S,
    {
        debug_assert!(index < self.bindings.len());
        let removed = self.bindings.remove(index);

        for (offset, binding) in self.bindings[index..].iter_mut().enumerate() {
            let position = index + offset;
            binding.rebind(position, make_sub(paths::cell(position)));
        }
        self.debug_check();
        removed
    }

    /// Discard every binding and rebuild `count` fresh ones from the shared
    /// document's current state. IndexDesync recovery.
    pub fn rebuild<F>(&mut self, cell_ids: Vec<String>, mut make_sub: F)
    where
        F: FnMut(Path) -> S,
    {
        self.bindings.clear();
        for (position, cell_id) in cell_ids.into_iter().enumerate() {
            self.bindings
                .push(CellBinding::new(position, cell_id, make_sub(paths::cell(position))));
        }
        self.debug_check();
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    fn debug_check(&self) {
        debug_assert!(
            self.bindings.iter().enumerate().all(|(i, b)| b.position() == i),
            "table positions must be contiguous 0..n-1"
        );
    }
}

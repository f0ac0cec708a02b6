//! Linear undo/redo over edit snapshots.
//!
//! [`EditHistory`] keeps the current entry separately from the entries before it, so there is
//! always a current state and no branch to look after: recording clears everything that could
//! have been redone.

pub mod editor;

pub use editor::{EditState, EditSurface, Editor};

#[derive(Clone, Debug, PartialEq)]
pub struct EditHistory<T> {
    earlier: Vec<T>,
    current: T,
    future: Vec<T>,
}

impl<T> EditHistory<T> {
    pub fn new(initial: T) -> Self {
        Self {
            earlier: Vec::new(),
            current: initial,
            future: Vec::new(),
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    /// Push `entry` as the new current state and drop any pending redo.
    pub fn record(&mut self, entry: T) {
        let prev = std::mem::replace(&mut self.current, entry);
        self.earlier.push(prev);
        self.future.clear();
    }

    /// Step back one entry. Returns the new current state, or `None` when only the initial
    /// entry is left.
    pub fn undo(&mut self) -> Option<&T> {
        let prev = self.earlier.pop()?;
        let undone = std::mem::replace(&mut self.current, prev);
        self.future.push(undone);
        Some(&self.current)
    }

    /// Re-apply the most recently undone entry.
    pub fn redo(&mut self) -> Option<&T> {
        let next = self.future.pop()?;
        let prev = std::mem::replace(&mut self.current, next);
        self.earlier.push(prev);
        Some(&self.current)
    }

    pub fn can_undo(&self) -> bool {
        !self.earlier.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of entries up to and including the current one.
    pub fn depth(&self) -> usize {
        self.earlier.len() + 1
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/history/mod.rs"]
mod tests;

//! Snapshot-based undo/redo with interaction batching.
//!
//! A gesture is bracketed by [`History::begin`] and [`History::commit`]. The
//! pre-gesture sprite set is captured once at `begin`; every intermediate
//! mutation in between is invisible to history. `commit` records one undo
//! entry, and only if the sprite set actually changed.
//!
//! Snapshots are independent deep copies of the sprite set, so they never
//! dangle when sprites are later removed. Viewport, grid and background are
//! not part of a snapshot.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::consts::HISTORY_LIMIT;
use crate::doc::SpriteSet;

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<SpriteSet>,
    redo: Vec<SpriteSet>,
    /// Snapshot taken by the currently open interaction, if any.
    pending: Option<SpriteSet>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl History {
    /// History keeping at most `limit` undo entries (at least one).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), pending: None, limit: limit.max(1) }
    }

    /// Open an interaction. Nested calls while one is open are no-ops.
    pub fn begin(&mut self, current: &SpriteSet) {
        if self.pending.is_none() {
            self.pending = Some(current.clone());
        }
    }

    /// Close the open interaction.
    ///
    /// Returns `true` if an undo entry was recorded. Nothing is recorded when
    /// no interaction is open or the sprite set is unchanged.
    pub fn commit(&mut self, current: &SpriteSet) -> bool {
        let Some(before) = self.pending.take() else {
            return false;
        };
        if before == *current {
            return false;
        }
        self.push_undo(before);
        self.redo.clear();
        log::debug!("history: committed interaction ({} undo entries)", self.undo.len());
        true
    }

    /// Whether an interaction is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Restore the most recent undo snapshot into `current`.
    ///
    /// An open interaction is committed first so its changes are undoable.
    pub fn undo(&mut self, current: &mut SpriteSet) -> bool {
        self.commit(current);
        let Some(snapshot) = self.undo.pop_back() else {
            return false;
        };
        let now = std::mem::replace(current, snapshot);
        self.redo.push(now);
        log::debug!("history: undo ({} left)", self.undo.len());
        true
    }

    /// Re-apply the most recently undone snapshot into `current`.
    pub fn redo(&mut self, current: &mut SpriteSet) -> bool {
        self.commit(current);
        let Some(snapshot) = self.redo.pop() else {
            return false;
        };
        let now = std::mem::replace(current, snapshot);
        self.push_undo(now);
        log::debug!("history: redo ({} left)", self.redo.len());
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Drop all entries and any open interaction (e.g. after loading a new scene).
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.pending = None;
    }

    fn push_undo(&mut self, snapshot: SpriteSet) {
        self.undo.push_back(snapshot);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }
}

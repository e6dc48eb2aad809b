//! Bounded time-travel store over immutable snapshots.
//!
//! Entries are `Arc<T>` so consecutive snapshots share whatever they do not
//! change. The timeline is never empty and the cursor always points at a
//! valid entry.
//!
//! ```text
//! push(c)         [a, b, c]      cursor 2
//! undo() x2       [a, b, c]      cursor 0
//! push(d)         [a, d]         cursor 1  (future discarded)
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

pub const MAX_HISTORY: usize = 50;

pub struct History<T> {
    entries: VecDeque<Arc<T>>,
    index: usize,
    capacity: usize,
}

impl<T> fmt::Debug for History<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("len", &self.entries.len())
            .field("index", &self.index)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> History<T> {
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, MAX_HISTORY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        let mut entries = VecDeque::new();
        entries.push_back(Arc::new(initial));
        Self {
            entries,
            index: 0,
            capacity: capacity.max(1),
        }
    }

    /// Drop any redo entries, append, and evict the oldest past the cap.
    pub fn push(&mut self, state: T) {
        self.push_arc(Arc::new(state));
    }

    pub fn push_arc(&mut self, state: Arc<T>) {
        self.entries.truncate(self.index + 1);
        self.entries.push_back(state);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.index = self.entries.len() - 1;
    }

    /// Push a snapshot derived from the current one.
    pub fn push_with(&mut self, resolve: impl FnOnce(&T) -> T) {
        let next = resolve(self.current());
        self.push(next);
    }

    /// Push a derived snapshot, leaving history untouched when `resolve` fails.
    pub fn try_push_with<E>(&mut self, resolve: impl FnOnce(&T) -> Result<T, E>) -> Result<(), E> {
        let next = resolve(self.current())?;
        self.push(next);
        Ok(())
    }

    /// Replace the entry at the cursor without touching the rest of the timeline.
    pub fn overwrite(&mut self, state: T) {
        self.entries[self.index] = Arc::new(state);
    }

    pub fn overwrite_with(&mut self, resolve: impl FnOnce(&T) -> T) {
        let next = resolve(self.current());
        self.overwrite(next);
    }

    /// Returns whether the cursor moved.
    pub fn undo(&mut self) -> bool {
        if self.can_undo() {
            self.index -= 1;
            true
        } else {
            false
        }
    }

    /// Returns whether the cursor moved.
    pub fn redo(&mut self) -> bool {
        if self.can_redo() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> &T {
        &self.entries[self.index]
    }

    pub fn current_arc(&self) -> Arc<T> {
        Arc::clone(&self.entries[self.index])
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Mark state and the worklist.

use std::{collections::VecDeque, sync::Arc};

use crate::{
    linker::config::WorklistOrder,
    metadata::{index::EntityIndex, token::Token},
    utils::BitSet,
};

/// Reachability status of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkState {
    /// Not (yet) known to be reachable
    Unvisited,
    /// Known reachable, dependencies not yet expanded
    Queued,
    /// Reachable and expanded
    Marked,
}

/// Per-entity mark state over a graph's dense index space.
///
/// The store can only move an entity forward through
/// `Unvisited -> Queued -> Marked`; there is no way to move it back.
#[derive(Debug, Clone)]
pub struct MarkStore {
    index: Arc<EntityIndex>,
    queued: BitSet,
    marked: BitSet,
}

impl MarkStore {
    /// Creates a store in which every entity is `Unvisited`.
    #[must_use]
    pub fn new(index: Arc<EntityIndex>) -> Self {
        let capacity = index.capacity();
        Self {
            index,
            queued: BitSet::new(capacity),
            marked: BitSet::new(capacity),
        }
    }

    /// Current state of a token. Tokens outside the index are always `Unvisited`.
    #[must_use]
    pub fn state(&self, token: Token) -> MarkState {
        match self.index.index_of(token) {
            Some(position) if self.marked.contains(position) => MarkState::Marked,
            Some(position) if self.queued.contains(position) => MarkState::Queued,
            _ => MarkState::Unvisited,
        }
    }

    /// Returns `true` if the token is `Marked`.
    #[must_use]
    pub fn is_marked(&self, token: Token) -> bool {
        self.state(token) == MarkState::Marked
    }

    /// Moves an `Unvisited` entity to `Queued`. Returns `true` if the state changed.
    pub(crate) fn enqueue(&mut self, token: Token) -> bool {
        match self.index.index_of(token) {
            Some(position) => self.queued.insert(position),
            None => false,
        }
    }

    /// Moves an entity to `Marked`. Returns `true` if the state changed.
    pub(crate) fn mark(&mut self, token: Token) -> bool {
        match self.index.index_of(token) {
            Some(position) => {
                self.queued.insert(position);
                self.marked.insert(position)
            }
            None => false,
        }
    }

    /// Marked tokens in index order.
    pub fn marked(&self) -> impl Iterator<Item = Token> + '_ {
        self.marked
            .iter()
            .filter_map(|position| self.index.token_at(position))
    }

    /// Number of marked entities.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.marked.count()
    }

    /// Number of entities still `Queued`.
    #[must_use]
    pub fn queued_count(&self) -> usize {
        self.queued.count() - self.marked.count()
    }

    /// The index this store addresses.
    #[must_use]
    pub fn entity_index(&self) -> &Arc<EntityIndex> {
        &self.index
    }

    /// Returns `true` if both stores assign the same state to every entity.
    #[must_use]
    pub fn same_marks(&self, other: &MarkStore) -> bool {
        self.index.capacity() == other.index.capacity()
            && self.marked == other.marked
            && self.queued == other.queued
    }
}

/// Queue of entities awaiting expansion.
#[derive(Debug)]
pub(crate) struct Worklist {
    order: WorklistOrder,
    items: VecDeque<Token>,
}

impl Worklist {
    pub(crate) fn new(order: WorklistOrder) -> Self {
        Self {
            order,
            items: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, token: Token) {
        self.items.push_back(token);
    }

    /// Removes up to `size` entities in worklist order.
    pub(crate) fn take_batch(&mut self, size: usize) -> Vec<Token> {
        let count = size.min(self.items.len());
        let mut batch = Vec::with_capacity(count);
        for _ in 0..count {
            let next = match self.order {
                WorklistOrder::Lifo => self.items.pop_back(),
                WorklistOrder::Fifo => self.items.pop_front(),
            };
            batch.extend(next);
        }
        batch
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

//! Lookup tables built when the entity graph is frozen.
//!
//! [`EntityIndex`] assigns every entity a dense position so that mark state can live in
//! bitsets instead of hash maps. Positions are handed out once, at build time, and never
//! reused: a sweep leaves removed positions vacant, so a mark store computed before the
//! sweep still addresses the same entities afterwards.
//!
//! [`MemberIndex`] answers the name based queries preserve directives need without
//! scanning the graph.

use rustc_hash::FxHashMap;

use crate::metadata::token::Token;

/// Dense, stable numbering of the graph's entities.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    tokens: Vec<Token>,
    positions: FxHashMap<Token, usize>,
}

impl EntityIndex {
    /// Numbers the given tokens in ascending token order.
    pub(crate) fn new(mut tokens: Vec<Token>) -> Self {
        tokens.sort_unstable();
        tokens.dedup();
        let positions = tokens
            .iter()
            .enumerate()
            .map(|(position, token)| (*token, position))
            .collect();
        Self { tokens, positions }
    }

    /// Position of a token, if the token was part of the graph when it was built.
    #[must_use]
    pub fn index_of(&self, token: Token) -> Option<usize> {
        self.positions.get(&token).copied()
    }

    /// Token at a position.
    #[must_use]
    pub fn token_at(&self, index: usize) -> Option<Token> {
        self.tokens.get(index).copied()
    }

    /// Size of the index space. Stays constant across sweeps.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tokens.len()
    }

    /// All indexed tokens in position order.
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.tokens.iter().copied()
    }
}

/// Name lookups over the members and types of the graph.
#[derive(Debug, Clone, Default)]
pub struct MemberIndex {
    members: FxHashMap<(Token, String), Vec<Token>>,
    types: FxHashMap<String, Vec<Token>>,
}

impl MemberIndex {
    pub(crate) fn insert_member(&mut self, declaring_type: Token, name: &str, member: Token) {
        self.members
            .entry((declaring_type, name.to_string()))
            .or_default()
            .push(member);
    }

    pub(crate) fn insert_type(&mut self, full_name: String, ty: Token) {
        self.types.entry(full_name).or_default().push(ty);
    }

    /// Methods and fields named `name` declared by `declaring_type`, in declaration order.
    #[must_use]
    pub fn members_named(&self, declaring_type: Token, name: &str) -> &[Token] {
        self.members
            .get(&(declaring_type, name.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    /// Types whose full name is `full_name`.
    #[must_use]
    pub fn types_named(&self, full_name: &str) -> &[Token] {
        self.types.get(full_name).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct `(type, name)` keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if no members are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

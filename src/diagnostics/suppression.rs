//! Warning suppression.
//!
//! A [`SuppressionPolicy`] is passed explicitly to every warning constructor; there is no
//! ambient suppression state.

use rustc_hash::FxHashSet;

use crate::diagnostics::message::MessageOrigin;

/// Decides whether a warning should be dropped.
pub trait SuppressionPolicy: Send + Sync {
    /// Returns `true` if the warning `code` raised at `origin` should be dropped.
    fn is_suppressed(&self, code: u32, origin: &MessageOrigin) -> bool;
}

/// A policy that suppresses nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuppression;

impl SuppressionPolicy for NoSuppression {
    fn is_suppressed(&self, _code: u32, _origin: &MessageOrigin) -> bool {
        false
    }
}

impl<F> SuppressionPolicy for F
where
    F: Fn(u32, &MessageOrigin) -> bool + Send + Sync,
{
    fn is_suppressed(&self, code: u32, origin: &MessageOrigin) -> bool {
        self(code, origin)
    }
}

/// Suppressions by code, globally or for a single origin.
///
/// # Examples
///
/// ```rust
/// use dottrim::diagnostics::{MessageOrigin, SuppressionPolicy, SuppressionSet};
///
/// let mut policy = SuppressionSet::new();
/// policy.suppress_code(2010);
/// policy.suppress(2042, MessageOrigin::file("foo.il"));
///
/// assert!(policy.is_suppressed(2010, &MessageOrigin::file("anything")));
/// assert!(policy.is_suppressed(2042, &MessageOrigin::file("foo.il")));
/// assert!(!policy.is_suppressed(2042, &MessageOrigin::file("bar.il")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SuppressionSet {
    codes: FxHashSet<u32>,
    pairs: FxHashSet<(u32, MessageOrigin)>,
}

impl SuppressionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses a code everywhere.
    pub fn suppress_code(&mut self, code: u32) -> &mut Self {
        self.codes.insert(code);
        self
    }

    /// Suppresses a code at one origin.
    pub fn suppress(&mut self, code: u32, origin: MessageOrigin) -> &mut Self {
        self.pairs.insert((code, origin));
        self
    }

    /// Returns `true` if nothing is suppressed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty() && self.pairs.is_empty()
    }
}

impl SuppressionPolicy for SuppressionSet {
    fn is_suppressed(&self, code: u32, origin: &MessageOrigin) -> bool {
        self.codes.contains(&code) || self.pairs.contains(&(code, origin.clone()))
    }
}

//! Why entities were marked.
//!
//! Only the first reason per entity is kept. Following `why` links from any marked entity
//! always ends at a root, which makes the reasons a spanning forest of the marked set.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::{
    linker::dispatch::DispatchRule,
    metadata::{graph::EntityGraph, token::Token},
    utils::DotWriter,
};

/// The first reason an entity became reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkReason {
    /// Supplied by the caller
    Root,
    /// Direct dependency of another entity
    Dependency(Token),
    /// Resolved target of a preserve directive
    Directive(Token),
    /// Interface edge or implementation needed for a dispatched interface slot
    InterfaceDispatch {
        /// Instantiated type
        ty: Token,
        /// Dispatched interface slot
        slot: Token,
    },
    /// Implementation of a kept interface method on a kept edge
    EdgeCompleteness {
        /// The marked edge
        edge: Token,
    },
    /// Most derived override of a marked class slot
    VirtualOverride {
        /// Instantiated type
        ty: Token,
        /// Overridden slot
        slot: Token,
    },
    /// Override of a slot declared outside the graph
    ExternalOverride {
        /// Instantiated type
        ty: Token,
    },
}

impl MarkReason {
    /// The entity this reason points back to, if any.
    #[must_use]
    pub fn source(&self) -> Option<Token> {
        match *self {
            MarkReason::Root => None,
            MarkReason::Dependency(from) | MarkReason::Directive(from) => Some(from),
            MarkReason::InterfaceDispatch { slot, .. }
            | MarkReason::VirtualOverride { slot, .. } => Some(slot),
            MarkReason::EdgeCompleteness { edge } => Some(edge),
            MarkReason::ExternalOverride { ty } => Some(ty),
        }
    }

    /// The dispatch rule behind this reason, if any.
    #[must_use]
    pub fn rule(&self) -> Option<DispatchRule> {
        match self {
            MarkReason::InterfaceDispatch { .. } => Some(DispatchRule::InterfaceDispatch),
            MarkReason::EdgeCompleteness { .. } => Some(DispatchRule::EdgeCompleteness),
            MarkReason::VirtualOverride { .. } => Some(DispatchRule::VirtualOverride),
            MarkReason::ExternalOverride { .. } => Some(DispatchRule::ExternalOverride),
            MarkReason::Root | MarkReason::Dependency(_) | MarkReason::Directive(_) => None,
        }
    }
}

impl fmt::Display for MarkReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkReason::Root => write!(f, "root"),
            MarkReason::Dependency(from) => write!(f, "dependency of {from}"),
            MarkReason::Directive(from) => write!(f, "preserved by {from}"),
            MarkReason::InterfaceDispatch { ty, slot } => {
                write!(f, "interface dispatch of {slot} on {ty}")
            }
            MarkReason::EdgeCompleteness { edge } => write!(f, "implementation for {edge}"),
            MarkReason::VirtualOverride { ty, slot } => {
                write!(f, "override of {slot} on {ty}")
            }
            MarkReason::ExternalOverride { ty } => write!(f, "external override on {ty}"),
        }
    }
}

/// First mark reason of every reached entity.
#[derive(Debug, Default, Clone)]
pub struct MarkReasons {
    reasons: FxHashMap<Token, MarkReason>,
}

impl MarkReasons {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `reason` unless `token` already has one. Returns `true` if recorded.
    pub fn record(&mut self, token: Token, reason: MarkReason) -> bool {
        match self.reasons.entry(token) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(reason);
                true
            }
        }
    }

    /// Why `token` was marked.
    #[must_use]
    pub fn why(&self, token: Token) -> Option<MarkReason> {
        self.reasons.get(&token).copied()
    }

    /// Follows reasons from `token` back to a root. The first element is `token`.
    ///
    /// Stops early (without a root) if a token has no recorded reason.
    #[must_use]
    pub fn chain(&self, token: Token) -> Vec<Token> {
        let mut chain = vec![token];
        let mut seen = FxHashSet::default();
        seen.insert(token);

        let mut current = token;
        while let Some(next) = self.why(current).and_then(|reason| reason.source()) {
            if !seen.insert(next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    /// Number of entities with a reason.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Renders the reason forest as a Graphviz digraph, edges pointing from cause to effect.
    #[must_use]
    pub fn to_dot(&self, graph: &EntityGraph) -> String {
        let mut tokens: Vec<Token> = self.reasons.keys().copied().collect();
        tokens.sort_unstable();

        let mut dot = DotWriter::new("mark reasons");
        for token in &tokens {
            dot.node(&token.to_string(), &graph.qualified_name(*token));
        }
        for token in &tokens {
            let Some(reason) = self.why(*token) else {
                continue;
            };
            if let Some(source) = reason.source() {
                let label = match reason.rule() {
                    Some(rule) => rule.to_string(),
                    None if matches!(reason, MarkReason::Directive(_)) => "preserve".to_string(),
                    None => String::new(),
                };
                let label = (!label.is_empty()).then_some(label);
                dot.edge(&source.to_string(), &token.to_string(), label.as_deref());
            }
        }
        dot.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{directive_scope_fixture, DirectiveScopeFixture};

    #[test]
    fn test_first_reason_wins() {
        let mut reasons = MarkReasons::new();
        let token = Token::new(0x06000001);
        assert!(reasons.record(token, MarkReason::Root));
        assert!(!reasons.record(token, MarkReason::Dependency(Token::new(0x06000002))));
        assert_eq!(reasons.why(token), Some(MarkReason::Root));
        assert_eq!(reasons.len(), 1);
    }

    #[test]
    fn test_chain_ends_at_root() {
        let root = Token::new(0x06000001);
        let directive = Token::new(0x70000001);
        let target = Token::new(0x06000002);

        let mut reasons = MarkReasons::new();
        reasons.record(root, MarkReason::Root);
        reasons.record(directive, MarkReason::Dependency(root));
        reasons.record(target, MarkReason::Directive(directive));

        assert_eq!(reasons.chain(target), vec![target, directive, root]);
        assert_eq!(reasons.chain(root), vec![root]);
    }

    #[test]
    fn test_reason_display() {
        let reason = MarkReason::VirtualOverride {
            ty: Token::new(0x02000002),
            slot: Token::new(0x06000001),
        };
        assert_eq!(reason.to_string(), "override of 0x06000001 on 0x02000002");
        assert_eq!(reason.rule(), Some(DispatchRule::VirtualOverride));
        assert_eq!(MarkReason::Root.source(), None);
    }

    #[test]
    fn test_to_dot() {
        let DirectiveScopeFixture {
            graph,
            keep,
            foo,
            directive,
            ..
        } = directive_scope_fixture();

        let mut reasons = MarkReasons::new();
        reasons.record(keep, MarkReason::Root);
        reasons.record(directive, MarkReason::Dependency(keep));
        reasons.record(foo, MarkReason::Directive(directive));

        let dot = reasons.to_dot(&graph);
        assert!(dot.starts_with("digraph \"mark reasons\" {"));
        assert!(dot.contains("[label=\"MyApp.T::Foo()\"]"));
        assert!(dot.contains(&format!("\"{directive}\" -> \"{foo}\" [label=\"preserve\"];")));
        assert!(dot.contains(&format!("\"{keep}\" -> \"{directive}\";")));
        assert!(dot.ends_with("}\n"));
    }
}

//! Resolution of preserve directives to concrete members.
//!
//! A directive names its target by string. Resolution enumerates the members of the
//! directive's scope type with a matching name, filters them by signature when one is
//! given, and succeeds only if exactly one candidate remains. Lookups go through the
//! graph's [`MemberIndex`](crate::metadata::index::MemberIndex); the graph is never scanned.

use dashmap::DashMap;
use thiserror::Error;

use crate::{
    diagnostics::codes,
    metadata::{
        directive::{DirectiveScope, PreserveDirective},
        graph::EntityGraph,
        signature::normalize_parameter_list,
        token::{TableId, Token},
    },
};

/// Why a directive could not be resolved.
///
/// Resolution failures are not fatal. The marking engine reports them as errors through
/// the diagnostics sink and carries on without the implied dependency.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No member of the scope matches, or the scope type itself does not exist.
    #[error("Could not resolve preserve target '{target}' in '{scope}'")]
    UnresolvedPreserveTarget {
        /// The directive being resolved
        directive: Token,
        /// Rendered target
        target: String,
        /// Rendered scope
        scope: String,
    },

    /// More than one member of the scope matches.
    #[error(
        "Preserve target '{target}' in '{scope}' is ambiguous between {count} members",
        count = .candidates.len()
    )]
    AmbiguousPreserveTarget {
        /// The directive being resolved
        directive: Token,
        /// Rendered target
        target: String,
        /// Rendered scope
        scope: String,
        /// Every matching member
        candidates: Vec<Token>,
    },
}

impl ResolutionError {
    /// The error code reported for this failure.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            ResolutionError::UnresolvedPreserveTarget { .. } => codes::UNRESOLVED_PRESERVE_TARGET,
            ResolutionError::AmbiguousPreserveTarget { .. } => codes::AMBIGUOUS_PRESERVE_TARGET,
        }
    }

    /// The directive that failed.
    #[must_use]
    pub fn directive(&self) -> Token {
        match self {
            ResolutionError::UnresolvedPreserveTarget { directive, .. }
            | ResolutionError::AmbiguousPreserveTarget { directive, .. } => *directive,
        }
    }
}

/// Resolves directives against one graph.
///
/// Results are memoised per directive. Resolution is a pure function of the graph, so the
/// cache never changes an answer; it only avoids repeating index lookups when the same
/// directive is expanded from several threads.
pub struct PreserveDirectiveResolver<'g> {
    graph: &'g EntityGraph,
    cache: DashMap<Token, Result<Token, ResolutionError>>,
}

impl<'g> PreserveDirectiveResolver<'g> {
    /// Creates a resolver for `graph`.
    #[must_use]
    pub fn new(graph: &'g EntityGraph) -> Self {
        Self {
            graph,
            cache: DashMap::new(),
        }
    }

    /// Resolves a directive to exactly one method or field.
    ///
    /// # Arguments
    ///
    /// * `directive` - The directive to resolve
    ///
    /// # Returns
    ///
    /// The token of the single matching member.
    ///
    /// # Errors
    ///
    /// [`ResolutionError::UnresolvedPreserveTarget`] if nothing matches or the scope type
    /// is unknown, [`ResolutionError::AmbiguousPreserveTarget`] if several members match.
    pub fn resolve(&self, directive: &PreserveDirective) -> Result<Token, ResolutionError> {
        if let Some(cached) = self.cache.get(&directive.token) {
            return cached.value().clone();
        }

        let result = self.resolve_uncached(directive);
        self.cache.insert(directive.token, result.clone());
        result
    }

    fn resolve_uncached(&self, directive: &PreserveDirective) -> Result<Token, ResolutionError> {
        let scope = self.scope_type(directive)?;
        let scope_name = self
            .graph
            .type_def(scope)
            .map_or_else(|| scope.to_string(), |row| row.full_name());

        let candidates: Vec<Token> = self
            .graph
            .member_index()
            .members_named(scope, &directive.target_name)
            .iter()
            .copied()
            .filter(|member| self.signature_matches(*member, directive.signature.as_deref()))
            .collect();

        match candidates.as_slice() {
            [single] => Ok(*single),
            [] => Err(ResolutionError::UnresolvedPreserveTarget {
                directive: directive.token,
                target: directive.target(),
                scope: scope_name,
            }),
            _ => Err(ResolutionError::AmbiguousPreserveTarget {
                directive: directive.token,
                target: directive.target(),
                scope: scope_name,
                candidates,
            }),
        }
    }

    /// The type whose members the directive is looked up in.
    fn scope_type(&self, directive: &PreserveDirective) -> Result<Token, ResolutionError> {
        let unresolved = || ResolutionError::UnresolvedPreserveTarget {
            directive: directive.token,
            target: directive.target(),
            scope: directive.scope.to_string(),
        };

        match &directive.scope {
            DirectiveScope::DeclaringType => match directive.owner.table_id() {
                Some(TableId::TypeDef) => Ok(directive.owner),
                Some(TableId::MethodDef) => self
                    .graph
                    .method(directive.owner)
                    .map(|method| method.declaring_type)
                    .ok_or_else(unresolved),
                _ => Err(unresolved()),
            },
            DirectiveScope::Type(ty) => {
                if self.graph.type_def(*ty).is_some() {
                    Ok(*ty)
                } else {
                    Err(unresolved())
                }
            }
            DirectiveScope::TypeName(name) => match self.graph.member_index().types_named(name) {
                [single] => Ok(*single),
                [] => Err(unresolved()),
                many => Err(ResolutionError::AmbiguousPreserveTarget {
                    directive: directive.token,
                    target: directive.target(),
                    scope: name.clone(),
                    candidates: many.to_vec(),
                }),
            },
        }
    }

    fn signature_matches(&self, member: Token, signature: Option<&str>) -> bool {
        let Some(signature) = signature else {
            return true;
        };

        if let Some(method) = self.graph.method(member) {
            return method.signature.parameter_list() == normalize_parameter_list(signature);
        }
        if let Some(field) = self.graph.field(member) {
            let wanted: String = signature.chars().filter(|c| !c.is_whitespace()).collect();
            return field.type_name == wanted;
        }
        false
    }
}

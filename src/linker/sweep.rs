//! Removal of unmarked entities.
//!
//! A sweep works in two phases. The first computes, without touching the graph, which
//! tokens go and how every surviving row that lists or points at them must be rewritten;
//! the referential closure check runs on that plan. Only when the plan is consistent is
//! it committed, so a failed sweep leaves the graph exactly as it was.

use rustc_hash::FxHashMap;
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    linker::{config::LinkerConfig, state::MarkStore},
    metadata::{
        entities::{Entity, EntityKind},
        graph::EntityGraph,
        token::Token,
    },
    Error, Result,
};

/// What a sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    removed: BTreeMap<EntityKind, Vec<Token>>,
    rewritten: usize,
}

impl SweepReport {
    /// Removed tokens of one kind, in token order.
    #[must_use]
    pub fn removed_of(&self, kind: EntityKind) -> &[Token] {
        self.removed.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Removed tokens per kind.
    #[must_use]
    pub fn removed(&self) -> &BTreeMap<EntityKind, Vec<Token>> {
        &self.removed
    }

    /// Number of removed entities.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.removed.values().map(Vec::len).sum()
    }

    /// Number of surviving rows whose lists or links were pruned.
    #[must_use]
    pub fn rewritten(&self) -> usize {
        self.rewritten
    }

    /// Returns `true` if the sweep changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_removed() == 0 && self.rewritten == 0
    }
}

/// Deletes every entity that is not marked.
#[derive(Debug, Clone, Copy)]
pub struct Sweep {
    verify_references: bool,
}

impl Sweep {
    /// Creates a sweep using the reference verification setting of `config`.
    #[must_use]
    pub fn new(config: &LinkerConfig) -> Self {
        Self {
            verify_references: config.verify_references,
        }
    }

    /// Removes every unmarked entity from `graph` and prunes the rows that survive.
    ///
    /// Sweeping an already swept graph with the same marks removes nothing.
    ///
    /// # Errors
    /// - [`Error::Malformed`] if `marks` was not computed over `graph`
    /// - [`Error::DanglingReference`] if a surviving entity would reference a removed one;
    ///   the graph is left untouched
    pub fn run(&self, graph: &mut EntityGraph, marks: &MarkStore) -> Result<SweepReport> {
        if !Arc::ptr_eq(marks.entity_index(), graph.entity_index()) {
            return Err(malformed_error!(
                "Mark state was computed for a different entity graph"
            ));
        }

        let survives = |token: Token| marks.is_marked(token) && graph.contains(token);

        let mut removed: BTreeMap<EntityKind, Vec<Token>> = BTreeMap::new();
        let mut rewrites: FxHashMap<Token, Entity> = FxHashMap::default();
        for token in graph.tokens() {
            let Some(entity) = graph.entity(token) else {
                continue;
            };
            if !survives(token) {
                removed.entry(entity.kind()).or_default().push(token);
            } else if let Some(pruned) = prune(&entity, &survives) {
                rewrites.insert(token, pruned);
            }
        }

        if self.verify_references {
            for token in graph.tokens().filter(|token| survives(*token)) {
                let entity = match rewrites.get(&token) {
                    Some(pruned) => Some(pruned.clone()),
                    None => graph.entity(token),
                };
                let Some(entity) = entity else {
                    continue;
                };
                if let Some(to) = entity
                    .references()
                    .into_iter()
                    .find(|to| !to.is_external() && !survives(*to))
                {
                    tracing::error!(
                        "{} references {}, which is about to be removed",
                        graph.qualified_name(token),
                        graph.qualified_name(to)
                    );
                    return Err(Error::DanglingReference { from: token, to });
                }
            }
        }

        let rewritten = rewrites.len();
        for tokens in removed.values() {
            for token in tokens {
                graph.remove(*token);
            }
        }
        for (_, pruned) in rewrites {
            graph.replace(pruned);
        }
        graph.rebuild_member_index();

        let report = SweepReport { removed, rewritten };
        tracing::info!(
            "Sweep removed {} entities and rewrote {} rows",
            report.total_removed(),
            report.rewritten
        );
        Ok(report)
    }
}

/// Returns a copy of `entity` with every list entry and weak link that does not survive
/// dropped, or `None` if nothing would change.
fn prune(entity: &Entity, survives: &impl Fn(Token) -> bool) -> Option<Entity> {
    let keep = |list: &[Token]| -> Option<Vec<Token>> {
        let kept: Vec<Token> = list.iter().copied().filter(|token| survives(*token)).collect();
        (kept.len() != list.len()).then_some(kept)
    };

    match entity {
        Entity::Type(row) => {
            let interfaces = keep(&row.interfaces);
            let methods = keep(&row.methods);
            let fields = keep(&row.fields);
            let attributes = keep(&row.custom_attributes);
            let directives = keep(&row.directives);
            if interfaces.is_none()
                && methods.is_none()
                && fields.is_none()
                && attributes.is_none()
                && directives.is_none()
            {
                return None;
            }

            let mut pruned = (**row).clone();
            pruned.interfaces = interfaces.unwrap_or(pruned.interfaces);
            pruned.methods = methods.unwrap_or(pruned.methods);
            pruned.fields = fields.unwrap_or(pruned.fields);
            pruned.custom_attributes = attributes.unwrap_or(pruned.custom_attributes);
            pruned.directives = directives.unwrap_or(pruned.directives);
            Some(Entity::Type(Arc::new(pruned)))
        }
        Entity::Method(row) => {
            let attributes = keep(&row.custom_attributes);
            let param_attributes = keep(&row.param_attributes);
            let directives = keep(&row.directives);
            // An override of a removed slot survives as a plain virtual method
            let stale_override = row
                .overrides
                .is_some_and(|slot| !slot.is_external() && !survives(slot));
            if attributes.is_none()
                && param_attributes.is_none()
                && directives.is_none()
                && !stale_override
            {
                return None;
            }

            let mut pruned = (**row).clone();
            pruned.custom_attributes = attributes.unwrap_or(pruned.custom_attributes);
            pruned.param_attributes = param_attributes.unwrap_or(pruned.param_attributes);
            pruned.directives = directives.unwrap_or(pruned.directives);
            if stale_override {
                pruned.overrides = None;
            }
            Some(Entity::Method(Arc::new(pruned)))
        }
        Entity::Field(row) => {
            let attributes = keep(&row.custom_attributes)?;
            let mut pruned = (**row).clone();
            pruned.custom_attributes = attributes;
            Some(Entity::Field(Arc::new(pruned)))
        }
        Entity::InterfaceImpl(row) => {
            let attributes = keep(&row.custom_attributes)?;
            let mut pruned = (**row).clone();
            pruned.custom_attributes = attributes;
            Some(Entity::InterfaceImpl(Arc::new(pruned)))
        }
        Entity::CustomAttribute(_) | Entity::PreserveDirective(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{Diagnostics, NoSuppression},
        linker::engine::MarkingEngine,
        metadata::{
            builder::EntityGraphBuilder,
            entities::{MethodBody, MethodModifiers, TypeAttributes},
            signature::MethodSignature,
        },
        test::{directive_scope_fixture, DirectiveScopeFixture},
    };

    fn mark(graph: &EntityGraph, roots: &[Token]) -> MarkStore {
        MarkingEngine::new(graph, &LinkerConfig::default())
            .run(roots, &Diagnostics::new(), &NoSuppression)
            .unwrap()
            .into_marks()
    }

    #[test]
    fn test_directive_scope_sweep() {
        let DirectiveScopeFixture {
            mut graph,
            t,
            i,
            i_foo,
            foo,
            keep,
            ctor,
            edge,
            directive,
        } = directive_scope_fixture();
        let marks = mark(&graph, &[keep]);

        let report = Sweep::new(&LinkerConfig::default())
            .run(&mut graph, &marks)
            .unwrap();

        assert_eq!(report.removed_of(EntityKind::Type), &[i]);
        assert_eq!(report.removed_of(EntityKind::Method), &[i_foo, ctor]);
        assert_eq!(report.removed_of(EntityKind::InterfaceImpl), &[edge]);
        assert_eq!(report.total_removed(), 4);

        let t_row = graph.type_def(t).unwrap();
        assert!(t_row.interfaces.is_empty());
        assert_eq!(t_row.methods, vec![foo, keep]);
        assert!(graph.contains(directive));
        assert!(!graph.contains(i));
        assert!(graph.member_index().types_named("MyApp.I").is_empty());
        assert_eq!(graph.member_index().members_named(t, "Foo"), &[foo]);
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let DirectiveScopeFixture { mut graph, keep, .. } = directive_scope_fixture();
        let marks = mark(&graph, &[keep]);
        let sweep = Sweep::new(&LinkerConfig::default());

        let first = sweep.run(&mut graph, &marks).unwrap();
        let len = graph.len();
        let second = sweep.run(&mut graph, &marks).unwrap();

        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(graph.len(), len);
    }

    #[test]
    fn test_stale_override_is_cleared() {
        let mut builder = EntityGraphBuilder::new();
        let animal = builder.add_type("Zoo", "Animal", TypeAttributes::PUBLIC);
        let animal_speak = builder.add_method(
            animal,
            "Speak",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT,
        );
        let dog = builder.add_type("Zoo", "Dog", TypeAttributes::PUBLIC);
        builder.set_base(dog, animal).unwrap();
        let dog_speak = builder.add_method(
            dog,
            "Speak",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL,
        );
        builder.set_overrides(dog_speak, animal_speak).unwrap();
        let program = builder.add_type("Zoo", "Program", TypeAttributes::PUBLIC);
        let main = builder.add_method(
            program,
            "Main",
            MethodSignature::void(),
            MethodModifiers::STATIC,
        );
        builder
            .set_body(main, MethodBody::builder().call(dog_speak).build())
            .unwrap();
        let mut graph = builder.build().unwrap();
        let marks = mark(&graph, &[main]);

        // The base slot is only referenced by the override link, which is not a dependency
        assert!(marks.is_marked(dog_speak));
        assert!(marks.is_marked(animal));
        assert!(!marks.is_marked(animal_speak));

        let report = Sweep::new(&LinkerConfig::default())
            .run(&mut graph, &marks)
            .unwrap();
        assert_eq!(report.removed_of(EntityKind::Method), &[animal_speak]);
        assert_eq!(graph.method(dog_speak).unwrap().overrides, None);
        assert!(report.rewritten() >= 2);
    }

    #[test]
    fn test_dangling_reference_aborts() {
        let DirectiveScopeFixture {
            mut graph, t, foo, ..
        } = directive_scope_fixture();
        let mut marks = MarkStore::new(graph.entity_index().clone());
        marks.mark(foo);
        let len = graph.len();

        let result = Sweep::new(&LinkerConfig::default()).run(&mut graph, &marks);
        assert!(matches!(
            result,
            Err(Error::DanglingReference { from, to }) if from == foo && to == t
        ));
        assert_eq!(graph.len(), len);

        // Without verification the inconsistent plan is committed
        let unchecked = LinkerConfig {
            verify_references: false,
            ..LinkerConfig::default()
        };
        let report = Sweep::new(&unchecked).run(&mut graph, &marks).unwrap();
        assert_eq!(report.total_removed(), len - 1);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_foreign_marks_are_rejected() {
        let DirectiveScopeFixture { mut graph, .. } = directive_scope_fixture();
        let DirectiveScopeFixture { graph: other, keep, .. } = directive_scope_fixture();
        let marks = mark(&other, &[keep]);

        assert!(matches!(
            Sweep::new(&LinkerConfig::default()).run(&mut graph, &marks),
            Err(Error::Malformed { .. })
        ));
    }
}

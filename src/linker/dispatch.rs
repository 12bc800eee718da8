//! Virtual and interface dispatch rules.
//!
//! Whether an override or an interface implementation is needed depends on two facts that
//! only become known while marking runs: some type must be constructed, and some slot must
//! be reachable. Everything else about a rule is a property of the graph's shape, so the
//! [`DispatchTable`] computes every possible rule instance once, up front. The marking
//! engine then only has to check a [`DispatchCandidate`]'s triggers whenever one of them
//! flips.
//!
//! # Rules
//!
//! | Rule | Triggers | Enqueues |
//! |------|----------|----------|
//! | [`DispatchRule::InterfaceDispatch`] | `T` instantiated, interface slot dispatched | the `InterfaceImpl` edge and `T`'s implementation |
//! | [`DispatchRule::EdgeCompleteness`] | edge `S -> I` marked, interface slot marked | `S`'s implementation |
//! | [`DispatchRule::VirtualOverride`] | `T` instantiated, class slot marked | the most derived override visible from `T` |
//! | [`DispatchRule::ExternalOverride`] | `T` instantiated | overrides of slots outside the graph, edges to external interfaces and the `newslot` methods that may implement them |
//!
//! Implementations are found through explicit `overrides` links first (nearest type
//! first), then by name and parameter list among the instance methods of the type chain.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use strum::{Display, EnumCount, EnumIter};

use crate::{
    linker::config::LinkerConfig,
    metadata::{
        entities::{InterfaceImplRc, MethodDef, MethodDefRc, TypeDefRc},
        graph::EntityGraph,
        token::Token,
    },
};

/// The rule a [`DispatchCandidate`] instantiates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount,
)]
pub enum DispatchRule {
    /// A constructed type receives an interface call
    #[strum(serialize = "interface dispatch")]
    InterfaceDispatch,
    /// A kept interface method stays implemented by every kept implementer
    #[strum(serialize = "edge completeness")]
    EdgeCompleteness,
    /// A constructed type receives a virtual call
    #[strum(serialize = "virtual override")]
    VirtualOverride,
    /// A constructed type may be called back through a slot declared outside the graph
    #[strum(serialize = "external override")]
    ExternalOverride,
}

/// One instance of a dispatch rule.
///
/// A candidate fires once all of its triggers hold:
/// - `instantiated`, when set, must be an instantiated type
/// - `slot`, when set, must be dispatched ([`DispatchRule::InterfaceDispatch`]) or marked
///   (every other rule)
/// - `edge`, when set, must be marked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchCandidate {
    /// The rule
    pub rule: DispatchRule,
    /// Type that must be instantiated
    pub instantiated: Option<Token>,
    /// Slot that must be dispatched or marked
    pub slot: Option<Token>,
    /// Interface edge that must be marked
    pub edge: Option<Token>,
    /// Entities enqueued when the candidate fires
    pub targets: Vec<Token>,
}

/// Every dispatch rule instance of a graph, indexed by trigger.
#[derive(Debug, Default)]
pub struct DispatchTable {
    candidates: Vec<DispatchCandidate>,
    by_type: FxHashMap<Token, Vec<usize>>,
    by_slot: FxHashMap<Token, Vec<usize>>,
    by_edge: FxHashMap<Token, Vec<usize>>,
}

impl DispatchTable {
    /// Computes the candidates of every rule over `graph`.
    ///
    /// Per type work runs on the `rayon` pool when `parallel_discovery` is on; the resulting
    /// table is the same either way.
    #[must_use]
    pub fn build(graph: &EntityGraph, config: &LinkerConfig) -> Self {
        let types: Vec<TypeDefRc> = graph.types().filter(|ty| ty.is_instantiable()).collect();
        let per_type: Vec<Vec<DispatchCandidate>> = if config.parallel_discovery {
            types
                .par_iter()
                .map(|ty| type_candidates(graph, ty, config))
                .collect()
        } else {
            types
                .iter()
                .map(|ty| type_candidates(graph, ty, config))
                .collect()
        };

        let mut table = DispatchTable::default();
        for candidate in per_type.into_iter().flatten() {
            table.insert(candidate);
        }
        for edge in graph.interface_impls() {
            for candidate in edge_candidates(graph, &edge) {
                table.insert(candidate);
            }
        }

        tracing::debug!(
            "Dispatch table: {} candidates over {} instantiable types",
            table.len(),
            types.len()
        );
        table
    }

    fn insert(&mut self, candidate: DispatchCandidate) {
        let index = self.candidates.len();
        if let Some(ty) = candidate.instantiated {
            self.by_type.entry(ty).or_default().push(index);
        }
        if let Some(slot) = candidate.slot {
            self.by_slot.entry(slot).or_default().push(index);
        }
        if let Some(edge) = candidate.edge {
            self.by_edge.entry(edge).or_default().push(index);
        }
        self.candidates.push(candidate);
    }

    /// Looks up a candidate by position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DispatchCandidate> {
        self.candidates.get(index)
    }

    /// All candidates.
    #[must_use]
    pub fn candidates(&self) -> &[DispatchCandidate] {
        &self.candidates
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns `true` if the graph has no dispatch rule instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Number of candidates of one rule.
    #[must_use]
    pub fn count(&self, rule: DispatchRule) -> usize {
        self.candidates
            .iter()
            .filter(|candidate| candidate.rule == rule)
            .count()
    }

    /// Candidates waiting on `ty` being instantiated.
    #[must_use]
    pub fn triggered_by_type(&self, ty: Token) -> &[usize] {
        self.by_type.get(&ty).map_or(&[], Vec::as_slice)
    }

    /// Candidates waiting on `slot` being dispatched or marked.
    #[must_use]
    pub fn triggered_by_slot(&self, slot: Token) -> &[usize] {
        self.by_slot.get(&slot).map_or(&[], Vec::as_slice)
    }

    /// Candidates waiting on `edge` being marked.
    #[must_use]
    pub fn triggered_by_edge(&self, edge: Token) -> &[usize] {
        self.by_edge.get(&edge).map_or(&[], Vec::as_slice)
    }
}

/// Finds the method of `chain` (nearest type first) that implements `slot`.
///
/// Explicit `overrides` links win over name matches anywhere in the chain. Returns `None`
/// if no instance method of the chain matches.
#[must_use]
pub fn implementation_of(
    graph: &EntityGraph,
    chain: &[TypeDefRc],
    slot: &MethodDef,
) -> Option<Token> {
    if let Some(explicit) =
        chain_methods(graph, chain).find(|method| method.overrides == Some(slot.token))
    {
        return Some(explicit.token);
    }

    let parameters = slot.signature.parameter_list();
    chain_methods(graph, chain)
        .find(|method| {
            !method.is_static()
                && method.name == slot.name
                && method.signature.parameter_list() == parameters
        })
        .map(|method| method.token)
}

fn chain_methods<'a>(
    graph: &'a EntityGraph,
    chain: &'a [TypeDefRc],
) -> impl Iterator<Item = MethodDefRc> + 'a {
    chain
        .iter()
        .flat_map(|ty| ty.methods.iter())
        .filter_map(move |token| graph.method(*token))
}

/// Instance methods of an interface that can be dispatched through.
fn interface_slots(graph: &EntityGraph, interface: Token) -> Vec<MethodDefRc> {
    graph
        .type_def(interface)
        .filter(|row| row.is_interface())
        .map(|row| {
            row.methods
                .iter()
                .filter_map(|token| graph.method(*token))
                .filter(|method| method.is_virtual() && !method.is_static())
                .collect()
        })
        .unwrap_or_default()
}

fn type_candidates(
    graph: &EntityGraph,
    ty: &TypeDefRc,
    config: &LinkerConfig,
) -> Vec<DispatchCandidate> {
    let chain = graph.type_chain(ty.token);
    let edges: Vec<InterfaceImplRc> = chain
        .iter()
        .flat_map(|owner| graph.interfaces_of(owner.token))
        .collect();
    let mut candidates = Vec::new();

    for edge in &edges {
        for slot in interface_slots(graph, edge.interface) {
            let mut targets = vec![edge.token];
            targets.extend(
                implementation_of(graph, &chain, &slot).filter(|method| *method != slot.token),
            );
            candidates.push(DispatchCandidate {
                rule: DispatchRule::InterfaceDispatch,
                instantiated: Some(ty.token),
                slot: Some(slot.token),
                edge: None,
                targets,
            });
        }
    }

    let layout = VTableLayout::compute(graph, &chain);
    for slot in &layout.slots {
        let Some((most_derived, overridden)) = slot.history.split_last() else {
            continue;
        };
        for occupant in overridden.iter().filter(|occupant| *occupant != most_derived) {
            candidates.push(DispatchCandidate {
                rule: DispatchRule::VirtualOverride,
                instantiated: Some(ty.token),
                slot: Some(*occupant),
                edge: None,
                targets: vec![*most_derived],
            });
        }
    }

    if config.keep_external_overrides {
        let mut targets: Vec<Token> = layout
            .slots
            .iter()
            .filter(|slot| slot.external)
            .filter_map(|slot| slot.history.last().copied())
            .collect();
        let external_edges: Vec<Token> = edges
            .iter()
            .filter(|edge| !graph.contains(edge.interface))
            .map(|edge| edge.token)
            .collect();
        if !external_edges.is_empty() {
            // The methods of an external interface are unknown, so any method that opened
            // a slot of its own may be the implicit implementation of one
            targets.extend(
                layout
                    .slots
                    .iter()
                    .filter(|slot| !slot.external && slot.implicit)
                    .filter_map(|slot| slot.history.last().copied()),
            );
            targets.extend(external_edges);
        }
        targets.sort_unstable();
        targets.dedup();

        if !targets.is_empty() {
            candidates.push(DispatchCandidate {
                rule: DispatchRule::ExternalOverride,
                instantiated: Some(ty.token),
                slot: None,
                edge: None,
                targets,
            });
        }
    }

    candidates
}

fn edge_candidates(graph: &EntityGraph, edge: &InterfaceImplRc) -> Vec<DispatchCandidate> {
    let chain = graph.type_chain(edge.class);
    interface_slots(graph, edge.interface)
        .into_iter()
        .filter_map(|slot| {
            let implementation =
                implementation_of(graph, &chain, &slot).filter(|method| *method != slot.token)?;
            Some(DispatchCandidate {
                rule: DispatchRule::EdgeCompleteness,
                instantiated: None,
                slot: Some(slot.token),
                edge: Some(edge.token),
                targets: vec![implementation],
            })
        })
        .collect()
}

/// A class virtual slot and every method that occupied it, base first.
#[derive(Debug)]
struct VirtualSlot {
    name: String,
    parameters: String,
    /// The slot is declared outside the graph
    external: bool,
    /// Opened by a `newslot` method without an explicit override
    implicit: bool,
    history: Vec<Token>,
}

/// Class vtable of one type, laid out over its chain.
#[derive(Debug, Default)]
struct VTableLayout {
    slots: Vec<VirtualSlot>,
    slot_of: FxHashMap<Token, usize>,
}

impl VTableLayout {
    fn compute(graph: &EntityGraph, chain: &[TypeDefRc]) -> Self {
        // A virtual method that overrides nothing visible must override a slot of the
        // external base
        let extends_external = chain
            .last()
            .and_then(|root| root.base)
            .is_some_and(|base| !graph.contains(base));

        let mut layout = VTableLayout::default();
        for ty in chain.iter().rev() {
            for method in ty.methods.iter().filter_map(|token| graph.method(*token)) {
                if method.is_virtual() && !method.is_static() {
                    layout.place(graph, &method, extends_external);
                }
            }
        }
        layout
    }

    fn place(&mut self, graph: &EntityGraph, method: &MethodDef, extends_external: bool) {
        if let Some(target) = method.overrides {
            if let Some(&index) = self.slot_of.get(&target) {
                self.occupy(index, method.token);
                if method.is_new_slot() {
                    self.open(method, false);
                }
            } else {
                // Outside the chain: an external slot, or an interface method
                self.open(method, !graph.contains(target));
            }
            return;
        }

        if !method.is_new_slot() {
            let parameters = method.signature.parameter_list();
            if let Some(index) = self
                .slots
                .iter()
                .rposition(|slot| slot.name == method.name && slot.parameters == parameters)
            {
                self.occupy(index, method.token);
                return;
            }
            self.open(method, extends_external);
            return;
        }

        self.open(method, false);
    }

    fn open(&mut self, method: &MethodDef, external: bool) {
        self.slot_of.insert(method.token, self.slots.len());
        self.slots.push(VirtualSlot {
            name: method.name.clone(),
            parameters: method.signature.parameter_list(),
            external,
            implicit: method.is_new_slot() && method.overrides.is_none(),
            history: vec![method.token],
        });
    }

    fn occupy(&mut self, index: usize, method: Token) {
        self.slot_of.insert(method, index);
        if let Some(slot) = self.slots.get_mut(index) {
            slot.history.push(method);
        }
    }
}

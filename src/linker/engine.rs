//! The worklist driven fixed point.
//!
//! # Architecture
//!
//! A run drains the worklist in batches. Dependency sets of a batch are computed first
//! (on the `rayon` pool when `parallel_discovery` is on), then applied one entity at a
//! time by the single writer that owns the [`MarkStore`]. Applying an entity marks it,
//! queues its dependencies, and re-checks every dispatch candidate whose trigger it
//! flipped: a type becoming instantiated, a slot becoming dispatched or marked, an
//! interface edge becoming marked.
//!
//! Every trigger is monotonic and every candidate is re-checked on each of its flips, so
//! a candidate fires exactly when its last trigger flips, whatever the order. The final
//! mark state is therefore the same for every worklist order, batch size and thread
//! count.
//!
//! # Examples
//!
//! ```rust
//! use dottrim::prelude::*;
//!
//! let mut builder = EntityGraphBuilder::new();
//! let program = builder.add_type("App", "Program", TypeAttributes::PUBLIC);
//! let main = builder.add_method(program, "Main", MethodSignature::void(), MethodModifiers::STATIC);
//! let unused = builder.add_method(program, "Unused", MethodSignature::void(), MethodModifiers::STATIC);
//! let graph = builder.build()?;
//!
//! let config = LinkerConfig::default();
//! let diagnostics = Diagnostics::new();
//! let result = MarkingEngine::new(&graph, &config).run(&[main], &diagnostics, &NoSuppression)?;
//!
//! assert!(result.is_marked(program));
//! assert!(!result.is_marked(unused));
//! # Ok::<(), dottrim::Error>(())
//! ```

use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use strum::IntoEnumIterator;

use crate::{
    diagnostics::{
        codes, DiagnosticsSink, Message, MessageOrigin, MessageSubCategory, SuppressionPolicy,
    },
    linker::{
        config::LinkerConfig,
        discovery::{Dependencies, DependencyDiscovery},
        dispatch::{DispatchCandidate, DispatchRule, DispatchTable},
        reasons::{MarkReason, MarkReasons},
        resolver::ResolutionError,
        state::{MarkState, MarkStore, Worklist},
    },
    metadata::{
        entities::EntityKind,
        graph::EntityGraph,
        token::{TableId, Token},
    },
    utils::BitSet,
    Result,
};

/// Counters of one marking run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkStats {
    /// Marked entities per kind
    pub marked: BTreeMap<EntityKind, usize>,
    /// Live entities per kind
    pub total: BTreeMap<EntityKind, usize>,
    /// Batches drained
    pub iterations: usize,
    /// Dispatch rule firings
    pub firings: BTreeMap<DispatchRule, usize>,
    /// Interface edges declared by marked types that no rule justified
    pub dropped_edges: usize,
}

impl MarkStats {
    /// Marked entities of one kind.
    #[must_use]
    pub fn marked_of(&self, kind: EntityKind) -> usize {
        self.marked.get(&kind).copied().unwrap_or(0)
    }

    /// Live entities of one kind.
    #[must_use]
    pub fn total_of(&self, kind: EntityKind) -> usize {
        self.total.get(&kind).copied().unwrap_or(0)
    }

    /// Firings of one rule.
    #[must_use]
    pub fn firings_of(&self, rule: DispatchRule) -> usize {
        self.firings.get(&rule).copied().unwrap_or(0)
    }

    /// Marked entities of every kind.
    #[must_use]
    pub fn total_marked(&self) -> usize {
        self.marked.values().sum()
    }
}

impl fmt::Display for MarkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self
            .total
            .iter()
            .map(|(kind, total)| format!("{kind} {}/{total}", self.marked_of(*kind)))
            .collect();
        write!(f, "{}", kinds.join(", "))?;
        write!(f, "; {} iterations", self.iterations)?;
        for (rule, count) in &self.firings {
            write!(f, ", {rule} x{count}")?;
        }
        Ok(())
    }
}

/// Outcome of a marking run.
#[derive(Debug, Clone)]
pub struct MarkResult {
    marks: MarkStore,
    instantiated: BTreeSet<Token>,
    dispatched: BTreeSet<Token>,
    reasons: MarkReasons,
    failures: Vec<ResolutionError>,
    stats: MarkStats,
}

impl MarkResult {
    /// Final mark state.
    #[must_use]
    pub fn marks(&self) -> &MarkStore {
        &self.marks
    }

    /// Consumes the result, keeping only the mark state.
    #[must_use]
    pub fn into_marks(self) -> MarkStore {
        self.marks
    }

    /// Returns `true` if `token` is marked.
    #[must_use]
    pub fn is_marked(&self, token: Token) -> bool {
        self.marks.is_marked(token)
    }

    /// Final state of `token`.
    #[must_use]
    pub fn state(&self, token: Token) -> MarkState {
        self.marks.state(token)
    }

    /// Types some marked method constructs.
    #[must_use]
    pub fn instantiated(&self) -> &BTreeSet<Token> {
        &self.instantiated
    }

    /// Returns `true` if some marked method constructs `ty`.
    #[must_use]
    pub fn is_instantiated(&self, ty: Token) -> bool {
        self.instantiated.contains(&ty)
    }

    /// Virtual slots some marked method calls through `callvirt` or `ldvirtftn`.
    #[must_use]
    pub fn dispatched(&self) -> &BTreeSet<Token> {
        &self.dispatched
    }

    /// Mark reasons; empty unless `record_reasons` was on.
    #[must_use]
    pub fn reasons(&self) -> &MarkReasons {
        &self.reasons
    }

    /// Why `token` was marked.
    #[must_use]
    pub fn why(&self, token: Token) -> Option<MarkReason> {
        self.reasons.why(token)
    }

    /// Directive resolution failures, in the order they were reported.
    #[must_use]
    pub fn failures(&self) -> &[ResolutionError] {
        &self.failures
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> &MarkStats {
        &self.stats
    }
}

/// Computes the reachable closure of a set of roots.
pub struct MarkingEngine<'g> {
    graph: &'g EntityGraph,
    config: LinkerConfig,
    discovery: DependencyDiscovery<'g>,
    dispatch: DispatchTable,
}

impl<'g> MarkingEngine<'g> {
    /// Prepares an engine for `graph`, precomputing its dispatch table.
    #[must_use]
    pub fn new(graph: &'g EntityGraph, config: &LinkerConfig) -> Self {
        Self {
            graph,
            config: *config,
            discovery: DependencyDiscovery::new(graph, config),
            dispatch: DispatchTable::build(graph, config),
        }
    }

    /// The graph being marked.
    #[must_use]
    pub fn graph(&self) -> &'g EntityGraph {
        self.graph
    }

    /// The dependency discovery pass.
    #[must_use]
    pub fn discovery(&self) -> &DependencyDiscovery<'g> {
        &self.discovery
    }

    /// The precomputed dispatch rule instances.
    #[must_use]
    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Marks everything reachable from `roots`.
    ///
    /// Roots that are not entities of the graph are reported as warnings and skipped.
    /// Directive resolution failures are reported as errors; the run continues without
    /// the dependency they would have implied.
    ///
    /// # Arguments
    ///
    /// * `roots` - Entities that are unconditionally required
    /// * `sink` - Receives warnings, errors and the final summary
    /// * `policy` - Consulted before every warning
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidMessageCode`] only if a message code constant is
    /// out of its category's range; marking itself cannot fail.
    pub fn run(
        &self,
        roots: &[Token],
        sink: &dyn DiagnosticsSink,
        policy: &dyn SuppressionPolicy,
    ) -> Result<MarkResult> {
        let mut run = MarkRun::new(self, sink);

        for root in roots {
            if self.graph.contains(*root) {
                run.enqueue(*root, MarkReason::Root);
            } else {
                sink.emit(Message::warning(
                    policy,
                    format!("Root {root} is not an entity of the graph and was ignored"),
                    codes::ROOT_NOT_FOUND,
                    MessageOrigin::member(*root, root.to_string()),
                    MessageSubCategory::NONE,
                )?);
            }
        }

        let batch_size = self.config.effective_batch_size();
        while !run.worklist.is_empty() {
            let batch = run.worklist.take_batch(batch_size);
            run.iterations += 1;

            let discovered: Vec<(Token, Dependencies)> =
                if self.config.parallel_discovery && batch.len() > 1 {
                    batch
                        .par_iter()
                        .map(|token| (*token, self.discovery.dependencies_of(*token)))
                        .collect()
                } else {
                    batch
                        .iter()
                        .map(|token| (*token, self.discovery.dependencies_of(*token)))
                        .collect()
                };

            for (token, dependencies) in discovered {
                run.apply(token, dependencies)?;
            }
        }

        let result = run.finish();
        tracing::debug!("Marking finished: {}", result.stats);
        sink.emit(Message::info(format!(
            "Marked {} of {} entities",
            result.marks.marked_count(),
            self.graph.len()
        )));
        Ok(result)
    }
}

/// Mutable state of one run. Owned by the single writer.
struct MarkRun<'e, 'g> {
    engine: &'e MarkingEngine<'g>,
    sink: &'e dyn DiagnosticsSink,
    marks: MarkStore,
    worklist: Worklist,
    instantiated: BTreeSet<Token>,
    dispatched: BTreeSet<Token>,
    pending_edges: BTreeSet<Token>,
    fired: BitSet,
    reasons: MarkReasons,
    failures: Vec<ResolutionError>,
    firings: BTreeMap<DispatchRule, usize>,
    iterations: usize,
}

impl<'e, 'g> MarkRun<'e, 'g> {
    fn new(engine: &'e MarkingEngine<'g>, sink: &'e dyn DiagnosticsSink) -> Self {
        Self {
            engine,
            sink,
            marks: MarkStore::new(engine.graph.entity_index().clone()),
            worklist: Worklist::new(engine.config.worklist_order),
            instantiated: BTreeSet::new(),
            dispatched: BTreeSet::new(),
            pending_edges: BTreeSet::new(),
            fired: BitSet::new(engine.dispatch.len()),
            reasons: MarkReasons::new(),
            failures: Vec::new(),
            firings: BTreeMap::new(),
            iterations: 0,
        }
    }

    fn enqueue(&mut self, token: Token, reason: MarkReason) {
        if self.marks.enqueue(token) {
            if self.engine.config.record_reasons {
                self.reasons.record(token, reason);
            }
            self.worklist.push(token);
        }
    }

    fn apply(&mut self, token: Token, dependencies: Dependencies) -> Result<()> {
        if !self.marks.mark(token) {
            return Ok(());
        }
        let engine = self.engine;

        let from_directive = token.table_id() == Some(TableId::PreserveDirective);
        for dependency in &dependencies.entities {
            let reason = if from_directive {
                MarkReason::Directive(token)
            } else {
                MarkReason::Dependency(token)
            };
            self.enqueue(*dependency, reason);
        }

        for failure in dependencies.failures {
            let owner = engine
                .graph
                .directive(failure.directive())
                .map_or(token, |directive| directive.owner);
            self.sink.emit(Message::error(
                failure.to_string(),
                failure.code(),
                MessageSubCategory::NONE,
                Some(MessageOrigin::member(owner, engine.graph.qualified_name(owner))),
            )?);
            self.failures.push(failure);
        }

        self.pending_edges.extend(dependencies.pending_edges);

        for ty in dependencies.instantiates {
            if self.instantiated.insert(ty) {
                for index in engine.dispatch.triggered_by_type(ty) {
                    self.try_fire(*index);
                }
            }
        }
        for slot in dependencies.dispatches {
            if self.dispatched.insert(slot) {
                for index in engine.dispatch.triggered_by_slot(slot) {
                    self.try_fire(*index);
                }
            }
        }

        // The entity itself may be the marked slot or edge a candidate waits on
        for index in engine.dispatch.triggered_by_slot(token) {
            self.try_fire(*index);
        }
        for index in engine.dispatch.triggered_by_edge(token) {
            self.try_fire(*index);
        }

        Ok(())
    }

    fn is_satisfied(&self, candidate: &DispatchCandidate) -> bool {
        candidate
            .instantiated
            .map_or(true, |ty| self.instantiated.contains(&ty))
            && candidate
                .edge
                .map_or(true, |edge| self.marks.is_marked(edge))
            && candidate.slot.map_or(true, |slot| match candidate.rule {
                DispatchRule::InterfaceDispatch => self.dispatched.contains(&slot),
                DispatchRule::EdgeCompleteness
                | DispatchRule::VirtualOverride
                | DispatchRule::ExternalOverride => self.marks.is_marked(slot),
            })
    }

    fn try_fire(&mut self, index: usize) {
        let engine = self.engine;
        if self.fired.contains(index) {
            return;
        }
        let Some(candidate) = engine.dispatch.get(index) else {
            return;
        };
        if !self.is_satisfied(candidate) {
            return;
        }

        self.fired.insert(index);
        *self.firings.entry(candidate.rule).or_insert(0) += 1;

        if engine.config.verbose {
            let targets: Vec<String> = candidate
                .targets
                .iter()
                .map(|target| engine.graph.qualified_name(*target))
                .collect();
            let subject = candidate
                .instantiated
                .or(candidate.edge)
                .map_or_else(String::new, |token| engine.graph.qualified_name(token));
            self.sink.emit(Message::diagnostic(format!(
                "{} on {subject} keeps {}",
                candidate.rule,
                targets.join(", ")
            )));
        }

        let Some(reason) = reason_of(candidate) else {
            return;
        };
        for target in &candidate.targets {
            self.enqueue(*target, reason);
        }
    }

    fn finish(self) -> MarkResult {
        let graph = self.engine.graph;

        let mut stats = MarkStats {
            iterations: self.iterations,
            firings: self.firings,
            dropped_edges: self
                .pending_edges
                .iter()
                .filter(|edge| !self.marks.is_marked(**edge))
                .count(),
            ..MarkStats::default()
        };
        for kind in EntityKind::iter() {
            stats.total.insert(kind, graph.count(kind));
            stats.marked.insert(kind, 0);
        }
        for token in self.marks.marked() {
            if let Some(kind) = graph.kind_of(token) {
                *stats.marked.entry(kind).or_insert(0) += 1;
            }
        }

        MarkResult {
            marks: self.marks,
            instantiated: self.instantiated,
            dispatched: self.dispatched,
            reasons: self.reasons,
            failures: self.failures,
            stats,
        }
    }
}

fn reason_of(candidate: &DispatchCandidate) -> Option<MarkReason> {
    match (candidate.rule, candidate.instantiated, candidate.slot, candidate.edge) {
        (DispatchRule::InterfaceDispatch, Some(ty), Some(slot), _) => {
            Some(MarkReason::InterfaceDispatch { ty, slot })
        }
        (DispatchRule::EdgeCompleteness, _, _, Some(edge)) => {
            Some(MarkReason::EdgeCompleteness { edge })
        }
        (DispatchRule::VirtualOverride, Some(ty), Some(slot), _) => {
            Some(MarkReason::VirtualOverride { ty, slot })
        }
        (DispatchRule::ExternalOverride, Some(ty), _, _) => {
            Some(MarkReason::ExternalOverride { ty })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{Diagnostics, MessageCategory, NoSuppression, SuppressionSet},
        metadata::{
            builder::EntityGraphBuilder,
            entities::{MethodBody, MethodModifiers, TypeAttributes},
            signature::MethodSignature,
        },
        test::{directive_scope_fixture, DirectiveScopeFixture},
    };

    #[test]
    fn test_directive_does_not_justify_dispatch() {
        let DirectiveScopeFixture {
            graph,
            t,
            i,
            i_foo,
            foo,
            keep,
            ctor,
            edge,
            directive,
        } = directive_scope_fixture();
        let diagnostics = Diagnostics::new();

        let result = MarkingEngine::new(&graph, &LinkerConfig::default())
            .run(&[keep], &diagnostics, &NoSuppression)
            .unwrap();

        assert!(result.is_marked(t));
        assert!(result.is_marked(keep));
        assert!(result.is_marked(foo));
        assert!(result.is_marked(directive));
        assert!(!result.is_marked(i));
        assert!(!result.is_marked(i_foo));
        assert!(!result.is_marked(edge));
        assert!(!result.is_marked(ctor));
        assert_eq!(result.state(edge), MarkState::Unvisited);
        assert_eq!(result.why(foo), Some(MarkReason::Directive(directive)));
        assert_eq!(result.stats().dropped_edges, 1);
        assert!(result.instantiated().is_empty());
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn test_interface_dispatch_marks_edge() {
        let mut builder = EntityGraphBuilder::new();
        let shape = builder.add_interface("Geo", "IShape");
        let area = builder.add_method(
            shape,
            "Area",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT | MethodModifiers::NEW_SLOT,
        );
        let circle = builder.add_type("Geo", "Circle", TypeAttributes::PUBLIC);
        let ctor = builder.add_method(
            circle,
            ".ctor",
            MethodSignature::void(),
            MethodModifiers::SPECIAL_NAME,
        );
        let circle_area = builder.add_method(
            circle,
            "Area",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL | MethodModifiers::FINAL | MethodModifiers::NEW_SLOT,
        );
        let edge = builder.add_interface_impl(circle, shape);
        let program = builder.add_type("Geo", "Program", TypeAttributes::PUBLIC);
        let main = builder.add_method(
            program,
            "Main",
            MethodSignature::void(),
            MethodModifiers::STATIC,
        );
        builder
            .set_body(main, MethodBody::builder().newobj(ctor).callvirt(area).build())
            .unwrap();
        let graph = builder.build().unwrap();

        let result = MarkingEngine::new(&graph, &LinkerConfig::default())
            .run(&[main], &Diagnostics::new(), &NoSuppression)
            .unwrap();

        assert!(result.is_instantiated(circle));
        assert!(result.dispatched().contains(&area));
        assert!(result.is_marked(edge));
        assert!(result.is_marked(circle_area));
        assert!(result.is_marked(shape));
        assert_eq!(
            result.why(edge),
            Some(MarkReason::InterfaceDispatch { ty: circle, slot: area })
        );
        assert_eq!(result.stats().firings_of(DispatchRule::InterfaceDispatch), 1);
        assert_eq!(result.stats().dropped_edges, 0);
    }

    #[test]
    fn test_unknown_root_is_warned() {
        let DirectiveScopeFixture { graph, keep, .. } = directive_scope_fixture();
        let diagnostics = Diagnostics::new();
        let missing = Token::new(0x06000099);

        let result = MarkingEngine::new(&graph, &LinkerConfig::default())
            .run(&[missing, keep], &diagnostics, &NoSuppression)
            .unwrap();

        assert!(result.is_marked(keep));
        let warnings = diagnostics.by_code(codes::ROOT_NOT_FOUND);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].category(), Some(MessageCategory::Warning));

        let mut policy = SuppressionSet::new();
        policy.suppress_code(codes::ROOT_NOT_FOUND);
        let quiet = Diagnostics::new();
        MarkingEngine::new(&graph, &LinkerConfig::default())
            .run(&[missing], &quiet, &policy)
            .unwrap();
        assert_eq!(quiet.warning_count(), 0);
    }

    #[test]
    fn test_summary_and_verbose_messages() {
        let mut builder = EntityGraphBuilder::new();
        let base = builder.add_type("Zoo", "Animal", TypeAttributes::PUBLIC);
        let speak = builder.add_method(
            base,
            "Speak",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT,
        );
        let dog = builder.add_type("Zoo", "Dog", TypeAttributes::PUBLIC);
        builder.set_base(dog, base).unwrap();
        let dog_ctor = builder.add_method(
            dog,
            ".ctor",
            MethodSignature::void(),
            MethodModifiers::SPECIAL_NAME,
        );
        let dog_speak = builder.add_method(
            dog,
            "Speak",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL,
        );
        let main_type = builder.add_type("Zoo", "Program", TypeAttributes::PUBLIC);
        let main = builder.add_method(
            main_type,
            "Main",
            MethodSignature::void(),
            MethodModifiers::STATIC,
        );
        builder
            .set_body(main, MethodBody::builder().newobj(dog_ctor).callvirt(speak).build())
            .unwrap();
        let graph = builder.build().unwrap();

        let config = LinkerConfig {
            verbose: true,
            ..LinkerConfig::default()
        };
        let diagnostics = Diagnostics::new();
        let result = MarkingEngine::new(&graph, &config)
            .run(&[main], &diagnostics, &NoSuppression)
            .unwrap();

        assert!(result.is_marked(dog_speak));
        assert_eq!(
            result.why(dog_speak),
            Some(MarkReason::VirtualOverride { ty: dog, slot: speak })
        );
        assert_eq!(diagnostics.count_of(MessageCategory::Diagnostic), 1);

        let summary = diagnostics.by_category(MessageCategory::Info);
        assert_eq!(summary.len(), 1);
        assert_eq!(
            summary[0].text(),
            format!("Marked {} of {} entities", result.marks().marked_count(), graph.len())
        );
        assert_eq!(result.stats().total_marked(), result.marks().marked_count());
        assert_eq!(result.stats().total_of(EntityKind::Type), 3);
    }

    #[test]
    fn test_reasons_can_be_disabled() {
        let DirectiveScopeFixture { graph, keep, .. } = directive_scope_fixture();
        let result = MarkingEngine::new(&graph, &LinkerConfig::minimal())
            .run(&[keep], &Diagnostics::new(), &NoSuppression)
            .unwrap();

        assert!(result.is_marked(keep));
        assert!(result.reasons().is_empty());
        assert_eq!(result.why(keep), None);
    }
}

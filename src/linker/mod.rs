//! Reachability marking and sweeping.
//!
//! This module is the core of the crate. Starting from a set of roots, the
//! [`MarkingEngine`] computes every entity the program needs, following direct
//! dependencies, preserve directives and the dispatch rules that make overrides and
//! interface implementations reachable once their types are constructed. [`Sweep`] then
//! deletes everything else.
//!
//! # Key Components
//!
//! - [`LinkerConfig`] - Keep rules and scheduling knobs
//! - [`DependencyDiscovery`] - Direct dependency sets, a pure function of graph shape
//! - [`PreserveDirectiveResolver`] - Name based directive lookup
//! - [`DispatchTable`] - Precomputed dispatch rule instances
//! - [`MarkingEngine`] - The worklist driven fixed point
//! - [`Sweep`] - Removal of unmarked entities with referential closure checking
//! - [`Linker`] - Mark and sweep in one call
//!
//! # Examples
//!
//! ```rust
//! use dottrim::prelude::*;
//!
//! let mut builder = EntityGraphBuilder::new();
//! let app = builder.add_type("App", "Program", TypeAttributes::PUBLIC);
//! let main = builder.add_method(app, "Main", MethodSignature::void(), MethodModifiers::STATIC);
//! let dead = builder.add_type("App", "Dead", TypeAttributes::PUBLIC);
//! let mut graph = builder.build()?;
//!
//! let diagnostics = Diagnostics::new();
//! let report = Linker::new(LinkerConfig::default()).run(&mut graph, &[main], &diagnostics, &NoSuppression)?;
//!
//! assert_eq!(report.sweep.removed_of(EntityKind::Type), &[dead]);
//! assert!(graph.contains(main));
//! # Ok::<(), dottrim::Error>(())
//! ```

mod config;
mod discovery;
mod dispatch;
mod engine;
mod reasons;
mod resolver;
mod state;
mod sweep;

pub use config::{LinkerConfig, WorklistOrder};
pub use discovery::{Dependencies, DependencyDiscovery};
pub use dispatch::{implementation_of, DispatchCandidate, DispatchRule, DispatchTable};
pub use engine::{MarkResult, MarkStats, MarkingEngine};
pub use reasons::{MarkReason, MarkReasons};
pub use resolver::{PreserveDirectiveResolver, ResolutionError};
pub use state::{MarkState, MarkStore};
pub use sweep::{Sweep, SweepReport};

use crate::{
    diagnostics::{DiagnosticsSink, SuppressionPolicy},
    metadata::{graph::EntityGraph, token::Token},
    Result,
};

/// Outcome of [`Linker::run`].
#[derive(Debug, Clone)]
pub struct LinkReport {
    /// Mark state, reasons and counters
    pub marking: MarkResult,
    /// What the sweep removed
    pub sweep: SweepReport,
}

/// Marks from a set of roots, then sweeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct Linker {
    config: LinkerConfig,
}

impl Linker {
    /// Creates a linker with the given configuration.
    #[must_use]
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Marks everything reachable from `roots` and removes the rest of `graph`.
    ///
    /// # Errors
    /// Returns [`crate::Error::DanglingReference`] if the sweep would leave a surviving
    /// entity pointing at a removed one; `graph` is unchanged in that case.
    pub fn run(
        &self,
        graph: &mut EntityGraph,
        roots: &[Token],
        sink: &dyn DiagnosticsSink,
        policy: &dyn SuppressionPolicy,
    ) -> Result<LinkReport> {
        let marking = MarkingEngine::new(graph, &self.config).run(roots, sink, policy)?;
        let sweep = Sweep::new(&self.config).run(graph, marking.marks())?;
        Ok(LinkReport { marking, sweep })
    }
}

//! Linker configuration
//!
//! This module provides the knobs of a marking and sweeping run. None of them changes
//! *which* entities end up marked for a fixed configuration of the keep rules; the
//! scheduling knobs (worklist order, parallel discovery, batch size) only change how fast
//! the fixed point is reached.

/// Order in which queued entities are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorklistOrder {
    /// Depth first: the most recently queued entity is expanded next
    Lifo,
    /// Breadth first: the oldest queued entity is expanded next
    Fifo,
}

/// Configuration for marking and sweeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct LinkerConfig {
    /// Worklist discipline
    pub worklist_order: WorklistOrder,

    /// Compute dependency sets of a whole batch in parallel with `rayon`
    /// Mark state is still updated by a single writer
    pub parallel_discovery: bool,

    /// Number of entities drained per batch when `parallel_discovery` is on
    pub batch_size: usize,

    /// Keep methods of instantiated types that override slots outside the graph
    /// (`ToString`, `Equals`, implementations of framework interfaces, ...)
    pub keep_external_overrides: bool,

    /// Treat a type's `.cctor` as a dependency of the type
    pub keep_type_initializers: bool,

    /// Record why each entity was marked
    pub record_reasons: bool,

    /// Emit a `Diagnostic` message for every dispatch rule firing
    pub verbose: bool,

    /// Check referential closure before sweeping commits
    pub verify_references: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            worklist_order: WorklistOrder::Lifo,
            parallel_discovery: false,
            batch_size: 64,
            keep_external_overrides: true,
            keep_type_initializers: true,
            record_reasons: true,
            verbose: false,
            verify_references: true,
        }
    }
}

impl LinkerConfig {
    /// Creates a single threaded configuration
    ///
    /// Identical to the default.
    #[must_use]
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Creates a configuration that computes dependency sets on the `rayon` pool
    #[must_use]
    pub fn parallel() -> Self {
        Self {
            parallel_discovery: true,
            batch_size: 256,
            ..Self::default()
        }
    }

    /// Creates a minimal configuration for maximum trimming
    ///
    /// Only entities reachable from code are kept: no type initializers, no overrides of
    /// external slots, no reason bookkeeping. Referential verification stays on.
    /// **Warning**: Types whose framework-visible overrides are dropped may behave
    /// differently at runtime.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            keep_external_overrides: false,
            keep_type_initializers: false,
            record_reasons: false,
            ..Self::default()
        }
    }

    /// Effective batch size, never zero.
    #[must_use]
    pub fn effective_batch_size(&self) -> usize {
        if self.parallel_discovery {
            self.batch_size.max(1)
        } else {
            1
        }
    }
}

//! # dottrim Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dottrim library. Import this module to get quick access to everything needed
//! to build an entity graph, mark it and sweep it.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dottrim operations
pub use crate::Error;

/// The result type used throughout dottrim
pub use crate::Result;

// ================================================================================================
// Entity Graph
// ================================================================================================

/// Graph construction and the frozen graph
pub use crate::metadata::{builder::EntityGraphBuilder, graph::EntityGraph};

/// Metadata tokens
pub use crate::metadata::token::{TableId, Token};

/// Row types, flags and body summaries
pub use crate::metadata::entities::{
    AttributeArgument, BodyReference, CallType, CustomAttribute, Entity, EntityKind, FieldDef,
    FieldModifiers, InterfaceImpl, MethodBody, MethodDef, MethodModifiers, TypeAttributes,
    TypeDef,
};

/// Method signatures
pub use crate::metadata::signature::MethodSignature;

/// Preserve directives
pub use crate::metadata::directive::{DirectiveScope, PreserveDirective};

// ================================================================================================
// Linker
// ================================================================================================

/// Configuration
pub use crate::linker::{LinkerConfig, WorklistOrder};

/// Marking
pub use crate::linker::{
    DispatchRule, MarkReason, MarkResult, MarkState, MarkStats, MarkStore, MarkingEngine,
    ResolutionError,
};

/// Sweeping
pub use crate::linker::{LinkReport, Linker, Sweep, SweepReport};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Messages and sinks
pub use crate::diagnostics::{
    Diagnostics, DiagnosticsSink, Message, MessageCategory, MessageOrigin, MessageSubCategory,
};

/// Suppression
pub use crate::diagnostics::{NoSuppression, SuppressionPolicy, SuppressionSet};

// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # dottrim
//!
//! Reachability driven trimming of .NET assemblies. Given the entity graph of an assembly
//! (types, methods, fields, interface implementations, custom attributes and preserve
//! directives) and a set of entry points, `dottrim` marks every entity the program needs
//! and sweeps the rest, leaving a graph that is referentially closed.
//!
//! ## Features
//!
//! - **Dispatch aware marking** - Overrides and interface implementations are kept only
//!   once their type is constructed and their slot is called
//! - **Preserve directives** - Name and signature based keep rules resolved through an
//!   index built when the graph is frozen
//! - **Order independent** - The same fixed point for every worklist order, batch size
//!   and thread count; dependency sets can be computed on the `rayon` pool
//! - **Safe sweeping** - Referential closure is verified before anything is removed
//! - **Structured diagnostics** - MSBuild style messages with explicit suppression
//!
//! ## Architecture
//!
//! - [`metadata`] - The entity graph, its builder and lookup indices
//! - [`linker`] - Dependency discovery, directive resolution, the marking engine and sweep
//! - [`diagnostics`] - Messages, suppression policies and sinks
//! - [`utils`] - Bitsets and DOT rendering
//!
//! Reading and writing assemblies is left to the caller: a reader builds the graph
//! through [`metadata::builder::EntityGraphBuilder`], a writer serializes what the sweep
//! left behind.
//!
//! ## Quick Start
//!
//! ```rust
//! use dottrim::prelude::*;
//!
//! let mut builder = EntityGraphBuilder::new();
//! let shape = builder.add_interface("Geo", "IShape");
//! let area = builder.add_method(
//!     shape,
//!     "Area",
//!     MethodSignature::new("System.Double", Vec::<String>::new()),
//!     MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT | MethodModifiers::NEW_SLOT,
//! );
//! let circle = builder.add_type("Geo", "Circle", TypeAttributes::PUBLIC);
//! let ctor = builder.add_method(circle, ".ctor", MethodSignature::void(), MethodModifiers::SPECIAL_NAME);
//! builder.add_method(
//!     circle,
//!     "Area",
//!     MethodSignature::new("System.Double", Vec::<String>::new()),
//!     MethodModifiers::VIRTUAL | MethodModifiers::FINAL | MethodModifiers::NEW_SLOT,
//! );
//! builder.add_interface_impl(circle, shape);
//! let program = builder.add_type("Geo", "Program", TypeAttributes::PUBLIC);
//! let main = builder.add_method(program, "Main", MethodSignature::void(), MethodModifiers::STATIC);
//! builder.set_body(main, MethodBody::builder().newobj(ctor).callvirt(area).build())?;
//! let mut graph = builder.build()?;
//!
//! let diagnostics = Diagnostics::new();
//! let report = Linker::new(LinkerConfig::default())
//!     .run(&mut graph, &[main], &diagnostics, &NoSuppression)?;
//!
//! // The interface call through IShape keeps the edge and Circle's implementation
//! assert!(report.sweep.is_empty());
//! assert_eq!(report.marking.stats().firings_of(DispatchRule::InterfaceDispatch), 1);
//! # Ok::<(), dottrim::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dottrim::prelude::*;
///
/// let mut builder = EntityGraphBuilder::new();
/// let ty = builder.add_type("App", "Program", TypeAttributes::PUBLIC);
/// let graph = builder.build()?;
/// assert_eq!(graph.kind_of(ty), Some(EntityKind::Type));
/// # Ok::<(), dottrim::Error>(())
/// ```
pub mod prelude;

/// Diagnostics raised while marking and sweeping.
///
/// Messages follow the MSBuild canonical format. Warnings are filtered through an explicit
/// [`diagnostics::SuppressionPolicy`] when they are constructed.
pub mod diagnostics;

/// Marking and sweeping.
///
/// # Key Types
///
/// - [`linker::MarkingEngine`] - Computes the reachable closure of a set of roots
/// - [`linker::Sweep`] - Removes everything that is not marked
/// - [`linker::Linker`] - Both in one call
pub mod linker;

/// The entity graph of an assembly.
///
/// Rows are immutable and `Arc` shared; the graph stores them in token ordered skip maps
/// and hands out dense indices for mark state.
pub mod metadata;

/// Small helpers shared across the crate.
pub mod utils;

/// `dottrim` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dottrim` Error type
///
/// The main error type for all operations in this crate. Directive resolution failures
/// are not errors; see [`linker::ResolutionError`].
pub use error::Error;

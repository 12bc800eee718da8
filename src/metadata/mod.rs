//! In-memory representation of the assembly being trimmed.
//!
//! The binary reader decodes an assembly into an [`graph::EntityGraph`]: types, methods,
//! fields, interface implementation edges, custom attribute usages and preserve
//! directives, each addressed by its metadata [`token::Token`]. The marking engine only
//! ever reads this structure; the sweep is the single writer.
//!
//! # Key Components
//!
//! - [`token`] - Metadata tokens and the table ids the graph understands
//! - [`entities`] - Immutable row types and the [`entities::Entity`] union
//! - [`directive`] - Name based preserve directives
//! - [`signature`] - Rendered method signatures used for member matching
//! - [`builder`] - Graph construction and shape validation
//! - [`graph`] - Lookups by token, member, interface and attribute
//! - [`index`] - Dense entity numbering and name indices
//!
//! # Examples
//!
//! ```rust
//! use dottrim::metadata::{
//!     builder::EntityGraphBuilder,
//!     directive::DirectiveScope,
//!     entities::{MethodModifiers, TypeAttributes},
//!     signature::MethodSignature,
//! };
//!
//! let mut builder = EntityGraphBuilder::new();
//! let ty = builder.add_type("MyApp", "Widget", TypeAttributes::PUBLIC);
//! let keep = builder.add_method(ty, "Keep", MethodSignature::void(), MethodModifiers::STATIC);
//! builder.add_method(ty, "Foo", MethodSignature::void(), MethodModifiers::HIDE_BY_SIG);
//! builder.add_directive(keep, "Foo", DirectiveScope::DeclaringType, None);
//!
//! let graph = builder.build()?;
//! assert_eq!(graph.directives_of(keep).len(), 1);
//! # Ok::<(), dottrim::Error>(())
//! ```

/// Graph construction and validation
pub mod builder;
/// Preserve directives
pub mod directive;
/// Row types of the entity graph
pub mod entities;
/// The frozen entity graph
pub mod graph;
/// Dense numbering and name lookups
pub mod index;
/// Rendered method signatures
pub mod signature;
/// Commonly used metadata token type
pub mod token;

//! Row types of the entity graph.
//!
//! Every row is an immutable value shared through an `Arc`; the graph stores rows in
//! token-ordered skip maps, one per table. [`Entity`] is the closed union handed out by
//! token lookups.

mod customattribute;
mod field;
mod interfaceimpl;
mod methoddef;
mod typedef;

pub use customattribute::*;
pub use field::*;
pub use interfaceimpl::*;
pub use methoddef::*;
pub use typedef::*;

use strum::{Display, EnumCount, EnumIter};

use crate::metadata::{directive::PreserveDirectiveRc, token::Token};

/// The kind of an entity, one per graph table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumCount)]
pub enum EntityKind {
    /// A type definition
    Type,
    /// A method definition
    Method,
    /// A field definition
    Field,
    /// An interface implementation edge
    InterfaceImpl,
    /// A custom attribute usage
    CustomAttribute,
    /// A preserve directive
    PreserveDirective,
}

/// A shared reference to any row of the graph.
#[derive(Debug, Clone)]
pub enum Entity {
    /// A type definition
    Type(TypeDefRc),
    /// A method definition
    Method(MethodDefRc),
    /// A field definition
    Field(FieldDefRc),
    /// An interface implementation edge
    InterfaceImpl(InterfaceImplRc),
    /// A custom attribute usage
    CustomAttribute(CustomAttributeRc),
    /// A preserve directive
    PreserveDirective(PreserveDirectiveRc),
}

impl Entity {
    /// Token of the row.
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            Entity::Type(row) => row.token,
            Entity::Method(row) => row.token,
            Entity::Field(row) => row.token,
            Entity::InterfaceImpl(row) => row.token,
            Entity::CustomAttribute(row) => row.token,
            Entity::PreserveDirective(row) => row.token,
        }
    }

    /// Kind of the row.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Type(_) => EntityKind::Type,
            Entity::Method(_) => EntityKind::Method,
            Entity::Field(_) => EntityKind::Field,
            Entity::InterfaceImpl(_) => EntityKind::InterfaceImpl,
            Entity::CustomAttribute(_) => EntityKind::CustomAttribute,
            Entity::PreserveDirective(_) => EntityKind::PreserveDirective,
        }
    }

    /// A short human readable name, used for diagnostics origins and DOT labels.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Entity::Type(row) => row.full_name(),
            Entity::Method(row) => format!("{}{}", row.name, row.signature.parameter_list()),
            Entity::Field(row) => row.name.clone(),
            Entity::InterfaceImpl(row) => format!("{} : {}", row.class, row.interface),
            Entity::CustomAttribute(row) => format!("[{}]", row.constructor),
            Entity::PreserveDirective(row) => format!("preserve {}", row.target()),
        }
    }

    /// Every token this row references that must survive alongside it.
    ///
    /// Lists of owned rows (members, edges, attributes, directives) are excluded; a sweep
    /// prunes them instead.
    pub(crate) fn references(&self) -> Vec<Token> {
        match self {
            Entity::Type(row) => row.references().collect(),
            Entity::Method(row) => row.references().collect(),
            Entity::Field(row) => row.references().collect(),
            Entity::InterfaceImpl(row) => row.references().collect(),
            Entity::CustomAttribute(row) => row.references().collect(),
            Entity::PreserveDirective(row) => row.references().collect(),
        }
    }
}

//! Type definitions of the entity graph.

use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

use crate::metadata::token::Token;

/// A map that holds the mapping of Token to `TypeDef`
pub type TypeDefMap = SkipMap<Token, TypeDefRc>;
/// A reference to a `TypeDef`
pub type TypeDefRc = Arc<TypeDef>;

#[allow(non_snake_case)]
/// Type attribute flag constants for `TypeDef` entries.
///
/// Only the subset the marking core consults is listed; the reader passes the raw
/// ECMA-335 flags through unchanged, so other bits survive a trim untouched.
pub mod TypeAttributes {
    /// Type has public scope (visible outside assembly).
    pub const PUBLIC: u32 = 0x0000_0001;

    /// Type is an interface definition.
    ///
    /// Interfaces never become instantiated; their methods are dispatch slots.
    pub const INTERFACE: u32 = 0x0000_0020;

    /// Class is abstract and cannot be instantiated directly.
    pub const ABSTRACT: u32 = 0x0000_0080;

    /// Class is sealed and cannot be inherited from.
    pub const SEALED: u32 = 0x0000_0100;
}

/// A type declared by the assembly being trimmed.
///
/// Member lists hold tokens only; the rows themselves live in the graph's per-table
/// maps. `base` is a weak reference: it may point at another `TypeDef` or at an external
/// `TypeRef` such as `System.Object`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Token
    pub token: Token,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Raw `TypeAttributes` flags
    pub flags: u32,
    /// Derives from `System.ValueType` or `System.Enum`
    pub value_type: bool,
    /// Base type, if any
    pub base: Option<Token>,
    /// `InterfaceImpl` edges declared by this type
    pub interfaces: Vec<Token>,
    /// Declared methods
    pub methods: Vec<Token>,
    /// Declared fields
    pub fields: Vec<Token>,
    /// Custom attributes applied to the type
    pub custom_attributes: Vec<Token>,
    /// Preserve directives attached to the type
    pub directives: Vec<Token>,
}

impl TypeDef {
    /// Returns `Namespace.Name`, or just `Name` for the global namespace.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` if the type is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags & TypeAttributes::INTERFACE != 0
    }

    /// Returns `true` if the type is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags & TypeAttributes::ABSTRACT != 0
    }

    /// Returns `true` if the type is sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.flags & TypeAttributes::SEALED != 0
    }

    /// Returns `true` for structs and enums.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.value_type
    }

    /// Returns `true` if instances of this type can exist at runtime.
    ///
    /// Interfaces and abstract classes are never the runtime type of an object.
    #[must_use]
    pub fn is_instantiable(&self) -> bool {
        !self.is_interface() && !self.is_abstract()
    }

    /// Tokens this row references outside of the member lists it owns.
    pub(crate) fn references(&self) -> impl Iterator<Item = Token> + '_ {
        self.base.iter().copied()
    }
}

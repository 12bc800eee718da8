use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

use crate::metadata::token::Token;

/// A map that holds the mapping of Token to `InterfaceImpl`
pub type InterfaceImplMap = SkipMap<Token, InterfaceImplRc>;
/// A reference to a `InterfaceImpl`
pub type InterfaceImplRc = Arc<InterfaceImpl>;

/// The edge recording that `class` implements `interface`.
///
/// The edge is an entity of its own: it can be swept while both endpoints survive, which
/// is exactly what happens when no instantiated type is ever dispatched through the
/// interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceImpl {
    /// Token
    pub token: Token,
    /// The implementing `TypeDef`
    pub class: Token,
    /// The implemented interface, a `TypeDef` of the graph or an external `TypeRef`
    pub interface: Token,
    /// Custom attributes applied to this interface implementation
    pub custom_attributes: Vec<Token>,
}

impl InterfaceImpl {
    pub(crate) fn references(&self) -> impl Iterator<Item = Token> + '_ {
        [self.class, self.interface].into_iter()
    }
}

use bitflags::bitflags;
use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

use crate::metadata::token::Token;

/// A map that holds the mapping of Token to `FieldDef`
pub type FieldDefMap = SkipMap<Token, FieldDefRc>;
/// A reference to a `FieldDef`
pub type FieldDefRc = Arc<FieldDef>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field attribute modifiers (ECMA-335 §II.23.1.5)
    pub struct FieldModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
    }
}

/// A field declared by a type of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Declaring `TypeDef`
    pub declaring_type: Token,
    /// Declared type when it is a class of this graph or a `TypeRef`; `None` for primitives
    pub field_type: Option<Token>,
    /// Rendered declared type, used for signature matching
    pub type_name: String,
    /// Attribute modifiers
    pub flags: FieldModifiers,
    /// Custom attributes applied to the field
    pub custom_attributes: Vec<Token>,
}

impl FieldDef {
    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldModifiers::STATIC)
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = Token> + '_ {
        std::iter::once(self.declaring_type).chain(self.field_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_references() {
        let field = FieldDef {
            token: Token::new(0x04000001),
            name: "_count".to_string(),
            declaring_type: Token::new(0x02000002),
            field_type: None,
            type_name: "System.Int32".to_string(),
            flags: FieldModifiers::STATIC | FieldModifiers::INIT_ONLY,
            custom_attributes: Vec::new(),
        };

        assert!(field.is_static());
        assert_eq!(
            field.references().collect::<Vec<_>>(),
            vec![Token::new(0x02000002)]
        );
    }
}

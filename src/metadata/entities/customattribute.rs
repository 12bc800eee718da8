use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

use crate::metadata::token::Token;

/// A map that holds the mapping of Token to `CustomAttribute`
pub type CustomAttributeMap = SkipMap<Token, CustomAttributeRc>;
/// A reference to a `CustomAttribute`
pub type CustomAttributeRc = Arc<CustomAttribute>;

/// A decoded fixed argument of a custom attribute constructor call.
///
/// Only `typeof(...)` arguments reference other entities; the remaining variants are
/// carried so the row stays a faithful value of the blob it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeArgument {
    /// A `System.Type` argument
    Type(Token),
    /// A string argument
    String(String),
    /// Any integral or enum argument
    Integer(i64),
    /// A boolean argument
    Boolean(bool),
}

/// One application of a custom attribute to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttribute {
    /// Token
    pub token: Token,
    /// The entity the attribute is applied to
    pub owner: Token,
    /// The attribute constructor, a `MethodDef` or external `MemberRef`
    pub constructor: Token,
    /// Decoded fixed arguments
    pub arguments: Vec<AttributeArgument>,
}

impl CustomAttribute {
    /// Types referenced through `typeof` arguments.
    pub fn type_arguments(&self) -> impl Iterator<Item = Token> + '_ {
        self.arguments.iter().filter_map(|argument| match argument {
            AttributeArgument::Type(token) => Some(*token),
            _ => None,
        })
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = Token> + '_ {
        [self.owner, self.constructor]
            .into_iter()
            .chain(self.type_arguments())
    }
}

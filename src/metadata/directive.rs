//! Preserve directives.
//!
//! A preserve directive is decoded from an attribute such as
//! `[PreserveDependency("Foo(System.Int32)", "MyApp.Widget")]` and keeps one named member
//! alive whenever its owner is kept. Directives are entities of their own, living in the
//! linker-private [`TableId::PreserveDirective`](crate::metadata::token::TableId) token space.

use crossbeam_skiplist::SkipMap;
use std::{fmt, sync::Arc};

use crate::metadata::token::Token;

/// A map that holds the mapping of Token to `PreserveDirective`
pub type PreserveDirectiveMap = SkipMap<Token, PreserveDirectiveRc>;
/// A reference to a `PreserveDirective`
pub type PreserveDirectiveRc = Arc<PreserveDirective>;

/// The type whose members a directive's target is looked up in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirectiveScope {
    /// The type declaring the owner, or the owner itself if it is a type
    DeclaringType,
    /// An explicit type of the graph
    Type(Token),
    /// A type named by its full name, resolved through the member index
    TypeName(String),
}

impl fmt::Display for DirectiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveScope::DeclaringType => write!(f, "<declaring type>"),
            DirectiveScope::Type(token) => write!(f, "{token}"),
            DirectiveScope::TypeName(name) => write!(f, "{name}"),
        }
    }
}

/// A name-based instruction to keep a member whenever the owner is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreserveDirective {
    /// Token
    pub token: Token,
    /// The `MethodDef` or `TypeDef` carrying the directive
    pub owner: Token,
    /// Member name to preserve
    pub target_name: String,
    /// Optional parameter list (methods) or field type (fields)
    pub signature: Option<String>,
    /// Where to look the member up
    pub scope: DirectiveScope,
    /// The custom attribute the directive was decoded from, if any
    pub attribute: Option<Token>,
}

impl PreserveDirective {
    /// Splits a combined member reference into its name and optional parameter list.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dottrim::metadata::directive::PreserveDirective;
    ///
    /// assert_eq!(PreserveDirective::parse_target("Foo"), ("Foo".to_string(), None));
    /// assert_eq!(
    ///     PreserveDirective::parse_target("Foo(System.Int32, System.String)"),
    ///     ("Foo".to_string(), Some("(System.Int32, System.String)".to_string()))
    /// );
    /// ```
    #[must_use]
    pub fn parse_target(text: &str) -> (String, Option<String>) {
        let text = text.trim();
        match text.find('(') {
            Some(open) => (
                text[..open].trim().to_string(),
                Some(text[open..].to_string()),
            ),
            None => (text.to_string(), None),
        }
    }

    /// Human readable target, `Name` or `Name(params)`.
    #[must_use]
    pub fn target(&self) -> String {
        match &self.signature {
            Some(signature) => format!("{}{}", self.target_name, signature),
            None => self.target_name.clone(),
        }
    }

    pub(crate) fn references(&self) -> impl Iterator<Item = Token> + '_ {
        let scope = match self.scope {
            DirectiveScope::Type(token) => Some(token),
            _ => None,
        };
        std::iter::once(self.owner).chain(scope).chain(self.attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_trims() {
        assert_eq!(
            PreserveDirective::parse_target("  Bar()  "),
            ("Bar".to_string(), Some("()".to_string()))
        );
        assert_eq!(
            PreserveDirective::parse_target("_field"),
            ("_field".to_string(), None)
        );
    }

    #[test]
    fn test_target_rendering() {
        let directive = PreserveDirective {
            token: Token::new(0x70000001),
            owner: Token::new(0x06000001),
            target_name: "Foo".to_string(),
            signature: Some("(System.Int32)".to_string()),
            scope: DirectiveScope::TypeName("MyApp.Widget".to_string()),
            attribute: None,
        };
        assert_eq!(directive.target(), "Foo(System.Int32)");
        assert_eq!(directive.scope.to_string(), "MyApp.Widget");
        assert_eq!(
            directive.references().collect::<Vec<_>>(),
            vec![Token::new(0x06000001)]
        );
    }
}

//! Method definitions and the body summaries the marking core consumes.
//!
//! The binary reader decodes each IL body once and reduces it to the list of
//! [`BodyReference`]s the body contains: call targets (with the opcode that reached
//! them), field accesses, and type tokens (`ldtoken`, `castclass`, `box`, ...). Nothing
//! else about the instruction stream matters for reachability.

use bitflags::bitflags;
use crossbeam_skiplist::SkipMap;
use std::sync::Arc;

use crate::metadata::{signature::MethodSignature, token::Token};

/// A map that holds the mapping of Token to `MethodDef`
pub type MethodDefMap = SkipMap<Token, MethodDefRc>;
/// A reference to a `MethodDef`
pub type MethodDefRc = Arc<MethodDef>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method attribute modifiers (ECMA-335 §II.23.1.10)
    pub struct MethodModifiers: u32 {
        /// Reserved: shall be zero for conforming implementations
        const UNMANAGED_EXPORT = 0x0008;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method can only be overriden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, dpending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

/// Name of instance constructors.
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Name of type initializers.
pub const TYPE_INITIALIZER_NAME: &str = ".cctor";

/// Opcode through which a body reaches a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Direct call instruction (`call`).
    Call,
    /// Virtual call instruction (`callvirt`).
    CallVirt,
    /// Object construction (`newobj`).
    NewObj,
    /// Load function pointer (`ldftn`).
    Ldftn,
    /// Load virtual function pointer (`ldvirtftn`).
    LdVirtFtn,
}

impl CallType {
    /// Returns `true` if this is a virtual call that requires runtime dispatch.
    ///
    /// Virtual calls use the actual runtime type of the receiver object to
    /// determine the method implementation to invoke.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        matches!(self, Self::CallVirt | Self::LdVirtFtn)
    }

    /// Returns `true` if this call creates a new object.
    #[must_use]
    pub const fn is_constructor(&self) -> bool {
        matches!(self, Self::NewObj)
    }
}

/// A single reference found in a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyReference {
    /// A call-like instruction and its method operand
    Call {
        /// Opcode used
        kind: CallType,
        /// `MethodDef` or `MemberRef` operand
        target: Token,
    },
    /// A field load, store or address-of
    Field(Token),
    /// Any instruction with a type operand
    TypeToken(Token),
}

impl BodyReference {
    /// The operand token.
    #[must_use]
    pub const fn token(&self) -> Token {
        match self {
            BodyReference::Call { target, .. } => *target,
            BodyReference::Field(token) | BodyReference::TypeToken(token) => *token,
        }
    }
}

/// The reachability-relevant summary of an IL body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBody {
    /// References in instruction order
    pub references: Vec<BodyReference>,
}

impl MethodBody {
    /// Starts a fluent body builder.
    #[must_use]
    pub fn builder() -> MethodBodyBuilder {
        MethodBodyBuilder::default()
    }

    /// Returns all call sites of the body.
    pub fn call_sites(&self) -> impl Iterator<Item = (CallType, Token)> + '_ {
        self.references.iter().filter_map(|reference| match reference {
            BodyReference::Call { kind, target } => Some((*kind, *target)),
            _ => None,
        })
    }
}

/// Fluent construction of [`MethodBody`] summaries.
///
/// # Examples
///
/// ```rust
/// use dottrim::metadata::entities::{BodyReference, CallType, MethodBody};
/// use dottrim::metadata::token::Token;
///
/// let body = MethodBody::builder()
///     .newobj(Token::new(0x06000002))
///     .callvirt(Token::new(0x06000005))
///     .field(Token::new(0x04000001))
///     .build();
///
/// assert_eq!(body.references.len(), 3);
/// assert_eq!(
///     body.references[1],
///     BodyReference::Call { kind: CallType::CallVirt, target: Token::new(0x06000005) }
/// );
/// ```
#[derive(Debug, Default)]
pub struct MethodBodyBuilder {
    references: Vec<BodyReference>,
}

impl MethodBodyBuilder {
    /// Adds a `call` to the target.
    #[must_use]
    pub fn call(self, target: Token) -> Self {
        self.reference(BodyReference::Call {
            kind: CallType::Call,
            target,
        })
    }

    /// Adds a `callvirt` to the target.
    #[must_use]
    pub fn callvirt(self, target: Token) -> Self {
        self.reference(BodyReference::Call {
            kind: CallType::CallVirt,
            target,
        })
    }

    /// Adds a `newobj` of the constructor.
    #[must_use]
    pub fn newobj(self, constructor: Token) -> Self {
        self.reference(BodyReference::Call {
            kind: CallType::NewObj,
            target: constructor,
        })
    }

    /// Adds an `ldftn` of the target.
    #[must_use]
    pub fn ldftn(self, target: Token) -> Self {
        self.reference(BodyReference::Call {
            kind: CallType::Ldftn,
            target,
        })
    }

    /// Adds an `ldvirtftn` of the target.
    #[must_use]
    pub fn ldvirtftn(self, target: Token) -> Self {
        self.reference(BodyReference::Call {
            kind: CallType::LdVirtFtn,
            target,
        })
    }

    /// Adds a field access.
    #[must_use]
    pub fn field(self, field: Token) -> Self {
        self.reference(BodyReference::Field(field))
    }

    /// Adds a type token reference.
    #[must_use]
    pub fn type_token(self, ty: Token) -> Self {
        self.reference(BodyReference::TypeToken(ty))
    }

    /// Adds an arbitrary reference.
    #[must_use]
    pub fn reference(mut self, reference: BodyReference) -> Self {
        self.references.push(reference);
        self
    }

    /// Finishes the body.
    #[must_use]
    pub fn build(self) -> MethodBody {
        MethodBody {
            references: self.references,
        }
    }
}

/// A method declared by a type of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Token
    pub token: Token,
    /// Method name
    pub name: String,
    /// Declaring `TypeDef`
    pub declaring_type: Token,
    /// Signature
    pub signature: MethodSignature,
    /// Attribute modifiers
    pub flags: MethodModifiers,
    /// Explicitly overridden slot (`MethodImpl`), a `MethodDef` or external `MemberRef`
    pub overrides: Option<Token>,
    /// Body summary, `None` for abstract, runtime or P/Invoke methods
    pub body: Option<MethodBody>,
    /// Custom attributes applied to the method
    pub custom_attributes: Vec<Token>,
    /// Custom attributes applied to the method's parameters and return value
    pub param_attributes: Vec<Token>,
    /// Preserve directives attached to the method
    pub directives: Vec<Token>,
}

impl MethodDef {
    /// Returns `true` if the method occupies a virtual slot.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodModifiers::VIRTUAL)
    }

    /// Returns `true` if the method is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodModifiers::STATIC)
    }

    /// Returns `true` if the method has no implementation.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns `true` if the method always introduces a new vtable slot.
    #[must_use]
    pub fn is_new_slot(&self) -> bool {
        self.flags.contains(MethodModifiers::NEW_SLOT)
    }

    /// Returns `true` for instance constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME && !self.is_static()
    }

    /// Returns `true` for type initializers.
    #[must_use]
    pub fn is_type_initializer(&self) -> bool {
        self.name == TYPE_INITIALIZER_NAME && self.is_static()
    }

    /// Tokens this row references outside of the attribute and directive lists it owns.
    pub(crate) fn references(&self) -> impl Iterator<Item = Token> + '_ {
        std::iter::once(self.declaring_type)
            .chain(self.overrides)
            .chain(
                self.body
                    .iter()
                    .flat_map(|body| body.references.iter().map(BodyReference::token)),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, flags: MethodModifiers) -> MethodDef {
        MethodDef {
            token: Token::new(0x06000001),
            name: name.to_string(),
            declaring_type: Token::new(0x02000002),
            signature: MethodSignature::void(),
            flags,
            overrides: None,
            body: None,
            custom_attributes: Vec::new(),
            param_attributes: Vec::new(),
            directives: Vec::new(),
        }
    }

    #[test]
    fn test_call_type_predicates() {
        assert!(CallType::CallVirt.is_virtual());
        assert!(CallType::LdVirtFtn.is_virtual());
        assert!(!CallType::Call.is_virtual());
        assert!(!CallType::Ldftn.is_virtual());
        assert!(CallType::NewObj.is_constructor());
        assert!(!CallType::Call.is_constructor());
    }

    #[test]
    fn test_method_predicates() {
        let ctor = method(".ctor", MethodModifiers::SPECIAL_NAME);
        assert!(ctor.is_constructor());
        assert!(!ctor.is_type_initializer());

        let cctor = method(".cctor", MethodModifiers::STATIC);
        assert!(cctor.is_type_initializer());
        assert!(!cctor.is_constructor());

        let slot = method(
            "Foo",
            MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT | MethodModifiers::ABSTRACT,
        );
        assert!(slot.is_virtual());
        assert!(slot.is_new_slot());
        assert!(slot.is_abstract());
        assert!(!slot.is_static());
    }

    #[test]
    fn test_body_call_sites() {
        let body = MethodBody::builder()
            .call(Token::new(0x06000002))
            .field(Token::new(0x04000001))
            .ldvirtftn(Token::new(0x06000003))
            .type_token(Token::new(0x02000004))
            .build();

        let sites: Vec<_> = body.call_sites().collect();
        assert_eq!(
            sites,
            vec![
                (CallType::Call, Token::new(0x06000002)),
                (CallType::LdVirtFtn, Token::new(0x06000003)),
            ]
        );
    }

    #[test]
    fn test_references_include_body_and_override() {
        let mut m = method("Foo", MethodModifiers::VIRTUAL);
        m.overrides = Some(Token::new(0x0A000001));
        m.body = Some(
            MethodBody::builder()
                .call(Token::new(0x06000009))
                .type_token(Token::new(0x02000003))
                .build(),
        );

        let refs: Vec<_> = m.references().collect();
        assert_eq!(
            refs,
            vec![
                Token::new(0x02000002),
                Token::new(0x0A000001),
                Token::new(0x06000009),
                Token::new(0x02000003),
            ]
        );
    }
}

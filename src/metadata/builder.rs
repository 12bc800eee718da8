//! Construction and validation of [`EntityGraph`]s.
//!
//! The binary reader (and every test) builds graphs through [`EntityGraphBuilder`]. Rows
//! may be added through the `add_*` helpers, which allocate tokens, or inserted whole
//! through the `insert_*` methods, which keep the tokens read from the assembly. Owner
//! lists (members, edges, attributes, directives) are wired from the children's
//! back-references when the graph is built, so a reader never has to keep both sides in
//! sync by hand.

use rustc_hash::{FxHashMap, FxHashSet};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    metadata::{
        directive::{DirectiveScope, PreserveDirective, PreserveDirectiveMap},
        entities::{
            AttributeArgument, BodyReference, CustomAttribute, CustomAttributeMap, FieldDef,
            FieldDefMap, FieldModifiers, InterfaceImpl, InterfaceImplMap, MethodBody, MethodDef,
            MethodDefMap, MethodModifiers, TypeAttributes, TypeDef, TypeDefMap,
        },
        graph::EntityGraph,
        signature::MethodSignature,
        token::{TableId, Token},
    },
    Error, Result,
};

/// Mutable staging area for an [`EntityGraph`].
#[derive(Debug, Default)]
pub struct EntityGraphBuilder {
    types: BTreeMap<Token, TypeDef>,
    methods: BTreeMap<Token, MethodDef>,
    fields: BTreeMap<Token, FieldDef>,
    interface_impls: BTreeMap<Token, InterfaceImpl>,
    custom_attributes: BTreeMap<Token, CustomAttribute>,
    directives: BTreeMap<Token, PreserveDirective>,
    param_attributes: FxHashSet<Token>,
    next_row: FxHashMap<TableId, u32>,
}

impl EntityGraphBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, table: TableId) -> Token {
        let row = self.next_row.entry(table).or_insert(1);
        let token = Token::from_parts(table, *row);
        *row += 1;
        token
    }

    fn claim(&mut self, token: Token, expected: TableId) -> Result<()> {
        if token.table_id() != Some(expected) {
            return Err(Error::WrongEntityKind { token, expected });
        }
        let taken = match expected {
            TableId::TypeDef => self.types.contains_key(&token),
            TableId::MethodDef => self.methods.contains_key(&token),
            TableId::Field => self.fields.contains_key(&token),
            TableId::InterfaceImpl => self.interface_impls.contains_key(&token),
            TableId::CustomAttribute => self.custom_attributes.contains_key(&token),
            TableId::PreserveDirective => self.directives.contains_key(&token),
            TableId::TypeRef | TableId::MemberRef => {
                return Err(malformed_error!(
                    "Token {} names a reference table, not an entity",
                    token
                ))
            }
        };
        if taken || token.row() == 0 {
            return Err(Error::DuplicateToken(token));
        }

        let next = self.next_row.entry(expected).or_insert(1);
        *next = (*next).max(token.row() + 1);
        Ok(())
    }

    /// Adds a type with no base and no members.
    pub fn add_type(&mut self, namespace: &str, name: &str, flags: u32) -> Token {
        let token = self.allocate(TableId::TypeDef);
        self.types.insert(
            token,
            TypeDef {
                token,
                namespace: namespace.to_string(),
                name: name.to_string(),
                flags,
                value_type: false,
                base: None,
                interfaces: Vec::new(),
                methods: Vec::new(),
                fields: Vec::new(),
                custom_attributes: Vec::new(),
                directives: Vec::new(),
            },
        );
        token
    }

    /// Adds a public interface type.
    pub fn add_interface(&mut self, namespace: &str, name: &str) -> Token {
        self.add_type(
            namespace,
            name,
            TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
        )
    }

    /// Adds a value type. Its base (`System.ValueType` or `System.Enum`) is set separately.
    pub fn add_value_type(&mut self, namespace: &str, name: &str, flags: u32) -> Token {
        let token = self.add_type(namespace, name, flags | TypeAttributes::SEALED);
        if let Some(row) = self.types.get_mut(&token) {
            row.value_type = true;
        }
        token
    }

    /// Sets the base type of a type.
    ///
    /// # Errors
    /// Returns [`Error::EntityNotFound`] if `ty` has not been added.
    pub fn set_base(&mut self, ty: Token, base: Token) -> Result<()> {
        let row = self.types.get_mut(&ty).ok_or(Error::EntityNotFound(ty))?;
        row.base = Some(base);
        Ok(())
    }

    /// Adds a method to a type.
    pub fn add_method(
        &mut self,
        declaring_type: Token,
        name: &str,
        signature: MethodSignature,
        flags: MethodModifiers,
    ) -> Token {
        let token = self.allocate(TableId::MethodDef);
        self.methods.insert(
            token,
            MethodDef {
                token,
                name: name.to_string(),
                declaring_type,
                signature,
                flags,
                overrides: None,
                body: None,
                custom_attributes: Vec::new(),
                param_attributes: Vec::new(),
                directives: Vec::new(),
            },
        );
        token
    }

    /// Attaches a body summary to a method.
    ///
    /// # Errors
    /// Returns [`Error::EntityNotFound`] if `method` has not been added.
    pub fn set_body(&mut self, method: Token, body: MethodBody) -> Result<()> {
        let row = self
            .methods
            .get_mut(&method)
            .ok_or(Error::EntityNotFound(method))?;
        row.body = Some(body);
        Ok(())
    }

    /// Records an explicit override (`MethodImpl`) of `slot` by `method`.
    ///
    /// # Errors
    /// Returns [`Error::EntityNotFound`] if `method` has not been added.
    pub fn set_overrides(&mut self, method: Token, slot: Token) -> Result<()> {
        let row = self
            .methods
            .get_mut(&method)
            .ok_or(Error::EntityNotFound(method))?;
        row.overrides = Some(slot);
        Ok(())
    }

    /// Adds a field to a type.
    ///
    /// `field_type` is the declared type when it is a type of this graph or a `TypeRef`;
    /// `type_name` is its rendered name, used to match field directives.
    pub fn add_field(
        &mut self,
        declaring_type: Token,
        name: &str,
        type_name: &str,
        field_type: Option<Token>,
        flags: FieldModifiers,
    ) -> Token {
        let token = self.allocate(TableId::Field);
        self.fields.insert(
            token,
            FieldDef {
                token,
                name: name.to_string(),
                declaring_type,
                field_type,
                type_name: type_name.to_string(),
                flags,
                custom_attributes: Vec::new(),
            },
        );
        token
    }

    /// Records that `class` implements `interface`.
    pub fn add_interface_impl(&mut self, class: Token, interface: Token) -> Token {
        let token = self.allocate(TableId::InterfaceImpl);
        self.interface_impls.insert(
            token,
            InterfaceImpl {
                token,
                class,
                interface,
                custom_attributes: Vec::new(),
            },
        );
        token
    }

    /// Applies a custom attribute to an entity.
    pub fn add_custom_attribute(
        &mut self,
        owner: Token,
        constructor: Token,
        arguments: Vec<AttributeArgument>,
    ) -> Token {
        let token = self.allocate(TableId::CustomAttribute);
        self.custom_attributes.insert(
            token,
            CustomAttribute {
                token,
                owner,
                constructor,
                arguments,
            },
        );
        token
    }

    /// Applies a custom attribute to a parameter (or the return value) of a method.
    pub fn add_parameter_attribute(
        &mut self,
        method: Token,
        constructor: Token,
        arguments: Vec<AttributeArgument>,
    ) -> Token {
        let token = self.add_custom_attribute(method, constructor, arguments);
        self.param_attributes.insert(token);
        token
    }

    /// Attaches a preserve directive to a type or method.
    ///
    /// `target` is a member name with an optional parameter list, e.g. `"Foo"` or
    /// `"Foo(System.Int32)"`. `attribute` is the custom attribute the directive was decoded
    /// from, when there is one.
    pub fn add_directive(
        &mut self,
        owner: Token,
        target: &str,
        scope: DirectiveScope,
        attribute: Option<Token>,
    ) -> Token {
        let (target_name, signature) = PreserveDirective::parse_target(target);
        let token = self.allocate(TableId::PreserveDirective);
        self.directives.insert(
            token,
            PreserveDirective {
                token,
                owner,
                target_name,
                signature,
                scope,
                attribute,
            },
        );
        token
    }

    /// Inserts a fully formed type row under its own token.
    ///
    /// # Errors
    /// Returns [`Error::WrongEntityKind`] or [`Error::DuplicateToken`] if the token is unusable.
    pub fn insert_type(&mut self, row: TypeDef) -> Result<Token> {
        self.claim(row.token, TableId::TypeDef)?;
        let token = row.token;
        self.types.insert(token, row);
        Ok(token)
    }

    /// Inserts a fully formed method row under its own token.
    ///
    /// # Errors
    /// Returns [`Error::WrongEntityKind`] or [`Error::DuplicateToken`] if the token is unusable.
    pub fn insert_method(&mut self, row: MethodDef) -> Result<Token> {
        self.claim(row.token, TableId::MethodDef)?;
        let token = row.token;
        self.methods.insert(token, row);
        Ok(token)
    }

    /// Inserts a fully formed field row under its own token.
    ///
    /// # Errors
    /// Returns [`Error::WrongEntityKind`] or [`Error::DuplicateToken`] if the token is unusable.
    pub fn insert_field(&mut self, row: FieldDef) -> Result<Token> {
        self.claim(row.token, TableId::Field)?;
        let token = row.token;
        self.fields.insert(token, row);
        Ok(token)
    }

    /// Inserts a fully formed interface implementation row under its own token.
    ///
    /// # Errors
    /// Returns [`Error::WrongEntityKind`] or [`Error::DuplicateToken`] if the token is unusable.
    pub fn insert_interface_impl(&mut self, row: InterfaceImpl) -> Result<Token> {
        self.claim(row.token, TableId::InterfaceImpl)?;
        let token = row.token;
        self.interface_impls.insert(token, row);
        Ok(token)
    }

    /// Inserts a fully formed custom attribute row under its own token.
    ///
    /// # Errors
    /// Returns [`Error::WrongEntityKind`] or [`Error::DuplicateToken`] if the token is unusable.
    pub fn insert_custom_attribute(&mut self, row: CustomAttribute) -> Result<Token> {
        self.claim(row.token, TableId::CustomAttribute)?;
        let token = row.token;
        self.custom_attributes.insert(token, row);
        Ok(token)
    }

    /// Inserts a fully formed directive row under its own token.
    ///
    /// # Errors
    /// Returns [`Error::WrongEntityKind`] or [`Error::DuplicateToken`] if the token is unusable.
    pub fn insert_directive(&mut self, row: PreserveDirective) -> Result<Token> {
        self.claim(row.token, TableId::PreserveDirective)?;
        let token = row.token;
        self.directives.insert(token, row);
        Ok(token)
    }

    /// Validates the staged rows and freezes them into an [`EntityGraph`].
    ///
    /// # Errors
    /// - [`Error::EntityNotFound`] if a reference into a graph table names no row
    /// - [`Error::WrongEntityKind`] if a reference names a row of the wrong table
    /// - [`Error::Malformed`] if owner lists contradict back-references, an inheritance
    ///   chain is cyclic, or an interface edge names a class
    pub fn build(mut self) -> Result<EntityGraph> {
        self.wire_owner_lists()?;
        self.validate_references()?;
        self.validate_lists()?;
        self.validate_hierarchy()?;

        let types = TypeDefMap::new();
        for (token, row) in self.types {
            types.insert(token, Arc::new(row));
        }
        let methods = MethodDefMap::new();
        for (token, row) in self.methods {
            methods.insert(token, Arc::new(row));
        }
        let fields = FieldDefMap::new();
        for (token, row) in self.fields {
            fields.insert(token, Arc::new(row));
        }
        let interface_impls = InterfaceImplMap::new();
        for (token, row) in self.interface_impls {
            interface_impls.insert(token, Arc::new(row));
        }
        let custom_attributes = CustomAttributeMap::new();
        for (token, row) in self.custom_attributes {
            custom_attributes.insert(token, Arc::new(row));
        }
        let directives = PreserveDirectiveMap::new();
        for (token, row) in self.directives {
            directives.insert(token, Arc::new(row));
        }

        Ok(EntityGraph::from_maps(
            types,
            methods,
            fields,
            interface_impls,
            custom_attributes,
            directives,
        ))
    }

    /// Pushes every child into its owner's list unless the owner already lists it.
    fn wire_owner_lists(&mut self) -> Result<()> {
        fn push_unique(list: &mut Vec<Token>, token: Token) {
            if !list.contains(&token) {
                list.push(token);
            }
        }

        for method in self.methods.values() {
            let owner = self
                .types
                .get_mut(&method.declaring_type)
                .ok_or(Error::EntityNotFound(method.declaring_type))?;
            push_unique(&mut owner.methods, method.token);
        }

        for field in self.fields.values() {
            let owner = self
                .types
                .get_mut(&field.declaring_type)
                .ok_or(Error::EntityNotFound(field.declaring_type))?;
            push_unique(&mut owner.fields, field.token);
        }

        for edge in self.interface_impls.values() {
            let owner = self
                .types
                .get_mut(&edge.class)
                .ok_or(Error::EntityNotFound(edge.class))?;
            push_unique(&mut owner.interfaces, edge.token);
        }

        for attribute in self.custom_attributes.values() {
            let token = attribute.token;
            let list = match attribute.owner.table_id() {
                Some(TableId::TypeDef) => self
                    .types
                    .get_mut(&attribute.owner)
                    .map(|row| &mut row.custom_attributes),
                Some(TableId::MethodDef) => {
                    let is_param = self.param_attributes.contains(&token);
                    self.methods.get_mut(&attribute.owner).map(|row| {
                        if is_param || row.param_attributes.contains(&token) {
                            &mut row.param_attributes
                        } else {
                            &mut row.custom_attributes
                        }
                    })
                }
                Some(TableId::Field) => self
                    .fields
                    .get_mut(&attribute.owner)
                    .map(|row| &mut row.custom_attributes),
                Some(TableId::InterfaceImpl) => self
                    .interface_impls
                    .get_mut(&attribute.owner)
                    .map(|row| &mut row.custom_attributes),
                _ => {
                    return Err(malformed_error!(
                        "Custom attribute {} is applied to {}, which cannot carry attributes",
                        token,
                        attribute.owner
                    ))
                }
            };
            let list = list.ok_or(Error::EntityNotFound(attribute.owner))?;
            push_unique(list, token);
        }

        for directive in self.directives.values() {
            let list = match directive.owner.table_id() {
                Some(TableId::TypeDef) => self
                    .types
                    .get_mut(&directive.owner)
                    .map(|row| &mut row.directives),
                Some(TableId::MethodDef) => self
                    .methods
                    .get_mut(&directive.owner)
                    .map(|row| &mut row.directives),
                _ => {
                    return Err(Error::WrongEntityKind {
                        token: directive.owner,
                        expected: TableId::MethodDef,
                    })
                }
            };
            let list = list.ok_or(Error::EntityNotFound(directive.owner))?;
            push_unique(list, directive.token);
        }

        Ok(())
    }

    fn expect(&self, token: Token, expected: TableId) -> Result<()> {
        if token.is_external() {
            return Ok(());
        }
        if token.table_id() != Some(expected) {
            return Err(Error::WrongEntityKind { token, expected });
        }
        let present = match expected {
            TableId::TypeDef => self.types.contains_key(&token),
            TableId::MethodDef => self.methods.contains_key(&token),
            TableId::Field => self.fields.contains_key(&token),
            TableId::InterfaceImpl => self.interface_impls.contains_key(&token),
            TableId::CustomAttribute => self.custom_attributes.contains_key(&token),
            TableId::PreserveDirective => self.directives.contains_key(&token),
            TableId::TypeRef | TableId::MemberRef => true,
        };
        if present {
            Ok(())
        } else {
            Err(Error::EntityNotFound(token))
        }
    }

    fn validate_references(&self) -> Result<()> {
        for ty in self.types.values() {
            if let Some(base) = ty.base {
                self.expect(base, TableId::TypeDef)?;
            }
        }

        for method in self.methods.values() {
            if let Some(slot) = method.overrides {
                self.expect(slot, TableId::MethodDef)?;
            }
            for reference in method.body.iter().flat_map(|body| &body.references) {
                match reference {
                    BodyReference::Call { target, .. } => self.expect(*target, TableId::MethodDef)?,
                    BodyReference::Field(field) => self.expect(*field, TableId::Field)?,
                    BodyReference::TypeToken(ty) => self.expect(*ty, TableId::TypeDef)?,
                }
            }
        }

        for field in self.fields.values() {
            if let Some(field_type) = field.field_type {
                self.expect(field_type, TableId::TypeDef)?;
            }
        }

        for edge in self.interface_impls.values() {
            self.expect(edge.interface, TableId::TypeDef)?;
            if let Some(interface) = self.types.get(&edge.interface) {
                if !interface.is_interface() {
                    return Err(malformed_error!(
                        "InterfaceImpl {} names {} which is not an interface",
                        edge.token,
                        interface.full_name()
                    ));
                }
            }
        }

        for attribute in self.custom_attributes.values() {
            self.expect(attribute.constructor, TableId::MethodDef)?;
            for argument in attribute.type_arguments() {
                self.expect(argument, TableId::TypeDef)?;
            }
        }

        for directive in self.directives.values() {
            if let DirectiveScope::Type(scope) = directive.scope {
                if scope.is_external() {
                    return Err(Error::WrongEntityKind {
                        token: scope,
                        expected: TableId::TypeDef,
                    });
                }
                self.expect(scope, TableId::TypeDef)?;
            }
            if let Some(attribute) = directive.attribute {
                self.expect(attribute, TableId::CustomAttribute)?;
            }
        }

        Ok(())
    }

    /// Owner lists supplied by `insert_*` must agree with the children's back-references.
    fn validate_lists(&self) -> Result<()> {
        for ty in self.types.values() {
            for member in &ty.methods {
                match self.methods.get(member) {
                    Some(method) if method.declaring_type == ty.token => {}
                    Some(method) => {
                        return Err(malformed_error!(
                            "Method {} is listed by {} but declared by {}",
                            member,
                            ty.token,
                            method.declaring_type
                        ))
                    }
                    None => return Err(Error::EntityNotFound(*member)),
                }
            }
            for member in &ty.fields {
                match self.fields.get(member) {
                    Some(field) if field.declaring_type == ty.token => {}
                    Some(field) => {
                        return Err(malformed_error!(
                            "Field {} is listed by {} but declared by {}",
                            member,
                            ty.token,
                            field.declaring_type
                        ))
                    }
                    None => return Err(Error::EntityNotFound(*member)),
                }
            }
            for edge in &ty.interfaces {
                match self.interface_impls.get(edge) {
                    Some(row) if row.class == ty.token => {}
                    Some(row) => {
                        return Err(malformed_error!(
                            "InterfaceImpl {} is listed by {} but belongs to {}",
                            edge,
                            ty.token,
                            row.class
                        ))
                    }
                    None => return Err(Error::EntityNotFound(*edge)),
                }
            }
            self.validate_attribute_list(ty.token, &ty.custom_attributes)?;
            self.validate_directive_list(ty.token, &ty.directives)?;
        }

        for method in self.methods.values() {
            self.validate_attribute_list(method.token, &method.custom_attributes)?;
            self.validate_attribute_list(method.token, &method.param_attributes)?;
            self.validate_directive_list(method.token, &method.directives)?;
        }
        for field in self.fields.values() {
            self.validate_attribute_list(field.token, &field.custom_attributes)?;
        }
        for edge in self.interface_impls.values() {
            self.validate_attribute_list(edge.token, &edge.custom_attributes)?;
        }

        Ok(())
    }

    fn validate_attribute_list(&self, owner: Token, list: &[Token]) -> Result<()> {
        for token in list {
            match self.custom_attributes.get(token) {
                Some(attribute) if attribute.owner == owner => {}
                Some(attribute) => {
                    return Err(malformed_error!(
                        "Custom attribute {} is listed by {} but applied to {}",
                        token,
                        owner,
                        attribute.owner
                    ))
                }
                None => return Err(Error::EntityNotFound(*token)),
            }
        }
        Ok(())
    }

    fn validate_directive_list(&self, owner: Token, list: &[Token]) -> Result<()> {
        for token in list {
            match self.directives.get(token) {
                Some(directive) if directive.owner == owner => {}
                Some(directive) => {
                    return Err(malformed_error!(
                        "Directive {} is listed by {} but attached to {}",
                        token,
                        owner,
                        directive.owner
                    ))
                }
                None => return Err(Error::EntityNotFound(*token)),
            }
        }
        Ok(())
    }

    fn validate_hierarchy(&self) -> Result<()> {
        for ty in self.types.values() {
            let mut seen = FxHashSet::default();
            seen.insert(ty.token);
            let mut current = ty.base;
            while let Some(base) = current {
                if !seen.insert(base) {
                    return Err(malformed_error!(
                        "Type {} has a cyclic inheritance chain",
                        ty.full_name()
                    ));
                }
                current = self.types.get(&base).and_then(|row| row.base);
            }
        }
        Ok(())
    }
}

//! The frozen entity graph.
//!
//! [`EntityGraph`] is the read-mostly store the marking engine walks. Its structural shape
//! never changes while marking runs; only [`crate::linker::Sweep`] mutates it, afterwards.
//!
//! # Examples
//!
//! ```rust
//! use dottrim::metadata::{
//!     builder::EntityGraphBuilder,
//!     entities::{EntityKind, MethodModifiers, TypeAttributes},
//!     signature::MethodSignature,
//! };
//!
//! let mut builder = EntityGraphBuilder::new();
//! let widget = builder.add_type("MyApp", "Widget", TypeAttributes::PUBLIC);
//! let ctor = builder.add_method(widget, ".ctor", MethodSignature::void(), MethodModifiers::SPECIAL_NAME);
//! let graph = builder.build().unwrap();
//!
//! assert_eq!(graph.kind_of(ctor), Some(EntityKind::Method));
//! assert_eq!(graph.members_of(widget), vec![ctor]);
//! ```

use rustc_hash::FxHashSet;
use std::sync::Arc;

use crate::metadata::{
    directive::{PreserveDirectiveMap, PreserveDirectiveRc},
    entities::{
        CustomAttributeMap, CustomAttributeRc, Entity, EntityKind, FieldDefMap, FieldDefRc,
        InterfaceImplMap, InterfaceImplRc, MethodDefMap, MethodDefRc, TypeDefMap, TypeDefRc,
    },
    index::{EntityIndex, MemberIndex},
    token::{TableId, Token},
};

/// The in-memory entity graph of one assembly.
pub struct EntityGraph {
    pub(crate) types: TypeDefMap,
    pub(crate) methods: MethodDefMap,
    pub(crate) fields: FieldDefMap,
    pub(crate) interface_impls: InterfaceImplMap,
    pub(crate) custom_attributes: CustomAttributeMap,
    pub(crate) directives: PreserveDirectiveMap,
    entity_index: Arc<EntityIndex>,
    member_index: MemberIndex,
}

impl EntityGraph {
    pub(crate) fn from_maps(
        types: TypeDefMap,
        methods: MethodDefMap,
        fields: FieldDefMap,
        interface_impls: InterfaceImplMap,
        custom_attributes: CustomAttributeMap,
        directives: PreserveDirectiveMap,
    ) -> Self {
        let mut graph = EntityGraph {
            types,
            methods,
            fields,
            interface_impls,
            custom_attributes,
            directives,
            entity_index: Arc::new(EntityIndex::default()),
            member_index: MemberIndex::default(),
        };
        graph.entity_index = Arc::new(EntityIndex::new(graph.tokens().collect()));
        graph.rebuild_member_index();
        graph
    }

    /// Rebuilds the name lookups from the current rows.
    pub(crate) fn rebuild_member_index(&mut self) {
        let mut index = MemberIndex::default();
        for entry in &self.types {
            index.insert_type(entry.value().full_name(), *entry.key());
        }
        for entry in &self.methods {
            let method = entry.value();
            index.insert_member(method.declaring_type, &method.name, method.token);
        }
        for entry in &self.fields {
            let field = entry.value();
            index.insert_member(field.declaring_type, &field.name, field.token);
        }
        self.member_index = index;
    }

    /// Removes one row. The entity index keeps the position vacant.
    pub(crate) fn remove(&mut self, token: Token) -> bool {
        match token.table_id() {
            Some(TableId::TypeDef) => self.types.remove(&token).is_some(),
            Some(TableId::MethodDef) => self.methods.remove(&token).is_some(),
            Some(TableId::Field) => self.fields.remove(&token).is_some(),
            Some(TableId::InterfaceImpl) => self.interface_impls.remove(&token).is_some(),
            Some(TableId::CustomAttribute) => self.custom_attributes.remove(&token).is_some(),
            Some(TableId::PreserveDirective) => self.directives.remove(&token).is_some(),
            Some(TableId::TypeRef | TableId::MemberRef) | None => false,
        }
    }

    /// Replaces a row with a new version under the same token.
    pub(crate) fn replace(&mut self, entity: Entity) {
        match entity {
            Entity::Type(row) => {
                self.types.insert(row.token, row);
            }
            Entity::Method(row) => {
                self.methods.insert(row.token, row);
            }
            Entity::Field(row) => {
                self.fields.insert(row.token, row);
            }
            Entity::InterfaceImpl(row) => {
                self.interface_impls.insert(row.token, row);
            }
            Entity::CustomAttribute(row) => {
                self.custom_attributes.insert(row.token, row);
            }
            Entity::PreserveDirective(row) => {
                self.directives.insert(row.token, row);
            }
        }
    }

    /// Looks up any entity by token.
    #[must_use]
    pub fn entity(&self, token: Token) -> Option<Entity> {
        match token.table_id()? {
            TableId::TypeDef => self.type_def(token).map(Entity::Type),
            TableId::MethodDef => self.method(token).map(Entity::Method),
            TableId::Field => self.field(token).map(Entity::Field),
            TableId::InterfaceImpl => self.interface_impl(token).map(Entity::InterfaceImpl),
            TableId::CustomAttribute => self.custom_attribute(token).map(Entity::CustomAttribute),
            TableId::PreserveDirective => self.directive(token).map(Entity::PreserveDirective),
            TableId::TypeRef | TableId::MemberRef => None,
        }
    }

    /// Looks up a type.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<TypeDefRc> {
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a method.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<MethodDefRc> {
        self.methods.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a field.
    #[must_use]
    pub fn field(&self, token: Token) -> Option<FieldDefRc> {
        self.fields.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up an interface implementation edge.
    #[must_use]
    pub fn interface_impl(&self, token: Token) -> Option<InterfaceImplRc> {
        self.interface_impls
            .get(&token)
            .map(|entry| entry.value().clone())
    }

    /// Looks up a custom attribute usage.
    #[must_use]
    pub fn custom_attribute(&self, token: Token) -> Option<CustomAttributeRc> {
        self.custom_attributes
            .get(&token)
            .map(|entry| entry.value().clone())
    }

    /// Looks up a preserve directive.
    #[must_use]
    pub fn directive(&self, token: Token) -> Option<PreserveDirectiveRc> {
        self.directives.get(&token).map(|entry| entry.value().clone())
    }

    /// Methods then fields declared by a type, in declaration order.
    #[must_use]
    pub fn members_of(&self, ty: Token) -> Vec<Token> {
        self.type_def(ty)
            .map(|row| row.methods.iter().chain(&row.fields).copied().collect())
            .unwrap_or_default()
    }

    /// Interface implementation edges declared by a type.
    #[must_use]
    pub fn interfaces_of(&self, ty: Token) -> Vec<InterfaceImplRc> {
        self.type_def(ty)
            .map(|row| {
                row.interfaces
                    .iter()
                    .filter_map(|edge| self.interface_impl(*edge))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Custom attribute usages applied directly to an entity.
    ///
    /// Attributes on a method's parameters are not included; see
    /// [`crate::metadata::entities::MethodDef::param_attributes`].
    #[must_use]
    pub fn attributes_of(&self, token: Token) -> Vec<CustomAttributeRc> {
        let list = match self.entity(token) {
            Some(Entity::Type(row)) => row.custom_attributes.clone(),
            Some(Entity::Method(row)) => row.custom_attributes.clone(),
            Some(Entity::Field(row)) => row.custom_attributes.clone(),
            Some(Entity::InterfaceImpl(row)) => row.custom_attributes.clone(),
            _ => Vec::new(),
        };
        list.into_iter()
            .filter_map(|attribute| self.custom_attribute(attribute))
            .collect()
    }

    /// Preserve directives attached to a type or method.
    #[must_use]
    pub fn directives_of(&self, token: Token) -> Vec<PreserveDirectiveRc> {
        let list = match self.entity(token) {
            Some(Entity::Type(row)) => row.directives.clone(),
            Some(Entity::Method(row)) => row.directives.clone(),
            _ => Vec::new(),
        };
        list.into_iter()
            .filter_map(|directive| self.directive(directive))
            .collect()
    }

    /// Renders a token for humans: `Namespace.Type` for types, `Namespace.Type::Name(params)`
    /// for methods, `Namespace.Type::Name` for fields. Anything else falls back to
    /// [`Entity::display_name`], and unknown tokens to their hex value.
    #[must_use]
    pub fn qualified_name(&self, token: Token) -> String {
        let owner = |ty: Token| {
            self.type_def(ty)
                .map_or_else(|| ty.to_string(), |row| row.full_name())
        };

        match self.entity(token) {
            Some(Entity::Method(row)) => format!(
                "{}::{}{}",
                owner(row.declaring_type),
                row.name,
                row.signature.parameter_list()
            ),
            Some(Entity::Field(row)) => format!("{}::{}", owner(row.declaring_type), row.name),
            Some(Entity::InterfaceImpl(row)) => {
                format!("{} : {}", owner(row.class), owner(row.interface))
            }
            Some(entity) => entity.display_name(),
            None => token.to_string(),
        }
    }

    /// Kind of a live entity.
    #[must_use]
    pub fn kind_of(&self, token: Token) -> Option<EntityKind> {
        self.entity(token).map(|entity| entity.kind())
    }

    /// Returns `true` if the token names a live entity.
    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        match token.table_id() {
            Some(TableId::TypeDef) => self.types.contains_key(&token),
            Some(TableId::MethodDef) => self.methods.contains_key(&token),
            Some(TableId::Field) => self.fields.contains_key(&token),
            Some(TableId::InterfaceImpl) => self.interface_impls.contains_key(&token),
            Some(TableId::CustomAttribute) => self.custom_attributes.contains_key(&token),
            Some(TableId::PreserveDirective) => self.directives.contains_key(&token),
            _ => false,
        }
    }

    /// Dense index of a token; stable for the lifetime of the graph.
    #[must_use]
    pub fn index_of(&self, token: Token) -> Option<usize> {
        self.entity_index.index_of(token)
    }

    /// Token at a dense index.
    #[must_use]
    pub fn token_at(&self, index: usize) -> Option<Token> {
        self.entity_index.token_at(index)
    }

    /// The dense numbering shared with mark stores.
    #[must_use]
    pub fn entity_index(&self) -> &Arc<EntityIndex> {
        &self.entity_index
    }

    /// Name lookups used by directive resolution.
    #[must_use]
    pub fn member_index(&self) -> &MemberIndex {
        &self.member_index
    }

    /// Base types of `ty` present in the graph, nearest first. The chain stops at the first
    /// external base.
    #[must_use]
    pub fn ancestors(&self, ty: Token) -> Vec<TypeDefRc> {
        let mut chain = Vec::new();
        let mut seen = FxHashSet::default();
        seen.insert(ty);

        let mut current = self.type_def(ty).and_then(|row| row.base);
        while let Some(base) = current {
            if !seen.insert(base) {
                break;
            }
            match self.type_def(base) {
                Some(row) => {
                    current = row.base;
                    chain.push(row);
                }
                None => break,
            }
        }
        chain
    }

    /// `ty` followed by its [`ancestors`](Self::ancestors).
    #[must_use]
    pub fn type_chain(&self, ty: Token) -> Vec<TypeDefRc> {
        match self.type_def(ty) {
            Some(row) => {
                let mut chain = vec![row];
                chain.extend(self.ancestors(ty));
                chain
            }
            None => Vec::new(),
        }
    }

    /// Iterates all types.
    pub fn types(&self) -> impl Iterator<Item = TypeDefRc> + '_ {
        self.types.iter().map(|entry| entry.value().clone())
    }

    /// Iterates all methods.
    pub fn methods(&self) -> impl Iterator<Item = MethodDefRc> + '_ {
        self.methods.iter().map(|entry| entry.value().clone())
    }

    /// Iterates all interface implementation edges.
    pub fn interface_impls(&self) -> impl Iterator<Item = InterfaceImplRc> + '_ {
        self.interface_impls
            .iter()
            .map(|entry| entry.value().clone())
    }

    /// Iterates the tokens of every live entity, table by table in token order.
    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.types
            .iter()
            .map(|entry| *entry.key())
            .chain(self.methods.iter().map(|entry| *entry.key()))
            .chain(self.fields.iter().map(|entry| *entry.key()))
            .chain(self.interface_impls.iter().map(|entry| *entry.key()))
            .chain(self.custom_attributes.iter().map(|entry| *entry.key()))
            .chain(self.directives.iter().map(|entry| *entry.key()))
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
            + self.methods.len()
            + self.fields.len()
            + self.interface_impls.len()
            + self.custom_attributes.len()
            + self.directives.len()
    }

    /// Returns `true` if the graph has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live entities of one kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Type => self.types.len(),
            EntityKind::Method => self.methods.len(),
            EntityKind::Field => self.fields.len(),
            EntityKind::InterfaceImpl => self.interface_impls.len(),
            EntityKind::CustomAttribute => self.custom_attributes.len(),
            EntityKind::PreserveDirective => self.directives.len(),
        }
    }
}

impl std::fmt::Debug for EntityGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityGraph")
            .field("types", &self.types.len())
            .field("methods", &self.methods.len())
            .field("fields", &self.fields.len())
            .field("interface_impls", &self.interface_impls.len())
            .field("custom_attributes", &self.custom_attributes.len())
            .field("directives", &self.directives.len())
            .finish()
    }
}

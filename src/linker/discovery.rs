//! Direct dependency sets of single entities.
//!
//! [`DependencyDiscovery::dependencies_of`] is a pure function of the graph's shape: it
//! never looks at mark state, so expanding the same entity twice, in any order or on any
//! thread, yields the same answer. That is what lets the marking engine converge to the
//! same fixed point regardless of worklist order.

use crate::{
    linker::{
        config::LinkerConfig,
        resolver::{PreserveDirectiveResolver, ResolutionError},
    },
    metadata::{
        directive::{DirectiveScope, PreserveDirective},
        entities::{
            BodyReference, CallType, CustomAttribute, Entity, FieldDef, InterfaceImpl, MethodDef,
            TypeDef,
        },
        graph::EntityGraph,
        token::Token,
    },
};

/// Everything marking one entity implies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Entities to mark next; sorted, deduplicated, graph entities only
    pub entities: Vec<Token>,
    /// Types constructed by a `newobj` in this entity's body, or the value type itself
    pub instantiates: Vec<Token>,
    /// Virtual slots invoked through `callvirt` or `ldvirtftn`
    pub dispatches: Vec<Token>,
    /// Interface implementation edges declared by a type; marked only by dispatch rules
    pub pending_edges: Vec<Token>,
    /// Directive resolution failures
    pub failures: Vec<ResolutionError>,
}

impl Dependencies {
    fn finish(mut self, graph: &EntityGraph) -> Self {
        self.entities.retain(|token| graph.contains(*token));
        self.entities.sort_unstable();
        self.entities.dedup();
        self.instantiates.sort_unstable();
        self.instantiates.dedup();
        self.dispatches.sort_unstable();
        self.dispatches.dedup();
        self
    }
}

/// Computes direct dependency sets.
pub struct DependencyDiscovery<'g> {
    graph: &'g EntityGraph,
    resolver: PreserveDirectiveResolver<'g>,
    config: LinkerConfig,
}

impl<'g> DependencyDiscovery<'g> {
    /// Creates a discovery pass over `graph`.
    #[must_use]
    pub fn new(graph: &'g EntityGraph, config: &LinkerConfig) -> Self {
        Self {
            graph,
            resolver: PreserveDirectiveResolver::new(graph),
            config: *config,
        }
    }

    /// The resolver used for directives.
    #[must_use]
    pub fn resolver(&self) -> &PreserveDirectiveResolver<'g> {
        &self.resolver
    }

    /// Direct dependencies of one entity. Unknown tokens have none.
    #[must_use]
    pub fn dependencies_of(&self, token: Token) -> Dependencies {
        let mut deps = Dependencies::default();
        match self.graph.entity(token) {
            Some(Entity::Type(row)) => self.type_dependencies(&row, &mut deps),
            Some(Entity::Method(row)) => self.method_dependencies(&row, &mut deps),
            Some(Entity::Field(row)) => Self::field_dependencies(&row, &mut deps),
            Some(Entity::InterfaceImpl(row)) => Self::edge_dependencies(&row, &mut deps),
            Some(Entity::CustomAttribute(row)) => Self::attribute_dependencies(&row, &mut deps),
            Some(Entity::PreserveDirective(row)) => self.directive_dependencies(&row, &mut deps),
            None => {}
        }
        deps.finish(self.graph)
    }

    fn type_dependencies(&self, ty: &TypeDef, deps: &mut Dependencies) {
        deps.entities.extend(ty.base);
        deps.entities.extend(&ty.custom_attributes);
        deps.entities.extend(&ty.directives);
        deps.pending_edges.extend(&ty.interfaces);

        // Locals, `initobj` and `box` create value types without a constructor call
        if ty.is_value_type() && ty.is_instantiable() {
            deps.instantiates.push(ty.token);
        }

        if self.config.keep_type_initializers {
            deps.entities.extend(ty.methods.iter().copied().filter(|method| {
                self.graph
                    .method(*method)
                    .is_some_and(|row| row.is_type_initializer())
            }));
        }
    }

    fn method_dependencies(&self, method: &MethodDef, deps: &mut Dependencies) {
        deps.entities.push(method.declaring_type);
        deps.entities.extend(&method.custom_attributes);
        deps.entities.extend(&method.param_attributes);
        deps.entities.extend(&method.directives);

        let Some(body) = &method.body else {
            return;
        };

        for reference in &body.references {
            match *reference {
                BodyReference::Call { kind, target } => {
                    deps.entities.push(target);
                    let Some(callee) = self.graph.method(target) else {
                        continue;
                    };
                    if kind == CallType::NewObj && callee.is_constructor() {
                        deps.instantiates.push(callee.declaring_type);
                    }
                    if kind.is_virtual() && callee.is_virtual() {
                        deps.dispatches.push(target);
                    }
                }
                BodyReference::Field(field) => deps.entities.push(field),
                BodyReference::TypeToken(ty) => deps.entities.push(ty),
            }
        }
    }

    fn field_dependencies(field: &FieldDef, deps: &mut Dependencies) {
        deps.entities.push(field.declaring_type);
        deps.entities.extend(field.field_type);
        deps.entities.extend(&field.custom_attributes);
    }

    fn edge_dependencies(edge: &InterfaceImpl, deps: &mut Dependencies) {
        deps.entities.push(edge.class);
        deps.entities.push(edge.interface);
        deps.entities.extend(&edge.custom_attributes);
    }

    fn attribute_dependencies(attribute: &CustomAttribute, deps: &mut Dependencies) {
        deps.entities.push(attribute.owner);
        deps.entities.push(attribute.constructor);
        deps.entities.extend(attribute.type_arguments());
    }

    fn directive_dependencies(&self, directive: &PreserveDirective, deps: &mut Dependencies) {
        deps.entities.push(directive.owner);
        deps.entities.extend(directive.attribute);
        if let DirectiveScope::Type(scope) = directive.scope {
            deps.entities.push(scope);
        }

        match self.resolver.resolve(directive) {
            Ok(member) => deps.entities.push(member),
            Err(failure) => deps.failures.push(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            builder::EntityGraphBuilder,
            entities::{
                AttributeArgument, FieldModifiers, MethodBody, MethodModifiers, TypeAttributes,
            },
            signature::MethodSignature,
        },
        test::{directive_scope_fixture, DirectiveScopeFixture},
    };

    #[test]
    fn test_type_reports_edges_as_pending() {
        let DirectiveScopeFixture { graph, t, edge, .. } = directive_scope_fixture();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        let deps = discovery.dependencies_of(t);
        assert_eq!(deps.pending_edges, vec![edge]);
        assert!(!deps.entities.contains(&edge));
    }

    #[test]
    fn test_directive_resolves_member() {
        let DirectiveScopeFixture {
            graph,
            keep,
            foo,
            directive,
            ..
        } = directive_scope_fixture();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        let method_deps = discovery.dependencies_of(keep);
        assert!(method_deps.entities.contains(&directive));
        assert!(!method_deps.entities.contains(&foo));

        let directive_deps = discovery.dependencies_of(directive);
        assert_eq!(directive_deps.entities, vec![foo, keep]);
        assert!(directive_deps.failures.is_empty());
    }

    #[test]
    fn test_method_body_dependencies() {
        let mut builder = EntityGraphBuilder::new();
        let object = Token::new(0x01000001);
        let iface = builder.add_interface("N", "IRun");
        let run = builder.add_method(
            iface,
            "Run",
            MethodSignature::void(),
            MethodModifiers::VIRTUAL | MethodModifiers::ABSTRACT | MethodModifiers::NEW_SLOT,
        );
        let ty = builder.add_type("N", "Runner", TypeAttributes::PUBLIC);
        builder.set_base(ty, object).unwrap();
        let ctor = builder.add_method(
            ty,
            ".ctor",
            MethodSignature::void(),
            MethodModifiers::SPECIAL_NAME,
        );
        let helper = builder.add_method(
            ty,
            "Helper",
            MethodSignature::void(),
            MethodModifiers::STATIC,
        );
        let count = builder.add_field(ty, "_count", "System.Int32", None, FieldModifiers::STATIC);
        let main = builder.add_method(ty, "Main", MethodSignature::void(), MethodModifiers::STATIC);
        builder
            .set_body(
                main,
                MethodBody::builder()
                    .newobj(ctor)
                    .callvirt(run)
                    .callvirt(helper)
                    .call(Token::new(0x0A000001))
                    .field(count)
                    .type_token(iface)
                    .build(),
            )
            .unwrap();
        let graph = builder.build().unwrap();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        let deps = discovery.dependencies_of(main);
        assert_eq!(deps.entities, vec![iface, ty, count, run, ctor, helper]);
        assert_eq!(deps.instantiates, vec![ty]);
        // `helper` is not virtual, so calling it through `callvirt` is not a dispatch
        assert_eq!(deps.dispatches, vec![run]);
    }

    #[test]
    fn test_value_type_is_instantiated_when_marked() {
        let mut builder = EntityGraphBuilder::new();
        let point = builder.add_value_type("N", "Point", TypeAttributes::PUBLIC);
        builder.set_base(point, Token::new(0x01000002)).unwrap();
        let class = builder.add_type("N", "Shape", TypeAttributes::PUBLIC);
        builder.set_base(class, Token::new(0x01000001)).unwrap();
        let graph = builder.build().unwrap();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        assert_eq!(discovery.dependencies_of(point).instantiates, vec![point]);
        assert!(discovery.dependencies_of(class).instantiates.is_empty());
    }

    #[test]
    fn test_type_initializer_toggle() {
        let mut builder = EntityGraphBuilder::new();
        let ty = builder.add_type("N", "Config", TypeAttributes::PUBLIC);
        let cctor = builder.add_method(
            ty,
            ".cctor",
            MethodSignature::void(),
            MethodModifiers::STATIC
                | MethodModifiers::SPECIAL_NAME
                | MethodModifiers::RTSPECIAL_NAME,
        );
        let graph = builder.build().unwrap();

        let keep = DependencyDiscovery::new(&graph, &LinkerConfig::default());
        assert_eq!(keep.dependencies_of(ty).entities, vec![cctor]);

        let drop = DependencyDiscovery::new(&graph, &LinkerConfig::minimal());
        assert!(drop.dependencies_of(ty).entities.is_empty());
    }

    #[test]
    fn test_attribute_dependencies() {
        let mut builder = EntityGraphBuilder::new();
        let attr_type = builder.add_type("N", "MarkerAttribute", TypeAttributes::PUBLIC);
        let attr_ctor = builder.add_method(
            attr_type,
            ".ctor",
            MethodSignature::new("System.Void", ["System.Type"]),
            MethodModifiers::SPECIAL_NAME,
        );
        let target = builder.add_type("N", "Target", TypeAttributes::PUBLIC);
        let referenced = builder.add_type("N", "Referenced", TypeAttributes::PUBLIC);
        let usage = builder.add_custom_attribute(
            target,
            attr_ctor,
            vec![
                AttributeArgument::Type(referenced),
                AttributeArgument::String("ignored".to_string()),
            ],
        );
        let graph = builder.build().unwrap();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        assert_eq!(discovery.dependencies_of(target).entities, vec![usage]);
        assert_eq!(
            discovery.dependencies_of(usage).entities,
            vec![target, referenced, attr_ctor]
        );
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let mut builder = EntityGraphBuilder::new();
        let ty = builder.add_type("N", "A", TypeAttributes::PUBLIC);
        let keep = builder.add_method(ty, "Keep", MethodSignature::void(), MethodModifiers::STATIC);
        let directive = builder.add_directive(keep, "Missing", DirectiveScope::DeclaringType, None);
        let graph = builder.build().unwrap();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        let deps = discovery.dependencies_of(directive);
        assert_eq!(deps.entities, vec![keep]);
        assert_eq!(deps.failures.len(), 1);
        assert_eq!(deps.failures[0].code(), 1040);
    }

    #[test]
    fn test_pure_function_of_shape() {
        let DirectiveScopeFixture { graph, .. } = directive_scope_fixture();
        let discovery = DependencyDiscovery::new(&graph, &LinkerConfig::default());

        for token in graph.tokens() {
            assert_eq!(discovery.dependencies_of(token), discovery.dependencies_of(token));
        }
        assert_eq!(
            discovery.dependencies_of(Token::new(0x02000099)),
            Dependencies::default()
        );
    }
}

//! The fixed point does not depend on scheduling.
//!
//! Worklist order, batch size, parallel discovery and the order of the roots only change
//! how the engine gets there. Marks, instantiated types, dispatched slots and rule firings
//! must come out identical.

use dottrim::{prelude::*, Result};

const OBJECT: Token = Token(0x0100_0001);
const SLOTS: [&str; 2] = ["Run", "Stop"];

/// Builds a deterministic graph with class hierarchies, interfaces, cross calls and
/// directives. Returns the graph and a handful of roots.
fn synthetic_graph(classes: usize) -> Result<(EntityGraph, Vec<Token>)> {
    let mut builder = EntityGraphBuilder::new();
    let interface_count = classes / 8 + 1;

    let mut slots = Vec::with_capacity(interface_count);
    for index in 0..interface_count {
        let iface = builder.add_interface("Synthetic", &format!("IService{index}"));
        let methods: Vec<Token> = SLOTS
            .iter()
            .map(|name| {
                builder.add_method(
                    iface,
                    name,
                    MethodSignature::void(),
                    MethodModifiers::VIRTUAL
                        | MethodModifiers::ABSTRACT
                        | MethodModifiers::NEW_SLOT,
                )
            })
            .collect();
        slots.push((iface, methods));
    }

    let mut types = Vec::with_capacity(classes);
    let mut ctors = Vec::with_capacity(classes);
    let mut works = Vec::with_capacity(classes);
    let mut helpers = Vec::with_capacity(classes);
    let mut fields = Vec::with_capacity(classes);
    for index in 0..classes {
        let ty = builder.add_type("Synthetic", &format!("Node{index}"), TypeAttributes::PUBLIC);
        let root_of_hierarchy = index == 0 || index % 3 == 0;
        builder.set_base(ty, if root_of_hierarchy { OBJECT } else { types[index / 2] })?;

        ctors.push(builder.add_method(
            ty,
            ".ctor",
            MethodSignature::void(),
            MethodModifiers::SPECIAL_NAME | MethodModifiers::RTSPECIAL_NAME,
        ));
        let work_flags = if root_of_hierarchy {
            MethodModifiers::VIRTUAL | MethodModifiers::NEW_SLOT
        } else {
            MethodModifiers::VIRTUAL
        };
        works.push(builder.add_method(ty, "Work", MethodSignature::void(), work_flags));
        helpers.push(builder.add_method(
            ty,
            &format!("Helper{index}"),
            MethodSignature::void(),
            MethodModifiers::STATIC,
        ));
        fields.push(builder.add_field(ty, "state", "System.Int32", None, FieldModifiers::empty()));

        if index % 2 == 1 {
            let (iface, _) = &slots[index % interface_count];
            for name in SLOTS {
                builder.add_method(
                    ty,
                    name,
                    MethodSignature::void(),
                    MethodModifiers::VIRTUAL | MethodModifiers::FINAL | MethodModifiers::NEW_SLOT,
                );
            }
            builder.add_interface_impl(ty, *iface);
        }
        if index % 3 == 1 {
            // ToString overrides a slot outside the graph
            builder.add_method(
                ty,
                "ToString",
                MethodSignature::new("System.String", Vec::<String>::new()),
                MethodModifiers::VIRTUAL,
            );
        }
        types.push(ty);
    }

    for index in 0..classes {
        let mut body = MethodBody::builder()
            .call(helpers[(index * 7 + 3) % classes])
            .field(fields[index])
            .callvirt(works[(index * 3 + 1) % classes]);
        if index % 4 == 0 {
            body = body.newobj(ctors[(index * 5 + 1) % classes]);
        }
        if index % 2 == 0 {
            let (_, methods) = &slots[(index / 2) % interface_count];
            body = body.callvirt(methods[index % SLOTS.len()]);
        }
        builder.set_body(works[index], body.build())?;

        if index % 5 == 0 {
            builder.add_directive(helpers[index], "Work", DirectiveScope::DeclaringType, None);
        }
        if index % 6 == 2 {
            builder.set_body(
                helpers[index],
                MethodBody::builder().newobj(ctors[(index + 4) % classes]).build(),
            )?;
        }
    }

    let program = builder.add_type("Synthetic", "Program", TypeAttributes::PUBLIC);
    let main = builder.add_method(
        program,
        "Main",
        MethodSignature::void(),
        MethodModifiers::STATIC,
    );
    builder.set_body(
        main,
        MethodBody::builder()
            .newobj(ctors[0])
            .callvirt(works[0])
            .call(helpers[1 % classes])
            .build(),
    )?;

    let roots = vec![main, helpers[classes / 2], helpers[classes - 1], works[classes / 3]];
    Ok((builder.build()?, roots))
}

fn run(graph: &EntityGraph, roots: &[Token], config: LinkerConfig) -> Result<MarkResult> {
    MarkingEngine::new(graph, &config).run(roots, &Diagnostics::new(), &NoSuppression)
}

fn assert_same(expected: &MarkResult, actual: &MarkResult, label: &str) {
    assert!(expected.marks().same_marks(actual.marks()), "marks differ for {label}");
    assert_eq!(expected.instantiated(), actual.instantiated(), "instantiated differ for {label}");
    assert_eq!(expected.dispatched(), actual.dispatched(), "dispatched differ for {label}");
    assert_eq!(expected.stats().marked, actual.stats().marked, "counts differ for {label}");
    assert_eq!(expected.stats().firings, actual.stats().firings, "firings differ for {label}");
    assert_eq!(
        expected.stats().dropped_edges,
        actual.stats().dropped_edges,
        "dropped edges differ for {label}"
    );
}

/// Depth first and breadth first reach the same fixed point.
#[test]
fn test_worklist_orders_agree() -> Result<()> {
    let (graph, roots) = synthetic_graph(64)?;

    let lifo = run(&graph, &roots, LinkerConfig::default())?;
    let fifo = run(
        &graph,
        &roots,
        LinkerConfig {
            worklist_order: WorklistOrder::Fifo,
            ..LinkerConfig::default()
        },
    )?;

    assert!(lifo.marks().marked_count() > roots.len());
    assert!(lifo.marks().marked_count() < graph.len());
    assert_same(&lifo, &fifo, "fifo");
    Ok(())
}

/// Parallel discovery agrees with sequential marking for every batch size.
#[test]
fn test_parallel_batches_agree() -> Result<()> {
    let (graph, roots) = synthetic_graph(96)?;
    let sequential = run(&graph, &roots, LinkerConfig::sequential())?;

    for batch_size in [0, 1, 2, 7, 64, 256] {
        for worklist_order in [WorklistOrder::Lifo, WorklistOrder::Fifo] {
            let config = LinkerConfig {
                batch_size,
                worklist_order,
                ..LinkerConfig::parallel()
            };
            let parallel = run(&graph, &roots, config)?;
            assert_same(
                &sequential,
                &parallel,
                &format!("batch size {batch_size}, {worklist_order:?}"),
            );
        }
    }
    Ok(())
}

/// Reordering and repeating roots changes nothing.
#[test]
fn test_root_order_irrelevant() -> Result<()> {
    let (graph, roots) = synthetic_graph(48)?;
    let forward = run(&graph, &roots, LinkerConfig::default())?;

    let mut reversed = roots.clone();
    reversed.reverse();
    assert_same(&forward, &run(&graph, &reversed, LinkerConfig::default())?, "reversed");

    let mut rotated = roots.clone();
    rotated.rotate_left(1);
    assert_same(&forward, &run(&graph, &rotated, LinkerConfig::parallel())?, "rotated");

    let mut repeated = roots.clone();
    repeated.extend_from_slice(&roots);
    assert_same(&forward, &run(&graph, &repeated, LinkerConfig::default())?, "repeated");
    Ok(())
}

/// Reason bookkeeping and verbose output do not influence what is marked.
#[test]
fn test_bookkeeping_is_transparent() -> Result<()> {
    let (graph, roots) = synthetic_graph(40)?;
    let plain = run(
        &graph,
        &roots,
        LinkerConfig {
            record_reasons: false,
            ..LinkerConfig::default()
        },
    )?;
    let verbose = run(
        &graph,
        &roots,
        LinkerConfig {
            verbose: true,
            ..LinkerConfig::default()
        },
    )?;

    assert!(plain.reasons().is_empty());
    assert_eq!(verbose.reasons().len(), verbose.marks().marked_count());
    assert_same(&plain, &verbose, "verbose");
    Ok(())
}

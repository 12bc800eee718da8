//! Integration tests for messages, suppression and the diagnostics sink.

use dottrim::{prelude::*, Result};

/// A warning suppressed for its origin becomes the empty message; other origins and
/// codes are untouched.
#[test]
fn test_suppression_by_origin() -> Result<()> {
    let origin = MessageOrigin::file("X");
    let mut policy = SuppressionSet::new();
    policy.suppress(2500, origin.clone());

    let suppressed = Message::warning(
        &policy,
        "quiet",
        2500,
        origin.clone(),
        MessageSubCategory::NONE,
    )?;
    assert_eq!(suppressed, Message::empty());
    assert!(suppressed.is_empty());

    let elsewhere = Message::warning(
        &policy,
        "loud",
        2500,
        MessageOrigin::file("Y"),
        MessageSubCategory::NONE,
    )?;
    assert_eq!(elsewhere.code(), Some(2500));

    let other_code = Message::warning(&policy, "loud", 2501, origin, MessageSubCategory::NONE)?;
    assert_eq!(other_code.category(), Some(MessageCategory::Warning));
    Ok(())
}

/// Codes outside their category's range are rejected.
#[test]
fn test_code_ranges() {
    let origin = MessageOrigin::file("foo.il");

    assert!(matches!(
        Message::error("bad", 500, MessageSubCategory::NONE, None),
        Err(Error::InvalidMessageCode { code: 500, .. })
    ));
    assert!(matches!(
        Message::warning(&NoSuppression, "bad", 1500, origin.clone(), MessageSubCategory::NONE),
        Err(Error::InvalidMessageCode { code: 1500, .. })
    ));
    assert!(Message::error("edge", 2000, MessageSubCategory::NONE, None).is_ok());
    assert!(
        Message::warning(&NoSuppression, "edge", 6000, origin, MessageSubCategory::NONE).is_ok()
    );
}

/// MSBuild canonical rendering.
#[test]
fn test_canonical_format() -> Result<()> {
    let warning = Message::warning(
        &NoSuppression,
        "unused field",
        2042,
        MessageOrigin::location("foo.il", 12, 3),
        MessageSubCategory::NONE,
    )?;
    assert_eq!(warning.to_string(), "foo.il:12:3: warning IL2042: unused field");

    let error = Message::error(
        "broken",
        1001,
        MessageSubCategory::TRIM_ANALYSIS,
        Some(MessageOrigin::file("app.dll")),
    )?;
    assert_eq!(error.to_string(), "app.dll: Trim analysis error IL1001: broken");

    let anonymous = Message::error("no origin", 1002, MessageSubCategory::NONE, None)?;
    assert_eq!(anonymous.to_string(), "dottrim: error IL1002: no origin");
    Ok(())
}

/// Messages compare by value.
#[test]
fn test_message_equality() -> Result<()> {
    let origin = MessageOrigin::location("foo.il", 1, 1);
    let a = Message::warning(
        &NoSuppression,
        "same",
        3000,
        origin.clone(),
        MessageSubCategory::NONE,
    )?;
    let b = Message::warning(
        &NoSuppression,
        "same",
        3000,
        origin.clone(),
        MessageSubCategory::NONE,
    )?;
    let c = Message::warning(
        &NoSuppression,
        "same",
        3000,
        origin,
        MessageSubCategory::TRIM_ANALYSIS,
    )?;

    assert_eq!(a, b);
    assert_ne!(a, c);
    Ok(())
}

/// Unknown roots are warned about, once per root, and the warning can be suppressed.
#[test]
fn test_unknown_root_warning() -> Result<()> {
    let mut builder = EntityGraphBuilder::new();
    let ty = builder.add_type("App", "Program", TypeAttributes::PUBLIC);
    let main = builder.add_method(ty, "Main", MethodSignature::void(), MethodModifiers::STATIC);
    let graph = builder.build()?;
    let engine = MarkingEngine::new(&graph, &LinkerConfig::default());

    let missing = Token::from_parts(TableId::MethodDef, 42);
    let diagnostics = Diagnostics::new();
    let result = engine.run(&[main, missing], &diagnostics, &NoSuppression)?;

    assert!(result.is_marked(main));
    assert_eq!(result.state(missing), MarkState::Unvisited);
    let warnings = diagnostics.by_code(2010);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].origin(), Some(&MessageOrigin::member(missing, "0x0600002a")));

    let mut policy = SuppressionSet::new();
    policy.suppress_code(2010);
    let quiet = Diagnostics::new();
    engine.run(&[main, missing], &quiet, &policy)?;
    assert_eq!(quiet.warning_count(), 0);
    assert!(quiet.by_code(2010).is_empty());
    Ok(())
}

/// Every run ends with an informational summary.
#[test]
fn test_summary_message() -> Result<()> {
    let mut builder = EntityGraphBuilder::new();
    let ty = builder.add_type("App", "Program", TypeAttributes::PUBLIC);
    let main = builder.add_method(ty, "Main", MethodSignature::void(), MethodModifiers::STATIC);
    builder.add_method(ty, "Unused", MethodSignature::void(), MethodModifiers::STATIC);
    let graph = builder.build()?;

    let diagnostics = Diagnostics::new();
    MarkingEngine::new(&graph, &LinkerConfig::default())
        .run(&[main], &diagnostics, &NoSuppression)?;

    let info = diagnostics.by_category(MessageCategory::Info);
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].to_string(), "dottrim: Marked 2 of 3 entities");
    assert!(!diagnostics.has_errors());
    Ok(())
}

/// A closure works as a suppression policy.
#[test]
fn test_closure_policy() -> Result<()> {
    let policy = |code: u32, _: &MessageOrigin| (2000..2100).contains(&code);
    let origin = MessageOrigin::file("lib.il");

    let hidden = Message::warning(
        &policy,
        "hidden",
        2050,
        origin.clone(),
        MessageSubCategory::NONE,
    )?;
    let shown = Message::warning(&policy, "shown", 2150, origin, MessageSubCategory::NONE)?;
    assert!(hidden.is_empty());
    assert!(!shown.is_empty());
    Ok(())
}

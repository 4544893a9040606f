// crates/strata-core/src/plugin_system/tests/resolver_tests.rs
#![cfg(test)]

use crate::plugin_system::dependency::ResolveState;
use crate::plugin_system::descriptor::PluginDescriptor;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::resolver::{DependencyResolver, FailureKind};

fn plugin(id: &str, version: &str, level: i32) -> PluginDescriptor {
    PluginDescriptor::builder(id).version(version).start_level(level).build().unwrap()
}

fn plugin_with_deps(id: &str, level: i32, deps: &[(&str, &str)]) -> PluginDescriptor {
    let mut builder = PluginDescriptor::builder(id).version("1.0.0").start_level(level);
    for (target, min) in deps {
        builder = builder.dependency(target, min);
    }
    builder.build().unwrap()
}

#[test]
fn test_dependency_orders_before_lower_start_level() {
    // ui starts earlier by level but depends on core
    let descriptors = vec![
        plugin_with_deps("ui", 5, &[("core", "1.0")]),
        plugin("core", "1.2.0", 10),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert_eq!(resolution.plan.ids(), &["core".to_string(), "ui".to_string()]);
    assert!(resolution.report.is_clean());
    let verdicts: Vec<_> = resolution.report.verdicts_for("ui").collect();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].state, ResolveState::Succeeded);
}

#[test]
fn test_version_too_low_excludes_dependent() {
    let descriptors = vec![
        plugin("core", "1.2.0", 10),
        plugin_with_deps("ui", 20, &[("core", "2.0")]),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert_eq!(resolution.plan.ids(), &["core".to_string()]);
    let failure = resolution.report.failure_for("ui").expect("ui must be reported");
    assert_eq!(failure.kind(), Some(FailureKind::UnsatisfiedDependency));
    assert_eq!(
        failure.causes[0].message,
        "dependency core requires version >= 2.0.0 but found 1.2.0"
    );

    let verdict = resolution.report.verdicts_for("ui").next().unwrap();
    assert_eq!(verdict.state, ResolveState::Failed);
    assert_eq!(verdict.cause, failure.causes[0].message);
}

#[test]
fn test_missing_dependency_is_reported() {
    let descriptors = vec![plugin_with_deps("ui", 20, &[("core", "1.0")])];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert!(resolution.plan.is_empty());
    assert_eq!(resolution.report.failed_ids(), vec!["ui"]);
    assert_eq!(
        resolution.report.failure_for("ui").unwrap().causes[0].message,
        "dependency core not found"
    );
}

#[test]
fn test_cycle_is_excluded_and_named() {
    let descriptors = vec![
        plugin_with_deps("a", 10, &[("b", "1.0")]),
        plugin_with_deps("b", 10, &[("a", "1.0")]),
        plugin("c", "1.0", 10),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert_eq!(resolution.plan.ids(), &["c".to_string()]);
    assert_eq!(resolution.report.cycles(), &[vec!["a".to_string(), "b".to_string()]]);
    for id in ["a", "b"] {
        let failure = resolution.report.failure_for(id).unwrap();
        assert!(failure.has_kind(FailureKind::CircularDependency), "{} not marked cyclic", id);
    }

    let errors = resolution.report.to_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        PluginSystemError::CircularDependency { members } if members == &["a".to_string(), "b".to_string()]
    ));
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let descriptors = vec![plugin_with_deps("loop", 10, &[("loop", "1.0")])];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert!(resolution.plan.is_empty());
    assert_eq!(resolution.report.cycles(), &[vec!["loop".to_string()]]);
}

#[test]
fn test_every_member_of_a_longer_cycle_is_reported() {
    let descriptors = vec![
        plugin_with_deps("a", 10, &[("b", "")]),
        plugin_with_deps("b", 10, &[("c", "")]),
        plugin_with_deps("c", 10, &[("a", "")]),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert!(resolution.plan.is_empty());
    assert_eq!(
        resolution.report.cycles(),
        &[vec!["a".to_string(), "b".to_string(), "c".to_string()]]
    );
    assert_eq!(resolution.report.failed_ids(), vec!["a", "b", "c"]);
}

#[test]
fn test_exclusion_is_transitive() {
    // app -> ui -> core(too old); tools -> app
    let descriptors = vec![
        plugin("core", "1.0", 10),
        plugin_with_deps("ui", 20, &[("core", "2.0")]),
        plugin_with_deps("app", 30, &[("ui", "1.0")]),
        plugin_with_deps("tools", 40, &[("app", "1.0")]),
        plugin("standalone", "1.0", 50),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert_eq!(
        resolution.plan.ids(),
        &["core".to_string(), "standalone".to_string()]
    );
    assert_eq!(resolution.report.failure_for("ui").unwrap().kind(), Some(FailureKind::UnsatisfiedDependency));
    for id in ["app", "tools"] {
        let failure = resolution.report.failure_for(id).unwrap();
        assert_eq!(failure.kind(), Some(FailureKind::ExcludedDependency), "{}", id);
    }
    assert_eq!(
        resolution.report.failure_for("app").unwrap().causes[0].message,
        "dependency ui is not resolvable"
    );
}

#[test]
fn test_dependents_of_a_cycle_are_excluded() {
    let descriptors = vec![
        plugin_with_deps("a", 10, &[("b", "")]),
        plugin_with_deps("b", 10, &[("a", "")]),
        plugin_with_deps("user", 10, &[("a", "")]),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    assert!(resolution.plan.is_empty());
    assert_eq!(
        resolution.report.failure_for("user").unwrap().kind(),
        Some(FailureKind::ExcludedDependency)
    );
    assert_eq!(resolution.report.cycles().len(), 1, "user is not a cycle member");
}

#[test]
fn test_ties_break_by_start_level_then_id() {
    let descriptors = vec![
        plugin("zeta", "1", 10),
        plugin("alpha", "1", 10),
        plugin("early", "1", 1),
        plugin("late", "1", 99),
        plugin_with_deps("mid", 50, &[("late", "")]),
    ];

    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    let ids: Vec<&str> = resolution.plan.iter().collect();
    assert_eq!(ids, vec!["early", "alpha", "zeta", "late", "mid"]);
    let reversed: Vec<&str> = resolution.plan.reversed().collect();
    assert_eq!(reversed, vec!["mid", "late", "zeta", "alpha", "early"]);
}

#[test]
fn test_resolution_is_deterministic() {
    let mut descriptors = vec![
        plugin("core", "1.2", 10),
        plugin_with_deps("ui", 5, &[("core", "1.0")]),
        plugin_with_deps("net", 10, &[("core", "1.0")]),
        plugin_with_deps("a", 30, &[("b", "")]),
        plugin_with_deps("b", 30, &[("a", "")]),
        plugin("log", "0.1", 1),
    ];

    let resolver = DependencyResolver::new();
    let first = resolver.resolve(&descriptors).unwrap();
    let again = resolver.resolve(&descriptors).unwrap();
    assert_eq!(first, again, "repeated passes over the same input");

    descriptors.reverse();
    let shuffled = resolver.resolve(&descriptors).unwrap();
    assert_eq!(first.plan, shuffled.plan, "input order does not matter");
    assert_eq!(first.report.failures(), shuffled.report.failures());
}

#[test]
fn test_duplicate_id_is_fatal() {
    let descriptors = vec![plugin("core", "1", 10), plugin("core", "2", 20)];

    let err = DependencyResolver::new().resolve(&descriptors).unwrap_err();
    assert!(matches!(err, PluginSystemError::DuplicateIdentity { plugin_id } if plugin_id == "core"));
}

#[test]
fn test_report_display_lists_causes() {
    let descriptors = vec![plugin_with_deps("ui", 20, &[("core", "1.0")])];
    let resolution = DependencyResolver::new().resolve(&descriptors).unwrap();

    let rendered = resolution.report.to_string();
    assert!(rendered.contains("plugin 'ui' cannot be resolved:"));
    assert!(rendered.contains("[unsatisfied dependency] dependency core not found"));

    let clean = DependencyResolver::new().resolve(&[plugin("core", "1", 1)]).unwrap();
    assert_eq!(clean.report.to_string(), "all plugins resolved");
}

//! End-to-end scenarios against static local-filesystem registry fixtures
//! under `tests/fixtures/registry/`, exercising the public `Engine` API
//! exactly the way a host application would.

use std::collections::HashMap;

use bzlresolve::config::{DirectDepsMode, YankedBehavior};
use bzlresolve::{Engine, ResolutionOptions};

fn fixture_registry(name: &str) -> String {
    format!("file://{}/tests/fixtures/registry/{name}", env!("CARGO_MANIFEST_DIR"))
}

/// Installs a `tracing` subscriber so `cargo test -- --nocapture` shows the
/// resolver's phase-level `debug!`/`info!` events. Safe to call from every
/// test: `try_init` no-ops once a global subscriber is already set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn options_for(registries: Vec<String>) -> ResolutionOptions {
    ResolutionOptions {
        registries,
        ..Default::default()
    }
}

#[tokio::test]
async fn diamond_resolves_bottom_to_highest_version() {
    init_tracing();
    let options = options_for(vec![fixture_registry("diamond")]);
    let engine = Engine::new(options);
    let root = r#"
        module(name = "root", version = "1.0.0")
        bazel_dep(name = "left", version = "1.0.0")
        bazel_dep(name = "right", version = "1.0.0")
    "#;

    let (list, graph) = engine.resolve_str(root, HashMap::new()).await.unwrap();

    assert_eq!(list.modules.len(), 3);
    assert_eq!(list.get("bottom").unwrap().version.as_str(), "2.0.0");
    assert_eq!(list.get("left").unwrap().version.as_str(), "1.0.0");
    assert_eq!(list.get("right").unwrap().version.as_str(), "1.0.0");

    assert!(!graph.has_cycles());
    assert_eq!(graph.stats().total, 3);
}

#[tokio::test]
async fn mutual_cycle_resolves_without_error() {
    init_tracing();
    let options = options_for(vec![fixture_registry("mutual")]);
    let engine = Engine::new(options);
    let root = r#"
        module(name = "root", version = "1.0.0")
        bazel_dep(name = "cycle_a", version = "1.0.0")
    "#;

    let (list, graph) = engine.resolve_str(root, HashMap::new()).await.unwrap();

    assert_eq!(list.modules.len(), 2);
    assert_eq!(list.get("cycle_a").unwrap().version.as_str(), "1.0.0");
    assert_eq!(list.get("cycle_b").unwrap().version.as_str(), "1.0.0");
    assert!(graph.has_cycles());
    assert_eq!(graph.find_cycles().len(), 1);
}

#[tokio::test]
async fn single_version_override_redirects_registry() {
    init_tracing();
    let override_registry = fixture_registry("single_version_override/override_registry");
    let options = options_for(vec![fixture_registry("single_version_override/primary")]);
    let engine = Engine::new(options);
    let root = format!(
        r#"
        module(name = "root", version = "1.0.0")
        bazel_dep(name = "rules_go", version = "0.41.0")
        single_version_override(module_name = "rules_go", version = "0.40.0", registry = "{override_registry}")
        "#
    );

    let (list, _graph) = engine.resolve_str(&root, HashMap::new()).await.unwrap();

    let rules_go = list.get("rules_go").unwrap();
    assert_eq!(rules_go.version.as_str(), "0.40.0");
    assert_eq!(rules_go.registry_url, override_registry);
}

#[tokio::test]
async fn yanked_version_is_substituted_with_matching_compat_level() {
    init_tracing();
    let mut options = options_for(vec![fixture_registry("yanked")]);
    options.substitute_yanked = true;
    options.check_yanked = true;
    options.yanked_behavior = YankedBehavior::Warn;
    let engine = Engine::new(options);
    let root = r#"
        module(name = "root", version = "1.0.0")
        bazel_dep(name = "m", version = "1.0.0")
    "#;

    let (list, _graph) = engine.resolve_str(root, HashMap::new()).await.unwrap();

    let m = list.get("m").unwrap();
    assert_eq!(m.version.as_str(), "1.1.0");
    assert!(!m.yanked);
}

#[tokio::test]
async fn direct_deps_mismatch_errors_when_configured() {
    init_tracing();
    let mut options = options_for(vec![fixture_registry("diamond")]);
    options.direct_deps_mode = DirectDepsMode::Error;
    let engine = Engine::new(options);
    let root = r#"
        module(name = "root", version = "1.0.0")
        bazel_dep(name = "left", version = "1.0.0")
        bazel_dep(name = "right", version = "1.0.0")
        bazel_dep(name = "bottom", version = "1.0.0")
    "#;

    let result = engine.resolve_str(root, HashMap::new()).await;
    assert!(result.is_err());
}

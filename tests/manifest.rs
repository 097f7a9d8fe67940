// ABOUTME: Tests for manifest parsing, validation, and filtering.
// ABOUTME: Exercises the YAML surface the CLI consumes.

mod support;

use armada::config::{Manifest, RunMode, StrategyKind};
use armada::error::Error;

const VALID: &str = r#"
env: dev
stacks:
  - name: hello
    strategy: blue-green
    capacity:
      min: 1
      desired: 2
      max: 4
    regions:
      - region: us-east-1
        instance_type: m5.large
        image: image-0123456789abcdef0
        subnets: [subnet-a, subnet-b]
        security_groups: [hello-sg]
        target_groups: [hello-tg]
        load_balancer: hello-lb
  - name: tail
    strategy: rolling-update
    capacity:
      min: 2
      desired: 2
      max: 6
    rolling_step: 2
    regions:
      - region: eu-west-1
        instance_type: c5.large
        image: image-0123456789abcdef0
        target_groups: [tail-tg]
"#;

/// Test: a well-formed manifest parses with defaults filled in.
#[test]
fn valid_manifest_parses() {
    let manifest = Manifest::from_yaml(VALID).expect("manifest should parse");
    assert_eq!(manifest.env, "dev");
    assert_eq!(manifest.stacks.len(), 2);

    let hello = manifest.stacks.first();
    assert_eq!(hello.strategy, StrategyKind::BlueGreen);
    assert_eq!(hello.rolling_step, 1);

    let tail = manifest.stacks.iter().nth(1).unwrap();
    assert_eq!(tail.strategy, StrategyKind::RollingUpdate);
    assert_eq!(tail.rolling_step, 2);
}

/// Test: a capacity violating min <= desired <= max is rejected at load.
#[test]
fn inverted_capacity_is_rejected() {
    let yaml = VALID.replace("desired: 2\n      max: 4", "desired: 5\n      max: 4");
    assert!(matches!(
        Manifest::from_yaml(&yaml),
        Err(Error::InvalidManifest(_))
    ));
}

/// Test: every health-checked strategy needs at least one target group.
#[test]
fn missing_target_groups_are_rejected() {
    let yaml = VALID.replace("        target_groups: [hello-tg]\n", "");
    let err = Manifest::from_yaml(&yaml);
    assert!(matches!(err, Err(Error::InvalidManifest(_))));
}

/// Test: deploy-only does not require target groups.
#[test]
fn deploy_only_allows_missing_target_groups() {
    let yaml = VALID
        .replace("strategy: blue-green", "strategy: deploy-only")
        .replace("        target_groups: [hello-tg]\n", "");
    assert!(Manifest::from_yaml(&yaml).is_ok());
}

/// Test: duplicate stack names are rejected.
#[test]
fn duplicate_stack_names_are_rejected() {
    let yaml = VALID.replace("name: tail", "name: hello");
    assert!(matches!(
        Manifest::from_yaml(&yaml),
        Err(Error::InvalidManifest(_))
    ));
}

/// Test: an empty stack list is rejected.
#[test]
fn empty_stacks_are_rejected() {
    let yaml = "env: dev\nstacks: []\n";
    assert!(Manifest::from_yaml(yaml).is_err());
}

/// Test: the stack filter keeps the named stack and rejects unknown names.
#[test]
fn stack_filter_selects_or_fails() {
    let manifest = Manifest::from_yaml(VALID).unwrap();

    let filtered = manifest.for_stack("tail").expect("known stack");
    assert_eq!(filtered.stacks.len(), 1);
    assert_eq!(filtered.stacks.first().name.as_str(), "tail");

    assert!(matches!(
        manifest.for_stack("nope"),
        Err(Error::UnknownStack(_))
    ));
}

/// Test: a region filter naming a region no stack deploys to is a
/// configuration error caught before any provider call.
#[test]
fn unknown_region_filter_is_rejected() {
    let manifest = Manifest::from_yaml(VALID).unwrap();

    let mut options = support::quick_options();
    options.region = Some(support::region("ap-southeast-7"));
    let ctx = support::context(RunMode::Deploy, &options);

    assert!(matches!(
        ctx.validate_against(&manifest),
        Err(Error::UnknownRegion(_))
    ));

    let mut options = support::quick_options();
    options.region = Some(support::region("eu-west-1"));
    let ctx = support::context(RunMode::Deploy, &options);
    assert!(ctx.validate_against(&manifest).is_ok());
}

/// Test: the programmatic template carries the expected defaults.
#[test]
fn programmatic_template_defaults() {
    let manifest = Manifest::template();
    assert_eq!(manifest.stacks.first().strategy, StrategyKind::BlueGreen);
    assert!(manifest.stacks.first().capacity.validate().is_ok());
}

/// Test: the scaffolded template manifest round-trips through the parser.
#[test]
fn template_manifest_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    armada::config::init_manifest(dir.path(), Some("shiny"), false).unwrap();

    let manifest = Manifest::discover(dir.path()).expect("template should parse");
    assert_eq!(manifest.stacks.first().name.as_str(), "shiny");

    // Refuses to clobber without force.
    assert!(matches!(
        armada::config::init_manifest(dir.path(), None, false),
        Err(Error::AlreadyExists(_))
    ));
    assert!(armada::config::init_manifest(dir.path(), None, true).is_ok());
}

// ABOUTME: Tests for deterministic resource naming and version arithmetic.
// ABOUTME: Covers version monotonicity and canary marker parsing.

use armada::deploy::naming::{
    VERSION_LIMIT, canary_target_group_name, check_canary_version, group_name, next_version,
    parse_version, resource_prefix,
};
use armada::types::{RegionId, StackName};
use proptest::prelude::*;

fn prefix() -> String {
    let stack = StackName::new("hello").unwrap();
    let region = RegionId::new("ap-northeast-2").unwrap();
    resource_prefix(&stack, "dev", &region)
}

/// Test: the next version is always (max + 1) mod the version limit,
/// regardless of discovery order.
#[test]
fn next_version_follows_max_plus_one() {
    assert_eq!(next_version([2, 0, 7]), 8);
    assert_eq!(next_version([7, 0, 2]), 8);
    assert_eq!(next_version([999]), 0);
}

/// Test: with zero existing resources the version is 0.
#[test]
fn next_version_is_zero_for_empty_history() {
    assert_eq!(next_version(std::iter::empty()), 0);
}

/// Test: versions survive the name round trip.
#[test]
fn version_round_trips_through_names() {
    let p = prefix();
    for version in [0, 1, 42, 999] {
        let name = group_name(&p, version);
        assert_eq!(parse_version(&p, &name), Some(version));
    }
}

/// Test: names from a different stack prefix never parse.
#[test]
fn foreign_prefixes_are_ignored() {
    let p = prefix();
    assert_eq!(parse_version(&p, "other-dev_apnortheast2-v003"), None);
    assert_eq!(parse_version("other-dev_apnortheast2", &group_name(&p, 3)), None);
}

/// Test: the canary version is the maximum across a target-group set and
/// zero when only non-canary names are present.
#[test]
fn canary_version_is_max_across_set() {
    let arns = [
        "arn:cloud:balancing:us:targetgroup/app-dev_useast1/aa".to_string(),
        "arn:cloud:balancing:us:targetgroup/app-dev_useast1-canary-v001/bb".to_string(),
        "arn:cloud:balancing:us:targetgroup/app-dev_useast1-canary-v002/cc".to_string(),
    ];
    assert_eq!(check_canary_version(arns.iter().map(|s| s.as_str())), 2);

    let plain = ["arn:cloud:balancing:us:targetgroup/app-dev_useast1/aa"];
    assert_eq!(check_canary_version(plain), 0);
}

/// Test: canary target-group names parse back to their version.
#[test]
fn canary_names_round_trip() {
    let p = prefix();
    let name = canary_target_group_name(&p, 7);
    assert_eq!(check_canary_version([name.as_str()]), 7);
}

proptest! {
    /// Test: for any set of existing versions under the limit, the computed
    /// next version equals (max + 1) mod limit.
    #[test]
    fn next_version_monotonicity(versions in proptest::collection::vec(0u32..VERSION_LIMIT, 0..32)) {
        let expected = versions
            .iter()
            .max()
            .map(|max| (max + 1) % VERSION_LIMIT)
            .unwrap_or(0);
        prop_assert_eq!(next_version(versions), expected);
    }

    /// Test: parsing is the inverse of formatting for every version under
    /// the limit.
    #[test]
    fn parse_inverts_format(version in 0u32..VERSION_LIMIT) {
        let p = prefix();
        prop_assert_eq!(parse_version(&p, &group_name(&p, version)), Some(version));
    }
}

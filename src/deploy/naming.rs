// ABOUTME: Deterministic resource naming and version arithmetic.
// ABOUTME: Prefix scans discover related versions without external bookkeeping.

use crate::types::{RegionId, StackName};
use chrono::{DateTime, Utc};

/// Versions wrap at this modulus to bound resource-name length.
pub const VERSION_LIMIT: u32 = 1000;

/// Marker embedded in canary target-group names.
pub const CANARY_MARKER: &str = "-canary-v";

/// Tag key marking a group as a canary slice.
pub const CANARY_TAG: &str = "armada:canary";

/// Naming root shared by every versioned resource of a stack in a region:
/// `app-env_region`, with the region's hyphens collapsed.
pub fn resource_prefix(stack: &StackName, env: &str, region: &RegionId) -> String {
    format!("{}-{}_{}", stack, env, region.compact())
}

/// Versioned autoscaling group name: `prefix-vNNN`.
pub fn group_name(prefix: &str, version: u32) -> String {
    format!("{prefix}-v{version:03}")
}

/// Launch template name: the group name with a time suffix, so template
/// rotation within one group version stays collision-free. The suffix
/// carries nanoseconds; rotations can land inside the same second.
pub fn template_name(group: &str, at: DateTime<Utc>) -> String {
    format!("{group}-{}", at.format("%Y%m%d%H%M%S%f"))
}

/// Parse the version out of a group name sharing `prefix`.
pub fn parse_version(prefix: &str, name: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?.strip_prefix("-v")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// The version the next resource gets: `(max(existing) + 1) mod 1000`,
/// zero when nothing exists yet.
pub fn next_version(existing: impl IntoIterator<Item = u32>) -> u32 {
    existing
        .into_iter()
        .max()
        .map(|max| (max + 1) % VERSION_LIMIT)
        .unwrap_or(0)
}

/// Canary target-group name: `prefix-canary-vNNN`.
pub fn canary_target_group_name(prefix: &str, version: u32) -> String {
    format!("{prefix}{CANARY_MARKER}{version:03}")
}

/// Name of the dedicated canary security group for a stack/region.
pub fn canary_security_group_name(prefix: &str) -> String {
    format!("{prefix}-canary")
}

/// Name of the dedicated canary load balancer for a stack/region.
pub fn canary_load_balancer_name(prefix: &str) -> String {
    format!("{prefix}-canary-lb")
}

/// Parse the canary version out of a target-group name or ARN.
///
/// ARNs carry the name as a path segment
/// (`.../targetgroup/app-dev_region-canary-v002/6d0e...`), so digits are
/// taken up to the first non-digit character after the marker.
pub fn parse_canary_version(value: &str) -> Option<u32> {
    let at = value.rfind(CANARY_MARKER)?;
    let rest = &value[at + CANARY_MARKER.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Maximum canary version observed across a target-group set, zero when no
/// canary marker is present.
pub fn check_canary_version<'a>(values: impl IntoIterator<Item = &'a str>) -> u32 {
    values
        .into_iter()
        .filter_map(parse_canary_version)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix() -> String {
        let stack = StackName::new("hello").unwrap();
        let region = RegionId::new("ap-northeast-2").unwrap();
        resource_prefix(&stack, "dev", &region)
    }

    #[test]
    fn prefix_collapses_region_hyphens() {
        assert_eq!(prefix(), "hello-dev_apnortheast2");
    }

    #[test]
    fn group_name_is_zero_padded() {
        assert_eq!(group_name(&prefix(), 7), "hello-dev_apnortheast2-v007");
    }

    #[test]
    fn parse_version_round_trips() {
        let p = prefix();
        assert_eq!(parse_version(&p, &group_name(&p, 12)), Some(12));
    }

    #[test]
    fn parse_version_rejects_foreign_names() {
        let p = prefix();
        assert_eq!(parse_version(&p, "other-dev_apnortheast2-v001"), None);
        assert_eq!(parse_version(&p, &format!("{p}-v01x")), None);
        assert_eq!(parse_version(&p, &format!("{p}-canary-v001")), None);
    }

    #[test]
    fn next_version_increments_max() {
        assert_eq!(next_version([0, 3, 1]), 4);
    }

    #[test]
    fn next_version_starts_at_zero() {
        assert_eq!(next_version([]), 0);
    }

    #[test]
    fn next_version_wraps_at_limit() {
        assert_eq!(next_version([VERSION_LIMIT - 1]), 0);
    }

    #[test]
    fn canary_version_from_arn() {
        let arns = [
            "arn:cloud:balancing:ap-northeast-2:targetgroup/hello-dev_apnortheast2/4f",
            "arn:cloud:balancing:ap-northeast-2:targetgroup/hello-dev_apnortheast2-canary-v001/5a",
            "arn:cloud:balancing:ap-northeast-2:targetgroup/hello-dev_apnortheast2-canary-v002/6b",
        ];
        assert_eq!(check_canary_version(arns), 2);
    }

    #[test]
    fn canary_version_zero_without_marker() {
        let arns = ["arn:cloud:balancing:ap-northeast-2:targetgroup/hello-dev_apnortheast2/4f"];
        assert_eq!(check_canary_version(arns), 0);
    }
}

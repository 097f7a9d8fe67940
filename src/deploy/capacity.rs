// ABOUTME: Capacity decision policy and rolling-update stepping arithmetic.
// ABOUTME: Decides which capacity a new group gets across the strategy modes.

use crate::config::{Capacity, StrategyKind};

/// Decide the capacity applied to the new (or promoted) group.
///
/// Priority:
/// 1. `force` applies the manifest-declared capacity for every mode.
/// 2. A canary slice that is not completing starts minimal, independent of
///    the manifest's full-scale intent.
/// 3. Everything else inherits the previously observed live capacity when
///    one was recorded for the region, falling back to the manifest.
pub fn decide_capacity(
    kind: StrategyKind,
    force: bool,
    completing_canary: bool,
    previous: Option<Capacity>,
    intended: Capacity,
) -> Capacity {
    if force {
        return intended;
    }

    match kind {
        StrategyKind::Canary if !completing_canary => Capacity::CANARY,
        _ => previous.unwrap_or(intended),
    }
}

/// One rolling-update increment: add `step` to each field, clamped per
/// field so the target is reached exactly and never overshot.
pub fn next_rolling_capacity(current: Capacity, target: Capacity, step: u32) -> Capacity {
    Capacity {
        min: (current.min + step).min(target.min),
        desired: (current.desired + step).min(target.desired),
        max: (current.max + step).min(target.max),
    }
}

/// One rolling-update decrement for a previous group, saturating at zero.
pub fn shrink_capacity(current: Capacity, step: u32) -> Capacity {
    Capacity {
        min: current.min.saturating_sub(step),
        desired: current.desired.saturating_sub(step),
        max: current.max.saturating_sub(step),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTENDED: Capacity = Capacity {
        min: 2,
        desired: 4,
        max: 8,
    };
    const PREVIOUS: Capacity = Capacity {
        min: 1,
        desired: 3,
        max: 6,
    };

    #[test]
    fn force_wins_for_every_mode() {
        for kind in [
            StrategyKind::BlueGreen,
            StrategyKind::Canary,
            StrategyKind::RollingUpdate,
            StrategyKind::DeployOnly,
        ] {
            for completing in [false, true] {
                assert_eq!(
                    decide_capacity(kind, true, completing, Some(PREVIOUS), INTENDED),
                    INTENDED
                );
            }
        }
    }

    #[test]
    fn blue_green_inherits_previous_capacity() {
        assert_eq!(
            decide_capacity(StrategyKind::BlueGreen, false, false, Some(PREVIOUS), INTENDED),
            PREVIOUS
        );
    }

    #[test]
    fn blue_green_falls_back_to_intended() {
        assert_eq!(
            decide_capacity(StrategyKind::BlueGreen, false, false, None, INTENDED),
            INTENDED
        );
    }

    #[test]
    fn canary_starts_minimal() {
        assert_eq!(
            decide_capacity(StrategyKind::Canary, false, false, Some(PREVIOUS), INTENDED),
            Capacity::CANARY
        );
    }

    #[test]
    fn completing_canary_restores_inherited_capacity() {
        assert_eq!(
            decide_capacity(StrategyKind::Canary, false, true, Some(PREVIOUS), INTENDED),
            PREVIOUS
        );
    }

    #[test]
    fn decisions_respect_the_capacity_invariant() {
        for kind in [
            StrategyKind::BlueGreen,
            StrategyKind::Canary,
            StrategyKind::RollingUpdate,
            StrategyKind::DeployOnly,
        ] {
            for force in [false, true] {
                for completing in [false, true] {
                    for previous in [None, Some(PREVIOUS)] {
                        let decided = decide_capacity(kind, force, completing, previous, INTENDED);
                        assert!(decided.validate().is_ok());
                    }
                }
            }
        }
    }

    #[test]
    fn stepping_clamps_each_field_to_target() {
        let start = Capacity::ZERO;
        let stepped = next_rolling_capacity(start, INTENDED, 3);
        assert_eq!(
            stepped,
            Capacity {
                min: 2,
                desired: 3,
                max: 3
            }
        );

        let again = next_rolling_capacity(stepped, INTENDED, 3);
        assert_eq!(
            again,
            Capacity {
                min: 2,
                desired: 4,
                max: 6
            }
        );
    }

    #[test]
    fn shrinking_saturates_at_zero() {
        let shrunk = shrink_capacity(Capacity { min: 1, desired: 2, max: 2 }, 3);
        assert_eq!(shrunk, Capacity::ZERO);
    }
}

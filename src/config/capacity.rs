// ABOUTME: Capacity triple for autoscaling groups.
// ABOUTME: Enforces the min <= desired <= max invariant at manifest load.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("capacity min ({min}) exceeds desired ({desired})")]
    MinAboveDesired { min: u32, desired: u32 },

    #[error("capacity desired ({desired}) exceeds max ({max})")]
    DesiredAboveMax { desired: u32, max: u32 },
}

/// Min/desired/max instance counts for one autoscaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

impl Capacity {
    /// The degenerate capacity used to drain a group before deletion.
    pub const ZERO: Capacity = Capacity {
        min: 0,
        desired: 0,
        max: 0,
    };

    /// The minimal capacity a canary slice starts at, independent of the
    /// manifest's full-scale intent.
    pub const CANARY: Capacity = Capacity {
        min: 1,
        desired: 1,
        max: 1,
    };

    pub fn new(min: u32, desired: u32, max: u32) -> Result<Self, CapacityError> {
        let capacity = Capacity { min, desired, max };
        capacity.validate()?;
        Ok(capacity)
    }

    pub fn validate(&self) -> Result<(), CapacityError> {
        if self.min > self.desired {
            return Err(CapacityError::MinAboveDesired {
                min: self.min,
                desired: self.desired,
            });
        }
        if self.desired > self.max {
            return Err(CapacityError::DesiredAboveMax {
                desired: self.desired,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.min, self.desired, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_capacity_passes() {
        assert!(Capacity::new(1, 2, 4).is_ok());
        assert!(Capacity::new(0, 0, 0).is_ok());
        assert!(Capacity::new(2, 2, 2).is_ok());
    }

    #[test]
    fn min_above_desired_rejected() {
        assert!(matches!(
            Capacity::new(3, 2, 4),
            Err(CapacityError::MinAboveDesired { .. })
        ));
    }

    #[test]
    fn desired_above_max_rejected() {
        assert!(matches!(
            Capacity::new(1, 5, 4),
            Err(CapacityError::DesiredAboveMax { .. })
        ));
    }
}

//! Tunable simulation parameters.
//!
//! [`Params`] holds the current values; [`ParamsPatch`] is the explicit
//! optional-field representation used for runtime updates. The historical
//! wire contract treats an exact `0.0` as "leave unchanged";
//! [`ParamsPatch::from_sentinel`] maps that shape onto the options so the
//! core never has to reason about sentinels itself.

use serde::{Deserialize, Serialize};

/// Current values of the tunable simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Reservoir decay rate (per unit of simulated time, >= 0).
    pub viscosity: f64,
    /// Saturation limit above which the corrective meta entity is born.
    pub limit: f64,
    /// Simulated time advanced per tick.
    pub dt: f64,
}

/// A partial update to [`Params`]: `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamsPatch {
    /// New viscosity, if any.
    pub viscosity: Option<f64>,
    /// New saturation limit, if any.
    pub limit: Option<f64>,
    /// New time step, if any.
    pub dt: Option<f64>,
}

impl ParamsPatch {
    /// Build a patch from the legacy sentinel wire shape.
    ///
    /// An exact `0.0` field means "unchanged" in that shape, so it maps
    /// to `None`. There is deliberately no way to set a parameter to zero
    /// through this constructor; callers that need that build the patch
    /// directly.
    pub fn from_sentinel(params: Params) -> Self {
        // The sentinel contract is exact equality with 0.0, not an epsilon.
        #[allow(clippy::float_cmp)]
        let lift = |v: f64| if v == 0.0 { None } else { Some(v) };
        Self {
            viscosity: lift(params.viscosity),
            limit: lift(params.limit),
            dt: lift(params.dt),
        }
    }

    /// Whether the patch changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.viscosity.is_none() && self.limit.is_none() && self.dt.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_zero_maps_to_none() {
        let patch = ParamsPatch::from_sentinel(Params {
            viscosity: 0.0,
            limit: 0.9,
            dt: 0.0,
        });
        assert_eq!(patch.viscosity, None);
        assert_eq!(patch.limit, Some(0.9));
        assert_eq!(patch.dt, None);
    }

    #[test]
    fn all_zero_sentinel_is_empty() {
        let patch = ParamsPatch::from_sentinel(Params {
            viscosity: 0.0,
            limit: 0.0,
            dt: 0.0,
        });
        assert!(patch.is_empty());
    }

    #[test]
    fn patch_deserializes_with_missing_fields() {
        let patch: ParamsPatch = serde_json::from_str(r#"{"limit": 0.9}"#).unwrap();
        assert_eq!(patch.limit, Some(0.9));
        assert!(patch.viscosity.is_none());
        assert!(patch.dt.is_none());
    }
}

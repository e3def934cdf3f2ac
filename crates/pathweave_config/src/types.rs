//! The router settings struct and its validation rules.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Parameters of the negotiated-congestion router.
///
/// Every field has a default, so a TOML table only needs to name the values
/// it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Initial present-congestion factor `p`.
    pub present_congestion_factor: f64,
    /// Multiplier applied to `p` after every non-converged iteration.
    pub present_congestion_growth: f64,
    /// History factor `h` added per excess occupant of a congested wire.
    pub history_factor: f64,
    /// Whether site route-through connections may be used.
    pub allow_route_throughs: bool,
    /// Whether idle logic may be reused as VCC/GND sources.
    pub static_sources: bool,
    /// Initial tile radius for the static-source search.
    pub static_search_radius: u32,
    /// Radius increment per iteration for the static-source search.
    pub static_search_growth: u32,
    /// Upper bound on outer iterations before giving up on convergence.
    pub max_iterations: u32,
    /// Number of requests a wire can carry before it is congested.
    pub wire_capacity: u32,
    /// Base cost of a wire with no usage entry.
    pub base_wire_cost: f64,
    /// Segment cost of a pip that leaves the current tile.
    pub segment_cost: f64,
    /// Segment cost of a pip that stays within the current tile.
    pub same_tile_segment_cost: f64,
    /// Segment cost assigned to non-local static branches when reseeding.
    pub static_reuse_segment_cost: f64,
    /// Congestion cost assigned to non-local static branches when reseeding.
    pub static_reuse_congestion_cost: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            present_congestion_factor: 1.0,
            present_congestion_growth: 1.3,
            history_factor: 1.0,
            allow_route_throughs: false,
            static_sources: true,
            static_search_radius: 0,
            static_search_growth: 4,
            max_iterations: 50,
            wire_capacity: 1,
            base_wire_cost: 1.0,
            segment_cost: 1.0,
            same_tile_segment_cost: 0.65,
            static_reuse_segment_cost: 1.0,
            static_reuse_congestion_cost: 4.0,
        }
    }
}

impl RouterConfig {
    /// Checks that all values are usable by the router.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factors = [
            ("present_congestion_factor", self.present_congestion_factor),
            ("present_congestion_growth", self.present_congestion_growth),
            ("history_factor", self.history_factor),
            ("base_wire_cost", self.base_wire_cost),
            ("segment_cost", self.segment_cost),
            ("same_tile_segment_cost", self.same_tile_segment_cost),
            ("static_reuse_segment_cost", self.static_reuse_segment_cost),
            (
                "static_reuse_congestion_cost",
                self.static_reuse_congestion_cost,
            ),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    name,
                    format!("must be a finite non-negative number, got {value}"),
                ));
            }
        }
        if self.present_congestion_growth < 1.0 {
            return Err(ConfigError::invalid(
                "present_congestion_growth",
                format!("must be at least 1.0, got {}", self.present_congestion_growth),
            ));
        }
        if self.wire_capacity == 0 {
            return Err(ConfigError::invalid("wire_capacity", "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("max_iterations", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RouterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.wire_capacity, 1);
        assert!(!config.allow_route_throughs);
    }

    #[test]
    fn rejects_negative_factor() {
        let config = RouterConfig {
            history_factor: -0.5,
            ..RouterConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err}").contains("history_factor"));
    }

    #[test]
    fn rejects_nan() {
        let config = RouterConfig {
            base_wire_cost: f64::NAN,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_shrinking_growth() {
        let config = RouterConfig {
            present_congestion_growth: 0.9,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_capacity_and_cap() {
        let config = RouterConfig {
            wire_capacity: 0,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RouterConfig {
            max_iterations: 0,
            ..RouterConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

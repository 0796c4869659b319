// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bake configuration, loaded from defaults, environment variables or JSON.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vertex_bake_topology::{Color, DEFAULT_DUPLICATE_TOLERANCE_SQ};

use crate::error::{Error, Result};

/// Color channels that receive the occlusion value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BakeTarget {
    /// Grayscale occlusion in red, green and blue
    #[default]
    Rgb,
    /// Occlusion in alpha only, leaving authored base colors intact
    Alpha,
}

impl BakeTarget {
    /// Write `value` into the target channels of `color`
    #[inline]
    pub fn write(self, color: &mut Color, value: f32) {
        match self {
            BakeTarget::Rgb => {
                color.r = value;
                color.g = value;
                color.b = value;
            }
            BakeTarget::Alpha => color.a = value,
        }
    }
}

impl FromStr for BakeTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rgb" | "color" => Ok(BakeTarget::Rgb),
            "alpha" | "a" => Ok(BakeTarget::Alpha),
            other => Err(Error::configuration(format!("unknown bake target '{other}'"))),
        }
    }
}

/// When baked values reach the mesh snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPolicy {
    /// Publish the running result after every sample or pass. An aborted
    /// bake leaves the last published result in the mesh.
    #[default]
    Incremental,
    /// Work in a scratch buffer and publish once the bake completes. An
    /// aborted bake leaves the mesh colors untouched.
    Atomic,
}

impl FromStr for CommitPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(CommitPolicy::Incremental),
            "atomic" => Ok(CommitPolicy::Atomic),
            other => Err(Error::configuration(format!("unknown commit policy '{other}'"))),
        }
    }
}

/// Hemisphere sweep for the occlusion bake.
///
/// Sample `(h, r)` looks along a direction `height_angle(h)` radians above
/// the tangent plane, turned `rotation(r)` of a full revolution around the
/// normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepParams {
    pub height_angle_min: f32,
    pub height_angle_max: f32,
    pub height_steps: u32,
    pub rotation_steps: u32,
    /// Distance a ray origin is pushed along the vertex normal
    pub surface_offset: f32,
    pub target: BakeTarget,
}

impl Default for SweepParams {
    fn default() -> Self {
        Self {
            height_angle_min: 0.2,
            height_angle_max: 0.99,
            height_steps: 8,
            rotation_steps: 8,
            surface_offset: f32::EPSILON,
            target: BakeTarget::Rgb,
        }
    }
}

impl SweepParams {
    pub fn validate(&self) -> Result<()> {
        if self.height_steps == 0 {
            return Err(Error::configuration("height steps must be positive"));
        }
        if self.rotation_steps == 0 {
            return Err(Error::configuration("rotation steps must be positive"));
        }
        if self.height_steps.checked_mul(self.rotation_steps).is_none() {
            return Err(Error::configuration(format!(
                "{} x {} samples is too many",
                self.height_steps, self.rotation_steps
            )));
        }
        for (name, value) in [
            ("height angle min", self.height_angle_min),
            ("height angle max", self.height_angle_max),
            ("surface offset", self.surface_offset),
        ] {
            if !value.is_finite() {
                return Err(Error::configuration(format!("{name} must be finite, got {value}")));
            }
        }
        Ok(())
    }

    /// Total samples in one sweep
    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.height_steps * self.rotation_steps
    }

    /// Elevation of height step `h`, linear from min at `h = 0` towards max
    #[inline]
    pub fn height_angle(&self, h: u32) -> f32 {
        let t = h as f32 / self.height_steps as f32;
        self.height_angle_min + (self.height_angle_max - self.height_angle_min) * t
    }

    /// Rotation of step `r` as a fraction of a full turn
    #[inline]
    pub fn rotation(&self, r: u32) -> f32 {
        r as f32 / self.rotation_steps as f32
    }
}

/// Everything a bake needs besides geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    pub sweep: SweepParams,
    /// Squared distance below which two vertices count as duplicates
    pub duplicate_tolerance_sq: f32,
    /// Averaging passes per smoothing bake
    pub smooth_iterations: u32,
    /// Smooth the occlusion result once the sweep completes
    pub smooth_after_occlusion: bool,
    pub commit: CommitPolicy,
    /// Worker threads for data-parallel passes
    pub worker_threads: usize,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            sweep: SweepParams::default(),
            duplicate_tolerance_sq: DEFAULT_DUPLICATE_TOLERANCE_SQ,
            smooth_iterations: 1,
            smooth_after_occlusion: false,
            commit: CommitPolicy::Incremental,
            worker_threads: num_cpus::get(),
        }
    }
}

impl BakeConfig {
    /// Load configuration from `VERTEX_BAKE_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep: SweepParams {
                height_angle_min: env_or(
                    "VERTEX_BAKE_HEIGHT_ANGLE_MIN",
                    defaults.sweep.height_angle_min,
                ),
                height_angle_max: env_or(
                    "VERTEX_BAKE_HEIGHT_ANGLE_MAX",
                    defaults.sweep.height_angle_max,
                ),
                height_steps: env_or("VERTEX_BAKE_HEIGHT_STEPS", defaults.sweep.height_steps),
                rotation_steps: env_or("VERTEX_BAKE_ROTATION_STEPS", defaults.sweep.rotation_steps),
                surface_offset: env_or("VERTEX_BAKE_SURFACE_OFFSET", defaults.sweep.surface_offset),
                target: env_or("VERTEX_BAKE_TARGET", defaults.sweep.target),
            },
            duplicate_tolerance_sq: env_or(
                "VERTEX_BAKE_DUPLICATE_TOLERANCE_SQ",
                defaults.duplicate_tolerance_sq,
            ),
            smooth_iterations: env_or("VERTEX_BAKE_SMOOTH_ITERATIONS", defaults.smooth_iterations),
            smooth_after_occlusion: env_or(
                "VERTEX_BAKE_SMOOTH_AFTER_OCCLUSION",
                defaults.smooth_after_occlusion,
            ),
            commit: env_or("VERTEX_BAKE_COMMIT", defaults.commit),
            worker_threads: env_or("VERTEX_BAKE_WORKER_THREADS", defaults.worker_threads),
        }
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("invalid bake config JSON: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.sweep.validate()?;
        if !(self.duplicate_tolerance_sq.is_finite() && self.duplicate_tolerance_sq > 0.0) {
            return Err(Error::configuration(format!(
                "duplicate tolerance must be positive and finite, got {}",
                self.duplicate_tolerance_sq
            )));
        }
        if self.smooth_iterations == 0 {
            return Err(Error::configuration("smooth iterations must be positive"));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_match_the_reference_sweep() {
        let params = SweepParams::default();
        assert_eq!(params.sample_count(), 64);
        assert_relative_eq!(params.height_angle(0), 0.2);
        assert!(params.height_angle(params.height_steps - 1) < params.height_angle_max);
        assert_relative_eq!(params.rotation(4), 0.5);
        assert!(params.validate().is_ok());
        assert!(BakeConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_steps_are_rejected() {
        let params = SweepParams {
            height_steps: 0,
            ..SweepParams::default()
        };
        assert!(matches!(params.validate(), Err(Error::Configuration(_))));

        let params = SweepParams {
            rotation_steps: 0,
            ..SweepParams::default()
        };
        assert!(matches!(params.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let params = SweepParams {
            surface_offset: f32::NAN,
            ..SweepParams::default()
        };
        assert!(params.validate().is_err());

        let config = BakeConfig {
            duplicate_tolerance_sq: 0.0,
            ..BakeConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = BakeConfig::from_json(
            r#"{ "sweep": { "height_steps": 2, "target": "alpha" }, "commit": "atomic" }"#,
        )
        .unwrap();
        assert_eq!(config.sweep.height_steps, 2);
        assert_eq!(config.sweep.rotation_steps, 8);
        assert_eq!(config.sweep.target, BakeTarget::Alpha);
        assert_eq!(config.commit, CommitPolicy::Atomic);
        assert_eq!(config.smooth_iterations, 1);

        assert!(BakeConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn parse_enums() {
        assert_eq!("ALPHA".parse::<BakeTarget>().unwrap(), BakeTarget::Alpha);
        assert_eq!(" rgb ".parse::<BakeTarget>().unwrap(), BakeTarget::Rgb);
        assert!("uv".parse::<BakeTarget>().is_err());
        assert_eq!("atomic".parse::<CommitPolicy>().unwrap(), CommitPolicy::Atomic);
    }

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("VERTEX_BAKE_ROTATION_STEPS", "3");
        std::env::set_var("VERTEX_BAKE_TARGET", "alpha");
        std::env::set_var("VERTEX_BAKE_HEIGHT_STEPS", "not a number");
        let config = BakeConfig::from_env();
        std::env::remove_var("VERTEX_BAKE_ROTATION_STEPS");
        std::env::remove_var("VERTEX_BAKE_TARGET");
        std::env::remove_var("VERTEX_BAKE_HEIGHT_STEPS");

        assert_eq!(config.sweep.rotation_steps, 3);
        assert_eq!(config.sweep.target, BakeTarget::Alpha);
        assert_eq!(config.sweep.height_steps, 8);
    }

    #[test]
    fn write_targets_channels() {
        let mut color = Color::new(0.1, 0.2, 0.3, 0.4);
        BakeTarget::Alpha.write(&mut color, 0.9);
        assert_eq!(color, Color::new(0.1, 0.2, 0.3, 0.9));
        BakeTarget::Rgb.write(&mut color, 0.5);
        assert_eq!(color, Color::new(0.5, 0.5, 0.5, 0.9));
    }
}

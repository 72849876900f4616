//! Run parameters, simulation constants and the walker's body dimensions.

use crate::error::{Error, Result};
use crate::snapshot::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

// World.
pub const GRAVITY_Y: f32 = -10.0;
pub const GROUND_Y: f32 = 0.0;
pub const GROUND_HALF_EXTENTS: Vec2 = Vec2::new(25.0, 2.5);
pub const FRICTION_COEFF: f32 = 0.05;

// Joints, in radians and radians per second.
/// A full turn either way, so joints rotate freely.
pub const MIN_JOINT_ANGLE: f32 = -2.0 * PI;
pub const MAX_JOINT_ANGLE: f32 = 2.0 * PI;
pub const MAX_MOTOR_TORQUE: f32 = 1000.0;
pub const MIN_MOTOR_SPEED: f32 = -10.0;
pub const MAX_MOTOR_SPEED: f32 = 10.0;

// Search defaults.
pub const DEFAULT_POPULATION_SIZE: usize = 1000;
pub const DEFAULT_GENERATIONS: usize = 10;
pub const DEFAULT_SURVIVAL_RATIO: f32 = 0.3;
/// Ratio used when the configured survival ratio falls outside `(0, 1]`.
pub const FALLBACK_SURVIVAL_RATIO: f32 = 0.1;
pub const CROSSOVER_PROBABILITY: f32 = 0.8;
pub const MUTATION_PROBABILITY: f32 = 0.1;

/// Physical dimensions of a walker. Shared read-only by every walker in a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    pub head_half_extents: Vec2,
    pub upper_limb_half_extents: Vec2,
    pub lower_limb_half_extents: Vec2,
    pub density: f32,
    /// Every joint shares the same torque limit.
    pub max_torque: f32,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            head_half_extents: Vec2::new(2.0, 1.0),
            upper_limb_half_extents: Vec2::new(0.25, 1.0),
            lower_limb_half_extents: Vec2::new(0.25, 1.0),
            density: 1.0,
            max_torque: MAX_MOTOR_TORQUE,
        }
    }
}

/// Fixed-timestep settings for one simulated interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Physics updates per simulated second.
    pub hertz: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    /// Simulated seconds advanced by each evaluation.
    pub interval_seconds: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            hertz: 60.0,
            velocity_iterations: 10,
            position_iterations: 10,
            interval_seconds: 0.5,
        }
    }
}

impl SimParams {
    pub fn timestep(&self) -> f32 {
        1.0 / self.hertz
    }

    pub fn steps_per_interval(&self) -> usize {
        (self.interval_seconds * self.hertz) as usize
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub population_size: usize,
    /// Number of evaluate/select rounds, the initial population included.
    pub generations: usize,
    /// Fraction kept by each selection. Values outside `(0, 1]` fall back to
    /// [`FALLBACK_SURVIVAL_RATIO`].
    pub survival_ratio: f32,
    pub crossover_probability: f32,
    pub mutation_probability: f32,
    /// Seed of the run-level generator; per-slot generators derive from it.
    pub seed: u64,
    /// Worker threads; 0 lets rayon pick.
    pub workers: usize,
    /// Clamp freshly drawn genes into motor bounds instead of keeping the raw
    /// normal draw.
    pub clamp_initial_genes: bool,
    pub shape: ShapeConfig,
    pub sim: SimParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population_size: DEFAULT_POPULATION_SIZE,
            generations: DEFAULT_GENERATIONS,
            survival_ratio: DEFAULT_SURVIVAL_RATIO,
            crossover_probability: CROSSOVER_PROBABILITY,
            mutation_probability: MUTATION_PROBABILITY,
            seed: 42,
            workers: 0,
            clamp_initial_genes: false,
            shape: ShapeConfig::default(),
            sim: SimParams::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| Error::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(Error::Configuration(
                "population_size must be greater than 0".into(),
            ));
        }
        if self.generations == 0 {
            return Err(Error::Configuration(
                "generations must be greater than 0".into(),
            ));
        }
        if self.sim.velocity_iterations == 0 || self.sim.position_iterations == 0 {
            return Err(Error::Configuration(format!(
                "velocity_iterations and position_iterations must be at least 1 (got {} and {})",
                self.sim.velocity_iterations, self.sim.position_iterations
            )));
        }
        if !(self.sim.hertz > 0.0) || !(self.sim.interval_seconds > 0.0) {
            return Err(Error::Configuration(format!(
                "hertz and interval_seconds must be positive (got {} and {})",
                self.sim.hertz, self.sim.interval_seconds
            )));
        }
        Ok(())
    }

    /// The survival ratio actually used by selection.
    pub fn effective_survival_ratio(&self) -> f32 {
        clamp_survival_ratio(self.survival_ratio)
    }
}

/// Maps ratios outside `(0, 1]`, NaN included, to [`FALLBACK_SURVIVAL_RATIO`].
pub fn clamp_survival_ratio(ratio: f32) -> f32 {
    if ratio > 0.0 && ratio <= 1.0 {
        ratio
    } else {
        tracing::warn!(
            ratio,
            fallback = FALLBACK_SURVIVAL_RATIO,
            "survival ratio outside (0, 1], using fallback"
        );
        FALLBACK_SURVIVAL_RATIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_json_fills_defaults() {
        let json = r#"{
            "population_size": 12,
            "generations": 3,
            "sim": { "hertz": 120.0 }
        }"#;
        let cfg = RunConfig::from_json_str(json).expect("partial config should parse");
        assert_eq!(cfg.population_size, 12);
        assert_eq!(cfg.generations, 3);
        assert_eq!(cfg.survival_ratio, DEFAULT_SURVIVAL_RATIO);
        assert_eq!(cfg.sim.hertz, 120.0);
        assert_eq!(cfg.sim.velocity_iterations, 10);
        assert_eq!(cfg.shape, ShapeConfig::default());
    }

    #[test]
    fn zero_population_is_rejected() {
        let result = RunConfig::from_json_str(r#"{ "population_size": 0 }"#);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn zero_iteration_counts_are_rejected() {
        for json in [
            r#"{ "sim": { "velocity_iterations": 0 } }"#,
            r#"{ "sim": { "position_iterations": 0 } }"#,
        ] {
            let result = RunConfig::from_json_str(json);
            assert!(matches!(result, Err(Error::Configuration(_))), "{json}");
        }
    }

    #[test]
    fn survival_ratio_outside_unit_interval_falls_back() {
        assert_eq!(clamp_survival_ratio(0.3), 0.3);
        assert_eq!(clamp_survival_ratio(1.0), 1.0);
        assert_eq!(clamp_survival_ratio(0.0), FALLBACK_SURVIVAL_RATIO);
        assert_eq!(clamp_survival_ratio(-0.5), FALLBACK_SURVIVAL_RATIO);
        assert_eq!(clamp_survival_ratio(1.5), FALLBACK_SURVIVAL_RATIO);
        assert_eq!(clamp_survival_ratio(f32::NAN), FALLBACK_SURVIVAL_RATIO);
    }

    #[test]
    fn default_interval_is_thirty_steps() {
        let sim = SimParams::default();
        assert_eq!(sim.steps_per_interval(), 30);
        assert!((sim.timestep() - 1.0 / 60.0).abs() < 1e-9);
    }
}

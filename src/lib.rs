//! Evolves motor gaits for 2D jointed walkers.
//!
//! Each walker is a head with two two-segment legs driven by four joint
//! motors; its [`Chromosome`] is the four motor target speeds. Walkers are
//! simulated one interval per generation and children continue from the
//! exact kinematic state of a parent, rebuilt from its snapshot [`Lineage`].
//! See [`GenerationalGA`] for the search loop and [`evolve`] for a one-call run.

use rand::Rng;
use serde::{Deserialize, Serialize};

pub mod agent;
pub mod chromosome;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod physics;
pub mod snapshot;
pub mod trajectory;

pub use agent::Walker;
pub use chromosome::{Chromosome, Joint};
pub use config::{RunConfig, ShapeConfig, SimParams};
pub use error::{Error, Result};
pub use evaluator::IntervalEvaluator;
pub use snapshot::{AgentSnapshot, Lineage, Vec2};
pub use trajectory::TrajectoryStore;

/// Heritable motor settings. Defined by how they change, not by what they drive.
pub trait Genotype: Clone + Serialize + for<'de> Deserialize<'de> + Send + Sync {
    fn mutate<R: Rng>(&mut self, rng: &mut R, rate: f32);
    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self;
}

/// A live walker together with its last evaluated fitness.
#[derive(Debug)]
pub struct Phenotype {
    pub walker: Walker,
    pub fitness: f32,
}

impl Phenotype {
    /// Not yet evaluated; fitness is NaN so it ranks last.
    pub fn unevaluated(walker: Walker) -> Self {
        Self {
            walker,
            fitness: f32::NAN,
        }
    }

    pub fn genotype(&self) -> Chromosome {
        self.walker.motor_speeds()
    }
}

/// Advances walkers through simulated time and scores them.
pub trait Evaluator: Send + Sync {
    /// Advance the walker one interval, recording a snapshot.
    fn simulate(&self, walker: &mut Walker) -> Result<()>;

    fn fitness(&self, walker: &Walker) -> f32;

    fn evaluate(&self, walker: &mut Walker) -> Result<f32> {
        self.simulate(walker)?;
        Ok(self.fitness(walker))
    }
}

/// A search engine advanced one state transition at a time.
pub trait Evolver {
    /// Perform one transition of the engine's state machine.
    fn step<E: Evaluator>(&mut self, evaluator: &E) -> Result<()>;
    fn population(&self) -> &[Phenotype];
}

pub mod algorithms {
    pub mod generational;
}

pub use algorithms::generational::{GenerationalGA, RunReport, evolve};

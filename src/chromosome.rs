//! Motor-speed chromosomes and the operators that breed them.
//!
//! A [`Chromosome`] holds one target angular speed per [`Joint`]. Genes are
//! bounded by [`MIN_MOTOR_SPEED`] and [`MAX_MOTOR_SPEED`]: mutation discards any
//! proposal that would leave those bounds, and crossover only ever copies
//! parent genes, so offspring of in-bounds parents stay in bounds.
//!
//! Freshly drawn chromosomes are *not* clamped unless asked for (see
//! [`Chromosome::random_clamped`]); motors accept out-of-range targets, the
//! torque limit decides how fast the joint really turns.

use crate::Genotype;
use crate::config::{CROSSOVER_PROBABILITY, MAX_MOTOR_SPEED, MIN_MOTOR_SPEED, MUTATION_PROBABILITY};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Standard deviation of freshly drawn genes.
pub const INITIAL_GENE_STD: f32 = (MAX_MOTOR_SPEED - MIN_MOTOR_SPEED) / 2.0;
/// Standard deviation of a single mutation step.
pub const MUTATION_STEP_STD: f32 = MAX_MOTOR_SPEED / 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// -1 for left, +1 for right.
    pub fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// The four motorized joints of a walker. Upper joints attach a limb to the
/// head; lower joints are knees attaching the lower limb to the upper limb on
/// the same side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Joint {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl Joint {
    pub const COUNT: usize = 4;

    /// Parents come before their children.
    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::UpperLeft,
        Joint::UpperRight,
        Joint::LowerLeft,
        Joint::LowerRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_upper(self) -> bool {
        matches!(self, Joint::UpperLeft | Joint::UpperRight)
    }

    pub fn side(self) -> Side {
        match self {
            Joint::UpperLeft | Joint::LowerLeft => Side::Left,
            Joint::UpperRight | Joint::LowerRight => Side::Right,
        }
    }

    /// The joint whose distal limb this joint's proximal body is. `None` for
    /// upper joints, whose proximal body is the head.
    pub fn parent(self) -> Option<Joint> {
        match self {
            Joint::UpperLeft | Joint::UpperRight => None,
            Joint::LowerLeft => Some(Joint::UpperLeft),
            Joint::LowerRight => Some(Joint::UpperRight),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chromosome([f32; Joint::COUNT]);

impl Chromosome {
    pub const fn new(genes: [f32; Joint::COUNT]) -> Self {
        Self(genes)
    }

    pub fn genes(&self) -> [f32; Joint::COUNT] {
        self.0
    }

    /// Draws every gene from `Normal(0, INITIAL_GENE_STD)`.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(std::array::from_fn(|_| gaussian(rng, INITIAL_GENE_STD)))
    }

    /// Like [`Chromosome::random`], then clamped into motor bounds.
    pub fn random_clamped<R: Rng>(rng: &mut R) -> Self {
        let mut c = Self::random(rng);
        for gene in &mut c.0 {
            *gene = gene.clamp(MIN_MOTOR_SPEED, MAX_MOTOR_SPEED);
        }
        c
    }

    /// Perturbs every gene by `Normal(0, MUTATION_STEP_STD)`. A perturbation
    /// that would leave the motor bounds is dropped and that gene kept as is.
    pub fn mutated<R: Rng>(&self, rng: &mut R) -> Self {
        Self(std::array::from_fn(|i| {
            let gene = self.0[i];
            let proposal = gene + gaussian(rng, MUTATION_STEP_STD);
            if is_in_bounds(proposal) { proposal } else { gene }
        }))
    }

    pub fn is_in_bounds(&self) -> bool {
        self.0.iter().all(|&g| is_in_bounds(g))
    }
}

impl Index<Joint> for Chromosome {
    type Output = f32;

    fn index(&self, joint: Joint) -> &f32 {
        &self.0[joint.index()]
    }
}

impl IndexMut<Joint> for Chromosome {
    fn index_mut(&mut self, joint: Joint) -> &mut f32 {
        &mut self.0[joint.index()]
    }
}

impl Genotype for Chromosome {
    /// Whole-chromosome gate: with probability `rate` every gene gets a
    /// bounded perturbation, otherwise nothing changes.
    fn mutate<R: Rng>(&mut self, rng: &mut R, rate: f32) {
        if rng.random::<f32>() < rate {
            *self = self.mutated(rng);
        }
    }

    /// Uniform per-gene selection: each gene comes from `self` or `other` with
    /// probability 0.5, independently of the others.
    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        Self(std::array::from_fn(|i| {
            if rng.random_bool(0.5) {
                self.0[i]
            } else {
                other.0[i]
            }
        }))
    }
}

/// Probabilities of the two breeding operators.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorRates {
    pub crossover: f32,
    pub mutation: f32,
}

impl Default for OperatorRates {
    fn default() -> Self {
        Self {
            crossover: CROSSOVER_PROBABILITY,
            mutation: MUTATION_PROBABILITY,
        }
    }
}

/// A bred chromosome and which operators produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Offspring {
    pub chromosome: Chromosome,
    pub crossed: bool,
    pub mutated: bool,
}

/// Starts from `first`; crosses it with `second` with probability
/// `rates.crossover`, then mutates the result with probability `rates.mutation`.
pub fn breed<R: Rng>(
    first: &Chromosome,
    second: &Chromosome,
    rng: &mut R,
    rates: &OperatorRates,
) -> Offspring {
    let mut chromosome = *first;
    let crossed = rng.random::<f32>() < rates.crossover;
    if crossed {
        chromosome = first.crossover(second, rng);
    }
    let mutated = rng.random::<f32>() < rates.mutation;
    if mutated {
        chromosome = chromosome.mutated(rng);
    }
    Offspring {
        chromosome,
        crossed,
        mutated,
    }
}

fn is_in_bounds(gene: f32) -> bool {
    (MIN_MOTOR_SPEED..=MAX_MOTOR_SPEED).contains(&gene)
}

fn gaussian<R: Rng>(rng: &mut R, std_dev: f32) -> f32 {
    let z: f32 = rng.sample(StandardNormal);
    z * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_relation_follows_sides() {
        for joint in Joint::ALL {
            match joint.parent() {
                None => assert!(joint.is_upper()),
                Some(parent) => {
                    assert!(!joint.is_upper());
                    assert!(parent.is_upper());
                    assert_eq!(parent.side(), joint.side());
                    assert!(parent.index() < joint.index());
                }
            }
        }
    }

    #[test]
    fn chromosome_indexes_by_joint() {
        let mut c = Chromosome::new([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(c[Joint::UpperLeft], 1.0);
        assert_eq!(c[Joint::LowerRight], 4.0);
        c[Joint::LowerLeft] = -3.0;
        assert_eq!(c.genes(), [1.0, 2.0, -3.0, 4.0]);
    }

    #[test]
    fn chromosome_serializes_as_plain_array() {
        let c = Chromosome::new([1.0, -2.0, 0.5, 0.0]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, "[1.0,-2.0,0.5,0.0]");
    }
}

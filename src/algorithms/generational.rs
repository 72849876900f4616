//! Generational search over walker gaits.
//!
//! The engine is a small state machine driven by [`Evolver::step`]:
//!
//! ```text
//! Init -> EvaluateInitial -> Select -> { Breed -> Evaluate -> Select }* -> Done
//! ```
//!
//! Init, Evaluate and Breed run as parallel work over population slots on a
//! fixed-size worker pool (with the `parallel` feature). Randomness inside
//! parallel regions comes from per-slot [`Pcg64`] generators whose seeds are
//! drawn serially from the run generator, so a run is reproducible for a
//! given seed whatever the number of workers.
//!
//! Walkers own their physics worlds. Selection moves each discarded walker to
//! exactly one worker to be dropped; breeding only borrows survivor lineages
//! and drops the survivors once every offspring has been built.

use crate::chromosome::{Chromosome, OperatorRates, breed};
use crate::config::{RunConfig, clamp_survival_ratio};
use crate::error::{Error, Result};
use crate::snapshot::{AgentSnapshot, Lineage};
use crate::trajectory::TrajectoryStore;
use crate::{Evaluator, Evolver, IntervalEvaluator, Phenotype, Walker};
use rand::Rng;
use rand::prelude::SeedableRng;
use rand_pcg::Pcg64;
use serde::Serialize;
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Compare two f32 values, treating NaN as less than all other values.
/// This ensures NaN fitness individuals sort to the end (lowest priority).
fn cmp_f32_nan_last(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Number of survivors for a population of `len` at `ratio`: `floor(len * ratio)`.
pub fn survivor_count(len: usize, ratio: f32) -> usize {
    ((len as f32 * ratio) as usize).min(len)
}

/// Sorts `items` by descending fitness and splits off the top `ratio` of them.
///
/// Returns `(survivors, discarded)`. The sort is stable, so equal fitness keeps
/// the original order; NaN fitness ranks last. Ratios outside `(0, 1]` fall
/// back to [`crate::config::FALLBACK_SURVIVAL_RATIO`].
pub fn select_fittest<T, F>(mut items: Vec<T>, ratio: f32, fitness: F) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> f32,
{
    let ratio = clamp_survival_ratio(ratio);
    items.sort_by(|a, b| cmp_f32_nan_last(fitness(b), fitness(a)));
    let keep = survivor_count(items.len(), ratio);
    let discarded = items.split_off(keep);
    (items, discarded)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Init,
    EvaluateInitial,
    Select,
    Breed,
    Evaluate,
    Done,
}

/// What one evaluate/select round looked like.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub population: usize,
    pub survivors: usize,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    pub worst_fitness: f32,
    /// Time spent building this generation's walkers (init or breed).
    pub create_time: Duration,
    pub simulate_time: Duration,
}

/// Outcome of a finished run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub best_fitness: f32,
    pub best_chromosome: Chromosome,
    /// Full snapshot history of the best walker.
    pub best_lineage: Lineage,
    pub generations: usize,
    pub history: Vec<GenerationStats>,
    /// Averages over bred generations; the initial population is excluded.
    pub average_create_time: Duration,
    pub average_simulate_time: Duration,
    /// Set when the best trajectory could not be written.
    pub persist_warning: Option<String>,
}

pub struct GenerationalGA {
    population: Vec<Phenotype>,
    config: RunConfig,
    survival_ratio: f32,
    rates: OperatorRates,
    phase: Phase,
    /// Completed selections.
    generation: usize,
    rng: Pcg64,
    history: Vec<GenerationStats>,
    create_time: Duration,
    simulate_time: Duration,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl GenerationalGA {
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "parallel")]
        let pool = {
            let mut builder = rayon::ThreadPoolBuilder::new();
            if config.workers > 0 {
                builder = builder.num_threads(config.workers);
            }
            builder.build()?
        };

        Ok(Self {
            population: Vec::new(),
            survival_ratio: config.effective_survival_ratio(),
            rates: OperatorRates {
                crossover: config.crossover_probability,
                mutation: config.mutation_probability,
            },
            phase: Phase::Init,
            generation: 0,
            rng: Pcg64::seed_from_u64(config.seed),
            history: Vec::new(),
            create_time: Duration::ZERO,
            simulate_time: Duration::ZERO,
            config,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed selections.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn history(&self) -> &[GenerationStats] {
        &self.history
    }

    /// Top-ranked walker. Only meaningful right after a selection.
    pub fn best(&self) -> Option<&Phenotype> {
        self.population.first()
    }

    pub fn into_best(self) -> Option<Phenotype> {
        self.population.into_iter().next()
    }

    /// Steps until [`Phase::Done`] and reports the top-ranked survivor.
    pub fn run<E: Evaluator>(&mut self, evaluator: &E) -> Result<RunReport> {
        info!(
            population = self.config.population_size,
            generations = self.config.generations,
            survival_ratio = self.survival_ratio,
            "starting run"
        );
        while self.phase != Phase::Done {
            self.step(evaluator)?;
        }
        self.report()
    }

    pub fn report(&self) -> Result<RunReport> {
        let best = self
            .best()
            .ok_or_else(|| Error::Configuration("no walker survived to report".into()))?;
        let bred = self.history.get(1..).unwrap_or_default();
        let average = |time: fn(&GenerationStats) -> Duration| {
            if bred.is_empty() {
                Duration::ZERO
            } else {
                bred.iter().map(time).sum::<Duration>() / bred.len() as u32
            }
        };
        Ok(RunReport {
            best_fitness: best.fitness,
            best_chromosome: best.genotype(),
            best_lineage: best.walker.lineage().to_vec(),
            generations: self.generation,
            history: self.history.clone(),
            average_create_time: average(|s| s.create_time),
            average_simulate_time: average(|s| s.simulate_time),
            persist_warning: None,
        })
    }

    fn draw_seeds(&mut self, count: usize) -> Vec<u64> {
        (0..count).map(|_| self.rng.random::<u64>()).collect()
    }

    /// Fresh walkers at the rest layout, each driven by its own random chromosome.
    fn initialize(&mut self) -> Result<()> {
        let seeds = self.draw_seeds(self.config.population_size);
        let shape = &self.config.shape;
        let clamp = self.config.clamp_initial_genes;
        let spawn = |seed: u64| -> Result<Phenotype> {
            let mut rng = Pcg64::seed_from_u64(seed);
            let chromosome = if clamp {
                Chromosome::random_clamped(&mut rng)
            } else {
                Chromosome::random(&mut rng)
            };
            let mut walker = Walker::new(shape.clone())?;
            walker.set_motor_speeds(&chromosome)?;
            Ok(Phenotype::unevaluated(walker))
        };

        #[cfg(feature = "parallel")]
        let population = self
            .pool
            .install(|| seeds.into_par_iter().map(spawn).collect::<Result<Vec<_>>>())?;
        #[cfg(not(feature = "parallel"))]
        let population = seeds.into_iter().map(spawn).collect::<Result<Vec<_>>>()?;

        self.population = population;
        Ok(())
    }

    fn evaluate_population<E: Evaluator>(&mut self, evaluator: &E) -> Result<()> {
        let evaluate = |p: &mut Phenotype| -> Result<()> {
            p.fitness = evaluator.evaluate(&mut p.walker)?;
            Ok(())
        };

        #[cfg(feature = "parallel")]
        let result = {
            let population = &mut self.population;
            self.pool
                .install(|| population.par_iter_mut().try_for_each(evaluate))
        };
        #[cfg(not(feature = "parallel"))]
        let result = self.population.iter_mut().try_for_each(evaluate);

        result
    }

    /// Keeps the fittest `survival_ratio` of the population, best first, and
    /// records this round's statistics.
    fn select(&mut self) {
        let population = std::mem::take(&mut self.population);
        let evaluated = population.len();
        let stats = fitness_summary(&population);

        let (survivors, discarded) = select_fittest(population, self.survival_ratio, |p| p.fitness);
        self.release(discarded);
        self.population = survivors;

        let stats = GenerationStats {
            generation: self.generation,
            population: evaluated,
            survivors: self.population.len(),
            best_fitness: stats.0,
            mean_fitness: stats.1,
            worst_fitness: stats.2,
            create_time: std::mem::take(&mut self.create_time),
            simulate_time: std::mem::take(&mut self.simulate_time),
        };
        info!(
            generation = stats.generation,
            survivors = stats.survivors,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            worst = stats.worst_fitness,
            create_ms = stats.create_time.as_millis() as u64,
            simulate_ms = stats.simulate_time.as_millis() as u64,
            "generation selected"
        );
        self.history.push(stats);
    }

    /// Refills the population from the survivors. Each offspring is rebuilt
    /// from its first parent's lineage and driven by a bred chromosome.
    fn breed(&mut self) -> Result<()> {
        if self.population.is_empty() {
            return Err(Error::Configuration(
                "selection left no survivors to breed from".into(),
            ));
        }
        let seeds = self.draw_seeds(self.config.population_size);
        let survivors = std::mem::take(&mut self.population);
        let parents: Vec<(&[AgentSnapshot], Chromosome)> = survivors
            .iter()
            .map(|p| (p.walker.lineage(), p.genotype()))
            .collect();
        let rates = self.rates;

        let spawn = |seed: u64| -> Result<Phenotype> {
            let mut rng = Pcg64::seed_from_u64(seed);
            let first = rng.random_range(0..parents.len());
            let second = rng.random_range(0..parents.len());
            let offspring = breed(&parents[first].1, &parents[second].1, &mut rng, &rates);
            let mut walker = Walker::from_lineage(parents[first].0)?;
            walker.set_motor_speeds(&offspring.chromosome)?;
            Ok(Phenotype::unevaluated(walker))
        };

        #[cfg(feature = "parallel")]
        let offspring = self
            .pool
            .install(|| seeds.into_par_iter().map(spawn).collect::<Result<Vec<_>>>())?;
        #[cfg(not(feature = "parallel"))]
        let offspring = seeds.into_iter().map(spawn).collect::<Result<Vec<_>>>()?;

        drop(parents);
        self.release(survivors);
        self.population = offspring;
        Ok(())
    }

    /// Drops walkers, each in exactly one worker.
    fn release(&self, walkers: Vec<Phenotype>) {
        if walkers.is_empty() {
            return;
        }
        debug!(count = walkers.len(), "releasing walkers");
        #[cfg(feature = "parallel")]
        self.pool.install(|| walkers.into_par_iter().for_each(drop));
        #[cfg(not(feature = "parallel"))]
        drop(walkers);
    }
}

impl Evolver for GenerationalGA {
    fn step<E: Evaluator>(&mut self, evaluator: &E) -> Result<()> {
        debug!(phase = ?self.phase, generation = self.generation, "step");
        match self.phase {
            Phase::Init => {
                let start = Instant::now();
                self.initialize()?;
                self.create_time = start.elapsed();
                self.phase = Phase::EvaluateInitial;
            }
            Phase::EvaluateInitial | Phase::Evaluate => {
                let start = Instant::now();
                self.evaluate_population(evaluator)?;
                self.simulate_time = start.elapsed();
                self.phase = Phase::Select;
            }
            Phase::Select => {
                self.select();
                self.generation += 1;
                self.phase = if self.generation >= self.config.generations {
                    Phase::Done
                } else {
                    Phase::Breed
                };
            }
            Phase::Breed => {
                let start = Instant::now();
                self.breed()?;
                self.create_time = start.elapsed();
                self.phase = Phase::Evaluate;
            }
            Phase::Done => {}
        }
        Ok(())
    }

    fn population(&self) -> &[Phenotype] {
        &self.population
    }
}

/// (best, mean, worst) over finite fitness values; NaN when there are none.
fn fitness_summary(population: &[Phenotype]) -> (f32, f32, f32) {
    let finite: Vec<f32> = population
        .iter()
        .map(|p| p.fitness)
        .filter(|f| f.is_finite())
        .collect();
    if finite.is_empty() {
        return (f32::NAN, f32::NAN, f32::NAN);
    }
    let best = finite.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let worst = finite.iter().copied().fold(f32::INFINITY, f32::min);
    let mean = finite.iter().sum::<f32>() / finite.len() as f32;
    (best, mean, worst)
}

/// Runs a full search with an [`IntervalEvaluator`] and, if a store is given,
/// writes the best walker's lineage to it.
///
/// A failed write does not fail the run: it is logged and reported in
/// [`RunReport::persist_warning`].
pub fn evolve(config: RunConfig, store: Option<&TrajectoryStore>) -> Result<RunReport> {
    let evaluator = IntervalEvaluator::new(config.sim.clone());
    let mut ga = GenerationalGA::new(config)?;
    let mut report = ga.run(&evaluator)?;
    info!(
        best = report.best_fitness,
        chromosome = ?report.best_chromosome.genes(),
        "run finished"
    );

    if let Some(store) = store {
        match store.save(&report.best_lineage) {
            Ok(()) => info!(path = %store.path().display(), "best trajectory written"),
            Err(err) => {
                warn!(error = %err, "could not persist best trajectory");
                report.persist_warning = Some(err.to_string());
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_sorts_below_everything() {
        assert_eq!(cmp_f32_nan_last(f32::NAN, -1e9), Ordering::Less);
        assert_eq!(cmp_f32_nan_last(0.0, f32::NAN), Ordering::Greater);
        assert_eq!(cmp_f32_nan_last(f32::NAN, f32::NAN), Ordering::Equal);
    }

    #[test]
    fn survivor_count_floors_product() {
        assert_eq!(survivor_count(10, 0.3), 3);
        assert_eq!(survivor_count(10, 0.7), 7);
        assert_eq!(survivor_count(1000, 0.3), 300);
        assert_eq!(survivor_count(7, 0.5), 3);
        assert_eq!(survivor_count(3, 0.1), 0);
        assert_eq!(survivor_count(4, 1.0), 4);
        assert_eq!(survivor_count(97, 0.25), 24);
    }

    #[test]
    fn survivor_count_truncates_without_rounding_up() {
        // 0.99999994 is the largest f32 below 1.0.
        let ratio = 0.999_999_94_f32;
        assert_eq!(survivor_count(1, ratio), 0);
        assert_eq!(survivor_count(3, 1.0 / 3.0), 1);
        assert_eq!(survivor_count(0, 0.5), 0);
    }

    #[test]
    fn equal_fitness_keeps_original_order() {
        let items = vec![(0, 1.0), (1, 2.0), (2, 1.0), (3, 2.0)];
        let (kept, dropped) = select_fittest(items, 1.0, |&(_, f)| f);
        assert!(dropped.is_empty());
        let order: Vec<i32> = kept.iter().map(|&(i, _)| i).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn fitness_summary_ignores_nan() {
        let scored = |fitness: f32| -> Phenotype {
            let walker = Walker::new(crate::ShapeConfig::default()).unwrap();
            Phenotype { walker, fitness }
        };
        let population = vec![scored(1.0), scored(f32::NAN), scored(4.0)];
        let (best, mean, worst) = fitness_summary(&population);
        assert_eq!(best, 4.0);
        assert_eq!(worst, 1.0);
        assert!((mean - 2.5).abs() < 1e-6);

        let (best, _, _) = fitness_summary(&[scored(f32::NAN)]);
        assert!(best.is_nan());
    }
}

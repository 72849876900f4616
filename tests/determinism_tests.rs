use stride_genetics::{GenerationalGA, IntervalEvaluator, RunConfig, RunReport, SimParams};

fn run_with(workers: usize, seed: u64) -> RunReport {
    let config = RunConfig {
        population_size: 12,
        generations: 3,
        survival_ratio: 0.25,
        seed,
        workers,
        sim: SimParams {
            interval_seconds: 0.2,
            ..SimParams::default()
        },
        ..RunConfig::default()
    };
    let evaluator = IntervalEvaluator::new(config.sim.clone());
    let mut ga = GenerationalGA::new(config).unwrap();
    ga.run(&evaluator).unwrap()
}

#[test]
fn test_same_seed_same_result_across_worker_counts() {
    let single = run_with(1, 99);
    let several = run_with(4, 99);

    assert_eq!(single.best_chromosome, several.best_chromosome);
    assert_eq!(single.best_lineage, several.best_lineage);
    let per_generation = |r: &RunReport| {
        r.history
            .iter()
            .map(|s| (s.best_fitness, s.mean_fitness, s.worst_fitness))
            .collect::<Vec<_>>()
    };
    assert_eq!(per_generation(&single), per_generation(&several));
}

#[test]
fn test_different_seeds_diverge() {
    let a = run_with(2, 1);
    let b = run_with(2, 2);
    assert_ne!(a.best_chromosome, b.best_chromosome);
}

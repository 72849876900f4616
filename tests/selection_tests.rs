use stride_genetics::algorithms::generational::{Phase, select_fittest, survivor_count};
use stride_genetics::{
    AgentSnapshot, Chromosome, Error, Evolver, GenerationalGA, IntervalEvaluator, Joint,
    RunConfig, SimParams,
};

fn small_config(population_size: usize, generations: usize, survival_ratio: f32) -> RunConfig {
    RunConfig {
        population_size,
        generations,
        survival_ratio,
        workers: 2,
        sim: SimParams {
            interval_seconds: 0.1,
            ..SimParams::default()
        },
        ..RunConfig::default()
    }
}

// ============================================================================
// select_fittest
// ============================================================================

#[test]
fn test_cutoff_keeps_top_three_of_ten() {
    let fitness = vec![5.0, 3.0, 8.0, 1.0, 9.0, 2.0, 7.0, 4.0, 6.0, 0.0];
    let (survivors, discarded) = select_fittest(fitness, 0.3, |&f| f);
    assert_eq!(survivors, vec![9.0, 8.0, 7.0]);
    assert_eq!(discarded.len(), 7);
}

#[test]
fn test_survivors_dominate_discarded() {
    let fitness: Vec<f32> = (0..97).map(|i| ((i * 37) % 101) as f32 - 50.0).collect();
    let (survivors, discarded) = select_fittest(fitness, 0.25, |&f| f);
    assert_eq!(survivors.len(), survivor_count(97, 0.25));
    assert!(survivors.windows(2).all(|w| w[0] >= w[1]));
    let worst_kept = survivors.last().copied().unwrap();
    assert!(discarded.iter().all(|&d| d <= worst_kept));
}

#[test]
fn test_nan_fitness_ranks_last() {
    let fitness = vec![f32::NAN, 1.0, f32::NAN, 2.0];
    let (survivors, discarded) = select_fittest(fitness, 0.5, |&f| f);
    assert_eq!(survivors, vec![2.0, 1.0]);
    assert!(discarded.iter().all(|d| d.is_nan()));
}

#[test]
fn test_invalid_ratio_falls_back() {
    for ratio in [0.0, -0.5, 1.5, f32::NAN] {
        let (survivors, _) = select_fittest((0..20).map(|i| i as f32).collect(), ratio, |&f| f);
        assert_eq!(survivors, vec![19.0, 18.0], "ratio {ratio}");
    }
}

// ============================================================================
// Population size invariants
// ============================================================================

#[test]
fn test_population_sizes_through_phases() {
    let config = small_config(10, 3, 0.3);
    let mut ga = GenerationalGA::new(config).unwrap();
    let evaluator = IntervalEvaluator::new(ga.config().sim.clone());

    assert_eq!(ga.phase(), Phase::Init);
    ga.step(&evaluator).unwrap();
    assert_eq!(ga.phase(), Phase::EvaluateInitial);
    assert_eq!(ga.population().len(), 10);
    assert!(ga.population().iter().all(|p| p.fitness.is_nan()));

    ga.step(&evaluator).unwrap();
    assert_eq!(ga.phase(), Phase::Select);
    assert_eq!(ga.population().len(), 10);
    assert!(ga.population().iter().all(|p| p.fitness.is_finite()));

    ga.step(&evaluator).unwrap();
    assert_eq!(ga.phase(), Phase::Breed);
    assert_eq!(ga.population().len(), 3);
    assert_eq!(ga.generation(), 1);

    ga.step(&evaluator).unwrap();
    assert_eq!(ga.phase(), Phase::Evaluate);
    assert_eq!(ga.population().len(), 10);
    // Every child continues one of the survivors' lineages.
    assert!(ga.population().iter().all(|p| p.walker.lineage().len() == 2));

    ga.step(&evaluator).unwrap();
    ga.step(&evaluator).unwrap();
    assert_eq!(ga.population().len(), 3);
    let fitness: Vec<f32> = ga.population().iter().map(|p| p.fitness).collect();
    assert!(fitness.windows(2).all(|w| w[0] >= w[1]));

    while ga.phase() != Phase::Done {
        ga.step(&evaluator).unwrap();
    }
    assert_eq!(ga.generation(), 3);
    assert_eq!(ga.history().len(), 3);
    assert_eq!(ga.best().unwrap().walker.lineage().len(), 4);

    // Done is terminal.
    ga.step(&evaluator).unwrap();
    assert_eq!(ga.phase(), Phase::Done);
}

#[test]
fn test_children_continue_a_survivor_with_survivor_genes() {
    let config = RunConfig {
        mutation_probability: 0.0,
        crossover_probability: 1.0,
        ..small_config(12, 2, 0.25)
    };
    let mut ga = GenerationalGA::new(config).unwrap();
    let evaluator = IntervalEvaluator::new(ga.config().sim.clone());
    while ga.phase() != Phase::Breed {
        ga.step(&evaluator).unwrap();
    }

    let survivors: Vec<(Vec<AgentSnapshot>, Chromosome)> = ga
        .population()
        .iter()
        .map(|p| (p.walker.lineage().to_vec(), p.genotype()))
        .collect();
    assert_eq!(survivors.len(), 3);

    ga.step(&evaluator).unwrap();
    assert_eq!(ga.population().len(), 12);

    for child in ga.population() {
        let lineage = child.walker.lineage();
        let (last, history) = lineage.split_last().unwrap();
        let parent = survivors
            .iter()
            .find(|(parent, _)| {
                parent.len() == lineage.len()
                    && parent[..history.len()] == *history
                    && last.diff(parent.last().unwrap()).max_pose_error() < 1e-3
            })
            .expect("child lineage does not continue any survivor");
        let speeds = last.diff(parent.0.last().unwrap()).joint_speeds;
        assert!(speeds.iter().all(|&d| d < 1e-3), "{speeds:?}");

        let genes = child.genotype();
        for joint in Joint::ALL {
            assert!(
                survivors.iter().any(|(_, c)| c[joint] == genes[joint]),
                "gene {joint:?} = {} comes from no survivor",
                genes[joint]
            );
        }
    }
}

#[test]
fn test_run_reports_best_survivor() {
    let mut ga = GenerationalGA::new(small_config(8, 2, 0.5)).unwrap();
    let evaluator = IntervalEvaluator::new(ga.config().sim.clone());
    let report = ga.run(&evaluator).unwrap();

    assert_eq!(report.generations, 2);
    assert_eq!(report.best_lineage.len(), 3);
    assert_eq!(report.best_fitness, report.best_lineage.last().unwrap().head_center.x);
    assert_eq!(report.history.len(), 2);
    assert_eq!(report.history[0].population, 8);
    assert_eq!(report.history[0].survivors, 4);
    assert!(report.history.iter().all(|s| s.best_fitness >= s.worst_fitness));
    assert!(report.persist_warning.is_none());
}

#[test]
fn test_breeding_without_survivors_fails() {
    // floor(5 * 0.1) = 0 survivors.
    let mut ga = GenerationalGA::new(small_config(5, 2, 0.1)).unwrap();
    let evaluator = IntervalEvaluator::new(ga.config().sim.clone());
    let err = ga.run(&evaluator).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(matches!(
        GenerationalGA::new(small_config(0, 2, 0.3)),
        Err(Error::Configuration(_))
    ));
    assert!(matches!(
        GenerationalGA::new(small_config(4, 0, 0.3)),
        Err(Error::Configuration(_))
    ));
}

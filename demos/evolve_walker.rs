//! Evolves walker gaits and writes the best walker's trajectory.
//!
//! ```text
//! cargo run --release --example evolve_walker -- 1000 10 0.3
//! cargo run --release --example evolve_walker -- --config run.json
//! ```

use stride_genetics::{Error, Result, RunConfig, TrajectoryStore, evolve};
use tracing_subscriber::EnvFilter;

fn parse<T: std::str::FromStr>(arg: &str, name: &str) -> Result<T> {
    arg.parse()
        .map_err(|_| Error::Configuration(format!("{name} must be a number, got {arg:?}")))
}

fn config_from_args(args: &[String]) -> Result<RunConfig> {
    match args {
        [] => Ok(RunConfig::default()),
        [flag, path] if flag == "--config" => RunConfig::load(path),
        [population, generations, ratio] => {
            let config = RunConfig {
                population_size: parse(population, "population")?,
                generations: parse(generations, "generations")?,
                survival_ratio: parse(ratio, "ratio")?,
                ..RunConfig::default()
            };
            config.validate()?;
            Ok(config)
        }
        _ => Err(Error::Configuration(
            "usage: evolve_walker [population generations ratio | --config path]".into(),
        )),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = config_from_args(&args)?;

    println!(
        "Evolving {} walkers over {} generations...",
        config.population_size, config.generations
    );

    let store = TrajectoryStore::default();
    let report = evolve(config, Some(&store))?;

    println!("Best fitness: {:.3}", report.best_fitness);
    println!("Best motor speeds: {:?}", report.best_chromosome.genes());
    println!(
        "Average create time: {:?}, average simulate time: {:?}",
        report.average_create_time, report.average_simulate_time
    );
    match report.persist_warning {
        Some(warning) => println!("Trajectory not saved: {warning}"),
        None => println!("Trajectory written to {}", store.path().display()),
    }
    Ok(())
}

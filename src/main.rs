//! Nurse Routing GA - Command Line Interface
//!
//! Solves home healthcare routing instances with the genetic algorithm,
//! benchmarks it over several seeds and analyses instance files.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use nurse_routing_ga::benchmark::Benchmark;
use nurse_routing_ga::error::Result;
use nurse_routing_ga::ga::{
    self, GaConfig, GenerationReport, GeneticAlgorithm, LogObserver, RunObserver,
};
use nurse_routing_ga::genotype::Individual;
use nurse_routing_ga::instance::Instance;
use nurse_routing_ga::report::{self, SolutionArtifacts};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nurse-routing-ga")]
#[command(version = "1.0")]
#[command(about = "Genetic algorithm for home healthcare nurse routing")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        #[command(flatten)]
        params: GaArgs,

        /// Output directory for the solution artifacts
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Also render the route map as PNG
        #[arg(long)]
        png: bool,
    },

    /// Run the algorithm several times over consecutive seeds
    Benchmark {
        #[arg(short, long)]
        instance: PathBuf,

        #[command(flatten)]
        params: GaArgs,

        /// Number of runs
        #[arg(short, long, default_value = "10")]
        runs: usize,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },
}

/// Algorithm parameters; command line values override the config file
#[derive(clap::Args)]
struct GaArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    population: Option<usize>,

    #[arg(short, long)]
    generations: Option<usize>,

    /// Generations without valid improvement before stopping
    #[arg(long)]
    stagnation: Option<usize>,

    #[arg(long)]
    crossover_rate: Option<f64>,

    #[arg(long)]
    mutation_rate: Option<f64>,

    /// Crossover passes per generation
    #[arg(long)]
    repetitions: Option<usize>,

    #[arg(long, value_enum)]
    crossover: Option<Crossover>,

    #[arg(long, value_enum)]
    mutation: Option<Mutation>,

    #[arg(long, value_enum)]
    repair: Option<Repair>,

    #[arg(long, value_enum)]
    parents: Option<Parents>,

    #[arg(long, value_enum)]
    survivors: Option<Survivors>,

    /// Benchmark targets in percent, comma separated
    #[arg(long, value_delimiter = ',')]
    targets: Option<Vec<u32>>,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Worker threads, 0 for one per core
    #[arg(short, long)]
    threads: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Crossover {
    /// Cut the flattened plan at a route boundary
    RouteBoundary,
    /// Cut inside a route
    WithinRoute,
    /// Swap one whole route
    RouteSwap,
    /// Remove the donor route's patients and repair
    Redistribution,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Mutation {
    Relocate,
    Swap,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Repair {
    /// Cheapest insertion
    Greedy,
    /// Random position
    Stochastic,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Parents {
    Elitist,
    Roulette,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Survivors {
    Greedy,
    Distinct,
    SafeDistinct,
    ElitistDistinct,
    Crowding,
    GreedyCrowding,
}

impl GaArgs {
    fn into_config(self) -> Result<GaConfig> {
        let mut config = match &self.config {
            Some(path) => GaConfig::from_file(path)?,
            None => GaConfig::default(),
        };

        if let Some(v) = self.population {
            config.population_size = v;
        }
        if let Some(v) = self.generations {
            config.max_generations = v;
        }
        if let Some(v) = self.stagnation {
            config.max_stagnation = v;
        }
        if let Some(v) = self.crossover_rate {
            config.crossover_rate = v;
        }
        if let Some(v) = self.mutation_rate {
            config.mutation_rate = v;
        }
        if let Some(v) = self.repetitions {
            config.repetitions = v;
        }
        if let Some(v) = self.crossover {
            config.crossover = match v {
                Crossover::RouteBoundary => ga::CrossoverStrategy::RouteBoundarySlice,
                Crossover::WithinRoute => ga::CrossoverStrategy::WithinRouteSlice,
                Crossover::RouteSwap => ga::CrossoverStrategy::WholeRouteSwap,
                Crossover::Redistribution => ga::CrossoverStrategy::RoutePatientRedistribution,
            };
        }
        if let Some(v) = self.mutation {
            config.mutation = match v {
                Mutation::Relocate => ga::MutationStrategy::Relocate,
                Mutation::Swap => ga::MutationStrategy::Swap,
            };
        }
        if let Some(v) = self.repair {
            config.repair = match v {
                Repair::Greedy => ga::RepairStrategy::Greedy,
                Repair::Stochastic => ga::RepairStrategy::Stochastic,
            };
        }
        if let Some(v) = self.parents {
            config.parent_selection = match v {
                Parents::Elitist => ga::ParentSelection::Elitist,
                Parents::Roulette => ga::ParentSelection::Roulette,
            };
        }
        if let Some(v) = self.survivors {
            config.survivor_selection = match v {
                Survivors::Greedy => ga::SurvivorSelection::Greedy,
                Survivors::Distinct => ga::SurvivorSelection::DistinctGreedy,
                Survivors::SafeDistinct => ga::SurvivorSelection::SafeDistinctGreedy,
                Survivors::ElitistDistinct => ga::SurvivorSelection::ElitistDistinct,
                Survivors::Crowding => ga::SurvivorSelection::SimpleCrowding,
                Survivors::GreedyCrowding => ga::SurvivorSelection::GreedyCrowding,
            };
        }
        if let Some(v) = self.targets {
            config.benchmark_targets = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.threads {
            config.threads = v;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Progress bar over generations; saves an artifact set at every benchmark target
struct ProgressObserver {
    bar: ProgressBar,
    log: LogObserver,
    output: PathBuf,
    png: bool,
}

impl ProgressObserver {
    fn new(max_generations: usize, output: &Path, png: bool) -> Self {
        let bar = ProgressBar::new(max_generations as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            bar.set_style(style);
        }
        ProgressObserver {
            bar,
            log: LogObserver::default(),
            output: output.to_path_buf(),
            png,
        }
    }
}

impl RunObserver for ProgressObserver {
    fn on_generation(&mut self, report: &GenerationReport) {
        let show = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |f| f.to_string());
        self.bar.set_position(report.generation as u64);
        self.bar.set_message(format!(
            "best {} | valid {} | stagnation {}/{}",
            show(report.best_fitness),
            show(report.best_valid_fitness),
            report.stagnation,
            report.max_stagnation
        ));
        self.log.on_generation(report);
    }

    fn on_benchmark_target(&mut self, percent: u32, best_valid: &Individual, instance: &Instance) {
        self.log.on_benchmark_target(percent, best_valid, instance);
        let suffix = format!("_{}", percent);
        match SolutionArtifacts::save(&self.output, &suffix, best_valid, instance, self.png) {
            Ok(artifacts) => self.bar.println(format!(
                "Target {}% reached (fitness {}), saved {:?}",
                percent,
                best_valid.fitness(),
                artifacts.table
            )),
            Err(e) => log::error!("Failed to save artifacts for target {}%: {}", percent, e),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let outcome = match cli.command {
        Commands::Solve {
            instance,
            params,
            output,
            png,
        } => solve_instance(&instance, params, &output, png),
        Commands::Benchmark {
            instance,
            params,
            runs,
            output,
        } => run_benchmark(&instance, params, runs, &output),
        Commands::Analyze { instance } => analyze_instance(&instance),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn solve_instance(path: &Path, params: GaArgs, output: &Path, png: bool) -> Result<()> {
    println!("Loading instance from {:?}...", path);
    let instance = Instance::from_file(path)?;
    let config = params.into_config()?;
    log::debug!("{:?}", config);

    let mut observer = ProgressObserver::new(config.max_generations, output, png);
    let mut ga = GeneticAlgorithm::new(instance, config)?;
    let summary = ga.run(&mut observer)?;
    observer.bar.finish_and_clear();

    println!(
        "\nStopped after {} generations ({}) in {:.2}s",
        summary.generations,
        summary.reason,
        summary.elapsed.as_secs_f64()
    );
    if !summary.targets_reached.is_empty() {
        println!("Benchmark targets reached: {:?}", summary.targets_reached);
    }

    let instance = ga.instance();
    match (&summary.best_valid, &summary.best) {
        (Some(best_valid), _) => {
            println!("\n{}", report::solution_table(best_valid, instance));
            let artifacts = SolutionArtifacts::save(output, "", best_valid, instance, png)?;
            println!("Solution saved to {:?}", artifacts.genotype_json);
        }
        (None, Some(best)) => {
            println!("No valid plan found; best plan has fitness {}", best.fitness());
            SolutionArtifacts::save(output, "_invalid", best, instance, png)?;
        }
        (None, None) => println!("No plan found"),
    }
    Ok(())
}

fn run_benchmark(path: &Path, params: GaArgs, runs: usize, output: &Path) -> Result<()> {
    let instance = Instance::from_file(path)?;
    let config = params.into_config()?;
    std::fs::create_dir_all(output)?;

    println!(
        "Benchmarking {} over {} runs (seeds {}..{})...",
        instance.instance_name,
        runs,
        config.seed,
        config.seed + runs as u64
    );
    let mut benchmark = Benchmark::new();
    benchmark.run(&instance, &config, runs)?;

    let results_path = output.join(format!("{}_runs.csv", instance.instance_name));
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let summary_path = output.join(format!("{}_summary.csv", instance.instance_name));
    benchmark.export_summary_csv(&summary_path)?;
    println!("Summary exported to {:?}", summary_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join(format!("{}_report.txt", instance.instance_name));
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}

fn analyze_instance(path: &Path) -> Result<()> {
    let instance = Instance::from_file(path)?;

    let stats = instance.statistics();
    println!("========== Instance Analysis ==========\n");
    println!("{}", stats);

    println!(
        "Demand uses {:.2}% of the fleet capacity",
        stats.total_demand as f64 / stats.fleet_capacity.max(1) as f64 * 100.0
    );
    for percent in GaConfig::default().sorted_targets() {
        println!(
            "  Target {:>3}%: fitness <= {:.2}",
            percent,
            instance.benchmark_threshold(percent)
        );
    }
    Ok(())
}

//! Generational control loop.
//!
//! Each generation runs parent selection, repeated crossover (in parallel on
//! the engine's thread pool), survivor selection and best-individual
//! bookkeeping. The run ends on stagnation of the best valid fitness, at the
//! generation limit, or once every benchmark target has been reached.

use super::config::GaConfig;
use super::crossover::repeat_crossover;
use crate::error::{Result, SolverError};
use crate::genotype::Individual;
use crate::instance::Instance;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use statrs::statistics::Statistics;
use std::time::{Duration, Instant};

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationReason {
    /// The best valid fitness did not improve for `max_stagnation` generations
    Stagnation,
    /// `max_generations` generations were run
    MaxGenerations,
    /// Every benchmark target was reached
    BenchmarkTargetsReached,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TerminationReason::Stagnation => "stagnation",
            TerminationReason::MaxGenerations => "max generations",
            TerminationReason::BenchmarkTargetsReached => "benchmark targets reached",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Running,
    Terminated(TerminationReason),
}

/// Snapshot handed to the observer after every generation
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub generation: usize,
    pub max_generations: usize,
    pub elapsed: Duration,
    pub valid_count: usize,
    pub invalid_count: usize,
    /// Best fitness ever seen, valid or not
    pub best_fitness: Option<u64>,
    pub best_is_valid: bool,
    /// Best fitness ever seen among valid individuals
    pub best_valid_fitness: Option<u64>,
    /// Best per-round fitness so far
    pub best_last_round_fitness: Option<u64>,
    /// Best fitness in the current population
    pub population_best_fitness: u64,
    pub mean_fitness: f64,
    pub std_fitness: f64,
    /// Generations since the best valid fitness last improved
    pub stagnation: usize,
    pub max_stagnation: usize,
    /// Next pending benchmark target and its fitness threshold
    pub next_target: Option<(u32, f64)>,
}

/// Progress hooks called by [`GeneticAlgorithm::run`].
///
/// Observers cannot influence the run.
pub trait RunObserver {
    fn on_generation(&mut self, report: &GenerationReport);

    /// The best valid individual reached the `percent` target
    fn on_benchmark_target(&mut self, _percent: u32, _best_valid: &Individual, _instance: &Instance) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_generation(&mut self, _report: &GenerationReport) {}
}

/// Observer logging a progress line every `interval` generations
#[derive(Debug, Clone, Copy)]
pub struct LogObserver {
    interval: usize,
}

impl LogObserver {
    pub fn new(interval: usize) -> Self {
        LogObserver {
            interval: interval.max(1),
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        LogObserver::new(50)
    }
}

impl RunObserver for LogObserver {
    fn on_generation(&mut self, report: &GenerationReport) {
        if report.generation % self.interval != 0 {
            return;
        }
        log::info!(
            "[GA] Gen {}/{}  Best {:?} (valid: {})  Best valid {:?}  Valid/Invalid {}/{}  Mean {:.1} ± {:.1}  Elapsed {:.2}s",
            report.generation,
            report.max_generations,
            report.best_fitness,
            report.best_is_valid,
            report.best_valid_fitness,
            report.valid_count,
            report.invalid_count,
            report.mean_fitness,
            report.std_fitness,
            report.elapsed.as_secs_f64()
        );
        if report.stagnation > report.max_stagnation / 3 {
            log::debug!(
                "No valid improvement for {} generations, stopping in {}",
                report.stagnation,
                report.max_stagnation.saturating_sub(report.stagnation)
            );
        }
    }

    fn on_benchmark_target(&mut self, percent: u32, best_valid: &Individual, _instance: &Instance) {
        log::info!(
            "Reached benchmark target {}% with fitness {}",
            percent,
            best_valid.fitness()
        );
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub best: Option<Individual>,
    pub best_valid: Option<Individual>,
    pub generations: usize,
    pub elapsed: Duration,
    pub reason: TerminationReason,
    pub targets_reached: Vec<u32>,
}

/// Genetic Algorithm implementation
pub struct GeneticAlgorithm {
    config: GaConfig,
    instance: Instance,
    population: Vec<Individual>,
    population_size: usize,
    best: Option<Individual>,
    best_valid: Option<Individual>,
    best_last_round: Option<Individual>,
    rng: ChaCha8Rng,
    pool: rayon::ThreadPool,
    state: EngineState,
    generation: usize,
    stagnation: usize,
    pending_targets: Vec<u32>,
    targets_reached: Vec<u32>,
}

impl GeneticAlgorithm {
    pub fn new(instance: Instance, config: GaConfig) -> Result<Self> {
        config.validate()?;
        instance.validate()?;

        let population_size = config.effective_population_size();
        if population_size != config.population_size {
            log::warn!(
                "Population size {} is odd, using {}",
                config.population_size,
                population_size
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| SolverError::Config(format!("cannot build thread pool: {e}")))?;

        Ok(GeneticAlgorithm {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            pending_targets: config.sorted_targets(),
            config,
            instance,
            population: Vec::new(),
            population_size,
            best: None,
            best_valid: None,
            best_last_round: None,
            pool,
            state: EngineState::Initializing,
            generation: 0,
            stagnation: 0,
            targets_reached: Vec::new(),
        })
    }

    /// Fresh population built from deadline-ordered random assignments
    fn initialize_population(&mut self) {
        self.state = EngineState::Initializing;
        self.population = (0..self.population_size)
            .map(|_| Individual::random(&self.instance, &mut self.rng))
            .collect();
        self.generation = 0;
        self.stagnation = 0;
        self.update_bests();
    }

    /// Replace the population with the next generation
    fn evolve(&mut self) -> Result<()> {
        let seed: u64 = self.rng.gen();
        let params = self.config.breeding_params();
        let repetitions = self.config.repetitions;

        let pairs = self
            .config
            .parent_selection
            .select(&self.population, &mut self.rng)?;
        let instance = &self.instance;
        let (parents, offspring) = self
            .pool
            .install(|| repeat_crossover(&pairs, instance, &params, repetitions, seed))?;
        let next = self.config.survivor_selection.select(
            &self.population,
            &parents,
            offspring,
            self.population_size,
        )?;

        self.population = next;
        self.generation += 1;
        if self.update_bests() {
            self.stagnation = 0;
        } else {
            self.stagnation += 1;
        }
        Ok(())
    }

    /// Track the three bests on strict improvement; true when the best valid improved
    fn update_bests(&mut self) -> bool {
        fn improves(current: &Option<Individual>, candidate: &Individual) -> bool {
            current
                .as_ref()
                .map_or(true, |best| candidate.fitness() < best.fitness())
        }

        let Some(round_best) = self.population.iter().min_by_key(|i| i.fitness()) else {
            return false;
        };
        if improves(&self.best_last_round, round_best) {
            self.best_last_round = Some(round_best.clone());
        }
        if improves(&self.best, round_best) {
            self.best = Some(round_best.clone());
        }

        let valid_best = self
            .population
            .iter()
            .filter(|i| i.is_valid())
            .min_by_key(|i| i.fitness());
        match valid_best {
            Some(candidate) if improves(&self.best_valid, candidate) => {
                self.best_valid = Some(candidate.clone());
                true
            }
            _ => false,
        }
    }

    /// Notify the observer of every target the best valid fitness now meets.
    /// Returns true once no target is left.
    fn check_targets(&mut self, observer: &mut dyn RunObserver) -> bool {
        if self.pending_targets.is_empty() {
            return false;
        }
        let Some(best_valid) = &self.best_valid else {
            return false;
        };

        while let Some(&percent) = self.pending_targets.first() {
            if best_valid.fitness() as f64 > self.instance.benchmark_threshold(percent) {
                break;
            }
            observer.on_benchmark_target(percent, best_valid, &self.instance);
            self.pending_targets.remove(0);
            self.targets_reached.push(percent);
        }
        self.pending_targets.is_empty()
    }

    fn report(&self, elapsed: Duration) -> GenerationReport {
        let fitness: Vec<f64> = self.population.iter().map(|i| i.fitness() as f64).collect();
        let valid_count = self.population.iter().filter(|i| i.is_valid()).count();

        GenerationReport {
            generation: self.generation,
            max_generations: self.config.max_generations,
            elapsed,
            valid_count,
            invalid_count: self.population.len() - valid_count,
            best_fitness: self.best.as_ref().map(Individual::fitness),
            best_is_valid: self.best.as_ref().map_or(false, Individual::is_valid),
            best_valid_fitness: self.best_valid.as_ref().map(Individual::fitness),
            best_last_round_fitness: self.best_last_round.as_ref().map(Individual::fitness),
            population_best_fitness: Iterator::min(self.population.iter().map(Individual::fitness))
                .unwrap_or(0),
            mean_fitness: fitness.iter().mean(),
            std_fitness: fitness.iter().std_dev(),
            stagnation: self.stagnation,
            max_stagnation: self.config.max_stagnation,
            next_target: self
                .pending_targets
                .first()
                .map(|&p| (p, self.instance.benchmark_threshold(p))),
        }
    }

    /// Run the algorithm from a fresh population until a termination condition holds
    pub fn run(&mut self, observer: &mut dyn RunObserver) -> Result<RunSummary> {
        let start = Instant::now();
        self.pending_targets = self.config.sorted_targets();
        self.targets_reached.clear();
        self.best = None;
        self.best_valid = None;
        self.best_last_round = None;

        self.initialize_population();
        self.state = EngineState::Running;
        log::info!(
            "Running GA on {} ({} patients, population {}, seed {})",
            self.instance.instance_name,
            self.instance.num_patients(),
            self.population_size,
            self.config.seed
        );

        let reason = loop {
            if self.generation >= self.config.max_generations {
                break TerminationReason::MaxGenerations;
            }
            if let Err(e) = self.evolve() {
                log::error!("Generation {} aborted: {}", self.generation + 1, e);
                return Err(e);
            }
            observer.on_generation(&self.report(start.elapsed()));

            if self.stagnation >= self.config.max_stagnation {
                break TerminationReason::Stagnation;
            }
            if self.check_targets(observer) {
                break TerminationReason::BenchmarkTargetsReached;
            }
        };

        self.state = EngineState::Terminated(reason);
        let elapsed = start.elapsed();
        log::info!(
            "Terminated after {} generations ({}) in {:.2}s",
            self.generation,
            reason,
            elapsed.as_secs_f64()
        );

        Ok(RunSummary {
            best: self.best.clone(),
            best_valid: self.best_valid.clone(),
            generations: self.generation,
            elapsed,
            reason,
            targets_reached: self.targets_reached.clone(),
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn best(&self) -> Option<&Individual> {
        self.best.as_ref()
    }

    pub fn best_valid(&self) -> Option<&Individual> {
        self.best_valid.as_ref()
    }

    pub fn best_last_round(&self) -> Option<&Individual> {
        self.best_last_round.as_ref()
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::selection::SurvivorSelection;
    use crate::instance::tests::line_instance;

    fn small_config() -> GaConfig {
        GaConfig {
            population_size: 12,
            max_generations: 30,
            max_stagnation: 1000,
            repetitions: 2,
            threads: 2,
            benchmark_targets: Vec::new(),
            ..GaConfig::default()
        }
    }

    /// Records every report and target event.
    #[derive(Default)]
    struct Recorder {
        reports: Vec<GenerationReport>,
        targets: Vec<(u32, u64)>,
    }

    impl RunObserver for Recorder {
        fn on_generation(&mut self, report: &GenerationReport) {
            self.reports.push(report.clone());
        }

        fn on_benchmark_target(&mut self, percent: u32, best_valid: &Individual, _instance: &Instance) {
            self.targets.push((percent, best_valid.fitness()));
        }
    }

    #[test]
    fn test_runs_to_max_generations() {
        let mut ga = GeneticAlgorithm::new(line_instance(), small_config()).unwrap();
        let mut recorder = Recorder::default();
        let summary = ga.run(&mut recorder).unwrap();

        assert_eq!(summary.reason, TerminationReason::MaxGenerations);
        assert_eq!(summary.generations, 30);
        assert_eq!(recorder.reports.len(), 30);
        assert_eq!(ga.state(), EngineState::Terminated(TerminationReason::MaxGenerations));
        assert_eq!(ga.population().len(), 12);
    }

    #[test]
    fn test_bests_never_regress() {
        let mut ga = GeneticAlgorithm::new(line_instance(), small_config()).unwrap();
        let mut recorder = Recorder::default();
        ga.run(&mut recorder).unwrap();

        for window in recorder.reports.windows(2) {
            let (before, after) = (&window[0], &window[1]);
            assert!(after.best_fitness <= before.best_fitness);
            assert!(after.best_last_round_fitness <= before.best_last_round_fitness);
            if before.best_valid_fitness.is_some() {
                assert!(after.best_valid_fitness <= before.best_valid_fitness);
            }
        }
    }

    #[test]
    fn test_population_stays_complete() {
        let instance = line_instance();
        let ids = instance.patient_ids();
        let mut ga = GeneticAlgorithm::new(instance, small_config()).unwrap();
        ga.run(&mut NoopObserver).unwrap();
        assert!(ga
            .population()
            .iter()
            .all(|ind| ind.genotype().is_complete(&ids)));
    }

    #[test]
    fn test_stagnation_stops_the_run() {
        let config = GaConfig {
            max_generations: 10_000,
            max_stagnation: 5,
            ..small_config()
        };
        let mut ga = GeneticAlgorithm::new(line_instance(), config).unwrap();
        let summary = ga.run(&mut NoopObserver).unwrap();
        assert_eq!(summary.reason, TerminationReason::Stagnation);
        assert!(summary.generations < 10_000);
    }

    #[test]
    fn test_benchmark_targets_end_the_run() {
        // Every complete plan on the line instance costs at most 12, far below 100% above 1000.
        let mut instance = line_instance();
        instance.benchmark = 1000.0;
        let config = GaConfig {
            benchmark_targets: vec![10, 100, 50],
            ..small_config()
        };
        let mut ga = GeneticAlgorithm::new(instance, config).unwrap();
        let mut recorder = Recorder::default();
        let summary = ga.run(&mut recorder).unwrap();

        assert_eq!(summary.reason, TerminationReason::BenchmarkTargetsReached);
        assert_eq!(summary.generations, 1);
        assert_eq!(summary.targets_reached, vec![100, 50, 10]);
        assert_eq!(recorder.targets.len(), 3);
        assert!(summary.best_valid.is_some());
    }

    #[test]
    fn test_odd_population_is_rounded_up() {
        let config = GaConfig {
            population_size: 7,
            max_generations: 2,
            ..small_config()
        };
        let mut ga = GeneticAlgorithm::new(line_instance(), config).unwrap();
        ga.run(&mut NoopObserver).unwrap();
        assert_eq!(ga.population().len(), 8);
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = GaConfig {
            survivor_selection: SurvivorSelection::SimpleCrowding,
            repetitions: 3,
            ..small_config()
        };
        assert!(matches!(
            GeneticAlgorithm::new(line_instance(), config),
            Err(SolverError::Config(_))
        ));
    }

    #[test]
    fn test_simple_crowding_runs_without_oversampling() {
        let config = GaConfig {
            survivor_selection: SurvivorSelection::SimpleCrowding,
            repetitions: 1,
            max_generations: 5,
            ..small_config()
        };
        let mut ga = GeneticAlgorithm::new(line_instance(), config).unwrap();
        ga.run(&mut NoopObserver).unwrap();
        assert_eq!(ga.population().len(), 12);
    }

    #[test]
    fn test_same_seed_same_result() {
        let run = || {
            let mut ga = GeneticAlgorithm::new(line_instance(), small_config()).unwrap();
            let summary = ga.run(&mut NoopObserver).unwrap();
            summary.best.map(|b| b.genotype().clone())
        };
        assert_eq!(run(), run());
    }
}

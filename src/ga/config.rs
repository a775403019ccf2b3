//! Genetic algorithm configuration.

use super::crossover::{BreedingParams, CrossoverStrategy};
use super::mutation::MutationStrategy;
use super::repair::RepairStrategy;
use super::selection::{ParentSelection, SurvivorSelection};
use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Genetic Algorithm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    /// Population size, rounded up to even
    pub population_size: usize,
    /// Number of generations
    pub max_generations: usize,
    /// Maximum generations without improving the best valid fitness
    pub max_stagnation: usize,
    /// Crossover probability per parent pair
    pub crossover_rate: f64,
    /// Mutation probability per visit
    pub mutation_rate: f64,
    /// Crossover passes over the parent pairs per generation
    pub repetitions: usize,
    /// Crossover operator
    pub crossover: CrossoverStrategy,
    /// Mutation operator
    pub mutation: MutationStrategy,
    /// Repair of incomplete children
    pub repair: RepairStrategy,
    /// Parent selection method
    pub parent_selection: ParentSelection,
    /// Survivor selection method
    pub survivor_selection: SurvivorSelection,
    /// Percentages above the benchmark that end the run once all are reached
    pub benchmark_targets: Vec<u32>,
    /// Random seed
    pub seed: u64,
    /// Worker threads for offspring generation, 0 for one per core
    pub threads: usize,
}

impl Default for GaConfig {
    fn default() -> Self {
        GaConfig {
            population_size: 500,
            max_generations: 10_000,
            max_stagnation: 300,
            crossover_rate: 0.9,
            mutation_rate: 0.01,
            repetitions: 4,
            crossover: CrossoverStrategy::RoutePatientRedistribution,
            mutation: MutationStrategy::Relocate,
            repair: RepairStrategy::Greedy,
            parent_selection: ParentSelection::Roulette,
            survivor_selection: SurvivorSelection::SafeDistinctGreedy,
            benchmark_targets: vec![30, 20, 10, 5],
            seed: 42,
            threads: 0,
        }
    }
}

impl GaConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: GaConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations the engine cannot run
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SolverError::Config(msg));

        if self.population_size < 2 {
            return invalid(format!(
                "population size must be at least 2, got {}",
                self.population_size
            ));
        }
        if self.max_generations == 0 {
            return invalid("max generations must be at least 1".into());
        }
        if self.max_stagnation == 0 {
            return invalid("max stagnation must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return invalid(format!("crossover rate {} is outside [0, 1]", self.crossover_rate));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid(format!("mutation rate {} is outside [0, 1]", self.mutation_rate));
        }
        if self.repetitions == 0 {
            return invalid("repetitions must be at least 1".into());
        }
        if self.repetitions > 1 && !self.survivor_selection.supports_oversampling() {
            return invalid(format!(
                "{:?} survivor selection needs repetitions = 1, got {}",
                self.survivor_selection, self.repetitions
            ));
        }
        if let Some(target) = self.benchmark_targets.iter().find(|&&t| t > 100) {
            return invalid(format!("benchmark target {target}% is above 100%"));
        }
        Ok(())
    }

    /// Population size actually used: odd sizes are rounded up
    pub fn effective_population_size(&self) -> usize {
        self.population_size + self.population_size % 2
    }

    /// Benchmark targets from the loosest to the tightest
    pub fn sorted_targets(&self) -> Vec<u32> {
        let mut targets = self.benchmark_targets.clone();
        targets.sort_unstable_by(|a, b| b.cmp(a));
        targets.dedup();
        targets
    }

    pub fn breeding_params(&self) -> BreedingParams {
        BreedingParams {
            crossover: self.crossover,
            repair: self.repair,
            mutation: self.mutation,
            crossover_rate: self.crossover_rate,
            mutation_rate: self.mutation_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.population_size, 500);
        assert_eq!(config.benchmark_targets, vec![30, 20, 10, 5]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GaConfig =
            serde_json::from_str(r#"{ "population_size": 20, "survivor_selection": "greedy-crowding" }"#)
                .unwrap();
        assert_eq!(config.population_size, 20);
        assert_eq!(config.survivor_selection, SurvivorSelection::GreedyCrowding);
        assert_eq!(config.repetitions, 4);
    }

    #[test]
    fn test_rejects_bad_rates() {
        let mut config = GaConfig::default();
        config.mutation_rate = 1.5;
        assert!(matches!(config.validate(), Err(SolverError::Config(_))));
        config.mutation_rate = 0.01;
        config.crossover_rate = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_simple_crowding_with_oversampling() {
        let mut config = GaConfig::default();
        config.survivor_selection = SurvivorSelection::SimpleCrowding;
        assert!(config.validate().is_err());
        config.repetitions = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        let mut config = GaConfig::default();
        config.population_size = 1;
        assert!(config.validate().is_err());
        config.population_size = 10;
        config.repetitions = 0;
        assert!(config.validate().is_err());
        config.repetitions = 1;
        config.max_generations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_odd_population_rounds_up() {
        let mut config = GaConfig::default();
        config.population_size = 7;
        assert_eq!(config.effective_population_size(), 8);
        config.population_size = 8;
        assert_eq!(config.effective_population_size(), 8);
    }

    #[test]
    fn test_targets_sorted_loosest_first() {
        let mut config = GaConfig::default();
        config.benchmark_targets = vec![5, 30, 10, 30];
        assert_eq!(config.sorted_targets(), vec![30, 10, 5]);
    }
}

//! Genetic algorithm for the nurse routing problem.
//!
//! Operators are small strategy enums chosen through [`GaConfig`]:
//! - Crossover: route-boundary slice, within-route slice, whole-route swap,
//!   route-patient redistribution, each followed by greedy or random repair
//! - Mutation: element-wise relocation or swap
//! - Parent selection: elitist pairing or roulette without replacement
//! - Survivor selection: greedy, distinct, safe distinct, elitist, crowding

pub mod config;
pub mod crossover;
pub mod engine;
pub mod mutation;
pub mod repair;
pub mod selection;

pub use config::GaConfig;
pub use crossover::{crossover_pair, crossover_population, repeat_crossover, BreedingParams, CrossoverStrategy};
pub use engine::{
    EngineState, GenerationReport, GeneticAlgorithm, LogObserver, NoopObserver, RunObserver, RunSummary,
    TerminationReason,
};
pub use mutation::MutationStrategy;
pub use repair::RepairStrategy;
pub use selection::{hamming_distance, ParentSelection, SurvivorSelection};

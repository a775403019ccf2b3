//! Nurse Routing GA Library
//!
//! A genetic algorithm for the home healthcare routing problem: a fleet of
//! nurses leaves a shared depot, visits every patient inside its time window
//! and returns before the depot closes, without exceeding nurse capacity.
//!
//! # Features
//!
//! - Route-list genotype with penalty-based fitness (time windows, capacity, return time)
//! - Four crossover operators with greedy or stochastic repair
//! - Relocation and swap mutation
//! - Elitist and roulette parent selection
//! - Greedy, distinct, elitist and crowding survivor selection
//! - Parallel offspring generation with reproducible per-task random streams
//! - Benchmark targets, solution reports, SVG/PNG rendering and multi-seed benchmarking
//!
//! # Example
//!
//! ```no_run
//! use nurse_routing_ga::instance::Instance;
//! use nurse_routing_ga::ga::{GaConfig, GeneticAlgorithm, LogObserver};
//! use nurse_routing_ga::report;
//!
//! // Load instance
//! let instance = Instance::from_file("train_0.json").unwrap();
//!
//! // Evolve
//! let config = GaConfig { max_generations: 2000, ..GaConfig::default() };
//! let mut ga = GeneticAlgorithm::new(instance, config).unwrap();
//! let summary = ga.run(&mut LogObserver::default()).unwrap();
//!
//! if let Some(best) = &summary.best_valid {
//!     println!("{}", report::solution_table(best, ga.instance()));
//! }
//! ```

pub mod error;
pub mod instance;
pub mod genotype;
pub mod cost;
pub mod ga;
pub mod report;
pub mod benchmark;
pub mod visualization;

pub use error::{Result, SolverError};
pub use genotype::{Genotype, Individual};
pub use instance::Instance;

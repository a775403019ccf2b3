//! Benchmarking module.
//!
//! Repeats the genetic algorithm over consecutive seeds, records one result
//! per run and summarises them against the instance benchmark.

use crate::error::Result;
use crate::ga::{GaConfig, GeneticAlgorithm, NoopObserver};
use crate::instance::Instance;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs::File;
use std::path::Path;

/// Result of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Instance name
    pub instance: String,
    /// Seed of this run
    pub seed: u64,
    /// Generations actually run
    pub generations: usize,
    /// Best fitness, valid or not
    pub best_fitness: Option<u64>,
    /// Best valid fitness
    pub best_valid_fitness: Option<u64>,
    /// Gap of the best valid fitness to the benchmark, in percent
    pub gap_percent: Option<f64>,
    /// Wall-clock time in seconds
    pub time: f64,
    /// Why the run stopped
    pub termination: String,
    /// Benchmark targets reached during the run
    pub targets_reached: usize,
}

/// Aggregated statistics over all runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub instance: String,
    pub runs: usize,
    /// Runs that found at least one valid plan
    pub valid_runs: usize,
    pub best_fitness: Option<u64>,
    pub worst_fitness: Option<u64>,
    pub mean_fitness: Option<f64>,
    pub std_fitness: Option<f64>,
    pub median_gap: Option<f64>,
    pub mean_time: f64,
    pub mean_generations: f64,
}

/// Benchmarking engine
pub struct Benchmark {
    records: Vec<RunRecord>,
}

impl Default for Benchmark {
    fn default() -> Self {
        Self::new()
    }
}

impl Benchmark {
    pub fn new() -> Self {
        Benchmark {
            records: Vec::new(),
        }
    }

    /// Run the algorithm `runs` times with seeds `config.seed..config.seed + runs`
    pub fn run(&mut self, instance: &Instance, config: &GaConfig, runs: usize) -> Result<()> {
        for offset in 0..runs as u64 {
            let run_config = GaConfig {
                seed: config.seed + offset,
                ..config.clone()
            };
            let seed = run_config.seed;
            let mut ga = GeneticAlgorithm::new(instance.clone(), run_config)?;
            let summary = ga.run(&mut NoopObserver)?;

            let best_valid_fitness = summary.best_valid.as_ref().map(|b| b.fitness());
            let record = RunRecord {
                instance: instance.instance_name.clone(),
                seed,
                generations: summary.generations,
                best_fitness: summary.best.as_ref().map(|b| b.fitness()),
                best_valid_fitness,
                gap_percent: best_valid_fitness
                    .filter(|_| instance.benchmark > 0.0)
                    .map(|f| (f as f64 - instance.benchmark) / instance.benchmark * 100.0),
                time: summary.elapsed.as_secs_f64(),
                termination: summary.reason.to_string(),
                targets_reached: summary.targets_reached.len(),
            };
            log::info!(
                "Run {}/{} (seed {}): best valid {:?}, {} generations, {:.2}s",
                offset + 1,
                runs,
                seed,
                record.best_valid_fitness,
                record.generations,
                record.time
            );
            self.records.push(record);
        }
        Ok(())
    }

    /// Statistics over the best valid fitness of every run
    pub fn summary(&self) -> Option<BenchmarkSummary> {
        let first = self.records.first()?;

        let fitness: Vec<f64> = self
            .records
            .iter()
            .filter_map(|r| r.best_valid_fitness)
            .map(|f| f as f64)
            .collect();
        let mut gaps: Vec<OrderedFloat<f64>> = self
            .records
            .iter()
            .filter_map(|r| r.gap_percent)
            .map(OrderedFloat)
            .collect();
        gaps.sort();
        let median_gap = match gaps.len() {
            0 => None,
            n if n % 2 == 1 => Some(gaps[n / 2].0),
            n => Some((gaps[n / 2 - 1].0 + gaps[n / 2].0) / 2.0),
        };

        let valid_fitness = || self.records.iter().filter_map(|r| r.best_valid_fitness);
        Some(BenchmarkSummary {
            instance: first.instance.clone(),
            runs: self.records.len(),
            valid_runs: fitness.len(),
            best_fitness: Iterator::min(valid_fitness()),
            worst_fitness: Iterator::max(valid_fitness()),
            mean_fitness: (!fitness.is_empty()).then(|| fitness.iter().mean()),
            std_fitness: (fitness.len() > 1).then(|| fitness.iter().std_dev()),
            median_gap,
            mean_time: self.records.iter().map(|r| r.time).mean(),
            mean_generations: self.records.iter().map(|r| r.generations as f64).mean(),
        })
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export the summary as a single-row CSV
    pub fn export_summary_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        if let Some(summary) = self.summary() {
            writer.serialize(summary)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("     Nurse Routing GA Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str(&format!(
            "{:<8} {:>12} {:>12} {:>10} {:>12} {:>10}\n",
            "Seed", "Best", "Best valid", "Gap%", "Generations", "Time"
        ));
        report.push_str("-".repeat(70).as_str());
        report.push('\n');

        let show = |v: Option<u64>| v.map(|f| f.to_string()).unwrap_or_else(|| "-".to_string());
        for record in &self.records {
            let gap_str = record
                .gap_percent
                .map(|g| format!("{:.2}%", g))
                .unwrap_or_else(|| "-".to_string());
            report.push_str(&format!(
                "{:<8} {:>12} {:>12} {:>10} {:>12} {:>10.2}\n",
                record.seed,
                show(record.best_fitness),
                show(record.best_valid_fitness),
                gap_str,
                record.generations,
                record.time
            ));
        }
        report.push_str("-".repeat(70).as_str());
        report.push('\n');

        if let Some(summary) = self.summary() {
            report.push_str(&format!(
                "\n{}: {}/{} runs valid, best {}, worst {}",
                summary.instance,
                summary.valid_runs,
                summary.runs,
                show(summary.best_fitness),
                show(summary.worst_fitness)
            ));
            if let (Some(mean), Some(std)) = (summary.mean_fitness, summary.std_fitness) {
                report.push_str(&format!(", mean {:.2} ± {:.2}", mean, std));
            }
            if let Some(gap) = summary.median_gap {
                report.push_str(&format!(", median gap {:.2}%", gap));
            }
            report.push_str(&format!(", mean time {:.2}s\n", summary.mean_time));
        }

        report
    }

    /// Get all results
    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }
}

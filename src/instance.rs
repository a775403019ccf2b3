//! Module for parsing and representing nurse routing instances.
//!
//! Instances are JSON records holding a depot, a fleet of identical nurses,
//! the patients to visit (each with demand, time window and care time) and a
//! precomputed travel-time matrix where index 0 is the depot.

use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// The shared start and end point of every route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    /// Latest time a nurse may be back at the depot
    pub return_time: u32,
    /// X coordinate
    pub x_coord: f64,
    /// Y coordinate
    pub y_coord: f64,
}

/// A patient to be visited exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    /// X coordinate
    pub x_coord: f64,
    /// Y coordinate
    pub y_coord: f64,
    /// Demand counted against the nurse capacity
    pub demand: u32,
    /// Earliest time care may start
    pub start_time: u32,
    /// Latest time care must be finished
    pub end_time: u32,
    /// Duration of the visit
    pub care_time: u32,
}

/// Represents a complete nurse routing instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Name of the instance
    pub instance_name: String,
    /// Number of nurses (one route each)
    #[serde(rename = "nbr_nurses")]
    pub num_nurses: usize,
    /// Capacity of every nurse
    pub capacity_nurse: u32,
    /// Known reference cost, used for progress thresholds only
    pub benchmark: f64,
    /// The depot
    pub depot: Depot,
    /// Patients keyed by identifier (1..=n)
    pub patients: BTreeMap<usize, Patient>,
    /// Travel times indexed `[from][to]`, row and column 0 are the depot
    pub travel_times: Vec<Vec<f64>>,
}

impl Instance {
    /// Load and validate an instance from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let instance = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "Loaded instance {} from {}",
            instance.instance_name,
            path.as_ref().display()
        );
        Ok(instance)
    }

    /// Parse and validate an instance from any JSON reader
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let instance: Instance = serde_json::from_reader(reader)?;
        instance.validate()?;
        Ok(instance)
    }

    /// Check that the instance can be searched at all
    pub fn validate(&self) -> Result<()> {
        if self.num_nurses == 0 {
            return Err(SolverError::InvalidInstance("no nurses available".into()));
        }
        if self.patients.is_empty() {
            return Err(SolverError::InvalidInstance("no patients to visit".into()));
        }

        let n = self.patients.len();
        if let Some(bad) = self
            .patients
            .keys()
            .zip(1..=n)
            .find(|(&id, expected)| id != *expected)
        {
            return Err(SolverError::InvalidInstance(format!(
                "patient identifiers must be exactly 1..={n}, found {}",
                bad.0
            )));
        }

        if self.travel_times.len() != n + 1 {
            return Err(SolverError::InvalidInstance(format!(
                "travel matrix has {} rows, expected {}",
                self.travel_times.len(),
                n + 1
            )));
        }
        if let Some((row, _)) = self
            .travel_times
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != n + 1)
        {
            return Err(SolverError::InvalidInstance(format!(
                "travel matrix row {row} has the wrong length"
            )));
        }

        for (id, patient) in &self.patients {
            if patient.start_time > patient.end_time {
                return Err(SolverError::InvalidInstance(format!(
                    "patient {id} has time window [{}, {}]",
                    patient.start_time, patient.end_time
                )));
            }
        }

        Ok(())
    }

    /// Number of patients (the depot excluded)
    #[inline]
    pub fn num_patients(&self) -> usize {
        self.patients.len()
    }

    /// All patient identifiers in increasing order
    pub fn patient_ids(&self) -> Vec<usize> {
        self.patients.keys().copied().collect()
    }

    /// Travel time between two locations (0 is the depot)
    #[inline]
    pub fn travel_time(&self, from: usize, to: usize) -> f64 {
        self.travel_times[from][to]
    }

    /// Fitness value lying `percent` percent above the benchmark
    pub fn benchmark_threshold(&self, percent: u32) -> f64 {
        self.benchmark + self.benchmark / 100.0 * percent as f64
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let total_demand: u64 = self.patients.values().map(|p| p.demand as u64).sum();
        let total_care_time: u64 = self.patients.values().map(|p| p.care_time as u64).sum();

        let mut travel: Vec<f64> = Vec::new();
        for i in 0..self.travel_times.len() {
            for j in i + 1..self.travel_times.len() {
                travel.push(self.travel_time(i, j));
            }
        }
        let avg_travel_time = if travel.is_empty() {
            0.0
        } else {
            travel.iter().sum::<f64>() / travel.len() as f64
        };
        let max_travel_time = travel.iter().cloned().fold(0.0, f64::max);

        let widths = self
            .patients
            .values()
            .map(|p| p.end_time.saturating_sub(p.start_time));
        let narrowest_window = widths.clone().min().unwrap_or(0);
        let widest_window = widths.max().unwrap_or(0);

        InstanceStatistics {
            name: self.instance_name.clone(),
            num_patients: self.num_patients(),
            num_nurses: self.num_nurses,
            capacity_nurse: self.capacity_nurse,
            fleet_capacity: self.num_nurses as u64 * self.capacity_nurse as u64,
            total_demand,
            total_care_time,
            return_time: self.depot.return_time,
            benchmark: self.benchmark,
            avg_travel_time,
            max_travel_time,
            narrowest_window,
            widest_window,
        }
    }
}

/// Statistics about a nurse routing instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub num_patients: usize,
    pub num_nurses: usize,
    pub capacity_nurse: u32,
    pub fleet_capacity: u64,
    pub total_demand: u64,
    pub total_care_time: u64,
    pub return_time: u32,
    pub benchmark: f64,
    pub avg_travel_time: f64,
    pub max_travel_time: f64,
    pub narrowest_window: u32,
    pub widest_window: u32,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Patients: {}", self.num_patients)?;
        writeln!(f, "  Nurses: {} (capacity {} each)", self.num_nurses, self.capacity_nurse)?;
        writeln!(f, "  Total demand: {} / fleet capacity {}", self.total_demand, self.fleet_capacity)?;
        writeln!(f, "  Total care time: {}", self.total_care_time)?;
        writeln!(f, "  Depot return time: {}", self.return_time)?;
        writeln!(f, "  Benchmark: {:.2}", self.benchmark)?;
        writeln!(f, "  Avg travel time: {:.2}", self.avg_travel_time)?;
        writeln!(f, "  Max travel time: {:.2}", self.max_travel_time)?;
        writeln!(f, "  Time window width: {}..{}", self.narrowest_window, self.widest_window)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Three patients on a line, travel time equals index distance.
    pub(crate) fn line_instance() -> Instance {
        let mut patients = BTreeMap::new();
        for id in 1..=3 {
            patients.insert(
                id,
                Patient {
                    x_coord: id as f64,
                    y_coord: 0.0,
                    demand: 10,
                    start_time: 0,
                    end_time: 1000,
                    care_time: 5,
                },
            );
        }
        let travel_times = (0..4)
            .map(|i: i32| (0..4).map(|j: i32| (i - j).abs() as f64).collect())
            .collect();

        Instance {
            instance_name: "line".to_string(),
            num_nurses: 2,
            capacity_nurse: 100,
            benchmark: 10.0,
            depot: Depot {
                return_time: 1000,
                x_coord: 0.0,
                y_coord: 0.0,
            },
            patients,
            travel_times,
        }
    }

    #[test]
    fn test_parse_json_instance() {
        let json = r#"{
            "instance_name": "tiny",
            "nbr_nurses": 1,
            "capacity_nurse": 50,
            "benchmark": 12.5,
            "depot": { "return_time": 100, "x_coord": 0, "y_coord": 0 },
            "patients": {
                "1": { "x_coord": 1, "y_coord": 2, "demand": 3, "start_time": 0, "end_time": 50, "care_time": 4 },
                "2": { "x_coord": 5, "y_coord": 6, "demand": 7, "start_time": 10, "end_time": 60, "care_time": 8 }
            },
            "travel_times": [[0, 1, 2], [1, 0, 1.5], [2, 1.5, 0]]
        }"#;

        let instance = Instance::from_reader(json.as_bytes()).unwrap();
        assert_eq!(instance.num_nurses, 1);
        assert_eq!(instance.patient_ids(), vec![1, 2]);
        assert_eq!(instance.patients[&2].care_time, 8);
        assert!((instance.travel_time(1, 2) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_non_contiguous_ids() {
        let mut instance = line_instance();
        let patient = instance.patients.remove(&2).unwrap();
        instance.patients.insert(7, patient);
        assert!(matches!(instance.validate(), Err(SolverError::InvalidInstance(_))));
    }

    #[test]
    fn test_rejects_bad_matrix() {
        let mut instance = line_instance();
        instance.travel_times.pop();
        assert!(instance.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Instance::from_file("does/not/exist.json");
        assert!(matches!(result, Err(SolverError::Io(_))));
    }

    #[test]
    fn test_benchmark_threshold() {
        let instance = line_instance();
        assert!((instance.benchmark_threshold(30) - 13.0).abs() < 1e-9);
        assert!((instance.benchmark_threshold(0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistics() {
        let stats = line_instance().statistics();
        assert_eq!(stats.num_patients, 3);
        assert_eq!(stats.total_demand, 30);
        assert_eq!(stats.fleet_capacity, 200);
        assert!((stats.max_travel_time - 3.0).abs() < 1e-12);
    }
}

//! Solution reports and artifact export.
//!
//! Builds the per-nurse table, the route CSV and the genotype snapshot, and
//! writes them next to the SVG renderings.

use crate::cost::{self, RouteMetrics};
use crate::error::Result;
use crate::genotype::{Genotype, Individual};
use crate::instance::Instance;
use crate::visualization::Visualizer;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One row of the route CSV
#[derive(Debug, Clone, Serialize)]
pub struct RouteRecord {
    pub nurse: usize,
    pub route_duration: f64,
    pub travel_time: f64,
    pub covered_demand: u64,
    pub num_patients: usize,
    /// Patient identifiers in visit order, space separated
    pub patients: String,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `D (0) -> P3 (a-b) [s-e] -> ... -> D (duration)`, empty for an unused nurse
pub fn patient_sequence(route: &RouteMetrics) -> String {
    if route.visits.is_empty() {
        return String::new();
    }
    let mut parts = Vec::with_capacity(route.visits.len() + 2);
    parts.push("D (0)".to_string());
    parts.extend(route.visits.iter().map(|v| v.to_string()));
    parts.push(format!("D ({:.2})", route.duration));
    parts.join(" -> ")
}

/// Human-readable table: one row per nurse with route duration, covered
/// demand and the timed visit sequence, framed by the instance limits and
/// the objective value.
///
/// Route duration is the time the nurse is back at the depot, waits and care
/// included. Pure travel time is only in the route CSV.
pub fn solution_table(individual: &Individual, instance: &Instance) -> String {
    let metrics = cost::route_metrics(instance, individual.genotype());
    let mut table = String::new();

    table.push_str(&format!("Nurse capacity: {}\n", instance.capacity_nurse));
    table.push_str(&format!("Depot return time: {}\n", instance.depot.return_time));
    table.push_str(&"-".repeat(100));
    table.push('\n');
    table.push_str(&format!(
        "{:<16} {:>15} {:>15}  {}\n",
        "Name", "Route Duration", "Covered Demand", "Patient Sequence"
    ));
    table.push_str(&"-".repeat(100));
    table.push('\n');

    for route in &metrics {
        table.push_str(&format!(
            "{:<16} {:>15} {:>15}  {}\n",
            format!("Nurse {} (N{})", route.nurse + 1, route.nurse + 1),
            round2(route.duration),
            route.covered_demand,
            patient_sequence(route)
        ));
    }

    table.push_str(&"-".repeat(100));
    table.push('\n');
    table.push_str(&format!("Objective value: {}\n", individual.fitness()));
    table
}

/// Route records for every nurse, unused nurses included
pub fn route_records(individual: &Individual, instance: &Instance) -> Vec<RouteRecord> {
    cost::route_metrics(instance, individual.genotype())
        .into_iter()
        .map(|route| RouteRecord {
            nurse: route.nurse + 1,
            route_duration: round2(route.duration),
            travel_time: round2(route.travel_time),
            covered_demand: route.covered_demand,
            num_patients: route.visits.len(),
            patients: route
                .visits
                .iter()
                .map(|v| v.id.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

/// Export one CSV record per nurse
pub fn write_route_csv<P: AsRef<Path>>(path: P, individual: &Individual, instance: &Instance) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);

    for record in route_records(individual, instance) {
        writer.serialize(record)?;
    }

    writer.flush()?;
    Ok(())
}

/// JSON snapshot of the genotype: an array of routes
pub fn write_genotype_json<P: AsRef<Path>>(path: P, genotype: &Genotype) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, genotype)?;
    writer.flush()?;
    Ok(())
}

/// Paths of everything written by [`SolutionArtifacts::save`]
#[derive(Debug, Clone, Default)]
pub struct SolutionArtifacts {
    pub genotype_json: PathBuf,
    pub table: PathBuf,
    pub routes_csv: PathBuf,
    pub routes_svg: PathBuf,
    pub schedule_svg: PathBuf,
    pub routes_png: Option<PathBuf>,
}

impl SolutionArtifacts {
    /// Write the full artifact set for `individual` into `dir`.
    ///
    /// Files are named `<instance><suffix>_*`. A failed PNG conversion is
    /// logged and skipped.
    pub fn save<P: AsRef<Path>>(
        dir: P,
        suffix: &str,
        individual: &Individual,
        instance: &Instance,
        png: bool,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let stem = format!("{}{}", instance.instance_name, suffix);
        let path = |name: &str| dir.join(format!("{stem}_{name}"));

        let artifacts = SolutionArtifacts {
            genotype_json: path("solution.json"),
            table: path("solution.txt"),
            routes_csv: path("routes.csv"),
            routes_svg: path("routes.svg"),
            schedule_svg: path("schedule.svg"),
            routes_png: None,
        };

        write_genotype_json(&artifacts.genotype_json, individual.genotype())?;
        write_route_csv(&artifacts.routes_csv, individual, instance)?;

        let mut table = File::create(&artifacts.table)?;
        writeln!(
            table,
            "Generated: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        table.write_all(solution_table(individual, instance).as_bytes())?;

        let visualizer = Visualizer::new();
        let map = visualizer.generate_svg(instance, individual);
        visualizer.save_svg(&map, &artifacts.routes_svg)?;
        visualizer.save_svg(
            &visualizer.generate_schedule_svg(instance, individual),
            &artifacts.schedule_svg,
        )?;

        let routes_png = if png {
            let target = path("routes.png");
            match visualizer.save_png(&map, &target) {
                Ok(()) => Some(target),
                Err(e) => {
                    log::warn!("PNG export skipped: {}", e);
                    None
                }
            }
        } else {
            None
        };

        log::info!("Saved solution artifacts to {}/{}_*", dir.display(), stem);
        Ok(SolutionArtifacts {
            routes_png,
            ..artifacts
        })
    }
}

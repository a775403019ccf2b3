use nurse_routing_ga::benchmark::Benchmark;
use nurse_routing_ga::ga::{GaConfig, GeneticAlgorithm, NoopObserver, SurvivorSelection, TerminationReason};
use nurse_routing_ga::report::SolutionArtifacts;
use nurse_routing_ga::Instance;

/// Six patients on a circle around the depot, two nurses.
fn circle_instance() -> Instance {
    let coords: Vec<(f64, f64)> = vec![
        (50.0, 50.0),
        (70.0, 50.0),
        (60.0, 67.0),
        (40.0, 67.0),
        (30.0, 50.0),
        (40.0, 33.0),
        (60.0, 33.0),
    ];
    let travel: Vec<Vec<f64>> = coords
        .iter()
        .map(|a| {
            coords
                .iter()
                .map(|b| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt())
                .collect()
        })
        .collect();

    let patients: serde_json::Map<String, serde_json::Value> = coords
        .iter()
        .enumerate()
        .skip(1)
        .map(|(id, &(x, y))| {
            (
                id.to_string(),
                serde_json::json!({
                    "x_coord": x,
                    "y_coord": y,
                    "demand": 10,
                    "start_time": 0,
                    "end_time": 500,
                    "care_time": 10
                }),
            )
        })
        .collect();

    let json = serde_json::json!({
        "instance_name": "circle",
        "nbr_nurses": 2,
        "capacity_nurse": 40,
        "benchmark": 130.0,
        "depot": { "return_time": 600, "x_coord": 50.0, "y_coord": 50.0 },
        "patients": patients,
        "travel_times": travel,
    });
    Instance::from_reader(json.to_string().as_bytes()).unwrap()
}

fn config() -> GaConfig {
    GaConfig {
        population_size: 20,
        max_generations: 60,
        max_stagnation: 60,
        repetitions: 2,
        threads: 2,
        benchmark_targets: Vec::new(),
        seed: 7,
        ..GaConfig::default()
    }
}

#[test]
fn solves_circle_instance_end_to_end() {
    let instance = circle_instance();
    let ids = instance.patient_ids();
    let mut ga = GeneticAlgorithm::new(instance, config()).unwrap();
    let summary = ga.run(&mut NoopObserver).unwrap();

    assert!(summary.generations >= 1);
    assert!(ga.population().iter().all(|i| i.genotype().is_complete(&ids)));

    // Capacity 40 per nurse fits 4 of the 6 patients, so valid plans split the visits.
    let best_valid = summary.best_valid.expect("a valid plan exists");
    assert!(best_valid.is_valid());
    assert!(best_valid.genotype().routes.iter().all(|r| r.len() <= 4));
    let best = summary.best.expect("best is tracked");
    assert!(best.fitness() <= best_valid.fitness());

    let dir = std::env::temp_dir().join(format!("nurse-routing-ga-it-{}", std::process::id()));
    let artifacts = SolutionArtifacts::save(&dir, "", &best_valid, ga.instance(), false).unwrap();
    assert!(artifacts.routes_svg.exists());
    assert!(artifacts.schedule_svg.exists());
    let table = std::fs::read_to_string(&artifacts.table).unwrap();
    assert!(table.contains(&format!("Objective value: {}", best_valid.fitness())));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn every_survivor_strategy_keeps_population_size() {
    let strategies = [
        (SurvivorSelection::Greedy, 2),
        (SurvivorSelection::DistinctGreedy, 2),
        (SurvivorSelection::SafeDistinctGreedy, 2),
        (SurvivorSelection::ElitistDistinct, 2),
        (SurvivorSelection::SimpleCrowding, 1),
        (SurvivorSelection::GreedyCrowding, 3),
    ];
    for (survivor_selection, repetitions) in strategies {
        let config = GaConfig {
            survivor_selection,
            repetitions,
            max_generations: 15,
            ..config()
        };
        let mut ga = GeneticAlgorithm::new(circle_instance(), config).unwrap();
        let summary = ga.run(&mut NoopObserver).unwrap();
        assert_eq!(summary.reason, TerminationReason::MaxGenerations);
        assert_eq!(ga.population().len(), 20, "{:?}", survivor_selection);
    }
}

#[test]
fn loose_target_is_reached_and_ends_the_run() {
    let config = GaConfig {
        benchmark_targets: vec![100],
        max_generations: 500,
        ..config()
    };
    let mut ga = GeneticAlgorithm::new(circle_instance(), config).unwrap();
    let summary = ga.run(&mut NoopObserver).unwrap();

    assert_eq!(summary.reason, TerminationReason::BenchmarkTargetsReached);
    assert_eq!(summary.targets_reached, vec![100]);
    assert!(summary.best_valid.unwrap().fitness() as f64 <= 260.0);
}

#[test]
fn benchmark_records_one_row_per_seed() {
    let mut benchmark = Benchmark::new();
    let config = GaConfig {
        max_generations: 10,
        ..config()
    };
    benchmark.run(&circle_instance(), &config, 2).unwrap();
    assert_eq!(benchmark.records().len(), 2);
    assert_eq!(benchmark.records()[1].seed, 8);
}

//! Cost model: travel cost, constraint penalty and per-route metrics.
//!
//! All functions are pure over an [`Instance`] and a [`Genotype`].

use crate::genotype::Genotype;
use crate::instance::Instance;
use serde::Serialize;
use std::collections::HashSet;

/// Weight of a capacity or return-time violation on one route
pub const VIOLATION_WEIGHT: u64 = 25;

/// Multiplier turning the violation count into a fitness penalty
pub const PENALTY_SCALE: u64 = 26;

/// Penalty reported for a genotype with no routes at all
pub const EMPTY_GENOTYPE_PENALTY: u64 = 10_000;

/// Total travel time of every route, depot legs included, rounded to the
/// nearest integer. An empty route contributes nothing.
pub fn travel_cost(instance: &Instance, genotype: &Genotype) -> u64 {
    let total: f64 = genotype
        .routes
        .iter()
        .map(|route| route_travel_time(instance, route))
        .sum();
    total.round() as u64
}

/// Travel time of a single route including both depot legs
pub fn route_travel_time(instance: &Instance, route: &[usize]) -> f64 {
    let (Some(&first), Some(&last)) = (route.first(), route.last()) else {
        return 0.0;
    };
    let inner: f64 = route
        .windows(2)
        .map(|leg| instance.travel_time(leg[0], leg[1]))
        .sum();
    instance.travel_time(0, first) + inner + instance.travel_time(last, 0)
}

/// Running clock of one nurse along a route
#[derive(Debug, Default, Clone, Copy)]
struct RouteClock {
    travel: f64,
    wait: f64,
    care: f64,
    demand: u64,
}

impl RouteClock {
    #[inline]
    fn now(&self) -> f64 {
        self.travel + self.wait + self.care
    }

    /// Drive to `patient`, wait for its window to open, and return the time
    /// care starts. Care time is not added yet.
    fn arrive(&mut self, instance: &Instance, from: usize, patient: usize) -> f64 {
        let p = &instance.patients[&patient];
        self.travel += instance.travel_time(from, patient);
        self.demand += p.demand as u64;
        let start = p.start_time as f64;
        if self.now() < start {
            self.wait += start - self.now();
        }
        self.now()
    }

    fn care(&mut self, instance: &Instance, patient: usize) -> f64 {
        self.care += instance.patients[&patient].care_time as f64;
        self.now()
    }

    fn return_to_depot(&mut self, instance: &Instance, from: usize) {
        self.travel += instance.travel_time(from, 0);
    }
}

/// Weighted constraint-violation score.
///
/// Counts revisits across the whole plan, at most one window-end violation per
/// route (the first stop finishing after its window closes), and a fixed
/// weight for each route over capacity or back after the depot return time.
pub fn penalty(instance: &Instance, genotype: &Genotype) -> u64 {
    if genotype.routes.is_empty() {
        return EMPTY_GENOTYPE_PENALTY;
    }

    let mut visited: HashSet<usize> = HashSet::with_capacity(instance.num_patients());
    let mut revisits = 0u64;
    let mut window_violations = 0u64;
    let mut capacity_violations = 0u64;
    let mut return_violations = 0u64;

    for route in &genotype.routes {
        let mut clock = RouteClock::default();
        let mut window_violated = false;
        let mut previous = 0;

        for &patient in route {
            if !visited.insert(patient) {
                revisits += 1;
            }
            clock.arrive(instance, previous, patient);
            let finished = clock.care(instance, patient);
            if !window_violated && finished > instance.patients[&patient].end_time as f64 {
                window_violations += 1;
                window_violated = true;
            }
            previous = patient;
        }
        if !route.is_empty() {
            clock.return_to_depot(instance, previous);
        }

        if clock.demand > instance.capacity_nurse as u64 {
            capacity_violations += VIOLATION_WEIGHT;
        }
        if clock.now() > instance.depot.return_time as f64 {
            return_violations += VIOLATION_WEIGHT;
        }
    }

    (revisits + window_violations + capacity_violations + return_violations) * PENALTY_SCALE
}

/// Travel cost plus penalty, the quantity repair minimises
#[inline]
pub fn combined_cost(instance: &Instance, genotype: &Genotype) -> u64 {
    travel_cost(instance, genotype) + penalty(instance, genotype)
}

/// Timing of a single patient visit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientVisit {
    pub id: usize,
    pub visit_start: f64,
    pub visit_end: f64,
    pub window_start: u32,
    pub window_end: u32,
}

impl std::fmt::Display for PatientVisit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "P{} ({:.2}-{:.2}) [{}-{}]",
            self.id, self.visit_start, self.visit_end, self.window_start, self.window_end
        )
    }
}

/// Recorded (not judged) timing of one nurse route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteMetrics {
    pub nurse: usize,
    pub covered_demand: u64,
    /// Travel time only, depot legs included
    pub travel_time: f64,
    /// Time the nurse is back at the depot, waits and care included
    pub duration: f64,
    pub visits: Vec<PatientVisit>,
}

/// Per-route metrics for reporting, using the same clock as [`penalty`]
pub fn route_metrics(instance: &Instance, genotype: &Genotype) -> Vec<RouteMetrics> {
    genotype
        .routes
        .iter()
        .enumerate()
        .map(|(nurse, route)| {
            let mut clock = RouteClock::default();
            let mut previous = 0;
            let mut visits = Vec::with_capacity(route.len());

            for &patient in route {
                let visit_start = clock.arrive(instance, previous, patient);
                let visit_end = clock.care(instance, patient);
                let p = &instance.patients[&patient];
                visits.push(PatientVisit {
                    id: patient,
                    visit_start,
                    visit_end,
                    window_start: p.start_time,
                    window_end: p.end_time,
                });
                previous = patient;
            }
            if !route.is_empty() {
                clock.return_to_depot(instance, previous);
            }

            RouteMetrics {
                nurse,
                covered_demand: clock.demand,
                travel_time: clock.travel,
                duration: clock.now(),
                visits,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::line_instance;
    use crate::instance::{Depot, Instance, Patient};
    use std::collections::BTreeMap;

    fn patient(demand: u32, start_time: u32, end_time: u32, care_time: u32) -> Patient {
        Patient {
            x_coord: 0.0,
            y_coord: 0.0,
            demand,
            start_time,
            end_time,
            care_time,
        }
    }

    /// Every leg takes 10, every visit takes 10.
    fn uniform_instance(num_patients: usize, num_nurses: usize, capacity: u32, return_time: u32) -> Instance {
        let patients: BTreeMap<usize, Patient> = (1..=num_patients)
            .map(|id| (id, patient(10, 0, 10_000, 10)))
            .collect();
        let n = num_patients + 1;
        let travel_times = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { 10.0 }).collect())
            .collect();
        Instance {
            instance_name: "uniform".into(),
            num_nurses,
            capacity_nurse: capacity,
            benchmark: 0.0,
            depot: Depot {
                return_time,
                x_coord: 0.0,
                y_coord: 0.0,
            },
            patients,
            travel_times,
        }
    }

    #[test]
    fn test_travel_cost_hand_computed() {
        let mut instance = line_instance();
        instance.travel_times[0][2] = 2.4;
        instance.travel_times[2][1] = 0.3;
        instance.travel_times[1][0] = 1.1;
        let genotype = Genotype::new(vec![vec![2, 1], vec![3]]);
        // 2.4 + 0.3 + 1.1 + (3 + 3) = 9.8
        assert_eq!(travel_cost(&instance, &genotype), 10);
    }

    #[test]
    fn test_empty_route_contributes_nothing() {
        let instance = line_instance();
        let with_empty = Genotype::new(vec![vec![1, 2, 3], vec![]]);
        assert_eq!(travel_cost(&instance, &with_empty), 6);
        assert_eq!(route_travel_time(&instance, &[]), 0.0);
    }

    #[test]
    fn test_valid_plan_has_no_penalty() {
        let instance = line_instance();
        let genotype = Genotype::new(vec![vec![1, 2], vec![3]]);
        assert_eq!(penalty(&instance, &genotype), 0);
    }

    #[test]
    fn test_empty_genotype_sentinel() {
        let instance = line_instance();
        assert_eq!(penalty(&instance, &Genotype::default()), EMPTY_GENOTYPE_PENALTY);
    }

    #[test]
    fn test_penalty_counting() {
        let mut instance = uniform_instance(6, 4, 45, 85);
        // Patient 2 closes early: route 0 finishes it at 40 > 15.
        instance.patients.get_mut(&2).unwrap().end_time = 15;
        instance.patients.get_mut(&4).unwrap().demand = 50;

        let genotype = Genotype::new(vec![
            // window violated at the second stop
            vec![1, 2],
            // over capacity: 50 > 45
            vec![4],
            // revisits 1 and is back at the depot at 90 > 85
            vec![3, 5, 6, 1],
            vec![],
        ]);

        // revisit 1, window 1, capacity 25, return 25
        assert_eq!(penalty(&instance, &genotype), 1352);
    }

    #[test]
    fn test_single_window_violation_per_route() {
        let mut instance = uniform_instance(3, 1, 1000, 10_000);
        for id in 1..=3 {
            instance.patients.get_mut(&id).unwrap().end_time = 5;
        }
        let genotype = Genotype::new(vec![vec![1, 2, 3]]);
        assert_eq!(penalty(&instance, &genotype), PENALTY_SCALE);
    }

    #[test]
    fn test_waiting_shifts_the_clock() {
        let mut instance = uniform_instance(2, 1, 1000, 10_000);
        instance.patients.get_mut(&1).unwrap().start_time = 50;
        let genotype = Genotype::new(vec![vec![1, 2]]);
        let metrics = route_metrics(&instance, &genotype);

        assert_eq!(metrics.len(), 1);
        let route = &metrics[0];
        assert_eq!(route.visits[0].visit_start, 50.0);
        assert_eq!(route.visits[0].visit_end, 60.0);
        assert_eq!(route.visits[1].visit_start, 70.0);
        assert_eq!(route.visits[1].visit_end, 80.0);
        assert_eq!(route.travel_time, 30.0);
        assert_eq!(route.duration, 90.0);
        assert_eq!(route.covered_demand, 20);
    }

    #[test]
    fn test_metrics_for_empty_route() {
        let instance = uniform_instance(1, 2, 100, 100);
        let genotype = Genotype::new(vec![vec![1], vec![]]);
        let metrics = route_metrics(&instance, &genotype);
        assert_eq!(metrics[1].duration, 0.0);
        assert!(metrics[1].visits.is_empty());
        assert_eq!(metrics[0].visits[0].to_string(), "P1 (10.00-20.00) [0-10000]");
    }
}

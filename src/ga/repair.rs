//! Repair of genotypes left incomplete by crossover filtering.

use crate::cost;
use crate::error::{Result, SolverError};
use crate::genotype::Genotype;
use crate::instance::Instance;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How missing patients are put back into a child genotype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepairStrategy {
    /// Cheapest insertion by combined cost, first minimum wins
    Greedy,
    /// Uniformly random route and position
    Stochastic,
}

impl RepairStrategy {
    /// Insert every missing patient and check the result holds each patient exactly once.
    ///
    /// A complete genotype is returned untouched. Missing patients are handled
    /// in increasing identifier order.
    pub fn repair<R: Rng + ?Sized>(
        self,
        genotype: &mut Genotype,
        instance: &Instance,
        rng: &mut R,
    ) -> Result<()> {
        let ids = instance.patient_ids();
        if genotype.is_complete(&ids) {
            return Ok(());
        }

        for patient in genotype.missing_patients(&ids) {
            match self {
                RepairStrategy::Greedy => insert_cheapest(genotype, instance, patient),
                RepairStrategy::Stochastic => insert_random(genotype, patient, rng),
            }
        }

        ensure_complete(genotype, &ids)
    }
}

/// Try every position of every route, appends included, and keep the one
/// with the lowest travel cost plus penalty.
fn insert_cheapest(genotype: &mut Genotype, instance: &Instance, patient: usize) {
    let mut best: Option<(u64, usize, usize)> = None;

    for route in 0..genotype.num_routes() {
        for position in 0..=genotype.routes[route].len() {
            genotype.routes[route].insert(position, patient);
            let candidate = cost::combined_cost(instance, genotype);
            genotype.routes[route].remove(position);

            if best.map_or(true, |(lowest, _, _)| candidate < lowest) {
                best = Some((candidate, route, position));
            }
        }
    }

    if let Some((_, route, position)) = best {
        genotype.routes[route].insert(position, patient);
    }
}

fn insert_random<R: Rng + ?Sized>(genotype: &mut Genotype, patient: usize, rng: &mut R) {
    if genotype.num_routes() == 0 {
        return;
    }
    let route = rng.gen_range(0..genotype.num_routes());
    let position = rng.gen_range(0..=genotype.routes[route].len());
    genotype.routes[route].insert(position, patient);
}

/// Fail with [`SolverError::Consistency`] unless every id appears exactly once
pub fn ensure_complete(genotype: &Genotype, ids: &[usize]) -> Result<()> {
    if genotype.is_complete(ids) {
        return Ok(());
    }
    Err(SolverError::Consistency {
        expected: ids.len(),
        found: genotype.patient_count(),
        missing: genotype.missing_patients(ids),
        duplicated: genotype.duplicates(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::line_instance;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_repair_is_idempotent_on_complete_genotype() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        // Deliberately poor ordering: greedy repair must not touch it.
        let original = Genotype::new(vec![vec![3, 1], vec![2]]);
        for strategy in [RepairStrategy::Greedy, RepairStrategy::Stochastic] {
            let mut genotype = original.clone();
            strategy.repair(&mut genotype, &instance, &mut rng).unwrap();
            assert_eq!(genotype, original);
        }
    }

    #[test]
    fn test_greedy_picks_cheapest_slot() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut genotype = Genotype::new(vec![vec![1, 3], vec![]]);
        RepairStrategy::Greedy
            .repair(&mut genotype, &instance, &mut rng)
            .unwrap();
        // Patient 2 between 1 and 3 keeps the cost at 6.
        assert_eq!(genotype.routes[0], vec![1, 2, 3]);
        assert!(genotype.routes[1].is_empty());
    }

    #[test]
    fn test_greedy_tie_takes_first_candidate() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut genotype = Genotype::new(vec![vec![2, 3], vec![]]);
        RepairStrategy::Greedy
            .repair(&mut genotype, &instance, &mut rng)
            .unwrap();
        // Front and back of route 0 both keep the cost at 6; the front is
        // enumerated first.
        assert_eq!(genotype.routes[0], vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_patients_in_id_order() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut genotype = Genotype::empty(2);
        RepairStrategy::Greedy
            .repair(&mut genotype, &instance, &mut rng)
            .unwrap();
        assert!(genotype.is_complete(&instance.patient_ids()));
        // Each insertion ties between the front and the back of route 0.
        assert_eq!(genotype.routes[0], vec![3, 2, 1]);
        assert!(genotype.routes[1].is_empty());
    }

    #[test]
    fn test_stochastic_repair_completes() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..20 {
            let mut genotype = Genotype::new(vec![vec![2], vec![]]);
            RepairStrategy::Stochastic
                .repair(&mut genotype, &instance, &mut rng)
                .unwrap();
            assert!(genotype.is_complete(&instance.patient_ids()));
        }
    }

    #[test]
    fn test_duplicates_are_a_consistency_error() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut genotype = Genotype::new(vec![vec![1, 2], vec![2]]);
        let err = RepairStrategy::Greedy
            .repair(&mut genotype, &instance, &mut rng)
            .unwrap_err();
        match err {
            SolverError::Consistency { duplicated, .. } => assert_eq!(duplicated, vec![2]),
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Genotype and individual representation.
//!
//! A genotype holds one route per nurse, index-aligned with nurse identity.
//! An individual owns a genotype together with its cached travel cost and
//! penalty, which are always recomputed together.

use crate::cost;
use crate::instance::Instance;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// One nurse's ordered visit sequence
pub type Route = Vec<usize>;

/// A complete routing plan, one route per nurse
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Genotype {
    pub routes: Vec<Route>,
}

impl Genotype {
    pub fn new(routes: Vec<Route>) -> Self {
        Genotype { routes }
    }

    /// A genotype with `num_routes` empty routes
    pub fn empty(num_routes: usize) -> Self {
        Genotype {
            routes: vec![Vec::new(); num_routes],
        }
    }

    /// Stochastic initial plan: patients ordered by ascending window end
    /// (ties by identifier), each appended to a uniformly random nurse.
    pub fn random_by_deadline<R: Rng + ?Sized>(instance: &Instance, rng: &mut R) -> Self {
        let mut order: Vec<usize> = instance.patient_ids();
        order.sort_by_key(|id| (instance.patients[id].end_time, *id));

        let mut genotype = Genotype::empty(instance.num_nurses);
        for patient in order {
            let nurse = rng.gen_range(0..instance.num_nurses);
            genotype.routes[nurse].push(patient);
        }
        genotype
    }

    #[inline]
    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    /// Total number of visits across all routes (duplicates included)
    pub fn patient_count(&self) -> usize {
        self.routes.iter().map(Vec::len).sum()
    }

    /// All routes concatenated in nurse order
    pub fn flatten(&self) -> Vec<usize> {
        self.routes.iter().flatten().copied().collect()
    }

    /// Whether every identifier in `ids` appears exactly once and nothing else does
    pub fn is_complete(&self, ids: &[usize]) -> bool {
        if self.patient_count() != ids.len() {
            return false;
        }
        let present: HashSet<usize> = self.routes.iter().flatten().copied().collect();
        present.len() == ids.len() && ids.iter().all(|id| present.contains(id))
    }

    /// Identifiers of `ids` absent from every route, in increasing order
    pub fn missing_patients(&self, ids: &[usize]) -> Vec<usize> {
        let present: HashSet<usize> = self.routes.iter().flatten().copied().collect();
        let mut missing: Vec<usize> = ids.iter().copied().filter(|id| !present.contains(id)).collect();
        missing.sort_unstable();
        missing
    }

    /// Identifiers visited more than once, in increasing order
    pub fn duplicates(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut repeated = BTreeSet::new();
        for &patient in self.routes.iter().flatten() {
            if !seen.insert(patient) {
                repeated.insert(patient);
            }
        }
        repeated.into_iter().collect()
    }

    /// Drop from every route each patient contained in `removed`
    pub fn remove_patients(&mut self, removed: &HashSet<usize>) {
        for route in &mut self.routes {
            route.retain(|p| !removed.contains(p));
        }
    }
}

impl From<Vec<Route>> for Genotype {
    fn from(routes: Vec<Route>) -> Self {
        Genotype { routes }
    }
}

/// A genotype with its cached cost model outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    genotype: Genotype,
    pure_fitness: u64,
    penalty: u64,
}

impl Individual {
    /// Evaluate a genotype against the instance
    pub fn evaluate(genotype: Genotype, instance: &Instance) -> Self {
        let pure_fitness = cost::travel_cost(instance, &genotype);
        let penalty = cost::penalty(instance, &genotype);
        Individual {
            genotype,
            pure_fitness,
            penalty,
        }
    }

    /// Individual with given cached values, for selection tests
    #[cfg(test)]
    pub(crate) fn with_costs(genotype: Genotype, pure_fitness: u64, penalty: u64) -> Self {
        Individual {
            genotype,
            pure_fitness,
            penalty,
        }
    }

    /// A fresh random individual built with [`Genotype::random_by_deadline`]
    pub fn random<R: Rng + ?Sized>(instance: &Instance, rng: &mut R) -> Self {
        Self::evaluate(Genotype::random_by_deadline(instance, rng), instance)
    }

    /// Replace the genotype and recompute both cached values
    pub fn set_genotype(&mut self, genotype: Genotype, instance: &Instance) {
        self.pure_fitness = cost::travel_cost(instance, &genotype);
        self.penalty = cost::penalty(instance, &genotype);
        self.genotype = genotype;
    }

    #[inline]
    pub fn genotype(&self) -> &Genotype {
        &self.genotype
    }

    pub fn into_genotype(self) -> Genotype {
        self.genotype
    }

    /// Total travel cost, independent of constraints
    #[inline]
    pub fn pure_fitness(&self) -> u64 {
        self.pure_fitness
    }

    /// Weighted constraint-violation score
    #[inline]
    pub fn penalty(&self) -> u64 {
        self.penalty
    }

    /// Travel cost plus penalty, lower is better
    #[inline]
    pub fn fitness(&self) -> u64 {
        self.pure_fitness + self.penalty
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.penalty == 0
    }
}

impl std::fmt::Display for Individual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Fitness: {}", self.fitness())?;
        writeln!(f, "Is valid: {}", self.is_valid())?;
        writeln!(f, "Non-penalized fitness: {}", self.pure_fitness)?;
        write!(f, "Penalty: {}", self.penalty)
    }
}

/// Two individuals handled together: a parent pair or an offspring pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair<T> {
    pub first: T,
    pub second: T,
}

impl<T> Pair<T> {
    pub fn new(first: T, second: T) -> Self {
        Pair { first, second }
    }

    pub fn into_array(self) -> [T; 2] {
        [self.first, self.second]
    }
}

/// Parents borrowed from the current population
pub type ParentPair<'a> = Pair<&'a Individual>;

/// Children owned by the generation that produced them
pub type OffspringPair = Pair<Individual>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::line_instance;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_flatten_and_completeness() {
        let genotype = Genotype::new(vec![vec![2, 1], vec![], vec![3]]);
        assert_eq!(genotype.flatten(), vec![2, 1, 3]);
        assert!(genotype.is_complete(&[1, 2, 3]));
        assert!(!genotype.is_complete(&[1, 2, 3, 4]));
        assert_eq!(genotype.missing_patients(&[1, 2, 3, 4]), vec![4]);
    }

    #[test]
    fn test_duplicates_break_completeness() {
        let genotype = Genotype::new(vec![vec![1, 2], vec![2]]);
        assert_eq!(genotype.duplicates(), vec![2]);
        assert!(!genotype.is_complete(&[1, 2, 3]));
        assert_eq!(genotype.missing_patients(&[1, 2, 3]), vec![3]);
    }

    #[test]
    fn test_random_genotype_is_complete() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            let genotype = Genotype::random_by_deadline(&instance, &mut rng);
            assert_eq!(genotype.num_routes(), instance.num_nurses);
            assert!(genotype.is_complete(&instance.patient_ids()));
        }
    }

    #[test]
    fn test_random_genotype_respects_deadline_order() {
        let mut instance = line_instance();
        instance.num_nurses = 1;
        instance.patients.get_mut(&1).unwrap().end_time = 900;
        instance.patients.get_mut(&3).unwrap().end_time = 100;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let genotype = Genotype::random_by_deadline(&instance, &mut rng);
        assert_eq!(genotype.routes[0], vec![3, 1, 2]);
    }

    #[test]
    fn test_validity_definition() {
        let instance = line_instance();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..10 {
            let ind = Individual::random(&instance, &mut rng);
            assert_eq!(ind.is_valid(), ind.penalty() == 0);
            assert_eq!(ind.fitness(), ind.pure_fitness() + ind.penalty());
        }
    }

    #[test]
    fn test_set_genotype_recomputes() {
        let instance = line_instance();
        let mut ind = Individual::evaluate(Genotype::new(vec![vec![1, 2, 3], vec![]]), &instance);
        assert_eq!(ind.pure_fitness(), 6);
        ind.set_genotype(Genotype::new(vec![vec![1], vec![2, 3]]), &instance);
        assert_eq!(ind.pure_fitness(), 2 + 6);
        assert_eq!(ind.genotype().routes[0], vec![1]);
    }
}

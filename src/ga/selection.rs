//! Parent and survivor selection.

use crate::error::{Result, SolverError};
use crate::genotype::{Genotype, Individual, OffspringPair, Pair, ParentPair};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Percentage of the survivor slots reserved for valid individuals
pub const VALID_PERCENT: usize = 60;

/// One elite per this many survivors
pub const ELITE_DIVISOR: usize = 50;

/// Parent selection method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentSelection {
    /// Pair neighbours in fitness order
    Elitist,
    /// Fitness-proportionate draws without replacement
    Roulette,
}

impl ParentSelection {
    /// Pair up the whole population; every individual appears in exactly one pair.
    pub fn select<'a, R: Rng + ?Sized>(
        self,
        population: &'a [Individual],
        rng: &mut R,
    ) -> Result<Vec<ParentPair<'a>>> {
        if population.len() % 2 != 0 {
            return Err(SolverError::Config(format!(
                "parent selection needs an even pool, got {}",
                population.len()
            )));
        }

        let order = match self {
            ParentSelection::Elitist => {
                let mut order: Vec<usize> = (0..population.len()).collect();
                order.sort_by_key(|&i| population[i].fitness());
                order
            }
            ParentSelection::Roulette => roulette_order(population, rng),
        };

        Ok(order
            .chunks_exact(2)
            .map(|pair| Pair::new(&population[pair[0]], &population[pair[1]]))
            .collect())
    }
}

/// Draw every index once, each draw weighted by `max - fitness + 1` among
/// the indices still in the pool.
fn roulette_order<R: Rng + ?Sized>(population: &[Individual], rng: &mut R) -> Vec<usize> {
    let max_fitness = population.iter().map(Individual::fitness).max().unwrap_or(0);
    let mut pool: Vec<(usize, u64)> = population
        .iter()
        .enumerate()
        .map(|(i, ind)| (i, max_fitness - ind.fitness() + 1))
        .collect();
    let mut total: u64 = pool.iter().map(|&(_, w)| w).sum();
    let mut order = Vec::with_capacity(pool.len());

    while !pool.is_empty() {
        let mut pick = rng.gen_range(0..total);
        let mut chosen = pool.len() - 1;
        for (slot, &(_, weight)) in pool.iter().enumerate() {
            if pick < weight {
                chosen = slot;
                break;
            }
            pick -= weight;
        }
        let (index, weight) = pool.remove(chosen);
        total -= weight;
        order.push(index);
    }
    order
}

/// Survivor selection method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurvivorSelection {
    /// Best offspring
    Greedy,
    /// Best offspring with distinct genotypes
    DistinctGreedy,
    /// Distinct greedy with a share of the slots reserved for valid offspring
    SafeDistinctGreedy,
    /// A few distinct parents survive, distinct offspring fill the rest
    ElitistDistinct,
    /// Parent against closest child; needs exactly one offspring pair per parent pair
    SimpleCrowding,
    /// Crowding followed by a distinct greedy cut, tolerates oversampling
    GreedyCrowding,
}

impl SurvivorSelection {
    /// Whether this strategy can handle more offspring pairs than parent pairs
    pub fn supports_oversampling(self) -> bool {
        !matches!(self, SurvivorSelection::SimpleCrowding)
    }

    /// Build the next population of `size` individuals.
    ///
    /// `parents[i]` must be the pair that produced `offspring[i]`; `population`
    /// is the generation the parents were drawn from.
    pub fn select(
        self,
        population: &[Individual],
        parents: &[ParentPair<'_>],
        offspring: Vec<OffspringPair>,
        size: usize,
    ) -> Result<Vec<Individual>> {
        if parents.len() != offspring.len() {
            return Err(SolverError::Config(format!(
                "{} parent pairs for {} offspring pairs",
                parents.len(),
                offspring.len()
            )));
        }

        let survivors = match self {
            SurvivorSelection::Greedy => {
                let mut children = flatten_pairs(offspring);
                children.sort_by_key(Individual::fitness);
                children.truncate(size);
                children
            }
            SurvivorSelection::DistinctGreedy => {
                let pool = DistinctPool::new(flatten_pairs(offspring));
                pool.fill(Vec::new(), size)
            }
            SurvivorSelection::SafeDistinctGreedy => {
                let pool = DistinctPool::new(flatten_pairs(offspring));
                let reserved = size * VALID_PERCENT / 100;
                pool.fill_with_reserve(reserved, size)
            }
            SurvivorSelection::ElitistDistinct => {
                let elites: Vec<Individual> = DistinctPool::new(population.to_vec())
                    .unique
                    .into_iter()
                    .take(size / ELITE_DIVISOR)
                    .collect();
                let pool = DistinctPool::new(flatten_pairs(offspring));
                pool.fill(elites, size)
            }
            SurvivorSelection::SimpleCrowding => {
                if population.len() != offspring.len() * 2 {
                    return Err(SolverError::Config(format!(
                        "simple crowding needs one offspring pair per parent pair, got {} offspring for {} individuals",
                        offspring.len() * 2,
                        population.len()
                    )));
                }
                crowding(parents, offspring)
            }
            SurvivorSelection::GreedyCrowding => {
                DistinctPool::new(crowding(parents, offspring)).fill(Vec::new(), size)
            }
        };

        Ok(survivors)
    }
}

fn flatten_pairs(pairs: Vec<OffspringPair>) -> Vec<Individual> {
    pairs.into_iter().flat_map(Pair::into_array).collect()
}

/// Candidates sorted by fitness and split into first occurrences and repeats
/// of the same flattened visit sequence.
struct DistinctPool {
    unique: Vec<Individual>,
    repeats: Vec<Individual>,
}

impl DistinctPool {
    fn new(mut candidates: Vec<Individual>) -> Self {
        candidates.sort_by_key(Individual::fitness);
        let mut seen: HashSet<Vec<usize>> = HashSet::with_capacity(candidates.len());
        let (unique, repeats): (Vec<Individual>, Vec<Individual>) = candidates
            .into_iter()
            .partition(|ind| seen.insert(ind.genotype().flatten()));
        DistinctPool { unique, repeats }
    }

    /// Append distinct candidates not already in `chosen`, then repeats, up to `size`
    fn fill(self, mut chosen: Vec<Individual>, size: usize) -> Vec<Individual> {
        let mut taken: HashSet<Vec<usize>> = chosen.iter().map(|i| i.genotype().flatten()).collect();
        for ind in self.unique {
            if chosen.len() >= size {
                return chosen;
            }
            if taken.insert(ind.genotype().flatten()) {
                chosen.push(ind);
            }
        }
        let missing = size.saturating_sub(chosen.len());
        chosen.extend(self.repeats.into_iter().take(missing));
        chosen
    }

    /// Take up to `reserved` of the best valid distinct candidates first
    fn fill_with_reserve(self, reserved: usize, size: usize) -> Vec<Individual> {
        let DistinctPool { unique, repeats } = self;
        let (mut valid, mut rest): (Vec<_>, Vec<_>) = (Vec::new(), Vec::new());
        for ind in unique {
            if ind.is_valid() && valid.len() < reserved.min(size) {
                valid.push(ind);
            } else {
                rest.push(ind);
            }
        }
        DistinctPool {
            unique: rest,
            repeats,
        }
        .fill(valid, size)
    }
}

/// Number of positions at which the flattened sequences differ; positions
/// past the shorter one all count.
pub fn hamming_distance(a: &Genotype, b: &Genotype) -> usize {
    let a = a.flatten();
    let b = b.flatten();
    let differing = a.iter().zip(&b).filter(|(x, y)| x != y).count();
    differing + a.len().abs_diff(b.len())
}

/// Winner of a parent against the child matched to it; ties go to the child
fn compete(parent: &Individual, child: Individual) -> Individual {
    if parent.fitness() < child.fitness() {
        parent.clone()
    } else {
        child
    }
}

/// Each parent competes against the child closest to it, the pairing being
/// the one with the lower summed Hamming distance.
fn crowding(parents: &[ParentPair<'_>], offspring: Vec<OffspringPair>) -> Vec<Individual> {
    let mut survivors = Vec::with_capacity(offspring.len() * 2);
    for (parents, children) in parents.iter().zip(offspring) {
        let (p1, p2) = (parents.first, parents.second);
        let (c1, c2) = (children.first, children.second);

        let straight = hamming_distance(p1.genotype(), c1.genotype())
            + hamming_distance(p2.genotype(), c2.genotype());
        let crossed = hamming_distance(p1.genotype(), c2.genotype())
            + hamming_distance(p2.genotype(), c1.genotype());

        if straight < crossed {
            survivors.push(compete(p1, c1));
            survivors.push(compete(p2, c2));
        } else {
            survivors.push(compete(p1, c2));
            survivors.push(compete(p2, c1));
        }
    }
    survivors
}

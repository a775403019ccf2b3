//! Crossover operators for route-based genotypes.
//!
//! Every operator follows the same shape: with probability `crossover_rate`
//! the parents are recombined and the children repaired, otherwise the
//! children start as clones of the parents. Both children are then mutated
//! and evaluated.
//!
//! Offspring are produced in parallel with rayon. Each task owns a
//! `ChaCha8Rng` seeded with the generation seed and switched to its own
//! stream, so results do not depend on scheduling.

use super::mutation::MutationStrategy;
use super::repair::RepairStrategy;
use crate::error::Result;
use crate::genotype::{Genotype, Individual, OffspringPair, Pair, ParentPair, Route};
use crate::instance::Instance;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Crossover operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossoverStrategy {
    /// Cut between two routes and exchange the tails
    RouteBoundarySlice,
    /// Cut inside one route and exchange the tails from there on
    WithinRouteSlice,
    /// Exchange one route, index preserved
    WholeRouteSwap,
    /// Strip the other parent's route patients everywhere and let repair redistribute them
    RoutePatientRedistribution,
}

impl CrossoverStrategy {
    /// Recombine two genotypes. The children may be incomplete and still need repair.
    pub fn recombine<R: Rng + ?Sized>(
        self,
        first: &Genotype,
        second: &Genotype,
        rng: &mut R,
    ) -> (Genotype, Genotype) {
        let num_routes = first.num_routes().min(second.num_routes());
        if num_routes == 0 {
            return (first.clone(), second.clone());
        }
        let index = rng.gen_range(0..num_routes);

        match self {
            CrossoverStrategy::RouteBoundarySlice => (
                route_boundary_child(first, second, index),
                route_boundary_child(second, first, index),
            ),
            CrossoverStrategy::WithinRouteSlice => {
                let cut_first = rng.gen_range(0..first.routes[index].len().max(1));
                let cut_second = rng.gen_range(0..second.routes[index].len().max(1));
                (
                    within_route_child(first, second, index, cut_first, cut_second),
                    within_route_child(second, first, index, cut_second, cut_first),
                )
            }
            CrossoverStrategy::WholeRouteSwap => (
                route_swap_child(first, second, index),
                route_swap_child(second, first, index),
            ),
            CrossoverStrategy::RoutePatientRedistribution => (
                redistribution_child(first, second, index),
                redistribution_child(second, first, index),
            ),
        }
    }
}

fn patient_set<'a, I>(routes: I) -> HashSet<usize>
where
    I: IntoIterator<Item = &'a Route>,
{
    routes.into_iter().flatten().copied().collect()
}

fn filtered(routes: &[Route], removed: &HashSet<usize>) -> Vec<Route> {
    routes
        .iter()
        .map(|route| route.iter().copied().filter(|p| !removed.contains(p)).collect())
        .collect()
}

/// `head[..split]` without the tail's patients, then `tail[split..]`
fn route_boundary_child(head: &Genotype, tail: &Genotype, split: usize) -> Genotype {
    let tail_routes = &tail.routes[split..];
    let mut routes = filtered(&head.routes[..split], &patient_set(tail_routes));
    routes.extend(tail_routes.iter().cloned());
    Genotype::new(routes)
}

/// The cut route keeps `head`'s visits before `head_cut` and continues with
/// `tail`'s visits from `tail_cut` on; later routes all come from `tail`.
fn within_route_child(
    head: &Genotype,
    tail: &Genotype,
    index: usize,
    head_cut: usize,
    tail_cut: usize,
) -> Genotype {
    let head_route = &head.routes[index];
    let tail_route = &tail.routes[index];
    let tail_part = &tail_route[tail_cut.min(tail_route.len())..];

    let mut routes: Vec<Route> = head.routes[..index].to_vec();
    routes.push(head_route[..head_cut.min(head_route.len())].to_vec());

    let mut routes = filtered(&routes, &tail_part.iter().copied().collect());
    if let Some(cut_route) = routes.last_mut() {
        cut_route.extend_from_slice(tail_part);
    }

    let later = &tail.routes[index + 1..];
    let mut routes = filtered(&routes, &patient_set(later));
    routes.extend(later.iter().cloned());
    Genotype::new(routes)
}

/// `base` with its route at `index` replaced by `donor`'s
fn route_swap_child(base: &Genotype, donor: &Genotype, index: usize) -> Genotype {
    let incoming = &donor.routes[index];
    let mut child = base.clone();
    child.routes.remove(index);
    child.remove_patients(&incoming.iter().copied().collect());
    child.routes.insert(index, incoming.clone());
    child
}

/// `base` without any patient of `donor`'s route at `index`
fn redistribution_child(base: &Genotype, donor: &Genotype, index: usize) -> Genotype {
    let mut child = base.clone();
    child.remove_patients(&donor.routes[index].iter().copied().collect());
    child
}

/// Operator settings shared by every crossover task of a generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreedingParams {
    pub crossover: CrossoverStrategy,
    pub repair: RepairStrategy,
    pub mutation: MutationStrategy,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
}

/// Produce two evaluated children from one parent pair
pub fn crossover_pair<R: Rng + ?Sized>(
    parents: ParentPair<'_>,
    instance: &Instance,
    params: &BreedingParams,
    rng: &mut R,
) -> Result<OffspringPair> {
    let (mut first, mut second) = if rng.gen::<f64>() < params.crossover_rate {
        let (mut first, mut second) =
            params
                .crossover
                .recombine(parents.first.genotype(), parents.second.genotype(), rng);
        params.repair.repair(&mut first, instance, rng)?;
        params.repair.repair(&mut second, instance, rng)?;
        (first, second)
    } else {
        (
            parents.first.genotype().clone(),
            parents.second.genotype().clone(),
        )
    };

    params.mutation.apply(&mut first, params.mutation_rate, rng);
    params.mutation.apply(&mut second, params.mutation_rate, rng);

    Ok(Pair::new(
        Individual::evaluate(first, instance),
        Individual::evaluate(second, instance),
    ))
}

fn task_rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

fn breed_block(
    pairs: &[ParentPair<'_>],
    instance: &Instance,
    params: &BreedingParams,
    seed: u64,
    first_stream: u64,
) -> Result<Vec<OffspringPair>> {
    pairs
        .par_iter()
        .enumerate()
        .map(|(i, parents)| {
            let mut rng = task_rng(seed, first_stream + i as u64);
            crossover_pair(*parents, instance, params, &mut rng)
        })
        .collect()
}

/// One offspring pair per parent pair, index-aligned, computed in parallel
pub fn crossover_population(
    pairs: &[ParentPair<'_>],
    instance: &Instance,
    params: &BreedingParams,
    seed: u64,
) -> Result<Vec<OffspringPair>> {
    breed_block(pairs, instance, params, seed, 0)
}

/// Run [`crossover_population`] `repetitions` times over the same parent pairs.
///
/// Repetitions run in parallel, each into its own slot, and are concatenated
/// in repetition order. The returned parent list repeats `pairs` accordingly
/// so that `parents[i]` produced `offspring[i]`.
pub fn repeat_crossover<'a>(
    pairs: &[ParentPair<'a>],
    instance: &Instance,
    params: &BreedingParams,
    repetitions: usize,
    seed: u64,
) -> Result<(Vec<ParentPair<'a>>, Vec<OffspringPair>)> {
    let block = pairs.len() as u64;
    let blocks: Vec<Vec<OffspringPair>> = (0..repetitions)
        .into_par_iter()
        .map(|repetition| breed_block(pairs, instance, params, seed, repetition as u64 * block))
        .collect::<Result<_>>()?;

    let parents = pairs
        .iter()
        .copied()
        .cycle()
        .take(pairs.len() * repetitions)
        .collect();
    let offspring = blocks.into_iter().flatten().collect();
    Ok((parents, offspring))
}

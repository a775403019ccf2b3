//! Element-wise mutation operators.
//!
//! Both operators only move or exchange existing visits, so a structurally
//! complete genotype stays complete.

use crate::genotype::Genotype;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mutation operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationStrategy {
    /// Move a visit to a random position of a random route
    Relocate,
    /// Exchange a visit with the one at a random position of a random route
    Swap,
}

impl MutationStrategy {
    /// Visit every (route, position) pair once and mutate it with probability `rate`
    pub fn apply<R: Rng + ?Sized>(self, genotype: &mut Genotype, rate: f64, rng: &mut R) {
        match self {
            MutationStrategy::Relocate => relocate_element_wise(genotype, rate, rng),
            MutationStrategy::Swap => swap_element_wise(genotype, rate, rng),
        }
    }
}

/// Positions are walked by stable index: when a visit leaves the current
/// route, the visit that slides into its slot is not revisited, and visits
/// appended to a later route are seen again when that route is walked.
fn relocate_element_wise<R: Rng + ?Sized>(genotype: &mut Genotype, rate: f64, rng: &mut R) {
    let num_routes = genotype.num_routes();
    if num_routes == 0 {
        return;
    }

    for from in 0..num_routes {
        let mut position = 0;
        while position < genotype.routes[from].len() {
            if rng.gen::<f64>() < rate {
                let to = rng.gen_range(0..num_routes);
                let patient = genotype.routes[from].remove(position);
                let target = rng.gen_range(0..=genotype.routes[to].len());
                genotype.routes[to].insert(target, patient);
            }
            position += 1;
        }
    }
}

fn swap_element_wise<R: Rng + ?Sized>(genotype: &mut Genotype, rate: f64, rng: &mut R) {
    let num_routes = genotype.num_routes();
    for from in 0..num_routes {
        for position in 0..genotype.routes[from].len() {
            if rng.gen::<f64>() >= rate {
                continue;
            }
            let to = rng.gen_range(0..num_routes);
            let len = genotype.routes[to].len();
            if len == 0 {
                continue;
            }
            let other = rng.gen_range(0..len);
            if from == to {
                genotype.routes[from].swap(position, other);
            } else {
                let patient = genotype.routes[from][position];
                genotype.routes[from][position] = std::mem::replace(&mut genotype.routes[to][other], patient);
            }
        }
    }
}

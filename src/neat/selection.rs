//! Elitism, per-species quotas and parent selection.
//!
//! [`SelectionEngine::next_generation`] turns scored, speciated pools into the
//! next population. The output length always equals `population_size`:
//! elites first, capped at half the population, then offspring allotted to
//! species in proportion to their fitness mass, with floor-rounding leftovers
//! handed out deterministically.

use std::cmp::Ordering;

use rand::Rng;
use rand::seq::IndexedRandom;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::NeatError;
use super::genome::Genome;
use super::innovation::InnovationTracker;
use super::mutation::MutationPolicy;
use super::params::Params;
use super::species::SpeciesId;

/// How parents are drawn from a species' surviving members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentSelection {
    /// Best of `tournament_size` distinct members drawn uniformly.
    #[default]
    Tournament,
    /// Probability proportional to (shifted) fitness.
    Roulette,
    /// Probability proportional to rank, best member weighted highest.
    Rank,
}

/// A genome with the fitness and eligibility reported by the host.
#[derive(Debug, Clone)]
pub struct Scored {
    /// The evaluated genome.
    pub genome: Genome,
    /// Fitness reached during the generation.
    pub fitness: f32,
    /// Whether the genome may be kept as an elite or chosen as a parent.
    pub eligible: bool,
}

impl Scored {
    /// An eligible genome with the given fitness.
    pub fn new(genome: Genome, fitness: f32) -> Self {
        Self {
            genome,
            fitness,
            eligible: true,
        }
    }

    /// Sets reproduction eligibility.
    #[must_use]
    pub fn with_eligibility(mut self, eligible: bool) -> Self {
        self.eligible = eligible;
        self
    }
}

/// The scored members of one species, as handed to selection.
#[derive(Debug, Clone)]
pub struct SpeciesPool {
    /// Species the members belong to.
    pub species: SpeciesId,
    /// Extinct pools get no offspring quota.
    pub extinct: bool,
    /// Scored members.
    pub members: Vec<Scored>,
}

impl SpeciesPool {
    /// Mean fitness of the members, 0 when empty.
    pub fn average_fitness(&self) -> f32 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().map(|m| m.fitness).sum::<f32>() / self.members.len() as f32
    }

    fn sort_members(&mut self) {
        self.members.sort_by(by_fitness_desc);
    }

    fn has_eligible(&self) -> bool {
        self.members.iter().any(|m| m.eligible)
    }
}

/// Produces the next population from speciated, scored pools.
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    population_size: usize,
    elite_count: usize,
    survival_rate: f32,
    tournament_size: usize,
    parent_selection: ParentSelection,
    fitness_sharing: bool,
    extinct_species_keep_elites: bool,
}

impl SelectionEngine {
    /// Creates an engine from validated parameters.
    pub fn new(params: &Params) -> Self {
        Self {
            population_size: params.population_size,
            elite_count: params.elite_count,
            survival_rate: params.survival_rate,
            tournament_size: params.tournament_size,
            parent_selection: params.parent_selection,
            fitness_sharing: params.fitness_sharing,
            extinct_species_keep_elites: params.extinct_species_keep_elites,
        }
    }

    /// Builds exactly `population_size` genomes for the next generation.
    ///
    /// Every returned genome has a fresh id from `tracker`. Elites are copied
    /// unmutated; offspring are copies of a selected parent mutated with
    /// `policy`.
    pub fn next_generation<R: Rng + ?Sized>(
        &self,
        mut pools: Vec<SpeciesPool>,
        policy: &MutationPolicy,
        tracker: &mut InnovationTracker,
        rng: &mut R,
    ) -> Result<Vec<Genome>, NeatError> {
        pools.retain(|pool| !pool.members.is_empty());
        if pools.is_empty() {
            return Err(NeatError::EmptyPopulation);
        }
        let unscored = demote_nan_fitness(&mut pools);
        if unscored > 0 {
            warn!(genomes = unscored, "NaN fitness treated as the worst score");
        }
        for pool in &mut pools {
            pool.sort_members();
        }
        pools.sort_by(|a, b| {
            b.average_fitness()
                .total_cmp(&a.average_fitness())
                .then_with(|| a.species.cmp(&b.species))
        });

        // At least half of every generation is bred.
        let elite_budget = self.population_size / 2;
        let mut next = Vec::with_capacity(self.population_size);
        let mut dropped_elites = 0usize;
        for pool in &pools {
            if pool.extinct && !self.extinct_species_keep_elites {
                continue;
            }
            for elite in pool.members.iter().filter(|m| m.eligible).take(self.elite_count) {
                if next.len() < elite_budget {
                    next.push(elite.genome.offspring(tracker.next_genome_id()));
                } else {
                    dropped_elites += 1;
                }
            }
        }
        if dropped_elites > 0 {
            warn!(dropped = dropped_elites, budget = elite_budget, "elites exceed half the population");
        }

        let slots = self.population_size - next.len();

        let mut breeders: Vec<usize> = pools
            .iter()
            .enumerate()
            .filter(|(_, pool)| !pool.extinct && pool.has_eligible())
            .map(|(index, _)| index)
            .collect();
        let respect_eligibility = !breeders.is_empty();
        if breeders.is_empty() {
            warn!(species = %pools[0].species, "no species can reproduce; best species breeds from all members");
            breeders.push(0);
        }

        let quotas = self.quotas(&pools, &breeders, slots);
        for (&pool_index, &quota) in breeders.iter().zip(&quotas) {
            let pool = &pools[pool_index];
            let candidates: Vec<&Scored> = pool
                .members
                .iter()
                .filter(|m| m.eligible || !respect_eligibility)
                .collect();
            let survivors = ((candidates.len() as f32 * self.survival_rate).floor() as usize)
                .clamp(1, candidates.len());
            let parents = &candidates[..survivors];

            for _ in 0..quota {
                let parent = self.select_parent(parents, rng);
                let mut child = parent.genome.offspring(tracker.next_genome_id());
                child.mutate(policy, tracker, rng);
                next.push(child);
            }
        }

        assert_eq!(next.len(), self.population_size, "generation size drifted");
        Ok(next)
    }

    /// Splits `slots` offspring among the breeding pools.
    ///
    /// `pools` must be ranked best first and `breeders` lists indices into it
    /// in rank order. Quotas are floors of each pool's share of the fitness
    /// mass; missing slots then go one per pool starting from the
    /// lowest-ranked breeder. The result always sums to `slots`.
    pub fn quotas(&self, pools: &[SpeciesPool], breeders: &[usize], slots: usize) -> Vec<usize> {
        if breeders.is_empty() {
            return Vec::new();
        }

        let lowest = breeders
            .iter()
            .flat_map(|&i| pools[i].members.iter().map(|m| f64::from(m.fitness)))
            .fold(f64::INFINITY, f64::min);
        let shift = if lowest < 0.0 { -lowest } else { 0.0 };

        let mut masses: Vec<f64> = breeders
            .iter()
            .map(|&i| {
                let members = &pools[i].members;
                let mass: f64 = members.iter().map(|m| f64::from(m.fitness) + shift).sum();
                if self.fitness_sharing {
                    mass / members.len() as f64
                } else {
                    mass
                }
            })
            .collect();
        let mut total: f64 = masses.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            masses = breeders.iter().map(|&i| pools[i].members.len() as f64).collect();
            total = masses.iter().sum();
        }

        let mut quotas: Vec<usize> = masses
            .iter()
            .map(|mass| (slots as f64 * mass / total).floor() as usize)
            .collect();

        let mut assigned: usize = quotas.iter().sum();
        while assigned > slots {
            for quota in quotas.iter_mut().rev() {
                if assigned > slots && *quota > 0 {
                    *quota -= 1;
                    assigned -= 1;
                }
            }
        }
        let missing = slots - assigned;
        for offset in 0..missing {
            let index = quotas.len() - 1 - offset % quotas.len();
            quotas[index] += 1;
        }

        debug!(slots, missing, ?quotas, "species quotas");
        quotas
    }

    fn select_parent<'a, R: Rng + ?Sized>(&self, parents: &[&'a Scored], rng: &mut R) -> &'a Scored {
        let fallback = parents[0];
        match self.parent_selection {
            ParentSelection::Tournament => {
                let size = self.tournament_size.clamp(1, parents.len());
                index::sample(rng, parents.len(), size)
                    .into_iter()
                    .min()
                    .map_or(fallback, |winner| parents[winner])
            }
            ParentSelection::Roulette => {
                let lowest = parents.iter().map(|p| p.fitness).fold(f32::INFINITY, f32::min);
                let shift = if lowest < 0.0 { 1.0 - lowest } else { 0.0 };
                parents
                    .choose_weighted(rng, |p| f64::from(p.fitness + shift))
                    .copied()
                    .unwrap_or_else(|_| parents.choose(rng).copied().unwrap_or(fallback))
            }
            ParentSelection::Rank => {
                let len = parents.len();
                let ranked: Vec<(usize, &'a Scored)> = parents.iter().copied().enumerate().collect();
                ranked
                    .choose_weighted(rng, |(rank, _)| (len - rank) as f64)
                    .map_or(fallback, |&(_, parent)| parent)
            }
        }
    }
}

/// Gives NaN-scored members the worst real fitness of the generation and
/// makes them ineligible. Returns how many were changed.
fn demote_nan_fitness(pools: &mut [SpeciesPool]) -> usize {
    let worst = pools
        .iter()
        .flat_map(|pool| &pool.members)
        .map(|m| m.fitness)
        .filter(|f| !f.is_nan())
        .fold(f32::INFINITY, f32::min);
    let worst = if worst < f32::INFINITY { worst } else { 0.0 };

    let mut demoted = 0;
    for member in pools.iter_mut().flat_map(|pool| pool.members.iter_mut()) {
        if member.fitness.is_nan() {
            member.fitness = worst;
            member.eligible = false;
            demoted += 1;
        }
    }
    demoted
}

/// Best first, ties by genome id.
fn by_fitness_desc(a: &Scored, b: &Scored) -> Ordering {
    b.fitness
        .total_cmp(&a.fitness)
        .then_with(|| a.genome.id().cmp(&b.genome.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn params(population_size: usize) -> Params {
        Params {
            input_count: 2,
            output_count: 1,
            population_size,
            ..Params::default()
        }
    }

    fn pool(species: u32, fitness: &[f32], tracker: &mut InnovationTracker, rng: &mut ChaCha8Rng) -> SpeciesPool {
        let params = params(1);
        SpeciesPool {
            species: SpeciesId(species),
            extinct: false,
            members: fitness
                .iter()
                .map(|&f| Scored::new(Genome::genesis(&params, tracker, rng), f))
                .collect(),
        }
    }

    #[test]
    fn test_quotas_proportional_with_leftovers_to_lowest() {
        let mut tracker = InnovationTracker::new(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let pools = vec![
            pool(0, &[3.0, 3.0], &mut tracker, &mut rng),
            pool(1, &[2.0, 2.0], &mut tracker, &mut rng),
            pool(2, &[1.0, 1.0], &mut tracker, &mut rng),
        ];
        let engine = SelectionEngine::new(&params(10));

        // Masses 6:4:2 over 10 slots floor to 5, 3, 1; the spare slot goes to the last pool.
        assert_eq!(engine.quotas(&pools, &[0, 1, 2], 10), vec![5, 3, 2]);
    }

    #[test]
    fn test_quotas_zero_mass_uses_size() {
        let mut tracker = InnovationTracker::new(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        let pools = vec![
            pool(0, &[0.0, 0.0, 0.0], &mut tracker, &mut rng),
            pool(1, &[0.0], &mut tracker, &mut rng),
        ];
        let engine = SelectionEngine::new(&params(8));
        assert_eq!(engine.quotas(&pools, &[0, 1], 8), vec![6, 2]);
    }

    #[test]
    fn test_fitness_sharing_divides_by_size() {
        let mut tracker = InnovationTracker::new(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(33);
        let pools = vec![
            pool(0, &[2.0, 2.0, 2.0, 2.0], &mut tracker, &mut rng),
            pool(1, &[2.0], &mut tracker, &mut rng),
        ];
        let engine = SelectionEngine::new(&Params {
            fitness_sharing: true,
            ..params(6)
        });
        assert_eq!(engine.quotas(&pools, &[0, 1], 6), vec![3, 3]);
    }

    #[test]
    fn test_tournament_prefers_best() {
        let mut tracker = InnovationTracker::new(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(34);
        let mut pool = pool(0, &[5.0, 1.0], &mut tracker, &mut rng);
        pool.sort_members();
        let parents: Vec<&Scored> = pool.members.iter().collect();
        let engine = SelectionEngine::new(&Params {
            tournament_size: 2,
            ..params(4)
        });

        for _ in 0..20 {
            assert_eq!(engine.select_parent(&parents, &mut rng).fitness, 5.0);
        }
    }

    #[test]
    fn test_rank_and_roulette_pick_members() {
        let mut tracker = InnovationTracker::new(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(35);
        let mut pool = pool(0, &[-1.0, 0.0, 4.0], &mut tracker, &mut rng);
        pool.sort_members();
        let parents: Vec<&Scored> = pool.members.iter().collect();

        for selection in [ParentSelection::Roulette, ParentSelection::Rank] {
            let engine = SelectionEngine::new(&Params {
                parent_selection: selection,
                ..params(4)
            });
            for _ in 0..20 {
                let parent = engine.select_parent(&parents, &mut rng);
                assert!(parents.iter().any(|p| p.genome.id() == parent.genome.id()));
            }
        }
    }

    #[test]
    fn test_empty_pools_are_an_error() {
        let mut tracker = InnovationTracker::new(2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(36);
        let engine = SelectionEngine::new(&params(4));
        let pools = vec![SpeciesPool {
            species: SpeciesId(0),
            extinct: false,
            members: Vec::new(),
        }];
        let result = engine.next_generation(pools, &MutationPolicy::default(), &mut tracker, &mut rng);
        assert!(matches!(result, Err(NeatError::EmptyPopulation)));
    }
}

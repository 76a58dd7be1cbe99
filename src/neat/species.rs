//! Speciation by genetic distance and stagnation tracking.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::genome::{DistanceCoefficients, Genome};
use super::innovation::GenomeId;
use super::params::Params;

/// Identity of a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpeciesId(pub u32);

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A group of genetically similar genomes.
#[derive(Debug, Clone)]
pub struct Species {
    /// Identity.
    pub id: SpeciesId,
    /// Genome new candidates are compared against.
    pub representative: Genome,
    /// Members of the current generation, in assignment order.
    pub members: Vec<GenomeId>,
    /// Highest fitness any member has ever reached.
    pub best_fitness: f32,
    /// Consecutive generations without a strict improvement of `best_fitness`.
    pub stagnation: u32,
    /// Average fitness of the current members.
    pub average_fitness: f32,
    /// Set once `stagnation` reaches the limit; extinct species get no offspring.
    pub extinct: bool,
    /// Generations since the species was founded.
    pub age: u32,
}

impl Species {
    fn founded(id: SpeciesId, representative: &Genome) -> Self {
        Self {
            id,
            members: vec![representative.id()],
            representative: representative.clone(),
            best_fitness: f32::NEG_INFINITY,
            stagnation: 0,
            average_fitness: 0.0,
            extinct: false,
            age: 0,
        }
    }
}

/// Partitions populations into species and keeps their history between generations.
#[derive(Debug, Clone)]
pub struct SpeciesManager {
    species: Vec<Species>,
    next_species_id: u32,
    divergence_threshold: f32,
    stagnation_limit: u32,
    coefficients: DistanceCoefficients,
}

impl SpeciesManager {
    /// Creates an empty manager.
    pub fn new(params: &Params) -> Self {
        Self {
            species: Vec::new(),
            next_species_id: 0,
            divergence_threshold: params.species_divergence_threshold,
            stagnation_limit: params.stagnation_limit,
            coefficients: params.distance,
        }
    }

    /// Assigns every genome to a species.
    ///
    /// Genomes are visited in order and join the first species, in creation
    /// order, whose representative is closer than the divergence threshold.
    /// Otherwise they found a new species and become its representative.
    /// Species left without members are dropped; surviving species keep
    /// their representative.
    pub fn assign<'a>(
        &mut self,
        population: impl IntoIterator<Item = &'a Genome>,
    ) -> BTreeMap<GenomeId, SpeciesId> {
        for species in &mut self.species {
            species.members.clear();
            species.age += 1;
        }

        let threshold = self.divergence_threshold;
        let coefficients = self.coefficients;
        let mut assignment = BTreeMap::new();

        for genome in population {
            let home = self
                .species
                .iter()
                .position(|s| genome.distance(&s.representative, &coefficients) < threshold);
            let id = match home {
                Some(index) => {
                    self.species[index].members.push(genome.id());
                    self.species[index].id
                }
                None => {
                    let id = SpeciesId(self.next_species_id);
                    self.next_species_id += 1;
                    self.species.push(Species::founded(id, genome));
                    debug!(species = %id, founder = %genome.id(), "new species");
                    id
                }
            };
            assignment.insert(genome.id(), id);
        }

        let before = self.species.len();
        self.species.retain(|s| !s.members.is_empty());
        if self.species.len() < before {
            debug!(removed = before - self.species.len(), "dropped empty species");
        }
        assignment
    }

    /// Updates averages, best fitness and stagnation from this generation's scores.
    ///
    /// A species goes extinct once it has gone `stagnation_limit` generations
    /// without a strict improvement. If that would leave no living species, the
    /// one with the highest average fitness (lowest id on ties) is spared.
    pub fn record_fitness(&mut self, fitness: &HashMap<GenomeId, f32>) {
        for species in &mut self.species {
            let scores: Vec<f32> = species
                .members
                .iter()
                .filter_map(|id| fitness.get(id).copied())
                .filter(|f| !f.is_nan())
                .collect();
            if scores.is_empty() {
                species.average_fitness = 0.0;
                continue;
            }

            species.average_fitness = scores.iter().sum::<f32>() / scores.len() as f32;
            let best = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if best > species.best_fitness {
                species.best_fitness = best;
                species.stagnation = 0;
            } else {
                species.stagnation += 1;
            }
            species.extinct = species.stagnation >= self.stagnation_limit;
        }

        if !self.species.is_empty() && self.species.iter().all(|s| s.extinct) {
            let spared = self
                .species
                .iter_mut()
                .max_by(|a, b| {
                    a.average_fitness
                        .total_cmp(&b.average_fitness)
                        .then_with(|| b.id.cmp(&a.id))
                });
            if let Some(spared) = spared {
                spared.extinct = false;
                warn!(species = %spared.id, "every species stagnated; sparing the best one");
            }
        }
    }

    /// Removes extinct species and returns how many were retired.
    ///
    /// Called once their elites have been handed to selection; surviving
    /// elites are re-speciated from scratch in the next generation.
    pub fn retire_extinct(&mut self) -> usize {
        let before = self.species.len();
        self.species.retain(|s| !s.extinct);
        let retired = before - self.species.len();
        if retired > 0 {
            debug!(retired, "retired extinct species");
        }
        retired
    }

    /// Living and extinct species in creation order.
    pub fn species(&self) -> &[Species] {
        &self.species
    }

    /// Number of species.
    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    /// Number of species currently marked extinct.
    pub fn extinct_count(&self) -> usize {
        self.species.iter().filter(|s| s.extinct).count()
    }

    /// Member count per species.
    pub fn species_sizes(&self) -> BTreeMap<SpeciesId, usize> {
        self.species.iter().map(|s| (s.id, s.members.len())).collect()
    }

    /// Looks up a species by id.
    pub fn get(&self, id: SpeciesId) -> Option<&Species> {
        self.species.iter().find(|s| s.id == id)
    }
}

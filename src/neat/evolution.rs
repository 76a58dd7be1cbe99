//! Generation transition.
//!
//! [`EvolutionEngine`] is the single owner of the state that outlives a
//! generation: the innovation tracker, species history, generation counter
//! and statistics. The host evaluates a population, scores it, and hands it
//! back through [`EvolutionEngine::next_generation`].

use std::collections::HashMap;

use rand::Rng;
use tracing::info;

use super::error::NeatError;
use super::genome::Genome;
use super::innovation::{GenomeId, InnovationTracker};
use super::params::Params;
use super::selection::{Scored, SelectionEngine, SpeciesPool};
use super::species::{SpeciesId, SpeciesManager};
use super::stats::{GenerationStats, StatsHistory};

/// Drives speciation, selection and reproduction between generations.
#[derive(Debug, Clone)]
pub struct EvolutionEngine {
    params: Params,
    tracker: InnovationTracker,
    species: SpeciesManager,
    selection: SelectionEngine,
    history: StatsHistory,
    generation: u32,
}

impl EvolutionEngine {
    /// Creates an engine, rejecting unusable parameters.
    pub fn new(params: Params) -> Result<Self, NeatError> {
        params.validate()?;
        Ok(Self {
            tracker: InnovationTracker::new(params.input_count, params.output_count),
            species: SpeciesManager::new(&params),
            selection: SelectionEngine::new(&params),
            history: StatsHistory::new(params.stats_history),
            generation: 0,
            params,
        })
    }

    /// Creates `population_size` fresh genomes.
    pub fn genesis<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<Genome> {
        (0..self.params.population_size)
            .map(|_| Genome::genesis(&self.params, &mut self.tracker, rng))
            .collect()
    }

    /// Turns a scored population into the next one.
    ///
    /// Speciates the population, updates stagnation, records statistics and
    /// then selects and reproduces. Species that went extinct this generation
    /// are retired after selection has seen them. The result always holds exactly
    /// `population_size` genomes. Must not run while agents are still being
    /// evaluated.
    pub fn next_generation<R: Rng + ?Sized>(
        &mut self,
        population: Vec<Scored>,
        rng: &mut R,
    ) -> Result<Vec<Genome>, NeatError> {
        if population.is_empty() {
            return Err(NeatError::EmptyPopulation);
        }
        self.tracker.begin_generation();

        let assignment = self.species.assign(population.iter().map(|s| &s.genome));
        let fitness: HashMap<GenomeId, f32> = population
            .iter()
            .map(|s| (s.genome.id(), s.fitness))
            .collect();
        self.species.record_fitness(&fitness);

        let stats = GenerationStats::collect(self.generation, &population, &self.species);
        info!(
            generation = stats.generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            species = stats.species_count,
            extinct = stats.extinct_species,
            neurons = stats.mean_neurons,
            connections = stats.mean_connections,
            "generation complete"
        );
        self.history.record(stats);

        let slot_of: HashMap<SpeciesId, usize> = self
            .species
            .species()
            .iter()
            .enumerate()
            .map(|(index, s)| (s.id, index))
            .collect();
        let mut pools: Vec<SpeciesPool> = self
            .species
            .species()
            .iter()
            .map(|s| SpeciesPool {
                species: s.id,
                extinct: s.extinct,
                members: Vec::with_capacity(s.members.len()),
            })
            .collect();
        for scored in population {
            let slot = assignment
                .get(&scored.genome.id())
                .and_then(|species| slot_of.get(species));
            if let Some(&slot) = slot {
                pools[slot].members.push(scored);
            }
        }

        // Extinct species hand over their elites once and are then dropped.
        self.species.retire_extinct();

        let next = self
            .selection
            .next_generation(pools, &self.params.mutation, &mut self.tracker, rng)?;
        self.generation += 1;
        Ok(next)
    }

    /// Number of completed generation transitions.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Species state after the last transition.
    pub fn species(&self) -> &SpeciesManager {
        &self.species
    }

    /// Recent generation summaries.
    pub fn history(&self) -> &StatsHistory {
        &self.history
    }

    /// Parameters the engine was built with.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Innovation tracker shared by every genome of this run.
    pub fn tracker(&self) -> &InnovationTracker {
        &self.tracker
    }
}

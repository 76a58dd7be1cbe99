use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::selection::Scored;
use super::species::SpeciesManager;

/// Summary of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation the scores belong to.
    pub generation: u32,
    /// Number of scored genomes.
    pub population: usize,
    /// Number of species after assignment.
    pub species_count: usize,
    /// Species marked extinct this generation.
    pub extinct_species: usize,
    /// Highest fitness.
    pub best_fitness: f32,
    /// Mean fitness.
    pub mean_fitness: f32,
    /// Mean neuron count, inputs and outputs included.
    pub mean_neurons: f32,
    /// Mean number of enabled connections.
    pub mean_connections: f32,
}

impl GenerationStats {
    /// Collects statistics from a scored, speciated population.
    pub fn collect(generation: u32, population: &[Scored], species: &SpeciesManager) -> Self {
        let count = population.len().max(1) as f32;
        let mean = |value: fn(&Scored) -> f32| population.iter().map(value).sum::<f32>() / count;

        Self {
            generation,
            population: population.len(),
            species_count: species.species_count(),
            extinct_species: species.extinct_count(),
            best_fitness: population
                .iter()
                .map(|s| s.fitness)
                .fold(f32::NEG_INFINITY, f32::max),
            mean_fitness: mean(|s| s.fitness),
            mean_neurons: mean(|s| s.genome.neuron_count() as f32),
            mean_connections: mean(|s| s.genome.enabled_connection_count() as f32),
        }
    }
}

/// Rolling window of recent generation summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsHistory {
    /// Recent summaries, oldest first.
    pub entries: VecDeque<GenerationStats>,
    /// Maximum number of summaries to keep.
    pub max_history: usize,
}

impl Default for StatsHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

impl StatsHistory {
    /// Creates an empty history keeping at most `max_history` entries.
    pub fn new(max_history: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Record a generation, evicting the oldest entry when full.
    pub fn record(&mut self, stats: GenerationStats) {
        self.entries.push_back(stats);
        if self.entries.len() > self.max_history {
            self.entries.pop_front();
        }
    }

    /// Most recent summary.
    pub fn latest(&self) -> Option<&GenerationStats> {
        self.entries.back()
    }

    /// Number of summaries kept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best fitness within the window.
    pub fn best_fitness_ever(&self) -> Option<f32> {
        self.entries
            .iter()
            .map(|s| s.best_fitness)
            .reduce(f32::max)
    }

    /// Average change of mean fitness per generation across the window (0 with fewer than two entries).
    pub fn mean_fitness_trend(&self) -> f32 {
        match (self.entries.front(), self.entries.back()) {
            (Some(first), Some(last)) if self.entries.len() > 1 => {
                (last.mean_fitness - first.mean_fitness) / (self.entries.len() - 1) as f32
            }
            _ => 0.0,
        }
    }
}

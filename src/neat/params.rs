use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::NeatError;
use super::genome::DistanceCoefficients;
use super::mutation::MutationPolicy;
use super::selection::ParentSelection;
use super::sensors::{self, Diet};

/// Engine parameters controlling genesis, speciation and reproduction.
///
/// Missing fields fall back to [`Params::default`] when deserialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Length of the sensory vector.
    pub input_count: usize,
    /// Length of the actuation vector.
    pub output_count: usize,
    /// Number of genomes per generation.
    pub population_size: usize,
    /// Behavioural prior for genesis weights.
    pub diet: Diet,
    /// Genesis output biases are uniform in `±initial_bias_range`.
    pub initial_bias_range: f32,
    /// Mutation probabilities and magnitudes.
    pub mutation: MutationPolicy,
    /// Coefficients of the genetic distance.
    pub distance: DistanceCoefficients,
    /// Genomes closer than this to a representative join its species.
    pub species_divergence_threshold: f32,
    /// Generations without a strict best-fitness improvement before a species goes extinct.
    pub stagnation_limit: u32,
    /// Best eligible members of each species copied unchanged into the next generation.
    pub elite_count: usize,
    /// Fraction of each species' eligible members allowed to parent offspring.
    pub survival_rate: f32,
    /// Members drawn per tournament.
    pub tournament_size: usize,
    /// How parents are drawn from the surviving fraction.
    pub parent_selection: ParentSelection,
    /// Divide each species' fitness mass by its size when computing quotas.
    pub fitness_sharing: bool,
    /// Whether extinct species still contribute elites.
    /// Extinction always zeroes the reproductive quota.
    pub extinct_species_keep_elites: bool,
    /// Number of generation summaries kept in the statistics history.
    pub stats_history: usize,
    /// Seed used by the demo binary when none is given on the command line.
    pub seed: u64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            input_count: sensors::INPUT_COUNT,
            output_count: sensors::OUTPUT_COUNT,
            population_size: 150,
            diet: Diet::Neutral,
            initial_bias_range: 2.0,
            mutation: MutationPolicy::default(),
            distance: DistanceCoefficients::default(),
            species_divergence_threshold: 0.6,
            stagnation_limit: 15,
            elite_count: 1,
            survival_rate: 0.5,
            tournament_size: 3,
            parent_selection: ParentSelection::Tournament,
            fitness_sharing: false,
            extinct_species_keep_elites: true,
            stats_history: 100,
            seed: 42,
        }
    }
}

impl Params {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), NeatError> {
        let invalid = |message: String| Err(NeatError::InvalidParams(message));

        if self.input_count == 0 || self.output_count == 0 {
            return invalid(format!(
                "input_count and output_count must be positive, got {} and {}",
                self.input_count, self.output_count
            ));
        }
        if self.population_size == 0 {
            return invalid("population_size must be positive".to_string());
        }
        if self.mutation.max_neurons < self.input_count + self.output_count {
            return invalid(format!(
                "max_neurons ({}) is below input_count + output_count ({})",
                self.mutation.max_neurons,
                self.input_count + self.output_count
            ));
        }
        if !self.initial_bias_range.is_finite() || self.initial_bias_range < 0.0 {
            return invalid(format!(
                "initial_bias_range must be finite and non-negative, got {}",
                self.initial_bias_range
            ));
        }
        if !self.species_divergence_threshold.is_finite() || self.species_divergence_threshold <= 0.0 {
            return invalid(format!(
                "species_divergence_threshold must be finite and positive, got {}",
                self.species_divergence_threshold
            ));
        }
        let coefficients = [
            self.distance.disjoint_coefficient,
            self.distance.weight_coefficient,
        ];
        if coefficients.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return invalid(format!(
                "distance coefficients must be finite and non-negative, got {:?}",
                self.distance
            ));
        }
        if self.stagnation_limit == 0 {
            return invalid("stagnation_limit must be at least 1".to_string());
        }
        if !(self.survival_rate > 0.0 && self.survival_rate <= 1.0) {
            return invalid(format!(
                "survival_rate must be within (0, 1], got {}",
                self.survival_rate
            ));
        }
        if self.tournament_size == 0 {
            return invalid("tournament_size must be at least 1".to_string());
        }
        if self.stats_history == 0 {
            return invalid("stats_history must be at least 1".to_string());
        }
        self.mutation.validate()
    }

    /// Parses parameters from JSON and validates them.
    pub fn from_json_str(json: &str) -> Result<Self, NeatError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Save parameters to a JSON file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), NeatError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate parameters from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, NeatError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

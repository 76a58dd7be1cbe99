//! # Neuroevo - NEAT-style neuroevolution engine
//!
//! Evolves the topology and weights of small feed-forward networks that
//! control simulated agents. Agents evaluate their network every simulation
//! step; between generations the engine speciates the scored population,
//! retires stagnant species, keeps elites and breeds mutated offspring.
//!
//! ## Features
//!
//! - Genomes as explicit neuron/connection tables with historical markers
//! - Add/remove neuron, add connection, weight and bias mutations
//! - Speciation by genetic distance with stagnation extinction
//! - Elitism, fitness-proportional species quotas, tournament/roulette/rank parents
//! - Seeded, reproducible runs through an injected random number generator
//! - JSON parameter files
//!
//! ## Core Modules
//!
//! - [`neat::genome`] - Genome tables, genesis and genetic distance
//! - [`neat::network`] - Compiled feed-forward evaluation
//! - [`neat::mutation`] - Mutation operators and policy
//! - [`neat::species`] - Speciation and stagnation
//! - [`neat::selection`] - Elites, quotas and parent selection
//! - [`neat::evolution`] - The generation transition
//!
//! ```
//! use neuroevo::neat::evolution::EvolutionEngine;
//! use neuroevo::neat::params::Params;
//! use neuroevo::neat::selection::Scored;
//! use rand::SeedableRng;
//!
//! let params = Params { population_size: 8, ..Params::default() };
//! let mut engine = EvolutionEngine::new(params).unwrap();
//! let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
//!
//! let population = engine.genesis(&mut rng);
//! let scored = population.into_iter().map(|g| Scored::new(g, 1.0)).collect();
//! let next = engine.next_generation(scored, &mut rng).unwrap();
//! assert_eq!(next.len(), 8);
//! ```

/// Neuroevolution core: genomes, networks and the generation transition.
pub mod neat {
    /// Error type shared by the engine.
    pub mod error;
    /// Generation transition owning all cross-generation state.
    pub mod evolution;
    /// Genome tables, genesis and genetic distance.
    pub mod genome;
    /// Historical markers and identity allocation.
    pub mod innovation;
    /// Mutation policy and operators.
    pub mod mutation;
    /// Feed-forward network compiled from a genome.
    pub mod network;
    /// Engine parameters.
    pub mod params;
    /// Elitism, species quotas and parent selection.
    pub mod selection;
    /// Standard sensory and actuation vector layout.
    pub mod sensors;
    /// Speciation by genetic distance.
    pub mod species;
    /// Per-generation statistics.
    pub mod stats;
}

//! Historical markers and identities.
//!
//! Neuron ids and connection innovation ids are never positional: they are
//! handed out by an [`InnovationTracker`] owned by the generation driver, so
//! genomes of different shapes can still be aligned gene by gene.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a neuron within a lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NeuronId(pub u32);

/// Innovation number of a connection gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InnovationId(pub u64);

/// Identity of a single genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenomeId(pub u64);

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Markers created when a connection is split by an add-neuron mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMarkers {
    /// The inserted hidden neuron.
    pub neuron: NeuronId,
    /// Innovation of the `source -> neuron` connection.
    pub incoming: InnovationId,
    /// Innovation of the `neuron -> target` connection.
    pub outgoing: InnovationId,
}

/// Allocator for neuron ids, innovation ids and genome ids.
///
/// Within one generation the same structural change (the same
/// `(source, target)` connection, or the split of the same innovation)
/// receives the same markers in every genome, which keeps independently
/// mutated siblings comparable. Call [`InnovationTracker::begin_generation`]
/// at each generation boundary to forget that memo; the counters themselves
/// only ever grow.
#[derive(Debug, Clone)]
pub struct InnovationTracker {
    next_neuron: u32,
    next_innovation: u64,
    next_genome: u64,
    connections: HashMap<(NeuronId, NeuronId), InnovationId>,
    splits: HashMap<InnovationId, SplitMarkers>,
}

impl InnovationTracker {
    /// Creates a tracker with neuron ids `0..input_count + output_count` reserved
    /// for the fixed input and output neurons.
    pub fn new(input_count: usize, output_count: usize) -> Self {
        Self {
            next_neuron: (input_count + output_count) as u32,
            next_innovation: 0,
            next_genome: 0,
            connections: HashMap::new(),
            splits: HashMap::new(),
        }
    }

    /// Forgets the per-generation memo of structural innovations.
    pub fn begin_generation(&mut self) {
        self.connections.clear();
        self.splits.clear();
    }

    /// Innovation id for a `(source, target)` connection, reused within the generation.
    pub fn connection(&mut self, source: NeuronId, target: NeuronId) -> InnovationId {
        if let Some(&innovation) = self.connections.get(&(source, target)) {
            return innovation;
        }
        let innovation = self.fresh_connection();
        self.connections.insert((source, target), innovation);
        innovation
    }

    /// A never-before-used innovation id, bypassing the memo.
    pub fn fresh_connection(&mut self) -> InnovationId {
        let innovation = InnovationId(self.next_innovation);
        self.next_innovation += 1;
        innovation
    }

    /// Markers for splitting `innovation`, reused within the generation.
    pub fn split(&mut self, innovation: InnovationId) -> SplitMarkers {
        if let Some(&markers) = self.splits.get(&innovation) {
            return markers;
        }
        let markers = self.fresh_split();
        self.splits.insert(innovation, markers);
        markers
    }

    /// Markers for a split that bypass the memo.
    pub fn fresh_split(&mut self) -> SplitMarkers {
        let neuron = NeuronId(self.next_neuron);
        self.next_neuron += 1;
        SplitMarkers {
            neuron,
            incoming: self.fresh_connection(),
            outgoing: self.fresh_connection(),
        }
    }

    /// Identity for a newly created genome.
    pub fn next_genome_id(&mut self) -> GenomeId {
        let id = GenomeId(self.next_genome);
        self.next_genome += 1;
        id
    }

    /// Number of innovation ids handed out so far.
    pub fn innovation_count(&self) -> u64 {
        self.next_innovation
    }
}

//! Genome representation: explicit neuron and connection tables.
//!
//! A genome stores its topology as two flat tables keyed by historical
//! markers rather than as linked objects. The compiled [`NeuralNetwork`] is
//! cached alongside and rebuilt whenever a mutation touches the tables.
//! Mutation operators live in [`super::mutation`].

use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::NeatError;
use super::innovation::{GenomeId, InnovationId, InnovationTracker, NeuronId};
use super::network::{Activation, NeuralNetwork};
use super::params::Params;

/// Role of a neuron in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Receives one entry of the sensory vector; never has incoming connections.
    Input,
    /// Produces one entry of the actuation vector; never deleted.
    Output,
    /// Inserted by mutation; may be removed again.
    Hidden,
}

/// A node gene.
#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
    /// Historical marker of the neuron.
    pub id: NeuronId,
    /// Input, output or hidden.
    pub kind: NeuronKind,
    /// Added to the weighted input sum before activation. Unused for inputs.
    pub bias: f32,
    /// Activation function, fixed by role.
    pub activation: Activation,
}

impl Neuron {
    /// Creates a neuron with the activation its role prescribes.
    pub fn new(id: NeuronId, kind: NeuronKind, bias: f32) -> Self {
        Self {
            id,
            kind,
            bias,
            activation: Activation::for_kind(kind),
        }
    }
}

/// A connection gene.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Neuron the signal comes from.
    pub source: NeuronId,
    /// Neuron the signal flows into.
    pub target: NeuronId,
    /// Multiplier applied to the source activation.
    pub weight: f32,
    /// Disabled connections are kept for alignment but skipped during evaluation.
    pub enabled: bool,
    /// Innovation number used to align genes across genomes.
    pub innovation: InnovationId,
}

/// Weights of the two terms of the genetic distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceCoefficients {
    /// `c1`: weight of the normalised disjoint-gene count.
    pub disjoint_coefficient: f32,
    /// `c2`: weight of the mean absolute weight difference of matching genes.
    pub weight_coefficient: f32,
}

impl Default for DistanceCoefficients {
    fn default() -> Self {
        Self {
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.5,
        }
    }
}

/// Evolvable encoding of one agent's network.
///
/// Topology only changes through the mutation operators, which are meant to
/// be called at reproduction time; the cached network is immutable between
/// those calls and safe to evaluate from several threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    pub(crate) id: GenomeId,
    pub(crate) parent: Option<GenomeId>,
    pub(crate) neurons: Vec<Neuron>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) inputs: Vec<NeuronId>,
    pub(crate) outputs: Vec<NeuronId>,
    network: NeuralNetwork,
}

impl Genome {
    /// Creates a genesis genome: every input connected to every output.
    ///
    /// Input neurons get ids `0..input_count`, outputs the following
    /// `output_count` ids. Initial weights follow the configured
    /// [`Diet`](super::sensors::Diet); output biases are drawn uniformly from
    /// `±initial_bias_range`. Both are clamped to the mutation limits, so a
    /// weight that is never perturbed still respects `weight_limit`.
    pub fn genesis<R: Rng + ?Sized>(
        params: &Params,
        tracker: &mut InnovationTracker,
        rng: &mut R,
    ) -> Self {
        let input_count = params.input_count;
        let output_count = params.output_count;
        let bias_range = params.initial_bias_range;
        let weight_limit = params.mutation.weight_limit;
        let bias_limit = params.mutation.bias_limit;

        let inputs: Vec<NeuronId> = (0..input_count).map(|i| NeuronId(i as u32)).collect();
        let outputs: Vec<NeuronId> = (input_count..input_count + output_count)
            .map(|i| NeuronId(i as u32))
            .collect();

        let mut neurons = Vec::with_capacity(input_count + output_count);
        neurons.extend(inputs.iter().map(|&id| Neuron::new(id, NeuronKind::Input, 0.0)));
        for &id in &outputs {
            let bias = rng
                .random_range(-bias_range..=bias_range)
                .clamp(-bias_limit, bias_limit);
            neurons.push(Neuron::new(id, NeuronKind::Output, bias));
        }

        let mut connections = Vec::with_capacity(input_count * output_count);
        for (input_index, &source) in inputs.iter().enumerate() {
            for (output_index, &target) in outputs.iter().enumerate() {
                let weight = params
                    .diet
                    .initial_weight(input_index, output_index, params.mutation.initial_weight_range, rng)
                    .clamp(-weight_limit, weight_limit);
                connections.push(Connection {
                    source,
                    target,
                    weight,
                    enabled: true,
                    innovation: tracker.connection(source, target),
                });
            }
        }

        Self::from_parts(tracker.next_genome_id(), None, neurons, connections, inputs, outputs)
    }

    /// Assembles a genome from raw tables and compiles its network.
    ///
    /// # Panics
    ///
    /// Panics if the tables violate a data-model invariant.
    pub fn from_parts(
        id: GenomeId,
        parent: Option<GenomeId>,
        neurons: Vec<Neuron>,
        connections: Vec<Connection>,
        inputs: Vec<NeuronId>,
        outputs: Vec<NeuronId>,
    ) -> Self {
        let network = NeuralNetwork::build(&neurons, &connections, &inputs, &outputs);
        let genome = Self {
            id,
            parent,
            neurons,
            connections,
            inputs,
            outputs,
            network,
        };
        genome.assert_invariants();
        genome
    }

    /// Deep copy with a new identity, recording `self` as the parent.
    pub fn offspring(&self, id: GenomeId) -> Genome {
        let mut child = self.clone();
        child.id = id;
        child.parent = Some(self.id);
        child
    }

    /// Identity of this genome.
    pub fn id(&self) -> GenomeId {
        self.id
    }

    /// Genome this one was copied from, if any.
    pub fn parent(&self) -> Option<GenomeId> {
        self.parent
    }

    /// Neuron table in creation order.
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// Connection table in creation order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Input neuron ids in sensory-vector order.
    pub fn inputs(&self) -> &[NeuronId] {
        &self.inputs
    }

    /// Output neuron ids in actuation-vector order.
    pub fn outputs(&self) -> &[NeuronId] {
        &self.outputs
    }

    /// Total neuron count.
    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    /// Number of hidden neurons.
    pub fn hidden_count(&self) -> usize {
        self.neurons
            .iter()
            .filter(|neuron| neuron.kind == NeuronKind::Hidden)
            .count()
    }

    /// Number of connection genes, disabled ones included.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of enabled connections.
    pub fn enabled_connection_count(&self) -> usize {
        self.connections.iter().filter(|c| c.enabled).count()
    }

    /// Cached network compiled from the current tables.
    pub fn to_network(&self) -> &NeuralNetwork {
        &self.network
    }

    /// Evaluates the cached network.
    #[inline]
    pub fn evaluate(&self, inputs: &Array1<f32>) -> Result<Array1<f32>, NeatError> {
        self.network.evaluate(inputs)
    }

    /// Recompiles the cached network after the tables changed.
    ///
    /// [`Genome::mutate`] does this itself; callers applying individual
    /// operators must call it before evaluating again.
    pub fn rebuild_network(&mut self) {
        self.network =
            NeuralNetwork::build(&self.neurons, &self.connections, &self.inputs, &self.outputs);
    }

    /// Whether a neuron with this id exists.
    pub fn contains_neuron(&self, id: NeuronId) -> bool {
        self.neurons.iter().any(|neuron| neuron.id == id)
    }

    /// Whether a connection with this innovation id exists.
    pub fn contains_innovation(&self, innovation: InnovationId) -> bool {
        self.connections.iter().any(|c| c.innovation == innovation)
    }

    /// Whether an enabled connection `source -> target` exists.
    pub fn has_enabled_link(&self, source: NeuronId, target: NeuronId) -> bool {
        self.connections
            .iter()
            .any(|c| c.enabled && c.source == source && c.target == target)
    }

    /// Whether `to` can be reached from `from` along enabled connections.
    ///
    /// A neuron always reaches itself.
    pub fn reaches(&self, from: NeuronId, to: NeuronId) -> bool {
        if from == to {
            return true;
        }
        let mut adjacency: HashMap<NeuronId, Vec<NeuronId>> = HashMap::new();
        for c in self.connections.iter().filter(|c| c.enabled) {
            adjacency.entry(c.source).or_default().push(c.target);
        }

        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = adjacency.get(&current) {
                for &neighbor in next {
                    if neighbor == to {
                        return true;
                    }
                    stack.push(neighbor);
                }
            }
        }
        false
    }

    /// Genetic distance to `other`.
    ///
    /// Connections are aligned by innovation id. With `D` genes present in
    /// only one genome, `W` the mean absolute weight difference over genes
    /// present in both (0 when none match) and `N` the larger connection
    /// count (at least 1), the distance is `c1 * D / N + c2 * W`. Matching
    /// genes are summed in innovation order, so the result is exactly
    /// symmetric.
    pub fn distance(&self, other: &Genome, coefficients: &DistanceCoefficients) -> f32 {
        let ours: BTreeMap<InnovationId, f32> = self
            .connections
            .iter()
            .map(|c| (c.innovation, c.weight))
            .collect();
        let theirs: BTreeMap<InnovationId, f32> = other
            .connections
            .iter()
            .map(|c| (c.innovation, c.weight))
            .collect();

        let mut matching = 0usize;
        let mut weight_difference = 0.0f32;
        for (innovation, weight) in &ours {
            if let Some(other_weight) = theirs.get(innovation) {
                matching += 1;
                weight_difference += (weight - other_weight).abs();
            }
        }

        let disjoint = ours.len() + theirs.len() - 2 * matching;
        let size = ours.len().max(theirs.len()).max(1) as f32;
        let mean_difference = if matching > 0 {
            weight_difference / matching as f32
        } else {
            0.0
        };

        coefficients.disjoint_coefficient * disjoint as f32 / size
            + coefficients.weight_coefficient * mean_difference
    }

    /// Checks every data-model invariant.
    ///
    /// # Panics
    ///
    /// Panics when a neuron id or innovation id is duplicated, the fixed
    /// input/output neurons are missing or mistyped, a connection dangles,
    /// loops onto itself, feeds an input, duplicates an enabled pair, or the
    /// enabled graph contains a cycle. Any of these indicates a bug in the
    /// mutation operators.
    pub fn assert_invariants(&self) {
        let kinds: HashMap<NeuronId, NeuronKind> =
            self.neurons.iter().map(|n| (n.id, n.kind)).collect();
        assert_eq!(kinds.len(), self.neurons.len(), "duplicate neuron id in {}", self.id);

        for id in &self.inputs {
            assert_eq!(kinds.get(id), Some(&NeuronKind::Input), "input {:?} missing in {}", id, self.id);
        }
        for id in &self.outputs {
            assert_eq!(kinds.get(id), Some(&NeuronKind::Output), "output {:?} missing in {}", id, self.id);
        }
        let input_total = kinds.values().filter(|&&k| k == NeuronKind::Input).count();
        let output_total = kinds.values().filter(|&&k| k == NeuronKind::Output).count();
        assert_eq!(input_total, self.inputs.len(), "stray input neuron in {}", self.id);
        assert_eq!(output_total, self.outputs.len(), "stray output neuron in {}", self.id);

        let mut innovations = HashSet::new();
        let mut enabled_pairs = HashSet::new();
        for c in &self.connections {
            assert!(
                innovations.insert(c.innovation),
                "duplicate innovation {:?} in {}",
                c.innovation,
                self.id
            );
            assert!(kinds.contains_key(&c.source), "dangling source {:?} in {}", c.source, self.id);
            let target_kind = kinds.get(&c.target);
            assert!(target_kind.is_some(), "dangling target {:?} in {}", c.target, self.id);
            assert_ne!(c.source, c.target, "self-loop on {:?} in {}", c.source, self.id);
            assert_ne!(target_kind, Some(&NeuronKind::Input), "connection into input {:?} in {}", c.target, self.id);
            if c.enabled {
                assert!(
                    enabled_pairs.insert((c.source, c.target)),
                    "duplicate enabled connection {:?} -> {:?} in {}",
                    c.source,
                    c.target,
                    self.id
                );
            }
        }

        // Compilation panics on a cycle.
        let _ = NeuralNetwork::build(&self.neurons, &self.connections, &self.inputs, &self.outputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::mutation::MutationPolicy;
    use crate::neat::sensors::Diet;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_params() -> Params {
        Params {
            input_count: 3,
            output_count: 2,
            ..Params::default()
        }
    }

    #[test]
    fn test_genesis_is_fully_connected() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let genome = Genome::genesis(&params, &mut tracker, &mut rng);

        assert_eq!(genome.neuron_count(), 5);
        assert_eq!(genome.connection_count(), 6);
        assert_eq!(genome.hidden_count(), 0);
        assert_eq!(genome.inputs(), &[NeuronId(0), NeuronId(1), NeuronId(2)]);
        assert_eq!(genome.outputs(), &[NeuronId(3), NeuronId(4)]);
        assert!(genome.parent().is_none());
    }

    #[test]
    fn test_genesis_respects_mutation_limits() {
        let params = Params {
            diet: Diet::Carnivore,
            initial_bias_range: 3.0,
            mutation: MutationPolicy {
                weight_limit: 1.0,
                bias_limit: 0.5,
                ..MutationPolicy::default()
            },
            ..Params::default()
        };
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        for _ in 0..20 {
            let genome = Genome::genesis(&params, &mut tracker, &mut rng);
            assert!(genome.connections().iter().all(|c| c.weight.abs() <= 1.0));
            assert!(genome.neurons().iter().all(|n| n.bias.abs() <= 0.5));
        }
    }

    #[test]
    fn test_genesis_genomes_share_innovations() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let a = Genome::genesis(&params, &mut tracker, &mut rng);
        let b = Genome::genesis(&params, &mut tracker, &mut rng);

        assert_ne!(a.id(), b.id());
        let innovations = |g: &Genome| g.connections().iter().map(|c| c.innovation).collect::<Vec<_>>();
        assert_eq!(innovations(&a), innovations(&b));
    }

    #[test]
    fn test_distance_weight_term() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = Genome::genesis(&params, &mut tracker, &mut rng);
        let mut b = a.offspring(tracker.next_genome_id());
        for c in &mut b.connections {
            c.weight += 0.5;
        }

        let coefficients = DistanceCoefficients {
            disjoint_coefficient: 1.0,
            weight_coefficient: 2.0,
        };
        assert!((a.distance(&b, &coefficients) - 1.0).abs() < 1e-5);
        assert_eq!(a.distance(&a, &coefficients), 0.0);
    }

    #[test]
    fn test_distance_counts_disjoint_genes() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let a = Genome::genesis(&params, &mut tracker, &mut rng);
        let mut b = a.offspring(tracker.next_genome_id());
        b.connections.truncate(3);

        let coefficients = DistanceCoefficients {
            disjoint_coefficient: 1.0,
            weight_coefficient: 0.0,
        };
        // 3 disjoint genes over a larger genome of 6 connections.
        assert!((a.distance(&b, &coefficients) - 0.5).abs() < 1e-6);
        assert_eq!(a.distance(&b, &coefficients), b.distance(&a, &coefficients));
    }

    #[test]
    fn test_offspring_records_parent() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let parent = Genome::genesis(&params, &mut tracker, &mut rng);
        let child = parent.offspring(tracker.next_genome_id());

        assert_eq!(child.parent(), Some(parent.id()));
        assert_ne!(child.id(), parent.id());
        assert_eq!(child.connections(), parent.connections());
    }

    #[test]
    fn test_reaches_follows_enabled_edges_only() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut genome = Genome::genesis(&params, &mut tracker, &mut rng);

        assert!(genome.reaches(NeuronId(0), NeuronId(3)));
        assert!(!genome.reaches(NeuronId(3), NeuronId(0)));

        for c in genome.connections.iter_mut().filter(|c| c.source == NeuronId(0)) {
            c.enabled = false;
        }
        assert!(!genome.reaches(NeuronId(0), NeuronId(3)));
    }

    #[test]
    #[should_panic(expected = "duplicate innovation")]
    fn test_duplicate_innovation_is_fatal() {
        let params = small_params();
        let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let genome = Genome::genesis(&params, &mut tracker, &mut rng);

        let mut connections = genome.connections().to_vec();
        connections[1].innovation = connections[0].innovation;
        let _ = Genome::from_parts(
            genome.id(),
            None,
            genome.neurons().to_vec(),
            connections,
            genome.inputs().to_vec(),
            genome.outputs().to_vec(),
        );
    }
}

//! Feed-forward evaluation of a genome's neuron/connection graph.
//!
//! A [`NeuralNetwork`] is compiled once from a genome's tables and then
//! evaluated every simulation step. Compilation resolves neuron ids to dense
//! slots, keeps only enabled connections as per-target incoming edge lists,
//! and fixes a topological evaluation order. Evaluation itself allocates one
//! scratch buffer and never mutates the network, so many agents can be
//! evaluated in parallel.
//!
//! Recurrent topologies are not supported: the mutation operators refuse to
//! close a cycle, and a cycle reaching [`NeuralNetwork::build`] is treated as
//! a bug and panics.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::error::NeatError;
use super::genome::{Connection, Neuron, NeuronKind};
use super::innovation::NeuronId;

/// Activation function attached to a neuron.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Pass-through, used by input neurons.
    Identity,
    /// Hyperbolic tangent, shared by every hidden and output neuron.
    ///
    /// Bounded to `(-1, 1)` with `tanh(0) = 0` and unit slope at the origin,
    /// which is what lets a freshly inserted hidden neuron approximately
    /// forward its input.
    Tanh,
}

impl Activation {
    /// Applies the function to a pre-activation sum.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Identity => x,
            Activation::Tanh => x.tanh(),
        }
    }

    /// Activation used for neurons of the given role.
    pub fn for_kind(kind: NeuronKind) -> Self {
        match kind {
            NeuronKind::Input => Activation::Identity,
            NeuronKind::Hidden | NeuronKind::Output => Activation::Tanh,
        }
    }
}

/// Compiled, immutable view of a genome used on the hot path.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralNetwork {
    /// Slots of the input neurons, in input-vector order.
    input_slots: Vec<usize>,
    /// Slots of the output neurons, in output-vector order.
    output_slots: Vec<usize>,
    /// Non-input slots in topological order.
    order: Vec<usize>,
    biases: Vec<f32>,
    activations: Vec<Activation>,
    /// `edge_offsets[slot]..edge_offsets[slot + 1]` indexes the incoming edges of `slot`.
    edge_offsets: Vec<usize>,
    edge_sources: Vec<usize>,
    edge_weights: Vec<f32>,
}

impl NeuralNetwork {
    /// Compiles a network from neuron and connection tables.
    ///
    /// `inputs` and `outputs` give the fixed ordering of the external vectors.
    ///
    /// # Panics
    ///
    /// Panics on a dangling connection, a duplicate neuron id, an enabled
    /// connection into an input neuron, or a cycle among enabled connections.
    pub fn build(
        neurons: &[Neuron],
        connections: &[Connection],
        inputs: &[NeuronId],
        outputs: &[NeuronId],
    ) -> Self {
        let n = neurons.len();
        let slot_of: HashMap<NeuronId, usize> = neurons
            .iter()
            .enumerate()
            .map(|(slot, neuron)| (neuron.id, slot))
            .collect();
        assert_eq!(slot_of.len(), n, "duplicate neuron id in genome");

        let slot = |id: NeuronId| -> usize {
            match slot_of.get(&id) {
                Some(&slot) => slot,
                None => panic!("connection references missing neuron {:?}", id),
            }
        };

        let mut incoming: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n];
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];

        for connection in connections {
            let source = slot(connection.source);
            let target = slot(connection.target);
            if !connection.enabled {
                continue;
            }
            assert!(
                neurons[target].kind != NeuronKind::Input,
                "enabled connection into input neuron {:?}",
                connection.target
            );
            incoming[target].push((source, connection.weight));
            outgoing[source].push(target);
            in_degree[target] += 1;
        }

        // Kahn's algorithm; the min-heap keeps ties in creation order.
        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&slot| in_degree[slot] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(current)) = ready.pop() {
            order.push(current);
            for &next in &outgoing[current] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }
        assert_eq!(order.len(), n, "cycle among enabled connections");
        order.retain(|&slot| neurons[slot].kind != NeuronKind::Input);

        let mut edge_offsets = Vec::with_capacity(n + 1);
        let mut edge_sources = Vec::new();
        let mut edge_weights = Vec::new();
        edge_offsets.push(0);
        for edges in &incoming {
            for &(source, weight) in edges {
                edge_sources.push(source);
                edge_weights.push(weight);
            }
            edge_offsets.push(edge_sources.len());
        }

        Self {
            input_slots: inputs.iter().map(|&id| slot(id)).collect(),
            output_slots: outputs.iter().map(|&id| slot(id)).collect(),
            order,
            biases: neurons.iter().map(|neuron| neuron.bias).collect(),
            activations: neurons.iter().map(|neuron| neuron.activation).collect(),
            edge_offsets,
            edge_sources,
            edge_weights,
        }
    }

    /// Runs a forward pass.
    ///
    /// Returns [`NeatError::Dimension`] when `inputs` does not have exactly
    /// [`NeuralNetwork::input_count`] entries.
    #[inline]
    pub fn evaluate(&self, inputs: &Array1<f32>) -> Result<Array1<f32>, NeatError> {
        if inputs.len() != self.input_slots.len() {
            return Err(NeatError::Dimension {
                expected: self.input_slots.len(),
                actual: inputs.len(),
            });
        }

        let mut values = vec![0.0f32; self.biases.len()];
        for (&slot, &x) in self.input_slots.iter().zip(inputs.iter()) {
            values[slot] = x;
        }

        for &slot in &self.order {
            let span = self.edge_offsets[slot]..self.edge_offsets[slot + 1];
            let sum = self.edge_sources[span.clone()]
                .iter()
                .zip(&self.edge_weights[span])
                .fold(self.biases[slot], |acc, (&source, &weight)| {
                    acc + weight * values[source]
                });
            values[slot] = self.activations[slot].apply(sum);
        }

        Ok(self.output_slots.iter().map(|&slot| values[slot]).collect())
    }

    /// Number of inputs the network expects.
    pub fn input_count(&self) -> usize {
        self.input_slots.len()
    }

    /// Number of outputs the network produces.
    pub fn output_count(&self) -> usize {
        self.output_slots.len()
    }

    /// Total number of neurons, inputs included.
    pub fn neuron_count(&self) -> usize {
        self.biases.len()
    }

    /// Number of enabled connections that take part in evaluation.
    pub fn edge_count(&self) -> usize {
        self.edge_sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neat::innovation::InnovationId;

    fn neuron(id: u32, kind: NeuronKind, bias: f32) -> Neuron {
        Neuron {
            id: NeuronId(id),
            kind,
            bias,
            activation: Activation::for_kind(kind),
        }
    }

    fn link(source: u32, target: u32, weight: f32, innovation: u64) -> Connection {
        Connection {
            source: NeuronId(source),
            target: NeuronId(target),
            weight,
            enabled: true,
            innovation: InnovationId(innovation),
        }
    }

    #[test]
    fn test_single_layer_forward() {
        let neurons = vec![
            neuron(0, NeuronKind::Input, 0.0),
            neuron(1, NeuronKind::Input, 0.0),
            neuron(2, NeuronKind::Output, 0.1),
        ];
        let connections = vec![link(0, 2, 0.5, 0), link(1, 2, -0.25, 1)];
        let net = NeuralNetwork::build(
            &neurons,
            &connections,
            &[NeuronId(0), NeuronId(1)],
            &[NeuronId(2)],
        );

        let out = net.evaluate(&Array1::from_vec(vec![1.0, 2.0])).unwrap();
        let expected = (0.1f32 + 0.5 - 0.5).tanh();
        assert_eq!((net.input_count(), net.output_count()), (2, 1));
        assert_eq!((net.neuron_count(), net.edge_count()), (3, 2));
        assert_eq!(out.len(), 1);
        assert!((out[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_hidden_created_after_its_consumer() {
        // Hidden 4 feeds hidden 3 even though 3 was created first.
        let neurons = vec![
            neuron(0, NeuronKind::Input, 0.0),
            neuron(1, NeuronKind::Output, 0.0),
            neuron(3, NeuronKind::Hidden, 0.0),
            neuron(4, NeuronKind::Hidden, 0.2),
        ];
        let connections = vec![link(0, 4, 1.0, 0), link(4, 3, 1.0, 1), link(3, 1, 1.0, 2)];
        let net = NeuralNetwork::build(&neurons, &connections, &[NeuronId(0)], &[NeuronId(1)]);

        let out = net.evaluate(&Array1::from_vec(vec![0.3])).unwrap();
        let expected = (0.5f32).tanh().tanh().tanh();
        assert!((out[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_connections_are_ignored() {
        let neurons = vec![
            neuron(0, NeuronKind::Input, 0.0),
            neuron(1, NeuronKind::Output, 0.0),
        ];
        let mut connection = link(0, 1, 3.0, 0);
        connection.enabled = false;
        let net = NeuralNetwork::build(&neurons, &[connection], &[NeuronId(0)], &[NeuronId(1)]);

        let out = net.evaluate(&Array1::from_vec(vec![1.0])).unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(net.edge_count(), 0);
    }

    #[test]
    fn test_dimension_error() {
        let neurons = vec![
            neuron(0, NeuronKind::Input, 0.0),
            neuron(1, NeuronKind::Output, 0.0),
        ];
        let net = NeuralNetwork::build(&neurons, &[link(0, 1, 1.0, 0)], &[NeuronId(0)], &[NeuronId(1)]);

        match net.evaluate(&Array1::zeros(3)) {
            Err(NeatError::Dimension { expected, actual }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 3);
            }
            other => panic!("expected a dimension error, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "cycle")]
    fn test_cycle_is_fatal() {
        let neurons = vec![
            neuron(0, NeuronKind::Input, 0.0),
            neuron(1, NeuronKind::Output, 0.0),
            neuron(2, NeuronKind::Hidden, 0.0),
        ];
        let connections = vec![link(0, 2, 1.0, 0), link(2, 1, 1.0, 1), link(1, 2, 1.0, 2)];
        let _ = NeuralNetwork::build(&neurons, &connections, &[NeuronId(0)], &[NeuronId(1)]);
    }

    #[test]
    #[should_panic(expected = "missing neuron")]
    fn test_dangling_connection_is_fatal() {
        let neurons = vec![
            neuron(0, NeuronKind::Input, 0.0),
            neuron(1, NeuronKind::Output, 0.0),
        ];
        let _ = NeuralNetwork::build(&neurons, &[link(0, 7, 1.0, 0)], &[NeuronId(0)], &[NeuronId(1)]);
    }
}

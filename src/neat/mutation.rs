//! Genome mutations (NEAT-style).
//!
//! Each operator is a small transformation on a [`Genome`] that either
//! applies or degrades to a reported no-op. [`Genome::mutate`] runs them in a
//! fixed order, each gated by its own probability, and rebuilds the cached
//! network once at the end.

use rand::Rng;
use rand::seq::IndexedRandom;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::error::NeatError;
use super::genome::{Connection, Genome, Neuron, NeuronKind};
use super::innovation::{InnovationTracker, NeuronId};

/// Configuration for mutation operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationPolicy {
    /// Probability of mutating each enabled connection weight.
    pub weight_mutation_rate: f32,
    /// Standard deviation of the Gaussian weight nudge.
    pub weight_mutation_strength: f32,
    /// Probability that a mutated weight is redrawn instead of nudged.
    pub weight_reset_rate: f32,
    /// Weights are clamped to `±weight_limit`.
    pub weight_limit: f32,
    /// Fresh weights (resets, new connections) are uniform in `±initial_weight_range`.
    pub initial_weight_range: f32,
    /// Probability of mutating each hidden or output bias.
    pub bias_mutation_rate: f32,
    /// Standard deviation of the Gaussian bias nudge.
    pub bias_mutation_strength: f32,
    /// Biases are clamped to `±bias_limit`.
    pub bias_limit: f32,
    /// Probability of splitting a connection with a new hidden neuron.
    pub add_neuron_rate: f32,
    /// Probability of deleting a hidden neuron.
    pub remove_neuron_rate: f32,
    /// Probability of adding a new connection.
    pub add_connection_rate: f32,
    /// Random `(source, target)` draws before add-connection gives up.
    pub add_connection_attempts: usize,
    /// Maximum neurons per genome, inputs and outputs included.
    pub max_neurons: usize,
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self {
            weight_mutation_rate: 0.8,
            weight_mutation_strength: 0.3,
            weight_reset_rate: 0.1,
            weight_limit: 2.0,
            initial_weight_range: 1.0,
            bias_mutation_rate: 0.4,
            bias_mutation_strength: 0.3,
            bias_limit: 2.0,
            add_neuron_rate: 0.03,
            remove_neuron_rate: 0.01,
            add_connection_rate: 0.05,
            add_connection_attempts: 20,
            max_neurons: 50,
        }
    }
}

impl MutationPolicy {
    /// Rejects probabilities outside `[0, 1]` and non-positive magnitudes.
    pub fn validate(&self) -> Result<(), NeatError> {
        let probabilities = [
            ("weight_mutation_rate", self.weight_mutation_rate),
            ("weight_reset_rate", self.weight_reset_rate),
            ("bias_mutation_rate", self.bias_mutation_rate),
            ("add_neuron_rate", self.add_neuron_rate),
            ("remove_neuron_rate", self.remove_neuron_rate),
            ("add_connection_rate", self.add_connection_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(NeatError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let strengths = [
            ("weight_mutation_strength", self.weight_mutation_strength),
            ("bias_mutation_strength", self.bias_mutation_strength),
        ];
        for (name, value) in strengths {
            if !value.is_finite() || value < 0.0 {
                return Err(NeatError::InvalidParams(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        let limits = [
            ("weight_limit", self.weight_limit),
            ("bias_limit", self.bias_limit),
            ("initial_weight_range", self.initial_weight_range),
        ];
        for (name, value) in limits {
            if !value.is_finite() || value <= 0.0 {
                return Err(NeatError::InvalidParams(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Why a structural operator changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// The genome already holds `max_neurons` neurons.
    AtCapacity,
    /// There is no enabled connection to split.
    NoEnabledConnection,
    /// There is no hidden neuron to remove.
    NoHiddenNeuron,
    /// Every draw hit an existing pair, a self-loop or a cycle.
    NoValidPair,
}

/// Result of one structural operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StructuralOutcome {
    /// The gating draw failed; the operator did not run.
    #[default]
    NotAttempted,
    /// The genome changed.
    Applied,
    /// The operator ran and changed nothing.
    NoOp(NoOpReason),
}

impl StructuralOutcome {
    /// Whether the genome changed.
    pub fn is_applied(self) -> bool {
        self == StructuralOutcome::Applied
    }
}

/// What a call to [`Genome::mutate`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    /// Weights nudged by Gaussian noise.
    pub weights_nudged: usize,
    /// Weights redrawn uniformly.
    pub weights_reset: usize,
    /// Biases nudged by Gaussian noise.
    pub biases_mutated: usize,
    /// Add-neuron outcome.
    pub add_neuron: StructuralOutcome,
    /// Remove-neuron outcome.
    pub remove_neuron: StructuralOutcome,
    /// Add-connection outcome.
    pub add_connection: StructuralOutcome,
}

impl MutationReport {
    /// Whether the topology changed.
    pub fn topology_changed(&self) -> bool {
        self.add_neuron.is_applied()
            || self.remove_neuron.is_applied()
            || self.add_connection.is_applied()
    }

    /// Whether anything changed.
    pub fn changed(&self) -> bool {
        self.weights_nudged + self.weights_reset + self.biases_mutated > 0
            || self.topology_changed()
    }
}

impl Genome {
    /// Applies every operator in order: weights, biases, add neuron, remove
    /// neuron, add connection.
    ///
    /// The cached network is rebuilt when anything changed. In debug builds
    /// the invariants are re-checked afterwards.
    ///
    /// # Panics
    ///
    /// `policy` must pass [`MutationPolicy::validate`]; a rate outside
    /// `[0, 1]` panics when it is sampled.
    pub fn mutate<R: Rng + ?Sized>(
        &mut self,
        policy: &MutationPolicy,
        tracker: &mut InnovationTracker,
        rng: &mut R,
    ) -> MutationReport {
        debug_assert!(policy.validate().is_ok(), "mutation policy must be validated");
        let mut report = MutationReport::default();

        let (nudged, reset) = self.perturb_weights(policy, rng);
        report.weights_nudged = nudged;
        report.weights_reset = reset;
        report.biases_mutated = self.mutate_biases(policy, rng);

        if rng.random_bool(f64::from(policy.add_neuron_rate)) {
            report.add_neuron = self.add_neuron(policy, tracker, rng);
        }
        if rng.random_bool(f64::from(policy.remove_neuron_rate)) {
            report.remove_neuron = self.remove_neuron(rng);
        }
        if rng.random_bool(f64::from(policy.add_connection_rate)) {
            report.add_connection = self.add_connection(policy, tracker, rng);
        }

        if report.changed() {
            self.rebuild_network();
        }

        #[cfg(debug_assertions)]
        {
            self.assert_invariants();
            assert!(
                self.neuron_count() <= policy.max_neurons.max(self.inputs.len() + self.outputs.len()),
                "{} exceeds max_neurons",
                self.id
            );
        }

        trace!(
            genome = %self.id,
            nudged = report.weights_nudged,
            reset = report.weights_reset,
            biases = report.biases_mutated,
            add_neuron = ?report.add_neuron,
            remove_neuron = ?report.remove_neuron,
            add_connection = ?report.add_connection,
            "mutated"
        );
        report
    }

    /// Nudges or resets enabled connection weights. Returns `(nudged, reset)`.
    ///
    /// Does not rebuild the network.
    pub fn perturb_weights<R: Rng + ?Sized>(
        &mut self,
        policy: &MutationPolicy,
        rng: &mut R,
    ) -> (usize, usize) {
        let range = policy.initial_weight_range;
        let limit = policy.weight_limit;
        let mut nudged = 0;
        let mut reset = 0;

        for connection in self.connections.iter_mut().filter(|c| c.enabled) {
            if !rng.random_bool(f64::from(policy.weight_mutation_rate)) {
                continue;
            }
            if rng.random_bool(f64::from(policy.weight_reset_rate)) {
                connection.weight = rng.random_range(-range..=range);
                reset += 1;
            } else {
                let noise: f32 = rng.sample(StandardNormal);
                connection.weight += noise * policy.weight_mutation_strength;
                nudged += 1;
            }
            connection.weight = connection.weight.clamp(-limit, limit);
        }
        (nudged, reset)
    }

    /// Nudges hidden and output biases. Returns the number changed.
    ///
    /// Does not rebuild the network.
    pub fn mutate_biases<R: Rng + ?Sized>(&mut self, policy: &MutationPolicy, rng: &mut R) -> usize {
        let limit = policy.bias_limit;
        let mut mutated = 0;
        for neuron in self.neurons.iter_mut().filter(|n| n.kind != NeuronKind::Input) {
            if rng.random_bool(f64::from(policy.bias_mutation_rate)) {
                let noise: f32 = rng.sample(StandardNormal);
                neuron.bias = (neuron.bias + noise * policy.bias_mutation_strength).clamp(-limit, limit);
                mutated += 1;
            }
        }
        mutated
    }

    /// Splits a random enabled connection with a new hidden neuron.
    ///
    /// The old connection is disabled; `source -> new` gets weight 1 and
    /// `new -> target` keeps the old weight, so behaviour is approximately
    /// preserved near the origin. Does not rebuild the network.
    pub fn add_neuron<R: Rng + ?Sized>(
        &mut self,
        policy: &MutationPolicy,
        tracker: &mut InnovationTracker,
        rng: &mut R,
    ) -> StructuralOutcome {
        if self.neurons.len() >= policy.max_neurons {
            return StructuralOutcome::NoOp(NoOpReason::AtCapacity);
        }
        let enabled: Vec<usize> = self
            .connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled)
            .map(|(index, _)| index)
            .collect();
        let Some(&index) = enabled.choose(rng) else {
            return StructuralOutcome::NoOp(NoOpReason::NoEnabledConnection);
        };

        let split = &mut self.connections[index];
        split.enabled = false;
        let (source, target, weight, innovation) =
            (split.source, split.target, split.weight, split.innovation);

        let mut markers = tracker.split(innovation);
        if self.contains_neuron(markers.neuron)
            || self.contains_innovation(markers.incoming)
            || self.contains_innovation(markers.outgoing)
        {
            markers = tracker.fresh_split();
        }

        self.neurons.push(Neuron::new(markers.neuron, NeuronKind::Hidden, 0.0));
        self.connections.push(Connection {
            source,
            target: markers.neuron,
            weight: 1.0,
            enabled: true,
            innovation: markers.incoming,
        });
        self.connections.push(Connection {
            source: markers.neuron,
            target,
            weight,
            enabled: true,
            innovation: markers.outgoing,
        });
        StructuralOutcome::Applied
    }

    /// Deletes a random hidden neuron and every connection touching it.
    ///
    /// Does not rebuild the network.
    pub fn remove_neuron<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StructuralOutcome {
        let hidden: Vec<NeuronId> = self
            .neurons
            .iter()
            .filter(|n| n.kind == NeuronKind::Hidden)
            .map(|n| n.id)
            .collect();
        let Some(&victim) = hidden.choose(rng) else {
            return StructuralOutcome::NoOp(NoOpReason::NoHiddenNeuron);
        };

        self.neurons.retain(|n| n.id != victim);
        self.connections
            .retain(|c| c.source != victim && c.target != victim);
        StructuralOutcome::Applied
    }

    /// Adds a connection between a random valid pair.
    ///
    /// A draw is rejected when it is a self-loop, targets an input, duplicates
    /// an enabled pair, or would close a cycle. Does not rebuild the network.
    pub fn add_connection<R: Rng + ?Sized>(
        &mut self,
        policy: &MutationPolicy,
        tracker: &mut InnovationTracker,
        rng: &mut R,
    ) -> StructuralOutcome {
        let sources: Vec<NeuronId> = self.neurons.iter().map(|n| n.id).collect();
        let targets: Vec<NeuronId> = self
            .neurons
            .iter()
            .filter(|n| n.kind != NeuronKind::Input)
            .map(|n| n.id)
            .collect();

        for _ in 0..policy.add_connection_attempts {
            let (Some(&source), Some(&target)) = (sources.choose(rng), targets.choose(rng)) else {
                break;
            };
            if source == target
                || self.has_enabled_link(source, target)
                || self.reaches(target, source)
            {
                continue;
            }

            let mut innovation = tracker.connection(source, target);
            if self.contains_innovation(innovation) {
                innovation = tracker.fresh_connection();
            }
            let range = policy.initial_weight_range;
            self.connections.push(Connection {
                source,
                target,
                weight: rng.random_range(-range..=range),
                enabled: true,
                innovation,
            });
            return StructuralOutcome::Applied;
        }
        StructuralOutcome::NoOp(NoOpReason::NoValidPair)
    }
}

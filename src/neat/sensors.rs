//! Fixed-length sensory and actuation vectors exchanged with the simulator.
//!
//! The engine itself only needs the vector lengths. This module pins down the
//! standard layout the simulator uses so the genesis weight seeding and any
//! host code agree on which slot means what.

use ndarray::Array1;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::NeatError;

/// Length of the standard sensory vector.
pub const INPUT_COUNT: usize = 10;
/// Length of the standard actuation vector.
pub const OUTPUT_COUNT: usize = 4;

/// Indices into the sensory vector.
pub mod input {
    /// Constant 1.0.
    pub const BIAS: usize = 0;
    /// Normalised energy level.
    pub const ENERGY: usize = 1;
    /// Direction to the nearest food, x.
    pub const FOOD_DX: usize = 2;
    /// Direction to the nearest food, y.
    pub const FOOD_DY: usize = 3;
    /// Direction to the nearest threat, x.
    pub const THREAT_DX: usize = 4;
    /// Direction to the nearest threat, y.
    pub const THREAT_DY: usize = 5;
    /// Direction to the nearest prey, x.
    pub const PREY_DX: usize = 6;
    /// Direction to the nearest prey, y.
    pub const PREY_DY: usize = 7;
    /// Normalised time since the last reproduction.
    pub const TIME_SINCE_REPRODUCTION: usize = 8;
    /// Local population density.
    pub const DENSITY: usize = 9;
}

/// Indices into the actuation vector.
pub mod output {
    /// Desired movement, x.
    pub const MOVE_X: usize = 0;
    /// Desired movement, y.
    pub const MOVE_Y: usize = 1;
    /// Eat or attack intent.
    pub const ACTION: usize = 2;
    /// Migration intent.
    pub const MIGRATE: usize = 3;
}

/// What an agent perceives in one simulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensoryInput {
    /// Energy level, normalised to `[0, 1]`.
    pub energy: f32,
    /// Unit direction to the nearest food, zero when none is visible.
    pub food: [f32; 2],
    /// Unit direction to the nearest threat, zero when none is visible.
    pub threat: [f32; 2],
    /// Unit direction to the nearest prey, zero when none is visible.
    pub prey: [f32; 2],
    /// Time since the last reproduction, normalised to `[0, 1]`.
    pub time_since_reproduction: f32,
    /// Local density, normalised to `[0, 1]`.
    pub density: f32,
}

impl SensoryInput {
    /// Packs the reading into the standard input vector.
    pub fn to_inputs(&self) -> Array1<f32> {
        let mut inputs = Array1::zeros(INPUT_COUNT);
        inputs[input::BIAS] = 1.0;
        inputs[input::ENERGY] = self.energy;
        inputs[input::FOOD_DX] = self.food[0];
        inputs[input::FOOD_DY] = self.food[1];
        inputs[input::THREAT_DX] = self.threat[0];
        inputs[input::THREAT_DY] = self.threat[1];
        inputs[input::PREY_DX] = self.prey[0];
        inputs[input::PREY_DY] = self.prey[1];
        inputs[input::TIME_SINCE_REPRODUCTION] = self.time_since_reproduction;
        inputs[input::DENSITY] = self.density;
        inputs
    }
}

/// What an agent decided to do, each entry in `(-1, 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Actuation {
    /// Desired movement, x.
    pub move_x: f32,
    /// Desired movement, y.
    pub move_y: f32,
    /// Eat or attack intent.
    pub action: f32,
    /// Migration intent.
    pub migrate: f32,
}

impl Actuation {
    /// Unpacks a network output vector.
    pub fn from_outputs(outputs: &Array1<f32>) -> Result<Self, NeatError> {
        if outputs.len() != OUTPUT_COUNT {
            return Err(NeatError::Dimension {
                expected: OUTPUT_COUNT,
                actual: outputs.len(),
            });
        }
        Ok(Self {
            move_x: outputs[output::MOVE_X],
            move_y: outputs[output::MOVE_Y],
            action: outputs[output::ACTION],
            migrate: outputs[output::MIGRATE],
        })
    }
}

/// Behavioural prior applied to genesis weights.
///
/// Biased pairs assume the standard layout; with a custom layout only
/// [`Diet::Neutral`] is meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Diet {
    /// Every weight uniform in `±initial_weight_range`.
    #[default]
    Neutral,
    /// Moves toward food and away from threats.
    Herbivore,
    /// Moves toward prey and attacks it.
    Carnivore,
}

impl Diet {
    /// Draws the genesis weight of the `input -> output` connection.
    pub fn initial_weight<R: Rng + ?Sized>(
        self,
        input_index: usize,
        output_index: usize,
        range: f32,
        rng: &mut R,
    ) -> f32 {
        let (low, high) = self
            .weight_bounds(input_index, output_index)
            .unwrap_or((-range, range));
        rng.random_range(low..=high)
    }

    fn weight_bounds(self, input_index: usize, output_index: usize) -> Option<(f32, f32)> {
        match self {
            Diet::Neutral => None,
            Diet::Herbivore => match (input_index, output_index) {
                (input::FOOD_DX, output::MOVE_X) | (input::FOOD_DY, output::MOVE_Y) => {
                    Some((0.8, 2.0))
                }
                (input::THREAT_DX, output::MOVE_X) | (input::THREAT_DY, output::MOVE_Y) => {
                    Some((-2.0, -0.8))
                }
                _ => None,
            },
            Diet::Carnivore => match (input_index, output_index) {
                (input::PREY_DX, output::MOVE_X) | (input::PREY_DY, output::MOVE_Y) => {
                    Some((1.2, 2.0))
                }
                (input::PREY_DX | input::PREY_DY, output::ACTION) => Some((0.6, 1.5)),
                _ => None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sensory_layout() {
        let reading = SensoryInput {
            energy: 0.5,
            food: [0.6, -0.8],
            prey: [1.0, 0.0],
            density: 0.25,
            ..SensoryInput::default()
        };
        let inputs = reading.to_inputs();

        assert_eq!(inputs.len(), INPUT_COUNT);
        assert_eq!(inputs[input::BIAS], 1.0);
        assert_eq!(inputs[input::FOOD_DY], -0.8);
        assert_eq!(inputs[input::PREY_DX], 1.0);
        assert_eq!(inputs[input::THREAT_DX], 0.0);
        assert_eq!(inputs[input::DENSITY], 0.25);
    }

    #[test]
    fn test_actuation_requires_standard_length() {
        let outputs = Array1::from_vec(vec![0.1, -0.2, 0.3, -0.4]);
        let actuation = Actuation::from_outputs(&outputs).unwrap();
        assert_eq!(actuation.move_y, -0.2);
        assert_eq!(actuation.migrate, -0.4);

        assert!(Actuation::from_outputs(&Array1::zeros(3)).is_err());
    }

    #[test]
    fn test_carnivore_prior_targets_prey() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..50 {
            let w = Diet::Carnivore.initial_weight(input::PREY_DX, output::MOVE_X, 1.0, &mut rng);
            assert!((1.2..=2.0).contains(&w));
            let w = Diet::Carnivore.initial_weight(input::ENERGY, output::MOVE_X, 1.0, &mut rng);
            assert!((-1.0..=1.0).contains(&w));
        }
    }

    #[test]
    fn test_herbivore_prior_flees_threats() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        for _ in 0..50 {
            let w = Diet::Herbivore.initial_weight(input::THREAT_DY, output::MOVE_Y, 1.0, &mut rng);
            assert!((-2.0..=-0.8).contains(&w));
        }
    }
}

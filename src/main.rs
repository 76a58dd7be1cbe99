//! Headless demo: evolves foraging controllers on randomly drawn sensory scenes.
//!
//! Each generation draws a batch of scenes (food, threat and prey directions
//! plus energy and density readings). A genome scores well when it moves
//! toward food, away from threats, and triggers its action when prey is
//! close. Agents are evaluated in parallel.

use std::path::PathBuf;

use clap::Parser;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use neuroevo::neat::error::NeatError;
use neuroevo::neat::evolution::EvolutionEngine;
use neuroevo::neat::genome::Genome;
use neuroevo::neat::params::Params;
use neuroevo::neat::selection::Scored;
use neuroevo::neat::sensors::{self, Actuation, SensoryInput};

#[derive(Parser, Debug)]
#[command(name = "neuroevo", about = "Evolve foraging controllers with NEAT")]
struct Args {
    /// JSON parameter file; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of generations to run.
    #[arg(long, default_value_t = 50)]
    generations: u32,
    /// Scenes drawn per generation.
    #[arg(long, default_value_t = 32)]
    scenes: usize,
    /// Overrides the seed from the parameter file.
    #[arg(long)]
    seed: Option<u64>,
    /// Writes the effective parameters to this file and exits.
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("neuroevo=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut params = match &args.config {
        Some(path) => Params::load_from_file(path)?,
        None => Params::default(),
    };
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    if let Some(path) = &args.dump_config {
        params.save_to_file(path)?;
        info!(path = %path.display(), "wrote parameters");
        return Ok(());
    }
    if params.input_count != sensors::INPUT_COUNT || params.output_count != sensors::OUTPUT_COUNT {
        return Err(NeatError::InvalidParams(format!(
            "the forage demo needs {} inputs and {} outputs",
            sensors::INPUT_COUNT,
            sensors::OUTPUT_COUNT
        ))
        .into());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut engine = EvolutionEngine::new(params)?;
    let mut population = engine.genesis(&mut rng);
    info!(population = population.len(), seed = engine.params().seed, "starting evolution");

    for _ in 0..args.generations {
        let scenes: Vec<SensoryInput> = (0..args.scenes).map(|_| random_scene(&mut rng)).collect();
        let scored = population
            .into_par_iter()
            .map(|genome| {
                let fitness = forage_fitness(&genome, &scenes)?;
                Ok(Scored::new(genome, fitness))
            })
            .collect::<Result<Vec<_>, NeatError>>()?;
        population = engine.next_generation(scored, &mut rng)?;
    }

    if let Some(best) = engine.history().best_fitness_ever() {
        info!(
            generations = engine.generation(),
            best,
            trend = engine.history().mean_fitness_trend(),
            species = engine.species().species_count(),
            "evolution finished"
        );
    }
    Ok(())
}

fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> [f32; 2] {
    let angle = rng.random_range(0.0..std::f32::consts::TAU);
    [angle.cos(), angle.sin()]
}

/// Direction of a target seen with probability `p`, zero otherwise.
fn visible<R: Rng + ?Sized>(rng: &mut R, p: f64) -> [f32; 2] {
    if rng.random_bool(p) {
        random_direction(rng)
    } else {
        [0.0, 0.0]
    }
}

fn random_scene<R: Rng + ?Sized>(rng: &mut R) -> SensoryInput {
    SensoryInput {
        energy: rng.random(),
        food: visible(rng, 0.8),
        threat: visible(rng, 0.4),
        prey: visible(rng, 0.3),
        time_since_reproduction: rng.random(),
        density: rng.random(),
    }
}

fn forage_fitness(genome: &Genome, scenes: &[SensoryInput]) -> Result<f32, NeatError> {
    let mut total = 0.0;
    for scene in scenes {
        let act = Actuation::from_outputs(&genome.evaluate(&scene.to_inputs())?)?;
        let toward = |direction: [f32; 2]| act.move_x * direction[0] + act.move_y * direction[1];
        total += toward(scene.food) - 0.5 * toward(scene.threat);
        let prey_visible = scene.prey != [0.0, 0.0];
        if prey_visible {
            total += 0.5 * act.action;
        }
    }
    Ok((total / scenes.len().max(1) as f32).max(0.0))
}

//! Performance benchmarks for network evaluation and generation transitions

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use neuroevo::neat::evolution::EvolutionEngine;
use neuroevo::neat::genome::Genome;
use neuroevo::neat::innovation::InnovationTracker;
use neuroevo::neat::mutation::MutationPolicy;
use neuroevo::neat::params::Params;
use neuroevo::neat::selection::Scored;

fn benchmark_evaluate(c: &mut Criterion) {
    let params = Params::default();
    let mut tracker = InnovationTracker::new(params.input_count, params.output_count);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let inputs = Array1::from_elem(params.input_count, 0.5f32);

    let minimal = Genome::genesis(&params, &mut tracker, &mut rng);
    c.bench_function("evaluate_minimal", |b| {
        b.iter(|| minimal.evaluate(black_box(&inputs)))
    });

    let growth = MutationPolicy {
        add_neuron_rate: 1.0,
        add_connection_rate: 1.0,
        remove_neuron_rate: 0.0,
        ..params.mutation.clone()
    };
    let mut complex = minimal.clone();
    for _ in 0..20 {
        complex.mutate(&growth, &mut tracker, &mut rng);
    }
    c.bench_function("evaluate_complex", |b| {
        b.iter(|| complex.evaluate(black_box(&inputs)))
    });
}

fn benchmark_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_generation");

    for population_size in [50usize, 150, 500].iter() {
        let params = Params {
            population_size: *population_size,
            ..Params::default()
        };
        group.bench_with_input(
            BenchmarkId::new("population", population_size),
            population_size,
            |b, _| {
                b.iter_batched(
                    || {
                        let mut engine = EvolutionEngine::new(params.clone()).unwrap();
                        let mut rng = ChaCha8Rng::seed_from_u64(7);
                        let scored: Vec<Scored> = engine
                            .genesis(&mut rng)
                            .into_iter()
                            .enumerate()
                            .map(|(i, g)| Scored::new(g, (i % 17) as f32))
                            .collect();
                        (engine, rng, scored)
                    },
                    |(mut engine, mut rng, scored)| engine.next_generation(scored, &mut rng),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_evaluate, benchmark_generation);
criterion_main!(benches);

//! Criterion benchmarks for the estimation engine.
//!
//! Measures Nataf sampling and transform maps across input dimensions, and
//! end-to-end two-level estimation runs across budgets, to characterise
//! scaling behaviour.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use uq_core::math::correlation::CorrelationMatrix;
use uq_engine::fidelity::{ClosureModel, FidelityModel};
use uq_engine::mfmc::{MfmcConfig, MfmcEngine};
use uq_models::correlation_model::{CorrelationModel, RandomVariable};
use uq_models::marginals::Marginal;
use uq_models::nataf::NatafTransform;

/// Mixed normal/lognormal variables under an AR(1)-style correlation.
fn correlated_transform(dim: usize) -> NatafTransform {
    let variables: Vec<RandomVariable> = (0..dim)
        .map(|i| {
            let marginal = if i % 2 == 0 {
                Marginal::normal(1.0, 0.3).unwrap()
            } else {
                Marginal::lognormal(0.0, 0.25).unwrap()
            };
            RandomVariable::new(format!("x{i}"), marginal)
        })
        .collect();

    let mut data = vec![0.0; dim * dim];
    for i in 0..dim {
        for j in 0..dim {
            data[i * dim + j] = 0.2f64.powi((i as i32 - j as i32).abs());
        }
    }
    let correlation = CorrelationMatrix::new(data, dim).unwrap();
    let model = CorrelationModel::new(variables, correlation).unwrap();
    NatafTransform::new(model).unwrap()
}

/// Two-level engine over independent normal inputs.
fn two_level_engine(budget: f64) -> MfmcEngine {
    let variables = vec![
        RandomVariable::new("x0", Marginal::normal(0.0, 1.0).unwrap()),
        RandomVariable::new("x1", Marginal::normal(0.0, 1.0).unwrap()),
    ];
    let model = CorrelationModel::new(variables, CorrelationMatrix::identity(2)).unwrap();
    let transform = NatafTransform::new(model).unwrap();

    let fine: Box<dyn FidelityModel> = Box::new(ClosureModel::new("fine", 1.0, |x: &[f64]| {
        Ok(vec![x[0] + x[1]])
    }));
    let coarse: Box<dyn FidelityModel> =
        Box::new(ClosureModel::new("coarse", 0.02, |x: &[f64]| {
            Ok(vec![0.95 * (x[0] + x[1]) + 0.2 * (3.0 * x[0]).sin()])
        }));

    let config = MfmcConfig::builder()
        .budget(budget)
        .pilot_size(16)
        .seed(42)
        .qoi("response")
        .build()
        .unwrap();
    MfmcEngine::new(transform, vec![fine, coarse], config).unwrap()
}

/// Benchmark correlated sampling and the transform maps by dimension.
fn bench_nataf_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("nataf_transform");

    for dim in [2, 5, 10] {
        let transform = correlated_transform(dim);

        group.bench_with_input(
            BenchmarkId::new("sample_one", dim),
            &transform,
            |b, transform| {
                let mut rng = StdRng::seed_from_u64(42);
                b.iter(|| transform.sample_one(black_box(&mut rng)));
            },
        );

        // One fixed physical point for the inverse map.
        let mut rng = StdRng::seed_from_u64(7);
        let x = transform.sample_one(&mut rng);
        group.bench_with_input(
            BenchmarkId::new("to_standard_normal", dim),
            &transform,
            |b, transform| {
                b.iter(|| transform.to_standard_normal(black_box(&x)).unwrap());
            },
        );

        group.bench_with_input(
            BenchmarkId::new("joint_pdf", dim),
            &transform,
            |b, transform| {
                b.iter(|| transform.joint_pdf(black_box(&x)).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmark complete two-level estimation runs by budget.
fn bench_mfmc_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("mfmc_run");
    group.sample_size(20);

    for budget in [32.0, 128.0] {
        let engine = two_level_engine(budget);
        group.bench_with_input(
            BenchmarkId::new("two_level", budget as usize),
            &engine,
            |b, engine| {
                b.iter(|| engine.run().unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_nataf_transform, bench_mfmc_run);
criterion_main!(benches);

//! Statistical integration tests for the multi-fidelity estimation engine.
//!
//! These tests verify that estimated moments converge to known values and
//! that the multi-fidelity schedule beats single-fidelity sampling at equal
//! budget.
//!
//! # Test Categories
//!
//! 1. **Analytical Moments**: estimates vs closed-form normal and lognormal
//!    moments
//! 2. **Variance Reduction**: MFMC standard error vs plain Monte Carlo
//! 3. **Distributed Reproducibility**: rank-partitioned runs vs one process
//! 4. **Degraded Inputs**: failing models, starved budgets, serialization

use uq_core::math::correlation::CorrelationMatrix;
use uq_engine::fidelity::{ClosureModel, FidelityModel, ModelEvalError};
use uq_engine::mfmc::{MfmcConfig, MfmcEngine, PartialRun, RunEvent};
use uq_models::correlation_model::{CorrelationModel, RandomVariable};
use uq_models::marginals::Marginal;
use uq_models::nataf::NatafTransform;

/// One standard normal input.
fn scalar_normal_transform(mean: f64, std_dev: f64) -> NatafTransform {
    let variables = vec![RandomVariable::new(
        "x",
        Marginal::normal(mean, std_dev).unwrap(),
    )];
    let model = CorrelationModel::new(variables, CorrelationMatrix::identity(1)).unwrap();
    NatafTransform::new(model).unwrap()
}

/// Two independent standard normal inputs.
fn pair_transform() -> NatafTransform {
    let variables = vec![
        RandomVariable::new("x0", Marginal::normal(0.0, 1.0).unwrap()),
        RandomVariable::new("x1", Marginal::normal(0.0, 1.0).unwrap()),
    ];
    let model = CorrelationModel::new(variables, CorrelationMatrix::identity(2)).unwrap();
    NatafTransform::new(model).unwrap()
}

fn config(budget: f64, pilot: usize, seed: u64) -> MfmcConfig {
    MfmcConfig::builder()
        .budget(budget)
        .pilot_size(pilot)
        .seed(seed)
        .qoi("response")
        .build()
        .unwrap()
}

/// Routes engine events to the test writer; `RUST_LOG` overrides the level.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn identity_model(name: &str, cost: f64) -> Box<dyn FidelityModel> {
    let name = name.to_string();
    Box::new(ClosureModel::new(name, cost, |x: &[f64]| Ok(vec![x[0]])))
}

fn sum_model(cost: f64) -> Box<dyn FidelityModel> {
    Box::new(ClosureModel::new("fine", cost, |x: &[f64]| {
        Ok(vec![x[0] + x[1]])
    }))
}

fn surrogate_model(cost: f64) -> Box<dyn FidelityModel> {
    Box::new(ClosureModel::new("coarse", cost, |x: &[f64]| {
        Ok(vec![0.95 * (x[0] + x[1]) + 0.2 * (3.0 * x[0]).sin()])
    }))
}

// ============================================================================
// Analytical Moment Tests
// ============================================================================

#[test]
fn test_plain_mc_recovers_normal_moments() {
    let engine = MfmcEngine::new(
        scalar_normal_transform(144.0, 20.0),
        vec![identity_model("exact", 1.0)],
        config(4000.0, 32, 42),
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    assert_eq!(stat.effective_samples, 4000);
    // Mean standard error is 20/sqrt(4000) ~ 0.32; 4-sigma bands.
    assert!(
        (stat.mean - 144.0).abs() < 1.3,
        "mean {:.3} should be near 144",
        stat.mean
    );
    assert!(
        (stat.std_dev - 20.0).abs() < 1.0,
        "std_dev {:.3} should be near 20",
        stat.std_dev
    );
    assert!(
        stat.skewness.abs() < 0.2,
        "normal skewness {:.3} should be near 0",
        stat.skewness
    );
    assert!(
        (stat.kurtosis - 3.0).abs() < 0.5,
        "normal raw kurtosis {:.3} should be near 3",
        stat.kurtosis
    );
    assert!(
        stat.mean_std_error > 0.2 && stat.mean_std_error < 0.45,
        "predicted standard error {:.4} should be near 0.32",
        stat.mean_std_error
    );
}

#[test]
fn test_ten_sample_run_stays_in_sanity_bounds() {
    // Ten high-fidelity samples of Normal(144, 20); wide sanity bounds hold
    // for any seed with overwhelming probability.
    let engine = MfmcEngine::new(
        scalar_normal_transform(144.0, 20.0),
        vec![identity_model("exact", 1.0)],
        config(10.0, 8, 99),
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    assert_eq!(stat.effective_samples, 10);
    assert!(
        stat.mean > 100.0 && stat.mean < 190.0,
        "mean {:.2} outside sanity band",
        stat.mean
    );
    assert!(
        stat.std_dev > 5.0 && stat.std_dev < 35.0,
        "std_dev {:.2} outside sanity band",
        stat.std_dev
    );
}

#[test]
fn test_lognormal_response_has_positive_skew() {
    let variables = vec![RandomVariable::new(
        "x",
        Marginal::lognormal(0.0, 1.0).unwrap(),
    )];
    let model = CorrelationModel::new(variables, CorrelationMatrix::identity(1)).unwrap();
    let transform = NatafTransform::new(model).unwrap();

    let engine = MfmcEngine::new(
        transform,
        vec![identity_model("exact", 1.0)],
        config(2000.0, 32, 5),
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    // Lognormal(0, 1): mean e^0.5 ~ 1.649, skewness ~ 6.18, kurtosis ~ 113.9.
    // Sample higher moments converge slowly for heavy tails, so the bands
    // only pin the signs and rough magnitudes.
    assert!(
        (stat.mean - 1.6487).abs() < 0.25,
        "lognormal mean {:.3}",
        stat.mean
    );
    assert!(stat.skewness > 1.0, "skewness {:.3} should be clearly positive", stat.skewness);
    assert!(stat.kurtosis > 5.0, "kurtosis {:.3} should exceed normal", stat.kurtosis);
    assert!(!stat.integer_valued);
}

#[test]
fn test_indicator_response_flags_integer_values() {
    let indicator: Box<dyn FidelityModel> = Box::new(ClosureModel::new(
        "failure_indicator",
        1.0,
        |x: &[f64]| Ok(vec![f64::from(u8::from(x[0] > 0.0))]),
    ));
    let engine = MfmcEngine::new(
        scalar_normal_transform(0.0, 1.0),
        vec![indicator],
        config(400.0, 16, 8),
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    assert!(stat.integer_valued, "0/1 outputs should report as integer");
    assert!(
        stat.mean > 0.35 && stat.mean < 0.65,
        "indicator mean {:.3} should be near 0.5",
        stat.mean
    );
}

// ============================================================================
// Variance Reduction Tests
// ============================================================================

#[test]
fn test_mfmc_beats_plain_mc_at_equal_budget() {
    init_tracing();
    let budget = 50.0;
    let seed = 42;

    let multi = MfmcEngine::new(
        pair_transform(),
        vec![sum_model(1.0), surrogate_model(0.01)],
        config(budget, 16, seed),
    )
    .unwrap();
    let multi_results = multi.run().unwrap();

    let single = MfmcEngine::new(
        pair_transform(),
        vec![sum_model(1.0)],
        config(budget, 16, seed),
    )
    .unwrap();
    let single_results = single.run().unwrap();

    assert!(
        multi_results.plan.variance_reduction < 1.0,
        "predicted variance ratio {:.4} should be below 1",
        multi_results.plan.variance_reduction
    );

    let multi_se = multi_results.statistic("response").unwrap().mean_std_error;
    let single_se = single_results.statistic("response").unwrap().mean_std_error;
    assert!(
        multi_se < single_se,
        "MFMC standard error {:.4} should beat plain MC {:.4}",
        multi_se,
        single_se
    );

    // The surrogate absorbs most of the budget in sample count.
    let plan = &multi_results.plan;
    assert!(plan.levels[1].count > 4 * plan.levels[0].count);
    assert!(plan.total_cost() <= budget * 1.5);
}

#[test]
fn test_three_level_schedule_is_monotone() {
    let mid: Box<dyn FidelityModel> = Box::new(ClosureModel::new("mid", 0.1, |x: &[f64]| {
        Ok(vec![0.9 * (x[0] + x[1]) + 0.3 * (2.0 * x[1]).cos()])
    }));
    let cheap: Box<dyn FidelityModel> = Box::new(ClosureModel::new("cheap", 0.001, |x: &[f64]| {
        Ok(vec![0.7 * (x[0] + x[1]) + 0.6 * (2.0 * x[1]).cos()])
    }));
    let engine = MfmcEngine::new(
        pair_transform(),
        vec![sum_model(1.0), mid, cheap],
        config(80.0, 24, 17),
    )
    .unwrap();
    let results = engine.run().unwrap();

    let counts: Vec<usize> = results.plan.levels.iter().map(|level| level.count).collect();
    for pair in counts.windows(2) {
        assert!(pair[0] <= pair[1], "counts must not decrease: {counts:?}");
    }
    assert_eq!(results.table.len(), *counts.last().unwrap());
    assert!(results.statistic("response").unwrap().mean.is_finite());
}

#[test]
fn test_perfectly_correlated_surrogate_is_kept() {
    // A scaled copy of the fine response correlates to within rounding of 1.
    let scaled: Box<dyn FidelityModel> = Box::new(ClosureModel::new(
        "scaled",
        0.05,
        |x: &[f64]| Ok(vec![0.5 * (x[0] + x[1])]),
    ));
    let engine = MfmcEngine::new(
        pair_transform(),
        vec![sum_model(1.0), scaled],
        config(60.0, 16, 23),
    )
    .unwrap();
    let results = engine.run().unwrap();

    assert_eq!(results.plan.levels.len(), 2, "capped correlation keeps the level");
    assert!(!results
        .log
        .events()
        .iter()
        .any(|event| matches!(event, RunEvent::DroppedLevel { .. })));
    assert!(results.plan.variance_reduction > 0.0);
    assert!(results.plan.variance_reduction < 1.0);
    assert!(results.statistic("response").unwrap().mean.is_finite());
}

// ============================================================================
// Distributed Reproducibility Tests
// ============================================================================

#[test]
fn test_rank_partition_reproduces_single_process_run() {
    let build = |rank: usize, n_procs: usize| {
        let config = MfmcConfig::builder()
            .budget(60.0)
            .pilot_size(16)
            .seed(0x00C0_FFEE)
            .qoi("response")
            .rank(rank)
            .n_procs(n_procs)
            .build()
            .unwrap();
        MfmcEngine::new(
            pair_transform(),
            vec![sum_model(1.0), surrogate_model(0.02)],
            config,
        )
        .unwrap()
    };

    let single = build(0, 1).run().unwrap();

    let partials: Vec<PartialRun> = (0..3).map(|rank| build(rank, 3).run_local()).collect();
    for partial in &partials {
        assert_eq!(partial.plan(), &single.plan, "schedules must agree rank-locally");
    }
    let reduced = build(0, 3).reduce(partials).unwrap();

    assert_eq!(single.plan, reduced.plan);
    assert_eq!(single.statistics, reduced.statistics);
    assert_eq!(single.table, reduced.table);
}

#[test]
fn test_partials_survive_serialization() {
    let config = MfmcConfig::builder()
        .budget(30.0)
        .pilot_size(8)
        .seed(31)
        .qoi("response")
        .rank(1)
        .n_procs(2)
        .build()
        .unwrap();
    let engine = MfmcEngine::new(
        pair_transform(),
        vec![sum_model(1.0), surrogate_model(0.05)],
        config,
    )
    .unwrap();

    let partial = engine.run_local();
    let wire = serde_json::to_string(&partial).unwrap();
    let back: PartialRun = serde_json::from_str(&wire).unwrap();
    assert_eq!(partial, back);
    assert_eq!(back.rank(), 1);
}

// ============================================================================
// Degraded Input Tests
// ============================================================================

#[test]
fn test_starved_budget_reports_insufficient_samples() {
    let engine = MfmcEngine::new(
        scalar_normal_transform(0.0, 1.0),
        vec![identity_model("exact", 1.0)],
        config(3.0, 2, 2),
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    // Three samples: mean and std_dev are defined, higher moments are not.
    assert_eq!(stat.effective_samples, 3);
    assert!(stat.mean.is_finite());
    assert!(stat.std_dev.is_finite());
    assert!(stat.skewness.is_nan());
    assert!(stat.kurtosis.is_nan());

    let starved: Vec<&str> = results
        .log
        .events()
        .iter()
        .filter_map(|event| match event {
            RunEvent::InsufficientSamples { statistic, required: 4, .. } => {
                Some(statistic.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(starved, vec!["skewness", "kurtosis"]);
}

#[test]
fn test_moment_thresholds_at_effective_count_boundaries() {
    // std_dev needs two samples, skewness and kurtosis need four.
    for (budget, std_defined, higher_defined) in
        [(2.0, true, false), (3.0, true, false), (4.0, true, true)]
    {
        let engine = MfmcEngine::new(
            scalar_normal_transform(0.0, 1.0),
            vec![identity_model("exact", 1.0)],
            config(budget, 2, 77),
        )
        .unwrap();
        let results = engine.run().unwrap();
        let stat = results.statistic("response").unwrap();

        assert_eq!(stat.effective_samples, budget as usize);
        assert!(stat.mean.is_finite());
        assert_eq!(
            stat.std_dev.is_finite(),
            std_defined,
            "std_dev at n = {budget}"
        );
        assert_eq!(
            stat.skewness.is_finite() && stat.kurtosis.is_finite(),
            higher_defined,
            "higher moments at n = {budget}"
        );
    }
}

#[test]
fn test_total_failure_yields_nan_statistics() {
    init_tracing();
    let broken: Box<dyn FidelityModel> = Box::new(ClosureModel::new(
        "broken",
        1.0,
        |_x: &[f64]| -> Result<Vec<f64>, ModelEvalError> {
            Err(ModelEvalError::Failed("solver diverged".to_string()))
        },
    ));
    let engine = MfmcEngine::new(
        scalar_normal_transform(0.0, 1.0),
        vec![broken],
        config(4.0, 2, 13),
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    assert_eq!(stat.effective_samples, 0);
    assert!(stat.mean.is_nan());
    assert!(stat.std_dev.is_nan());
    assert!(stat.skewness.is_nan());
    assert!(stat.kurtosis.is_nan());

    let failures = results
        .log
        .events()
        .iter()
        .filter(|event| matches!(event, RunEvent::SampleEvaluationFailure { .. }))
        .count();
    assert_eq!(failures, 4, "every scheduled sample fails");
    let insufficient = results
        .log
        .events()
        .iter()
        .filter(|event| matches!(event, RunEvent::InsufficientSamples { .. }))
        .count();
    assert_eq!(insufficient, 4, "all four moments are starved");

    for record in &results.table {
        assert!(record.excluded);
        assert!(record.outputs.iter().all(Option::is_none));
    }
}

#[test]
fn test_results_serialize_with_null_moments() {
    let broken: Box<dyn FidelityModel> = Box::new(ClosureModel::new(
        "broken",
        1.0,
        |_x: &[f64]| -> Result<Vec<f64>, ModelEvalError> {
            Err(ModelEvalError::Failed("solver diverged".to_string()))
        },
    ));
    let engine = MfmcEngine::new(
        scalar_normal_transform(0.0, 1.0),
        vec![broken],
        config(4.0, 2, 13),
    )
    .unwrap();
    let results = engine.run().unwrap();

    let value = serde_json::to_value(&results).unwrap();
    assert!(value["statistics"][0]["mean"].is_null());
    assert!(value["statistics"][0]["kurtosis"].is_null());
    assert_eq!(value["statistics"][0]["effective_samples"], 0);
    assert!(value["table"][0]["outputs"][0].is_null());
    assert_eq!(value["log"][0]["kind"], "sample_evaluation_failure");
}

#[test]
fn test_engine_runs_from_json_config() {
    let config: MfmcConfig = serde_json::from_str(
        r#"{"budget": 100.0, "seed": 11, "qoi_names": ["response"]}"#,
    )
    .unwrap();
    let engine = MfmcEngine::new(
        scalar_normal_transform(10.0, 2.0),
        vec![identity_model("exact", 1.0)],
        config,
    )
    .unwrap();
    let results = engine.run().unwrap();
    let stat = results.statistic("response").unwrap();

    // Defaults fill pilot size and process layout.
    assert_eq!(engine.config().pilot_size(), 32);
    assert_eq!(engine.config().n_procs(), 1);
    assert_eq!(stat.effective_samples, 100);
    assert!((stat.mean - 10.0).abs() < 1.0, "mean {:.3}", stat.mean);
}

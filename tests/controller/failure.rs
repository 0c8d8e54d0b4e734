use std::cell::Cell;

use latent_bo::controller::BoController;
use latent_bo::domain::Bounds;
use latent_bo::objective::FnObjective;
use latent_bo::{Error, Objective, Result, RunState};

use crate::quick_config;

/// Scores `-|z|²` for the first `ok_calls` calls, then misbehaves.
struct Flaky {
    calls: Cell<usize>,
    ok_calls: usize,
    failure: Failure,
}

#[derive(Clone, Copy)]
enum Failure {
    Error,
    NonFinite,
    TooFewScores,
}

impl Flaky {
    fn new(ok_calls: usize, failure: Failure) -> Self {
        Self {
            calls: Cell::new(0),
            ok_calls,
            failure,
        }
    }
}

impl Objective for Flaky {
    fn dim(&self) -> usize {
        2
    }

    fn evaluate(&self, batch: &[Vec<f64>]) -> Result<Vec<f64>> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        let scores: Vec<f64> = batch
            .iter()
            .map(|z| -z.iter().map(|v| v * v).sum::<f64>())
            .collect();
        if call < self.ok_calls {
            return Ok(scores);
        }
        match self.failure {
            Failure::Error => Err(Error::Objective("simulator crashed".into())),
            Failure::NonFinite => Ok(vec![f64::NAN; batch.len()]),
            Failure::TooFewScores => Ok(scores[..1].to_vec()),
        }
    }
}

fn run_until_failure(failure: Failure) -> (BoController<Flaky>, Error) {
    let mut bo =
        BoController::new(Flaky::new(2, failure), Bounds::unit(2), quick_config(3, 2, 5)).unwrap();
    let err = bo.run().unwrap_err();
    (bo, err)
}

#[test]
fn objective_error_fails_the_run_and_keeps_data() {
    let (bo, err) = run_until_failure(Failure::Error);
    assert!(matches!(err, Error::Objective(_)));
    assert_eq!(bo.state(), RunState::Failed);
    // Init (3) and the first iteration (2) completed before the failure.
    assert_eq!(bo.dataset().len(), 5);
    assert_eq!(bo.history().len(), 2);
    assert_eq!(bo.history().last(), bo.dataset().max_score());
}

#[test]
fn non_finite_scores_are_rejected_atomically() {
    let (bo, err) = run_until_failure(Failure::NonFinite);
    assert!(matches!(err, Error::Objective(_)));
    assert_eq!(bo.dataset().len(), 5);
    assert!(bo.dataset().scores().iter().all(|s| s.is_finite()));
}

#[test]
fn wrong_score_count_is_an_objective_error() {
    let (bo, err) = run_until_failure(Failure::TooFewScores);
    assert!(matches!(err, Error::Objective(_)));
    assert_eq!(bo.dataset().len(), 5);
}

/// Finite scores whose spread overflows the surrogate's likelihood.
fn astronomical(z: &[f64]) -> f64 {
    1e300 * (z[0] - 0.5)
}

#[test]
fn surrogate_failure_mid_loop_fails_the_run_and_keeps_data() {
    let objective = FnObjective::new(2, astronomical);
    let mut bo = BoController::new(objective, Bounds::unit(2), quick_config(4, 2, 3)).unwrap();
    bo.step().unwrap();
    assert_eq!(bo.state(), RunState::Iterating);

    let err = bo.step().unwrap_err();
    assert!(matches!(err, Error::NumericalInstability(_)), "{err:?}");
    assert_eq!(bo.state(), RunState::Failed);
    assert!(bo.state().is_terminal());
    assert_eq!(bo.dataset().len(), 4);
    assert_eq!(bo.history().len(), 1);
    assert_eq!(bo.history().last(), bo.dataset().max_score());
    assert!(matches!(bo.step(), Err(Error::RunFinished)));
}

#[test]
fn failed_run_cannot_be_resumed() {
    let (mut bo, _) = run_until_failure(Failure::Error);
    assert!(matches!(bo.step(), Err(Error::RunFinished)));
    assert!(matches!(bo.run(), Err(Error::RunFinished)));
}

#[test]
fn failure_during_init_leaves_an_empty_dataset() {
    let mut bo = BoController::new(Flaky::new(0, Failure::Error), Bounds::unit(2), quick_config(3, 2, 1))
        .unwrap();
    assert!(bo.step().is_err());
    assert_eq!(bo.state(), RunState::Failed);
    assert!(bo.dataset().is_empty());
    assert!(bo.history().is_empty());
}

#[test]
fn invalid_setup_is_rejected_before_any_evaluation() {
    let objective = Flaky::new(0, Failure::Error);
    assert!(matches!(
        BoController::new(objective, Bounds::unit(3), quick_config(3, 2, 1)),
        Err(Error::DimensionMismatch { expected: 3, got: 2 })
    ));
    assert!(matches!(
        Bounds::uniform(2, 1.0, -1.0),
        Err(Error::InvalidBounds { .. })
    ));
}

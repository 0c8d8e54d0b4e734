use latent_bo::controller::BoController;
use latent_bo::domain::Bounds;
use latent_bo::objective::FnObjective;
use latent_bo::{Error, RunState};

use crate::quick_config;
use crate::test_functions::{bump, neg_branin};

#[test]
fn dataset_grows_by_one_batch_per_step() {
    let objective = FnObjective::new(3, |z: &[f64]| bump(z, &[0.2, -0.4, 0.1]));
    let mut bo =
        BoController::new(objective, Bounds::uniform(3, -1.0, 1.0).unwrap(), quick_config(5, 3, 2))
            .unwrap();
    assert_eq!(bo.state(), RunState::Init);
    assert!(bo.dataset().is_empty());

    let mut sizes = Vec::new();
    while bo.state() != RunState::Done {
        bo.step().unwrap();
        sizes.push(bo.dataset().len());
    }
    assert_eq!(sizes, vec![5, 8, 11]);
    assert_eq!(bo.history().len(), 3);
    assert_eq!(bo.iteration(), 2);
}

#[test]
fn history_is_monotone_and_ends_at_the_dataset_max() {
    let objective = FnObjective::new(2, neg_branin);
    let bounds = Bounds::new(vec![-5.0, 0.0], vec![10.0, 15.0]).unwrap();
    let mut bo = BoController::new(objective, bounds, quick_config(4, 2, 4)).unwrap();
    bo.run().unwrap();

    let history = bo.history().values();
    assert_eq!(history.len(), 5);
    assert!(history.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(bo.history().last(), bo.dataset().max_score());

    // Each entry is the best over the matching dataset prefix.
    for (stage, value) in history.iter().enumerate() {
        let prefix = 4 + 2 * stage;
        assert_eq!(bo.dataset().best_within(prefix).map(|(_, v)| v), Some(*value));
    }
}

#[test]
fn every_evaluated_point_lies_inside_the_bounds() {
    let low = vec![-6.0, 0.5, 10.0, -0.1];
    let high = vec![6.0, 0.6, 20.0, 0.1];
    let objective = FnObjective::new(4, |z: &[f64]| bump(z, &[0.0, 0.55, 15.0, 0.0]));
    let bounds = Bounds::new(low.clone(), high.clone()).unwrap();
    let mut bo = BoController::new(objective, bounds, quick_config(3, 2, 2)).unwrap();
    bo.run().unwrap();

    for obs in bo.dataset().iter() {
        for (d, v) in obs.latent.iter().enumerate() {
            assert!(low[d] <= *v && *v <= high[d], "z[{d}] = {v}");
        }
    }
    assert!(bo.bounds().check_contains(&bo.dataset().latents()).is_ok());
}

#[test]
fn guided_iterations_improve_on_a_smooth_bump() {
    let objective = FnObjective::new(2, |z: &[f64]| bump(z, &[0.3, -0.2]));
    let mut bo =
        BoController::new(objective, Bounds::uniform(2, -1.0, 1.0).unwrap(), quick_config(4, 2, 6))
            .unwrap();
    bo.run().unwrap();
    let first = bo.history().values()[0];
    let last = bo.history().last().unwrap();
    assert!(last >= first);
    assert!(last > 0.8, "best after 16 evaluations: {last}");
}

#[test]
fn ties_resolve_to_the_earliest_observation() {
    let objective = FnObjective::new(2, |_: &[f64]| 1.0);
    let mut bo = BoController::new(objective, Bounds::unit(2), quick_config(3, 2, 1)).unwrap();
    bo.run().unwrap();
    assert_eq!(bo.dataset().best(), Some((0, 1.0)));
    assert_eq!(bo.history().values(), &[1.0, 1.0]);
}

#[test]
fn stepping_a_finished_run_is_an_error() {
    let objective = FnObjective::new(1, |z: &[f64]| -z[0].abs());
    let mut bo = BoController::new(objective, Bounds::unit(1), quick_config(2, 1, 1)).unwrap();
    bo.run().unwrap();
    assert_eq!(bo.state(), RunState::Done);
    assert!(matches!(bo.step(), Err(Error::RunFinished)));
    // Running again is a no-op once done.
    assert!(bo.run().is_ok());
    assert_eq!(bo.dataset().len(), 3);
}

#[test]
fn warm_start_tracks_the_last_fit() {
    let objective = FnObjective::new(2, |z: &[f64]| bump(z, &[0.5, 0.5]));
    let mut bo = BoController::new(objective, Bounds::unit(2), quick_config(4, 1, 2)).unwrap();
    bo.step().unwrap();
    assert!(bo.warm_start().is_none());
    let report = bo.step().unwrap();
    assert_eq!(report.iteration, 1);
    assert_eq!(report.n_new, 1);
    assert!(report.acquisition_value.is_some_and(|v| v >= 0.0));
    assert_eq!(bo.warm_start().map(|h| h.dim()), Some(2));
}

#[test]
fn outputs_export_as_csv() {
    let objective = FnObjective::new(2, |z: &[f64]| bump(z, &[0.1, 0.9]));
    let mut bo = BoController::new(objective, Bounds::unit(2), quick_config(3, 2, 1)).unwrap();
    bo.run().unwrap();

    let mut data = Vec::new();
    bo.dataset().to_csv(&mut data).unwrap();
    let data = String::from_utf8(data).unwrap();
    assert_eq!(data.lines().next(), Some("index,score,z0,z1"));
    assert_eq!(data.lines().count(), 6);

    let mut hist = Vec::new();
    bo.history().to_csv(&mut hist).unwrap();
    let hist = String::from_utf8(hist).unwrap();
    assert_eq!(hist.lines().next(), Some("stage,best"));
    assert_eq!(hist.lines().count(), 3);

    let (dataset, history) = bo.into_parts();
    assert_eq!((dataset.len(), history.len()), (5, 2));
}

use latent_bo::controller::{BoConfig, BoController};
use latent_bo::domain::Bounds;
use latent_bo::objective::FnObjective;

use crate::quick_config;
use crate::test_functions::hartmann6;

fn run(config: BoConfig) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut bo = BoController::new(FnObjective::new(6, hartmann6), Bounds::unit(6), config).unwrap();
    bo.run().unwrap();
    (bo.dataset().latents(), bo.history().values().to_vec())
}

#[test]
fn same_seed_reproduces_the_run() {
    let a = run(quick_config(4, 2, 2));
    let b = run(quick_config(4, 2, 2));
    assert_eq!(a, b);
}

#[test]
fn different_seeds_draw_different_initial_points() {
    let a = run(quick_config(4, 2, 0));
    let config = BoConfig::builder()
        .n_init(4)
        .n_batch(0)
        .seed(7)
        .build()
        .unwrap();
    let b = run(config);
    assert_ne!(a.0, b.0);
}

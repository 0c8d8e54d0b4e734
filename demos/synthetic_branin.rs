//! Maximize the negated Branin function with batch qEI.
//!
//! No pretrained weights needed: shows the loop on a cheap 2-D objective
//! and writes the dataset and history as CSV to the working directory.
//!
//! Run with: `RUST_LOG=debug cargo run --example synthetic_branin`

use std::fs::File;

use latent_bo::prelude::*;
use tracing_subscriber::EnvFilter;

fn neg_branin(x: &[f64]) -> f64 {
    let pi = std::f64::consts::PI;
    let b = 5.1 / (4.0 * pi * pi);
    let c = 5.0 / pi;
    let t = 1.0 / (8.0 * pi);
    -((x[1] - b * x[0] * x[0] + c * x[0] - 6.0).powi(2) + 10.0 * (1.0 - t) * x[0].cos() + 10.0)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = BoConfig::builder()
        .n_init(6)
        .batch_size(2)
        .n_batch(10)
        .num_restarts(5)
        .raw_samples(128)
        .mc_samples(512)
        .seed(3)
        .build()?;
    let bounds = Bounds::new(vec![-5.0, 0.0], vec![10.0, 15.0])?;
    let mut bo = BoController::new(FnObjective::new(2, neg_branin), bounds, config)?;

    while !bo.state().is_terminal() {
        let report = bo.step()?;
        println!(
            "iteration {:>2}: +{} points, batch max {:>9.4}, best {:>9.4}",
            report.iteration, report.n_new, report.batch_max, report.best_value
        );
    }

    if let Some(best) = bo.best() {
        println!(
            "best -branin = {:.5} at ({:.4}, {:.4}); optimum is -0.39789",
            best.score, best.latent[0], best.latent[1]
        );
    }

    bo.dataset().to_csv(File::create("branin_dataset.csv")?)?;
    bo.history().to_csv(File::create("branin_history.csv")?)?;
    Ok(())
}

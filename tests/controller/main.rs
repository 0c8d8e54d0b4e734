#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

#[path = "../../benches/test_functions.rs"]
#[allow(dead_code)]
mod test_functions;

mod determinism;
mod failure;
mod lifecycle;

use latent_bo::controller::BoConfig;

/// A configuration small enough to run in a test.
fn quick_config(n_init: usize, batch_size: usize, n_batch: usize) -> BoConfig {
    BoConfig::builder()
        .n_init(n_init)
        .batch_size(batch_size)
        .n_batch(n_batch)
        .num_restarts(2)
        .raw_samples(32)
        .mc_samples(128)
        .fit_max_iter(50)
        .seed(42)
        .build()
        .unwrap()
}

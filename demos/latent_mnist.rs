//! Search the VAE latent space for images the classifier reads as a "3".
//!
//! Loads `mnist_vae.safetensors` and `mnist_cnn.safetensors` from the
//! directory in `PRETRAINED_LOCATION` (or `./pretrained_models`), runs 5
//! random evaluations plus 25 batches of 3 qEI-selected points over
//! `[-6, 6]^20`, and prints the best image found at several stages of the
//! run. Set `SMOKE_TEST=1` for a tiny configuration.
//!
//! Run with: `RUST_LOG=info cargo run --release --example latent_mnist`

use std::io::Write as _;

use latent_bo::network::{IMAGE_SIDE, Image};
use latent_bo::prelude::*;
use tracing_subscriber::EnvFilter;

const LATENT_DIM: usize = 20;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let smoke = std::env::var_os("SMOKE_TEST").is_some();
    let config = if smoke {
        BoConfig::builder()
            .batch_size(2)
            .n_batch(3)
            .num_restarts(2)
            .raw_samples(4)
            .mc_samples(32)
            .build()?
    } else {
        BoConfig::default()
    };

    let objective = LatentObjective::from_pretrained(config.precision())?;
    let bounds = Bounds::uniform(LATENT_DIM, -6.0, 6.0)?;
    let mut bo = BoController::new(objective, bounds, config.clone())?;

    print!("Running BO ");
    while !bo.state().is_terminal() {
        bo.step()?;
        print!(".");
        std::io::stdout().flush()?;
    }
    println!();

    for (stage, best) in bo.history().values().iter().enumerate() {
        println!("stage {stage:>2}: best score {best:.4}");
    }

    // Best image as the run would have reported it after each fraction of
    // the guided evaluations.
    let guided = config.n_batch() * config.batch_size();
    for pct in [0, 10, 25, 50, 75, 100] {
        let prefix = config.n_init() + guided * pct / 100;
        let Some((index, score)) = bo.dataset().best_within(prefix) else {
            continue;
        };
        let latent = &bo.dataset().observations()[index].latent;
        let image = bo.objective().decode(latent)?;
        println!("\n{pct:>3}% (observation {index}, score {score:.4})");
        print!("{}", render(&image));
    }
    Ok(())
}

/// Draw an image with a five-level character ramp.
fn render(image: &Image) -> String {
    const RAMP: [char; 5] = [' ', '.', ':', '*', '#'];
    let mut out = String::with_capacity((IMAGE_SIDE + 1) * IMAGE_SIDE);
    for y in 0..IMAGE_SIDE {
        for x in 0..IMAGE_SIDE {
            let level = (image.get(y, x) * 4.0).round().clamp(0.0, 4.0);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = level as usize;
            out.push(RAMP[level]);
        }
        out.push('\n');
    }
    out
}

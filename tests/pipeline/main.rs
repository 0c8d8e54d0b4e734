//! End-to-end runs of the decode → classify → reward objective on
//! synthetic weight files.

#![allow(
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

use std::path::Path;

use latent_bo::network::{Classifier, LatentDecoder, MnistCnn, Vae, VaeDecoder, locate_pretrained};
use latent_bo::objective::LatentObjective;
use latent_bo::prelude::*;

const LATENT: usize = 20;
const HIDDEN: usize = 400;
const PIXELS: usize = 784;

/// Serialize `F32` tensors in the safetensors layout.
fn safetensors_bytes(tensors: &[(&str, Vec<usize>, Vec<f32>)]) -> Vec<u8> {
    let mut entries = Vec::new();
    let mut offset = 0;
    for (name, shape, values) in tensors {
        let end = offset + values.len() * 4;
        let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
        entries.push(format!(
            "\"{name}\":{{\"dtype\":\"F32\",\"shape\":[{}],\"data_offsets\":[{offset},{end}]}}",
            dims.join(",")
        ));
        offset = end;
    }
    let mut header = format!("{{{}}}", entries.join(","));
    while header.len() % 8 != 0 {
        header.push(' ');
    }
    let mut out = (header.len() as u64).to_le_bytes().to_vec();
    out.extend_from_slice(header.as_bytes());
    for (_, _, values) in tensors {
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

/// A decoder whose pixels brighten with `z[0]`, and a classifier that
/// favors label 3 in proportion to mean brightness.
fn write_weights(dir: &Path) {
    let mut fc3 = vec![0.0; HIDDEN * LATENT];
    fc3[0] = 1.0;
    let mut fc4 = vec![0.0; PIXELS * HIDDEN];
    for i in 0..PIXELS {
        fc4[i * HIDDEN] = 1.0;
    }
    let vae = safetensors_bytes(&[
        ("fc3.weight", vec![HIDDEN, LATENT], fc3),
        ("fc3.bias", vec![HIDDEN], vec![0.0; HIDDEN]),
        ("fc4.weight", vec![PIXELS, HIDDEN], fc4),
        ("fc4.bias", vec![PIXELS], vec![-2.0; PIXELS]),
    ]);
    std::fs::write(dir.join("mnist_vae.safetensors"), vae).unwrap();

    // conv1 channel 0 sums a 5x5 patch; everything else is zero, so the
    // pooled features and fc1 unit 0 grow with image brightness.
    let mut conv1 = vec![0.0; 20 * 25];
    conv1[..25].fill(0.04);
    let mut conv2 = vec![0.0; 50 * 20 * 25];
    conv2[..25].fill(0.04);
    let mut fc1 = vec![0.0; 500 * 800];
    fc1[..16].fill(1.0);
    let mut fc2 = vec![0.0; 10 * 500];
    fc2[3 * 500] = 0.5;
    let mut fc2_bias = vec![0.0; 10];
    fc2_bias[3] = -4.0;
    let cnn = safetensors_bytes(&[
        ("conv1.weight", vec![20, 1, 5, 5], conv1),
        ("conv1.bias", vec![20], vec![0.0; 20]),
        ("conv2.weight", vec![50, 20, 5, 5], conv2),
        ("conv2.bias", vec![50], vec![0.0; 50]),
        ("fc1.weight", vec![500, 800], fc1),
        ("fc1.bias", vec![500], vec![0.0; 500]),
        ("fc2.weight", vec![10, 500], fc2),
        ("fc2.bias", vec![10], fc2_bias),
    ]);
    std::fs::write(dir.join("mnist_cnn.safetensors"), cnn).unwrap();
}

fn pretrained() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_weights(dir.path());
    dir
}

#[test]
fn brighter_latents_score_higher() {
    let dir = pretrained();
    let objective = LatentObjective::from_dir(dir.path(), Precision::Double).unwrap();
    assert_eq!(objective.dim(), LATENT);

    let mut dark = vec![0.0; LATENT];
    dark[0] = -6.0;
    let mut bright = vec![0.0; LATENT];
    bright[0] = 6.0;
    let scores = objective.evaluate(&[dark, bright]).unwrap();
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    assert!(scores[1] > scores[0], "{scores:?}");
}

#[test]
fn single_precision_stays_close_to_double() {
    let dir = pretrained();
    let double = LatentObjective::from_dir(dir.path(), Precision::Double).unwrap();
    let single = LatentObjective::from_dir(dir.path(), Precision::Single).unwrap();
    let z: Vec<Vec<f64>> = (0..3).map(|k| vec![f64::from(k) - 1.0; LATENT]).collect();
    let a = double.evaluate(&z).unwrap();
    let b = single.evaluate(&z).unwrap();
    for (x, y) in a.iter().zip(&b) {
        assert!((x - y).abs() < 1e-4, "{x} vs {y}");
    }
}

#[test]
fn networks_load_individually() {
    let dir = pretrained();
    let decoder = VaeDecoder::open(dir.path().join("mnist_vae.safetensors"), Precision::Double)
        .unwrap();
    assert_eq!(decoder.latent_dim(), LATENT);
    let vae = Vae::open(dir.path().join("mnist_vae.safetensors"), Precision::Double).unwrap();
    assert!(!vae.has_encoder());

    let cnn = MnistCnn::open(dir.path().join("mnist_cnn.safetensors"), Precision::Double).unwrap();
    let image = decoder.decode(&[0.0; LATENT]).unwrap();
    let log_probs = cnn.log_probs(&image).unwrap();
    let total: f64 = log_probs.iter().map(|lp| lp.exp()).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn missing_weights_are_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        LatentObjective::from_dir(dir.path(), Precision::Double),
        Err(Error::Configuration(_))
    ));

    std::fs::write(dir.path().join("mnist_vae.safetensors"), b"not a tensor file").unwrap();
    assert!(matches!(
        VaeDecoder::open(dir.path().join("mnist_vae.safetensors"), Precision::Double),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn locator_finds_a_local_pretrained_directory() {
    let root = tempfile::tempdir().unwrap();
    let models = root.path().join("pretrained_models");
    std::fs::create_dir(&models).unwrap();
    write_weights(&models);

    let found = locate_pretrained(None, root.path()).unwrap();
    assert_eq!(found, models);
    assert!(LatentObjective::from_dir(&found, Precision::Double).is_ok());
}

#[test]
fn optimization_run_in_latent_space() {
    let dir = pretrained();
    let objective = LatentObjective::from_dir(dir.path(), Precision::Double).unwrap();
    let config = BoConfig::builder()
        .n_init(5)
        .batch_size(3)
        .n_batch(2)
        .num_restarts(2)
        .raw_samples(32)
        .mc_samples(128)
        .fit_max_iter(50)
        .build()
        .unwrap();
    let mut bo =
        BoController::new(objective, Bounds::uniform(LATENT, -6.0, 6.0).unwrap(), config).unwrap();
    bo.run().unwrap();

    assert_eq!(bo.state(), RunState::Done);
    assert_eq!(bo.dataset().len(), 11);
    assert_eq!(bo.history().len(), 3);
    assert!(bo.history().values().windows(2).all(|w| w[1] >= w[0]));
    assert!(bo
        .dataset()
        .iter()
        .all(|o| o.latent.iter().all(|v| (-6.0..=6.0).contains(v))));
    assert!(bo.dataset().scores().iter().all(|s| (0.0..=1.0).contains(s)));
}

//! Common test utilities
#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const REFERENCE_FS: f64 = 48000.0;

pub fn reference_config(block_size: usize) -> cqt_rs::CqtConfig {
    cqt_rs::CqtConfig::new(REFERENCE_FS, block_size, 1.0, 100.0, 10000.0, 1500.0).unwrap()
}

/// Uniform samples in [-1, 1) from a seeded generator
pub fn random_signal(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
}

pub fn sine(len: usize, frequency: f64, phase: f64) -> Vec<f64> {
    (0..len)
        .map(|i| (2.0 * std::f64::consts::PI * frequency * i as f64 / REFERENCE_FS + phase).sin())
        .collect()
}

pub fn rms_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
    (sum / a.len() as f64).sqrt()
}

pub fn calculate_snr(original: &[f64], reconstructed: &[f64]) -> f64 {
    assert_eq!(original.len(), reconstructed.len());

    let signal_power: f64 = original.iter().map(|x| x.powi(2)).sum();
    let noise_power: f64 = original
        .iter()
        .zip(reconstructed.iter())
        .map(|(o, r)| (o - r).powi(2))
        .sum();

    if noise_power == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (signal_power / noise_power).log10()
    }
}

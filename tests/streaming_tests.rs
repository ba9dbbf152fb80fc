mod common;

use cqt_rs::prelude::*;

const SIGNAL_LEN: usize = 1 << 16;

fn delayed_error(input: &[f64], output: &[f64], delay: usize, skip: usize) -> f64 {
    common::rms_diff(&output[delay + skip..], &input[skip..input.len() - delay])
}

/// Mid-band sine mix with a short fade-in
fn sine_mix(len: usize) -> Vec<f64> {
    let a = common::sine(len, 700.0, 0.0);
    let b = common::sine(len, 1500.0, 0.3);
    let c = common::sine(len, 3100.0, 1.1);
    let fade = 4096;
    (0..len)
        .map(|i| {
            let gain = (i as f64 / fade as f64).min(1.0);
            gain * (a[i] + b[i] + c[i]) / 3.0
        })
        .collect()
}

fn run<C: CqtTransform<Sample = f64>, H: BlockProcessor<C::Coefs>>(
    processor: &mut CqtProcessor<C, H>,
    input: &[f64],
) -> Vec<f64> {
    let mut output = vec![0.0; input.len()];
    processor.process(input, &mut output);
    output
}

#[test]
fn test_direct_dense_identity() {
    let mut processor = CqtDenseProcessor::<f64>::direct(common::reference_config(1024), Passthrough).unwrap();
    let x = common::random_signal(SIGNAL_LEN, 1);
    let y = run(&mut processor, &x);

    let err = delayed_error(&x, &y, processor.latency(), 0);
    assert!(err < 1e-10, "rms error {:e}", err);
}

#[test]
fn test_direct_sparse_identity() {
    let mut processor = CqtSparseProcessor::<f64>::direct(common::reference_config(1024), Passthrough).unwrap();
    let x = common::random_signal(SIGNAL_LEN, 2);
    let y = run(&mut processor, &x);

    let err = delayed_error(&x, &y, processor.latency(), 0);
    assert!(err < 1e-10, "rms error {:e}", err);
}

#[test]
fn test_sliding_dense_identity() {
    let config = common::reference_config(16384);
    let mut processor = CqtDenseProcessor::<f64>::sliding(config, Passthrough).unwrap();
    let x = sine_mix(1 << 17);
    let y = run(&mut processor, &x);

    let latency = processor.latency();
    assert_eq!(latency, 16384 + 8192);
    let err = delayed_error(&x, &y, latency, 2 * 16384);
    assert!(err < 1e-3, "rms error {:e}", err);
}

#[test]
fn test_sliding_sparse_identity() {
    let config = common::reference_config(16384);
    let mut processor = CqtSparseProcessor::<f64>::sliding(config, Passthrough).unwrap();
    let x = sine_mix(1 << 17);
    let y = run(&mut processor, &x);

    let err = delayed_error(&x, &y, processor.latency(), 2 * 16384);
    assert!(err < 1e-3, "rms error {:e}", err);
}

/// Sliding identity on uniform noise, skipping the latency and two warm-up blocks
fn sliding_noise_error<C: CqtTransform<Sample = f64>>(block_size: usize, seed: u64) -> f64 {
    let config = common::reference_config(block_size);
    let mut processor = CqtProcessor::<C>::sliding(config, Passthrough).unwrap();
    let x = common::random_signal(1 << 17, seed);
    let y = run(&mut processor, &x);

    let latency = processor.latency();
    assert_eq!(latency, block_size + block_size / 2);
    delayed_error(&x, &y, latency, 2 * block_size)
}

#[test]
fn test_sliding_dense_noise() {
    // measured around 9.8e-4
    let err = sliding_noise_error::<NsgfCqtDense<f64>>(16384, 6);
    assert!(err < 1.2e-3, "rms error {:e}", err);
}

#[test]
fn test_sliding_sparse_noise() {
    let err = sliding_noise_error::<NsgfCqtSparse<f64>>(16384, 7);
    assert!(err < 1.2e-3, "rms error {:e}", err);
}

#[test]
fn test_sliding_noise_short_blocks() {
    // shorter blocks recombine coarser halves; measured around 5e-3
    let dense = sliding_noise_error::<NsgfCqtDense<f64>>(1024, 8);
    let sparse = sliding_noise_error::<NsgfCqtSparse<f64>>(1024, 8);
    assert!(dense < 6e-3, "dense rms error {:e}", dense);
    assert!(sparse < 6e-3, "sparse rms error {:e}", sparse);
}

#[test]
fn test_direct_identity_on_erb_scale() {
    let config = CqtConfig {
        fraction: 0.5,
        ..common::reference_config(4096)
    }
    .with_scale(FrequencyScale::Erb)
    .unwrap();
    let mut processor = CqtSparseProcessor::<f64>::direct(config, Passthrough).unwrap();
    let x = common::random_signal(1 << 15, 9);
    let y = run(&mut processor, &x);

    let err = delayed_error(&x, &y, processor.latency(), 0);
    assert!(err < 1e-10, "rms error {:e}", err);
}

#[test]
fn test_gain_hook_scales_output() {
    let hook = |coefs: &mut SparseCoefs<f64>| {
        for band in coefs.iter_mut() {
            for c in band.iter_mut() {
                *c = *c * 0.5;
            }
        }
    };
    let mut processor = CqtSparseProcessor::<f64, _>::direct(common::reference_config(1024), hook).unwrap();
    let x = common::random_signal(1 << 14, 3);
    let y = run(&mut processor, &x);

    let half: Vec<f64> = x.iter().map(|v| v * 0.5).collect();
    let err = delayed_error(&half, &y, processor.latency(), 0);
    assert!(err < 1e-10, "rms error {:e}", err);
}

#[test]
fn test_band_mute_hook_removes_tone() {
    let config = common::reference_config(4096);
    let mut cqt = NsgfCqtDense::<f64>::new(config).unwrap();
    let mut coefs = cqt.coefs();
    cqt.forward(&common::sine(4096, 6000.0, 0.0), &mut coefs);
    let energy = |band: usize| coefs.col(band).iter().map(|c| c.norm_sqr()).sum::<f64>();
    let loudest = (0..cqt.num_bands())
        .max_by(|&a, &b| energy(a).total_cmp(&energy(b)))
        .unwrap();

    let hook = move |coefs: &mut CoefMatrix<f64>| coefs.col_mut(loudest).fill(Complex::new(0.0, 0.0));
    let mut processor = CqtDenseProcessor::<f64, _>::direct(config, hook).unwrap();
    let x = common::sine(1 << 15, 6000.0, 0.0);
    let y = run(&mut processor, &x);

    let tail = &y[2 * 4096..];
    let input_rms = cqt_rs::rms(&x[..tail.len()]);
    assert!(cqt_rs::rms(tail) < 0.5 * input_rms);
}

#[test]
fn test_process_matches_per_sample() {
    let config = common::reference_config(1024);
    let x = common::random_signal(10_000, 4);

    let mut buffered = CqtSparseProcessor::<f64>::sliding(config, Passthrough).unwrap();
    let mut output = vec![0.0; x.len()];
    for (src, dst) in x.chunks(333).zip(output.chunks_mut(333)) {
        buffered.process(src, dst);
    }

    let mut single = CqtSparseProcessor::<f64>::sliding(config, Passthrough).unwrap();
    let expected: Vec<f64> = x.iter().map(|&s| single.process_sample(s)).collect();
    assert_eq!(output, expected);
}

#[test]
fn test_reinitialize_changes_block_size() {
    let mut processor = CqtDenseProcessor::<f64>::default();
    processor.initialize(common::reference_config(1024)).unwrap();
    assert_eq!(processor.latency(), 1024);

    processor.initialize(common::reference_config(2048)).unwrap();
    assert_eq!(processor.latency(), 2048);
    assert_eq!(processor.config().map(|c| c.block_size), Some(2048));

    let x = common::random_signal(1 << 14, 5);
    let y = run(&mut processor, &x);
    let err = delayed_error(&x, &y, 2048, 0);
    assert!(err < 1e-10, "rms error {:e}", err);
}

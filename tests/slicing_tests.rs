mod common;

use cqt_rs::{Slicer, Splicer, WindowType, generate_window};

/// Slice, window twice with sqrt-Hann and splice back
fn resynthesize(input: &[f64], block_size: usize) -> Vec<f64> {
    let hop_size = block_size / 2;
    let window: Vec<f64> = generate_window(WindowType::SqrtHann, block_size);
    let mut slicer = Slicer::new(block_size, hop_size);
    let mut splicer = Splicer::new(block_size, hop_size);
    let mut block = vec![0.0; block_size];

    input
        .iter()
        .map(|&sample| {
            slicer.push_sample(sample);
            let out = splicer.next_sample();
            if slicer.has_block() {
                for ((b, &s), &w) in block.iter_mut().zip(slicer.next_block()).zip(&window) {
                    *b = s * w * w;
                }
                splicer.push_block(&block);
            }
            out
        })
        .collect()
}

#[test]
fn test_perfect_reconstruction_after_one_block() {
    for block_size in [16, 256, 1024] {
        let x = common::random_signal(block_size * 20, block_size as u64);
        let y = resynthesize(&x, block_size);

        let err = common::rms_diff(&y[block_size..], &x[..x.len() - block_size]);
        assert!(err < 1e-6, "block {}: rms error {:e}", block_size, err);
        assert!(y[..block_size].iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_block_count_matches_hops() {
    let mut slicer = Slicer::<f32>::new(64, 16);
    let mut blocks = 0;
    for i in 0..1000 {
        slicer.push_sample(i as f32);
        if slicer.has_block() {
            let block = slicer.next_block();
            assert_eq!(block.len(), 64);
            assert_eq!(block[63], i as f32);
            blocks += 1;
        }
    }
    assert_eq!(blocks, 1000 / 16);
}

#[test]
fn test_hann_sums_to_constant() {
    let window: Vec<f64> = generate_window(WindowType::Hann, 512);
    for n in 0..256 {
        assert!((window[n] + window[n + 256] - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_splicer_without_overlap_is_a_delay() {
    let mut splicer = Splicer::<f64>::new(4, 4);
    let mut out = Vec::new();
    for block in [[1.0, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]] {
        for _ in 0..4 {
            out.push(splicer.next_sample());
        }
        splicer.push_block(&block);
    }
    for _ in 0..4 {
        out.push(splicer.next_sample());
    }
    assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
}

use cqt_rs::prelude::*;

/// Attenuates every band above `cutoff`
struct BandGate {
    cutoff: usize,
    gain: f32,
}

impl BlockProcessor<SparseCoefs<f32>> for BandGate {
    fn process_block(&mut self, coefs: &mut SparseCoefs<f32>) {
        for band in coefs.iter_mut().skip(self.cutoff) {
            for c in band.iter_mut() {
                *c = *c * self.gain;
            }
        }
    }
}

fn main() {
    let config = CqtConfig::default();

    println!("Streaming CQT Demo");
    println!(
        "Block size: {}, hop size: {}, {} bands",
        config.block_size,
        config.hop_size(),
        config.band_info().num_bands
    );

    let sample_rate = config.sample_rate as usize;
    let chunk_size = 512;
    let total_samples = sample_rate * 2;
    let audio: Vec<f32> = (0..total_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let freq = 200.0 + 900.0 * t;
            0.5 * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect();

    for mode in [ProcessingMode::Direct, ProcessingMode::Sliding] {
        let mut identity = match CqtSparseProcessor::<f32>::new(config, mode, Passthrough) {
            Ok(processor) => processor,
            Err(e) => {
                eprintln!("invalid configuration: {}", e);
                return;
            }
        };

        let mut output = vec![0.0f32; audio.len()];
        for (src, dst) in audio.chunks(chunk_size).zip(output.chunks_mut(chunk_size)) {
            identity.process(src, dst);
        }

        // skip the warm-up before comparing against the delayed input
        let latency = identity.latency();
        let skip = latency + 2 * config.block_size;
        let signal_power: f32 = audio[skip - latency..audio.len() - latency]
            .iter()
            .map(|x| x.powi(2))
            .sum();
        let noise_power: f32 = audio[skip - latency..audio.len() - latency]
            .iter()
            .zip(&output[skip..])
            .map(|(a, b)| (a - b).powi(2))
            .sum();

        println!("\n{:?} mode:", mode);
        println!("  Latency: {} samples", latency);
        println!(
            "  Identity SNR: {:.1} dB",
            10.0 * (signal_power / noise_power.max(f32::MIN_POSITIVE)).log10()
        );
    }

    let hook = BandGate { cutoff: 30, gain: 0.1 };
    let mut gated = match CqtSparseProcessor::<f32, BandGate>::direct(config, hook) {
        Ok(processor) => processor,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            return;
        }
    };
    let mut output = vec![0.0f32; audio.len()];
    gated.process(&audio, &mut output);

    let cutoff_hz = gated
        .cqt()
        .map(|cqt| cqt.filterbank().band_frequencies()[gated.hook().cutoff])
        .unwrap_or(0.0);
    let rms = |x: &[f32]| cqt_rs::rms(x);
    println!("\nBand gate above {:.0} Hz:", cutoff_hz);
    println!("  Input RMS:  {:.3}", rms(&audio));
    println!("  Output RMS: {:.3}", rms(&output));
}

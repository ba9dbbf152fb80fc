/// Element-wise kernels on the per-block path, dispatched through pulp when the
/// `simd` feature is enabled
use num_traits::Float;

#[cfg(feature = "simd")]
use pulp::Arch;

/// Multiply samples by a window in place.
///
/// Used on both sides of the transform: analysis windowing of a sliced block and
/// synthesis windowing before overlap-add.
#[inline]
pub fn apply_window<T: Float + 'static>(samples: &mut [T], window: &[T]) {
    debug_assert_eq!(samples.len(), window.len());

    #[cfg(feature = "simd")]
    {
        let simd = pulp::Arch::new();
        match (
            std::any::TypeId::of::<T>(),
            std::any::TypeId::of::<f32>(),
            std::any::TypeId::of::<f64>(),
        ) {
            (t, f32_id, _) if t == f32_id => {
                apply_window_f32_simd(
                    simd,
                    unsafe { std::mem::transmute::<&mut [T], &mut [f32]>(samples) },
                    unsafe { std::mem::transmute::<&[T], &[f32]>(window) },
                );
                return;
            }
            (t, _, f64_id) if t == f64_id => {
                apply_window_f64_simd(
                    simd,
                    unsafe { std::mem::transmute::<&mut [T], &mut [f64]>(samples) },
                    unsafe { std::mem::transmute::<&[T], &[f64]>(window) },
                );
                return;
            }
            _ => {}
        }
    }

    // Fallback to scalar implementation
    for (sample, &w) in samples.iter_mut().zip(window) {
        *sample = *sample * w;
    }
}

#[cfg(feature = "simd")]
fn apply_window_f32_simd(simd: Arch, samples: &mut [f32], window: &[f32]) {
    simd.dispatch(|| {
        let (samples_head, samples_tail) = pulp::as_arrays_mut::<4, _>(samples);
        let (window_head, window_tail) = pulp::as_arrays::<4, _>(window);

        for (s, w) in samples_head.iter_mut().zip(window_head) {
            *s = [s[0] * w[0], s[1] * w[1], s[2] * w[2], s[3] * w[3]];
        }

        for (s, w) in samples_tail.iter_mut().zip(window_tail) {
            *s *= w;
        }
    });
}

#[cfg(feature = "simd")]
fn apply_window_f64_simd(simd: Arch, samples: &mut [f64], window: &[f64]) {
    simd.dispatch(|| {
        let (samples_head, samples_tail) = pulp::as_arrays_mut::<4, _>(samples);
        let (window_head, window_tail) = pulp::as_arrays::<4, _>(window);

        for (s, w) in samples_head.iter_mut().zip(window_head) {
            *s = [s[0] * w[0], s[1] * w[1], s[2] * w[2], s[3] * w[3]];
        }

        for (s, w) in samples_tail.iter_mut().zip(window_tail) {
            *s *= w;
        }
    });
}

/// Scale samples in place
#[inline]
pub fn scale_in_place<T: Float + 'static>(samples: &mut [T], scale: T) {
    #[cfg(feature = "simd")]
    {
        let simd = pulp::Arch::new();
        match (
            std::any::TypeId::of::<T>(),
            std::any::TypeId::of::<f32>(),
            std::any::TypeId::of::<f64>(),
        ) {
            (t, f32_id, _) if t == f32_id => {
                scale_f32_simd(
                    simd,
                    unsafe { std::mem::transmute::<&mut [T], &mut [f32]>(samples) },
                    unsafe { std::mem::transmute_copy::<T, f32>(&scale) },
                );
                return;
            }
            (t, _, f64_id) if t == f64_id => {
                scale_f64_simd(
                    simd,
                    unsafe { std::mem::transmute::<&mut [T], &mut [f64]>(samples) },
                    unsafe { std::mem::transmute_copy::<T, f64>(&scale) },
                );
                return;
            }
            _ => {}
        }
    }

    // Fallback to scalar
    for sample in samples.iter_mut() {
        *sample = *sample * scale;
    }
}

#[cfg(feature = "simd")]
fn scale_f32_simd(simd: Arch, samples: &mut [f32], scale: f32) {
    simd.dispatch(|| {
        let (head, tail) = pulp::as_arrays_mut::<4, _>(samples);

        for s in head.iter_mut() {
            *s = [s[0] * scale, s[1] * scale, s[2] * scale, s[3] * scale];
        }

        for s in tail.iter_mut() {
            *s *= scale;
        }
    });
}

#[cfg(feature = "simd")]
fn scale_f64_simd(simd: Arch, samples: &mut [f64], scale: f64) {
    simd.dispatch(|| {
        let (head, tail) = pulp::as_arrays_mut::<4, _>(samples);

        for s in head.iter_mut() {
            *s = [s[0] * scale, s[1] * scale, s[2] * scale, s[3] * scale];
        }

        for s in tail.iter_mut() {
            *s *= scale;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_window_f32() {
        let mut samples = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let window = vec![0.5f32, 0.5, 0.5, 0.5, 2.0, 2.0, 0.0];
        apply_window(&mut samples, &window);
        assert_eq!(samples, vec![0.5, 1.0, 1.5, 2.0, 10.0, 12.0, 0.0]);
    }

    #[test]
    fn test_apply_window_f64_matches_scalar() {
        let original: Vec<f64> = (0..37).map(|i| (i as f64 * 0.3).sin()).collect();
        let window: Vec<f64> = (0..37).map(|i| (i as f64 * 0.1).cos()).collect();

        let mut samples = original.clone();
        apply_window(&mut samples, &window);

        for i in 0..37 {
            assert_eq!(samples[i], original[i] * window[i]);
        }
    }

    #[test]
    fn test_scale_in_place() {
        let mut samples = vec![1.0f64, -2.0, 4.0, 8.0, 16.0];
        scale_in_place(&mut samples, 0.25);
        assert_eq!(samples, vec![0.25, -0.5, 1.0, 2.0, 4.0]);

        let mut samples = vec![3.0f32; 9];
        scale_in_place(&mut samples, 2.0);
        assert!(samples.iter().all(|&s| s == 6.0));
    }
}

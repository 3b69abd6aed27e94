//! Fractal noise synthesis and height calibration.
//!
//! Elevation (and every other noise-driven mask) starts as multi-octave
//! gradient noise. Fields are unbounded until calibrated: calibration
//! shifts a field so that a chosen quantile lands on a chosen value,
//! which is how area fractions such as "20% water" are hit exactly.

use std::f32::consts::TAU;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::symmetry::Symmetry;
use crate::tilemap::Tilemap;

/// Amplitude of an octave as a function of its wavelength (in cells).
pub type AmplitudeFn = dyn Fn(f32) -> f32 + Sync;

/// Amplitude proportional to wavelength (pink noise).
pub fn pink_amplitude(wavelength: f32) -> f32 {
    wavelength
}

/// Amplitude proportional to `wavelength ^ (1 - roughness)`. A roughness of
/// 0 gives pink noise; larger values keep more high-frequency detail.
pub fn rough_amplitude(roughness: f32) -> impl Fn(f32) -> f32 + Sync {
    move |wavelength: f32| wavelength.powf(1.0 - roughness)
}

// =============================================================================
// NOISE FIELD
// =============================================================================

/// Multi-octave fractal gradient noise.
///
/// Octave `i` has wavelength `feature_size / 2^i`; there are
/// `ceil(log2(max(width, height)))` octaves, and octaves shorter than one
/// cell are skipped.
pub fn fractal_noise(
    rng: &mut ChaCha8Rng,
    width: usize,
    height: usize,
    feature_size: f32,
    amplitude: &AmplitudeFn,
) -> Tilemap<f32> {
    let mut result = Tilemap::new_with(width, height, 0.0f32);
    let octaves = (width.max(height).max(2) as f32).log2().ceil() as u32;

    for octave in 0..octaves {
        let wavelength = feature_size / 2f32.powi(octave as i32);
        if wavelength < 1.0 {
            break;
        }
        let layer = gradient_noise(rng, width, height, wavelength);
        let amp = amplitude(wavelength);
        for (out, v) in result.as_mut_slice().iter_mut().zip(layer.as_slice()) {
            *out += v * amp;
        }
    }

    result
}

/// One octave of gradient noise.
///
/// Every lattice point gets a unit gradient with a random phase; each cell
/// centre interpolates the four surrounding gradient contributions.
fn gradient_noise(rng: &mut ChaCha8Rng, width: usize, height: usize, wavelength: f32) -> Tilemap<f32> {
    let lattice_w = (width as f32 / wavelength).ceil() as usize + 2;
    let lattice_h = (height as f32 / wavelength).ceil() as usize + 2;

    let offset_x: f32 = rng.gen();
    let offset_y: f32 = rng.gen();
    let gradients: Vec<(f32, f32)> = (0..lattice_w * lattice_h)
        .map(|_| {
            let phase: f32 = rng.gen::<f32>() * TAU;
            let (sin, cos) = phase.sin_cos();
            (cos, sin)
        })
        .collect();

    let mut layer = Tilemap::new_with(width, height, 0.0f32);
    // Cells are independent, so rows can be rendered in parallel without
    // changing the output.
    layer
        .as_mut_slice()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let sy = (y as f32 + 0.5) / wavelength + offset_y;
            let iy = (sy.floor() as usize).min(lattice_h - 2);
            let fy = sy - iy as f32;
            for (x, out) in row.iter_mut().enumerate() {
                let sx = (x as f32 + 0.5) / wavelength + offset_x;
                let ix = (sx.floor() as usize).min(lattice_w - 2);
                let fx = sx - ix as f32;

                let dot = |gx: usize, gy: usize, dx: f32, dy: f32| {
                    let (cx, cy) = gradients[gy * lattice_w + gx];
                    cx * dx + cy * dy
                };
                let n00 = dot(ix, iy, fx, fy);
                let n10 = dot(ix + 1, iy, fx - 1.0, fy);
                let n01 = dot(ix, iy + 1, fx, fy - 1.0);
                let n11 = dot(ix + 1, iy + 1, fx - 1.0, fy - 1.0);

                let u = fade(fx);
                let v = fade(fy);
                let top = n00 + (n10 - n00) * u;
                let bottom = n01 + (n11 - n01) * u;
                *out = top + (bottom - top) * v;
            }
        });
    layer
}

/// Quintic fade curve used to weight the bilinear blend.
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Fractal noise averaged over a symmetry group.
///
/// The pattern is rendered once on a square large enough to contain every
/// rotation of the map, then sampled at each rotated cell centre. The
/// average is rescaled by `sqrt(rotations)` to keep the variance of a
/// single sample. With a mirror axis the field is summed with its
/// reflection.
pub fn symmetric_fractal_noise(
    rng: &mut ChaCha8Rng,
    width: usize,
    height: usize,
    feature_size: f32,
    symmetry: &Symmetry,
    amplitude: &AmplitudeFn,
) -> Tilemap<f32> {
    if symmetry.is_identity() {
        return fractal_noise(rng, width, height, feature_size, amplitude);
    }

    let size = ((width * width + height * height) as f32).sqrt().ceil() as usize + 2;
    let pattern = fractal_noise(rng, size, size, feature_size, amplitude);
    let (cx, cy) = symmetry.center();
    let half = size as f32 / 2.0;
    let rotations = symmetry.rotations as usize;
    let correction = (rotations as f32).sqrt();

    let rotated = Tilemap::from_fn(width, height, |x, y| {
        let images = symmetry.project_point((x as f32 + 0.5, y as f32 + 0.5));
        let sum: f32 = images
            .iter()
            .take(rotations)
            .map(|&(px, py)| pattern.sample_bilinear(px - cx + half - 0.5, py - cy + half - 0.5))
            .sum();
        sum / rotations as f32 * correction
    });

    if symmetry.mirror == crate::symmetry::MirrorAxis::None {
        return rotated;
    }

    Tilemap::from_fn(width, height, |x, y| {
        let (mx, my) = symmetry.mirror_point((x as f32 + 0.5, y as f32 + 0.5));
        *rotated.get(x, y) + rotated.sample_bilinear(mx - 0.5, my - 0.5)
    })
}

// =============================================================================
// HEIGHT CALIBRATION
// =============================================================================

/// Empirical quantile of all values, linearly interpolated between order
/// statistics. `fraction` is clamped to `[0, 1]`.
pub fn quantile(field: &Tilemap<f32>, fraction: f32) -> f32 {
    sorted_quantile(field.as_slice().to_vec(), fraction)
}

/// Quantile over the cells where `mask` is true only.
pub fn masked_quantile(field: &Tilemap<f32>, mask: &Tilemap<bool>, fraction: f32) -> f32 {
    let values = field
        .as_slice()
        .iter()
        .zip(mask.as_slice())
        .filter(|(_, &m)| m)
        .map(|(&v, _)| v)
        .collect();
    sorted_quantile(values, fraction)
}

fn sorted_quantile(mut sorted: Vec<f32>, fraction: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let position = fraction.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let t = position - lower as f32;
    sorted[lower] + (sorted[upper] - sorted[lower]) * t
}

/// Shift every value so that the `fraction` quantile equals `target`.
pub fn calibrate_height_in_place(field: &mut Tilemap<f32>, target: f32, fraction: f32) {
    let shift = target - quantile(field, fraction);
    for v in field.as_mut_slice() {
        *v += shift;
    }
}

/// Calibrate so that (approximately) `fraction_above` of the cells are >= 0.
pub fn calibrate_area_fraction(field: &mut Tilemap<f32>, fraction_above: f32) {
    calibrate_height_in_place(field, 0.0, 1.0 - fraction_above);
}

/// Normalize values to the 0.0-1.0 range.
pub fn normalize_heightmap(field: &Tilemap<f32>) -> Tilemap<f32> {
    let (min_val, max_val) = field.range();
    let range = max_val - min_val;
    if range < 0.0001 {
        return field.map(|_| 0.5);
    }
    field.map(|&v| (v - min_val) / range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::MirrorAxis;
    use rand::SeedableRng;

    #[test]
    fn test_noise_is_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        let fa = fractal_noise(&mut a, 32, 24, 16.0, &pink_amplitude);
        let fb = fractal_noise(&mut b, 32, 24, 16.0, &pink_amplitude);
        assert_eq!(fa, fb);
        let (lo, hi) = fa.range();
        assert!(hi > lo);
    }

    #[test]
    fn test_calibrated_quantile_hits_target() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let base = fractal_noise(&mut rng, 40, 40, 20.0, &pink_amplitude);
        for &q in &[0.0f32, 0.1, 0.5, 0.73, 1.0] {
            let mut field = base.clone();
            calibrate_height_in_place(&mut field, 2.5, q);
            assert!((quantile(&field, q) - 2.5).abs() < 1e-3, "quantile {q}");
        }
    }

    #[test]
    fn test_masked_quantile_ignores_other_cells() {
        let field = Tilemap::from_fn(4, 1, |x, _| x as f32);
        let mask = Tilemap::from_fn(4, 1, |x, _| x >= 2);
        assert_eq!(masked_quantile(&field, &mask, 0.0), 2.0);
        assert_eq!(masked_quantile(&field, &mask, 1.0), 3.0);
        assert_eq!(masked_quantile(&field, &Tilemap::new_with(4, 1, false), 0.5), 0.0);
    }

    #[test]
    fn test_area_fraction_calibration() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut field = fractal_noise(&mut rng, 50, 50, 25.0, &pink_amplitude);
        calibrate_area_fraction(&mut field, 0.2);
        let above = field.as_slice().iter().filter(|&&v| v >= 0.0).count();
        let fraction = above as f32 / field.len() as f32;
        assert!((fraction - 0.2).abs() < 0.01, "fraction {fraction}");
    }

    #[test]
    fn test_symmetric_noise_is_symmetric() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let sym = Symmetry::new(2, MirrorAxis::None, 20, 20);
        let field = symmetric_fractal_noise(&mut rng, 20, 20, 10.0, &sym, &pink_amplitude);
        for y in 0..20 {
            for x in 0..20 {
                let a = *field.get(x, y);
                let b = *field.get(19 - x, 19 - y);
                assert!((a - b).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_normalize_range() {
        let field = Tilemap::from_fn(4, 4, |x, y| (x * y) as f32 - 3.0);
        let normalized = normalize_heightmap(&field);
        let (lo, hi) = normalized.range();
        assert_eq!((lo, hi), (0.0, 1.0));
    }
}

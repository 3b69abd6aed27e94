//! Landmass shaping
//!
//! Turns a calibrated height field into a binary mask (land/water or
//! mountain/flat) that is smooth and has no feature thinner than a
//! requested thickness. A feature is "thin" where no `t x t` window lying
//! entirely inside that feature covers the cell; windows may hang over the
//! map edge, so the border itself never makes a feature thin.

use crate::symmetry::Symmetry;
use crate::tilemap::{disc_offsets, SummedArea, Tilemap};

/// Upper bound on the number of repair passes.
const MAX_REPAIR_PASSES: usize = 16;

/// Upper bound on blur iterations at one radius.
const MAX_BLUR_ITERATIONS: usize = 32;

/// Parameters for landmass shaping
#[derive(Clone, Debug, PartialEq)]
pub struct LandmassParams {
    /// Largest majority-blur radius
    pub smoothing_radius: usize,
    /// Dead band around 50% within which the blur keeps a cell unchanged
    pub smoothing_threshold: f32,
    /// Minimum feature thickness in cells
    pub min_thickness: usize,
    /// Value used for exact ties and for oscillation-breaking discs
    pub bias: bool,
}

impl Default for LandmassParams {
    fn default() -> Self {
        Self {
            smoothing_radius: 2,
            smoothing_threshold: 0.0,
            min_thickness: 3,
            bias: true,
        }
    }
}

/// Shape a calibrated height field into a mask of cells `>= 0`.
pub fn shape_landmass(field: &Tilemap<f32>, params: &LandmassParams) -> Tilemap<bool> {
    let mask = binarize(field);
    let mask = smooth_mask(&mask, params.smoothing_radius, params.smoothing_threshold, params.bias);
    enforce_thickness(mask, params.min_thickness, params.bias)
}

/// Threshold a field at zero.
pub fn binarize(field: &Tilemap<f32>) -> Tilemap<bool> {
    field.map(|&v| v >= 0.0)
}

// =============================================================================
// SMOOTHING
// =============================================================================

/// One majority-vote pass over `(2r+1)^2` windows clipped to the map.
/// Returns the new mask and the number of changed cells.
pub fn majority_blur(mask: &Tilemap<bool>, radius: usize, threshold: f32, bias: bool) -> (Tilemap<bool>, usize) {
    let sat = SummedArea::new(mask);
    let r = radius as i32;
    let mut changes = 0;
    let result = Tilemap::from_fn(mask.width, mask.height, |x, y| {
        let (x, y) = (x as i32, y as i32);
        let (trues, total) = sat.count(x - r, y - r, x + r + 1, y + r + 1);
        let current = *mask.get(x as usize, y as usize);
        let balance = trues as f32 / total as f32 - 0.5;
        let value = if balance > threshold {
            true
        } else if balance < -threshold {
            false
        } else if balance == 0.0 {
            bias
        } else {
            current
        };
        if value != current {
            changes += 1;
        }
        value
    });
    (result, changes)
}

/// Blur at radii `1..=radius`, repeating each radius until stable.
pub fn smooth_mask(mask: &Tilemap<bool>, radius: usize, threshold: f32, bias: bool) -> Tilemap<bool> {
    let mut current = mask.clone();
    for r in 1..=radius {
        for _ in 0..MAX_BLUR_ITERATIONS {
            let (next, changes) = majority_blur(&current, r, threshold, bias);
            current = next;
            if changes == 0 {
                break;
            }
        }
    }
    current
}

// =============================================================================
// MORPHOLOGY
// =============================================================================

/// Cells covered by at least one `t x t` window whose in-map part is all true
/// (erode-then-dilate with a square element).
pub fn opening(mask: &Tilemap<bool>, thickness: usize) -> Tilemap<bool> {
    let t = thickness.max(1) as i32;
    let (w, h) = (mask.width as i32, mask.height as i32);
    let sat = SummedArea::new(mask);

    // Coverage accumulated with a 2D difference array.
    let dw = (w + 1) as usize;
    let mut diff = vec![0i32; dw * (h + 1) as usize];
    for y0 in (1 - t)..h {
        for x0 in (1 - t)..w {
            let (trues, cells) = sat.count(x0, y0, x0 + t, y0 + t);
            if cells == 0 || trues != cells {
                continue;
            }
            let (cx0, cy0) = (x0.max(0) as usize, y0.max(0) as usize);
            let (cx1, cy1) = ((x0 + t).min(w) as usize, (y0 + t).min(h) as usize);
            diff[cy0 * dw + cx0] += 1;
            diff[cy0 * dw + cx1] -= 1;
            diff[cy1 * dw + cx0] -= 1;
            diff[cy1 * dw + cx1] += 1;
        }
    }

    let mut covered = Tilemap::new_with(mask.width, mask.height, false);
    let mut column = vec![0i32; dw];
    for y in 0..mask.height {
        let mut running = 0;
        for x in 0..mask.width {
            column[x] += diff[y * dw + x];
            running += column[x];
            covered.set(x, y, running > 0);
        }
    }
    covered
}

/// Dilate-then-erode with a square element.
pub fn closing(mask: &Tilemap<bool>, thickness: usize) -> Tilemap<bool> {
    opening(&mask.inverted(), thickness).inverted()
}

/// Cells with the given value that belong to a feature thinner than `thickness`.
pub fn thin_cells(mask: &Tilemap<bool>, thickness: usize, value: bool) -> Tilemap<bool> {
    let region = if value { mask.clone() } else { mask.inverted() };
    let fat = opening(&region, thickness);
    region.zip(&fat, |&r, &f| r && !f)
}

/// Score thin cells by how enclosed they are.
///
/// Each of the four `t x t` windows having the cell as a corner (one per
/// diagonal quadrant) contributes the number of opposite-valued cells it
/// contains. Cells on the feature boundary are preferred; if none exist all
/// thin cells compete.
fn thinness_scores(mask: &Tilemap<bool>, thin: &Tilemap<bool>, thickness: usize, value: bool) -> Vec<(usize, u32)> {
    let opposite = if value { mask.inverted() } else { mask.clone() };
    let sat = SummedArea::new(&opposite);
    let t = thickness as i32;

    let mut boundary = Vec::new();
    let mut interior = Vec::new();
    for (x, y, &is_thin) in thin.iter() {
        if !is_thin {
            continue;
        }
        let (xi, yi) = (x as i32, y as i32);
        let mut score = 0;
        for (sx, sy) in [(1, 1), (-1, 1), (-1, -1), (1, -1)] {
            let (x0, x1) = if sx > 0 { (xi, xi + t) } else { (xi - t + 1, xi + 1) };
            let (y0, y1) = if sy > 0 { (yi, yi + t) } else { (yi - t + 1, yi + 1) };
            score += sat.count(x0, y0, x1, y1).0;
        }
        let idx = y * mask.width + x;
        if mask.neighbors(x, y).iter().any(|&(nx, ny)| *mask.get(nx, ny) != value) {
            boundary.push((idx, score));
        } else {
            interior.push((idx, score));
        }
    }
    if boundary.is_empty() {
        interior
    } else {
        boundary
    }
}

/// Repeatedly flip the thinnest cells of `value` features until none are
/// thin. Returns the number of flipped cells.
pub fn fix_thin_mass(mask: &mut Tilemap<bool>, thickness: usize, value: bool) -> usize {
    let mut flipped = 0;
    // Every pass removes at least one `value` cell, so this bound is never hit
    // before the mask runs out of them.
    for _ in 0..mask.len() {
        let thin = thin_cells(mask, thickness, value);
        let scores = thinness_scores(mask, &thin, thickness, value);
        let Some(best) = scores.iter().map(|&(_, s)| s).max() else {
            break;
        };
        for &(idx, score) in &scores {
            if score == best {
                let (x, y) = mask.coords(idx);
                mask.set(x, y, !value);
                flipped += 1;
            }
        }
    }
    flipped
}

/// Alternate opening/closing and thin-mass repair until stable.
pub fn enforce_thickness(mut mask: Tilemap<bool>, thickness: usize, bias: bool) -> Tilemap<bool> {
    if thickness <= 1 {
        return mask;
    }

    let mut two_back: Option<Tilemap<bool>> = None;
    for pass in 0..MAX_REPAIR_PASSES {
        let before = mask.clone();

        if pass % 2 == 0 {
            mask = closing(&opening(&mask, thickness), thickness);
            fix_thin_mass(&mut mask, thickness, false);
            fix_thin_mass(&mut mask, thickness, true);
        } else {
            mask = opening(&closing(&mask, thickness), thickness);
            fix_thin_mass(&mut mask, thickness, true);
            fix_thin_mass(&mut mask, thickness, false);
        }

        if mask == before {
            break;
        }

        // Cells that went back to the state they had two passes ago are
        // oscillating; settle them with a disc of the bias value.
        if let Some(older) = &two_back {
            let radius = thickness as f32;
            let offsets = disc_offsets(radius);
            let mut oscillating = Vec::new();
            for (x, y, &v) in mask.iter() {
                if v != *before.get(x, y) && v == *older.get(x, y) {
                    oscillating.push((x as i32, y as i32));
                }
            }
            for (cx, cy) in oscillating {
                for &(dx, dy) in &offsets {
                    if mask.contains(cx + dx, cy + dy) {
                        mask.set((cx + dx) as usize, (cy + dy) as usize, bias);
                    }
                }
            }
        }
        two_back = Some(before);
    }
    mask
}

/// Majority vote of every cell with its symmetry images. Exact ties
/// resolve to `bias`. Only exact groups give an exactly symmetric result.
pub fn symmetrize(mask: &Tilemap<bool>, symmetry: &Symmetry, bias: bool) -> Tilemap<bool> {
    if symmetry.is_identity() {
        return mask.clone();
    }
    Tilemap::from_fn(mask.width, mask.height, |x, y| {
        let (mut votes, mut total) = (0usize, 0usize);
        for (ix, iy) in symmetry.project_cell((x as i32, y as i32)) {
            if let Some(&v) = mask.get_checked(ix, iy) {
                votes += v as usize;
                total += 1;
            }
        }
        match (2 * votes).cmp(&total) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => bias,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::MirrorAxis;

    fn blobs_with_channel() -> Tilemap<bool> {
        // Land everywhere except a one-cell vertical channel and a lake.
        Tilemap::from_fn(24, 16, |x, y| x != 12 && !(3..9).contains(&x) || !(4..12).contains(&y))
    }

    #[test]
    fn test_blur_removes_isolated_cell() {
        let mut mask = Tilemap::new_with(9, 9, false);
        mask.set(4, 4, true);
        let smoothed = smooth_mask(&mask, 1, 0.0, false);
        assert_eq!(smoothed.count_true(), 0);
    }

    #[test]
    fn test_opening_removes_thin_strip() {
        let mask = Tilemap::from_fn(10, 10, |x, y| x < 5 || y == 5);
        let opened = opening(&mask, 3);
        assert!(*opened.get(2, 2));
        assert!(!*opened.get(8, 5));
    }

    #[test]
    fn test_map_edge_does_not_make_features_thin() {
        let mask = Tilemap::from_fn(10, 10, |x, _| x == 0);
        assert_eq!(thin_cells(&mask, 3, true).count_true(), 0);
        let inner = Tilemap::from_fn(10, 10, |x, _| x == 5);
        assert_eq!(thin_cells(&inner, 3, true).count_true(), 10);
        let wide = Tilemap::from_fn(10, 10, |x, _| x < 3);
        assert_eq!(thin_cells(&wide, 3, true).count_true(), 0);
    }

    #[test]
    fn test_channel_is_closed() {
        let shaped = enforce_thickness(blobs_with_channel(), 3, true);
        assert!(*shaped.get(12, 0));
        assert_eq!(thin_cells(&shaped, 3, true).count_true(), 0);
        assert_eq!(thin_cells(&shaped, 3, false).count_true(), 0);
        // The lake is wide enough to survive.
        assert!(!*shaped.get(5, 8));
    }

    #[test]
    fn test_fix_thin_mass_flips_peninsula() {
        let mut mask = Tilemap::from_fn(12, 12, |x, y| y < 6 || (x == 6 && y < 9));
        let flipped = fix_thin_mass(&mut mask, 3, true);
        assert!(flipped >= 3);
        assert!(!*mask.get(6, 8));
        assert_eq!(thin_cells(&mask, 3, true).count_true(), 0);
    }

    #[test]
    fn test_shape_landmass_respects_thickness() {
        let field = Tilemap::from_fn(20, 20, |x, y| {
            if (x + y) % 7 == 0 || (x > 10 && y > 4 && y < 15) { 1.0 } else { -1.0 }
        });
        let params = LandmassParams {
            smoothing_radius: 1,
            min_thickness: 2,
            ..Default::default()
        };
        let mask = shape_landmass(&field, &params);
        assert_eq!(thin_cells(&mask, 2, true).count_true(), 0);
        assert_eq!(thin_cells(&mask, 2, false).count_true(), 0);
    }

    #[test]
    fn test_symmetrize_rotation() {
        let sym = Symmetry::new(4, MirrorAxis::None, 12, 12);
        let mask = Tilemap::from_fn(12, 12, |x, y| x < 4 && y < 6);
        let result = symmetrize(&mask, &sym, true);
        for (x, y, &v) in result.iter() {
            assert_eq!(v, *result.get(11 - y, x), "({x}, {y})");
            assert_eq!(v, *result.get(11 - x, 11 - y));
        }
    }
}

//! Resource density placement
//!
//! Ore is spread over clear, playable cells in the order given by a
//! noise-driven weight field, one cell (and its symmetric images) at a
//! time, until the placed value reaches the per-player target.

use std::collections::BTreeSet;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Playability, TemplateCatalog, TileDescriptor};
use crate::heightmap::{fractal_noise, pink_amplitude};
use crate::params::ResourceParams;
use crate::plan::{mark_footprints, EntityPlan, SPAWN};
use crate::priority::PriorityArray;
use crate::symmetry::Symmetry;
use crate::tilemap::Tilemap;

/// Resource kind stored in a cell (0 = none)
pub const NO_RESOURCE: u8 = 0;
pub const ORE: u8 = 1;

/// One cell of the resource grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCell {
    pub kind: u8,
    pub density: u8,
}

impl ResourceCell {
    pub fn is_empty(&self) -> bool {
        self.kind == NO_RESOURCE
    }
}

/// Resource grid plus the value bookkeeping of the run that produced it.
#[derive(Clone, Debug)]
pub struct ResourceLayout {
    pub cells: Tilemap<ResourceCell>,
    pub target: u64,
    pub placed: u64,
}

impl ResourceLayout {
    pub fn shortfall(&self) -> bool {
        self.placed < self.target
    }
}

/// Value of one resource cell: `resource_value * (density + 1)`.
pub fn cell_value(cell: ResourceCell, resource_value: u32) -> u64 {
    if cell.is_empty() {
        0
    } else {
        resource_value as u64 * (cell.density as u64 + 1)
    }
}

/// Density from the number of resource cells in the 3x3 neighbourhood.
fn density_for(count: u32, max_density: u8) -> u8 {
    ((max_density as u32 * count / 9).max(1)).min(u8::MAX as u32) as u8
}

/// Total value of a resource grid.
pub fn total_value(cells: &Tilemap<ResourceCell>, resource_value: u32) -> u64 {
    cells.as_slice().iter().map(|&c| cell_value(c, resource_value)).sum()
}

/// Cells that may hold resources: playable terrain flagged as resource
/// bearing, away from entity footprints and spawn centres.
pub fn resource_eligible(
    tiles: &Tilemap<TileDescriptor>,
    catalog: &TemplateCatalog,
    plans: &[EntityPlan],
    exclusion: f32,
) -> Tilemap<bool> {
    let mut blocked = Tilemap::new_with(tiles.width, tiles.height, false);
    mark_footprints(plans, &mut blocked);
    let spawns: Vec<(f32, f32)> = plans.iter().filter(|p| p.kind == SPAWN).map(|p| p.center()).collect();

    Tilemap::from_fn(tiles.width, tiles.height, |x, y| {
        let tile = *tiles.get(x, y);
        let terrain_ok = catalog
            .terrain_of(tile)
            .is_some_and(|t| catalog.terrain_type(t).resource_eligible);
        let center = (x as f32 + 0.5, y as f32 + 0.5);
        terrain_ok
            && catalog.playability_of(tile) == Playability::Playable
            && !*blocked.get(x, y)
            && spawns.iter().all(|&s| distance(s, center) >= exclusion)
    })
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Placement weight of each eligible cell: noise normalised over the
/// eligible cells, plus a bonus ramping down with distance from spawns.
fn weight_field(
    rng: &mut ChaCha8Rng,
    eligible: &Tilemap<bool>,
    spawns: &[(f32, f32)],
    params: &ResourceParams,
) -> Tilemap<f32> {
    let noise = fractal_noise(
        rng,
        eligible.width,
        eligible.height,
        params.resource_feature_size,
        &pink_amplitude,
    );
    let (mut lo, mut hi) = (f32::INFINITY, f32::NEG_INFINITY);
    for (x, y, &v) in noise.iter() {
        if *eligible.get(x, y) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    let range = if hi > lo { hi - lo } else { 1.0 };

    Tilemap::from_fn(eligible.width, eligible.height, |x, y| {
        let base = if hi >= lo { (*noise.get(x, y) - lo) / range } else { 0.0 };
        let center = (x as f32 + 0.5, y as f32 + 0.5);
        let nearest = spawns.iter().map(|&s| distance(s, center)).fold(f32::INFINITY, f32::min);
        let ramp = if params.resource_spawn_ramp > 0.0 {
            (1.0 - nearest / params.resource_spawn_ramp).max(0.0)
        } else {
            0.0
        };
        base + params.resource_spawn_bias * ramp
    })
}

/// Greedily spread ore until `target` value is reached or no eligible
/// cell remains.
pub fn place_resources(
    rng: &mut ChaCha8Rng,
    eligible: &Tilemap<bool>,
    plans: &[EntityPlan],
    symmetry: &Symmetry,
    params: &ResourceParams,
    target: u64,
) -> ResourceLayout {
    let (width, height) = (eligible.width, eligible.height);
    let mut cells = Tilemap::new_with(width, height, ResourceCell::default());
    let spawns: Vec<(f32, f32)> = plans.iter().filter(|p| p.kind == SPAWN).map(|p| p.center()).collect();
    let weights = weight_field(rng, eligible, &spawns, params);

    let mut queue = PriorityArray::new(width * height, f32::INFINITY);
    for (x, y, &ok) in eligible.iter() {
        if ok {
            queue.set(y * width + x, -*weights.get(x, y));
        }
    }

    let mut placed = 0u64;
    while placed < target && queue.min_priority().is_finite() {
        let index = queue.min_index();
        let (x, y) = cells.coords(index);

        let mut changed = BTreeSet::new();
        for (ix, iy) in symmetry.project_cell((x as i32, y as i32)) {
            if !eligible.contains(ix, iy) {
                continue;
            }
            let (ux, uy) = (ix as usize, iy as usize);
            queue.set(uy * width + ux, f32::INFINITY);
            if *eligible.get(ux, uy) && cells.get(ux, uy).is_empty() {
                cells.set(ux, uy, ResourceCell { kind: ORE, density: 1 });
                changed.insert((ix, iy));
            }
        }
        // Guard against a cell whose own image is ineligible.
        queue.set(index, f32::INFINITY);
        if changed.is_empty() {
            continue;
        }

        let affected: BTreeSet<(i32, i32)> = changed
            .iter()
            .flat_map(|&(cx, cy)| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| (cx + dx, cy + dy))))
            .filter(|&(ax, ay)| cells.contains(ax, ay))
            .collect();

        let mut before = 0u64;
        let mut after = 0u64;
        for &(ax, ay) in &affected {
            let (ux, uy) = (ax as usize, ay as usize);
            let old = *cells.get(ux, uy);
            if !changed.contains(&(ax, ay)) {
                before += cell_value(old, params.resource_value);
            }
            if old.is_empty() {
                continue;
            }
            let count = neighbourhood_count(&cells, ax, ay, old.kind);
            let new = ResourceCell {
                density: density_for(count, params.max_resource_density),
                ..old
            };
            cells.set(ux, uy, new);
            after += cell_value(new, params.resource_value);
        }
        placed = (placed + after).saturating_sub(before);
    }

    ResourceLayout {
        cells,
        target,
        placed,
    }
}

fn neighbourhood_count(cells: &Tilemap<ResourceCell>, x: i32, y: i32, kind: u8) -> u32 {
    let mut count = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if cells.get_checked(x + dx, y + dy).is_some_and(|c| c.kind == kind) {
                count += 1;
            }
        }
    }
    count
}

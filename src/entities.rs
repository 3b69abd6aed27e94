//! Spawn, mine and neutral structure placement
//!
//! Placement is driven by "roominess": the distance from a cell to the
//! nearest cell that cannot be built on. Every placement is made once and
//! then copied through the map's symmetry group, and the roominess field
//! is recomputed after each batch so later choices see earlier ones.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::{GenResult, GenerationError};
use crate::params::EntityParams;
use crate::plan::{mark_footprints, EntityCatalog, EntityPlan, GEM_MINE, MINE, SPAWN};
use crate::symmetry::Symmetry;
use crate::tilemap::{disc_offsets, Tilemap};

// =============================================================================
// ROOMINESS
// =============================================================================

/// Signed distance field over a mask.
///
/// Eligible cells get the Chebyshev distance to the nearest ineligible
/// cell or to the map edge (1 next to either). Ineligible cells get the
/// negated distance to the nearest eligible cell. Values are clamped to
/// `[-cap, cap]`.
pub fn roominess(eligible: &Tilemap<bool>, cap: i32) -> Tilemap<i32> {
    let inside = distance_to_other(eligible, true, cap);
    let outside = distance_to_other(eligible, false, cap);
    Tilemap::from_fn(eligible.width, eligible.height, |x, y| {
        if *eligible.get(x, y) {
            *inside.get(x, y)
        } else {
            -*outside.get(x, y)
        }
    })
}

/// BFS distance from cells equal to `value` to the nearest cell that
/// differs. With `value == true` the map edge also counts as different.
fn distance_to_other(mask: &Tilemap<bool>, value: bool, cap: i32) -> Tilemap<i32> {
    let mut dist = Tilemap::new_with(mask.width, mask.height, cap);
    let mut queue = VecDeque::new();

    for (x, y, &v) in mask.iter() {
        if v != value {
            continue;
        }
        let on_edge = x == 0 || y == 0 || x + 1 == mask.width || y + 1 == mask.height;
        let touches_other = mask.neighbors_8(x, y).iter().any(|&(nx, ny)| *mask.get(nx, ny) != value);
        if touches_other || (value && on_edge) {
            dist.set(x, y, 1);
            queue.push_back((x, y));
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        let d = *dist.get(x, y);
        if d >= cap {
            continue;
        }
        for (nx, ny) in mask.neighbors_8(x, y) {
            if *mask.get(nx, ny) == value && *dist.get(nx, ny) > d + 1 {
                dist.set(nx, ny, d + 1);
                queue.push_back((nx, ny));
            }
        }
    }
    dist
}

// =============================================================================
// PLACER
// =============================================================================

/// Entity placement state for one map.
pub struct EntityPlacer<'a> {
    symmetry: &'a Symmetry,
    catalog: &'a EntityCatalog,
    params: &'a EntityParams,
    /// Buildable cells of the playable area
    base: Tilemap<bool>,
    /// Cells withheld by spawn, expansion and structure zones
    reserved: Tilemap<bool>,
    /// Cells under placed footprints
    occupied: Tilemap<bool>,
    plans: Vec<EntityPlan>,
}

impl<'a> EntityPlacer<'a> {
    pub fn new(
        base: Tilemap<bool>,
        symmetry: &'a Symmetry,
        catalog: &'a EntityCatalog,
        params: &'a EntityParams,
    ) -> Self {
        let (w, h) = (base.width, base.height);
        Self {
            symmetry,
            catalog,
            params,
            base,
            reserved: Tilemap::new_with(w, h, false),
            occupied: Tilemap::new_with(w, h, false),
            plans: Vec::new(),
        }
    }

    pub fn plans(&self) -> &[EntityPlan] {
        &self.plans
    }

    pub fn into_plans(self) -> Vec<EntityPlan> {
        self.plans
    }

    /// Cells covered by placed footprints.
    pub fn occupied(&self) -> &Tilemap<bool> {
        &self.occupied
    }

    fn eligible(&self) -> Tilemap<bool> {
        Tilemap::from_fn(self.base.width, self.base.height, |x, y| {
            *self.base.get(x, y) && !*self.reserved.get(x, y) && !*self.occupied.get(x, y)
        })
    }

    fn current_roominess(&self) -> Tilemap<i32> {
        roominess(&self.eligible(), self.params.roominess_cap)
    }

    fn clamp_into_map(&self, mut plan: EntityPlan) -> EntityPlan {
        let max_x = (self.base.width as i32 - plan.size.0).max(0);
        let max_y = (self.base.height as i32 - plan.size.1).max(0);
        plan.location = (plan.location.0.clamp(0, max_x), plan.location.1.clamp(0, max_y));
        plan
    }

    /// Symmetry images of a plan, clamped into the map.
    fn images(&self, plan: &EntityPlan) -> Vec<EntityPlan> {
        plan.project(self.symmetry)
            .into_iter()
            .map(|p| self.clamp_into_map(p))
            .collect()
    }

    /// Whether every image lands on free buildable cells without
    /// overlapping another image.
    fn images_fit(&self, images: &[EntityPlan]) -> bool {
        let mut claimed = Vec::new();
        for (x, y) in images.iter().flat_map(|p| p.cells()) {
            if self.base.get_checked(x, y) != Some(&true) || *self.occupied.get(x as usize, y as usize) {
                return false;
            }
            if claimed.contains(&(x, y)) {
                return false;
            }
            claimed.push((x, y));
        }
        true
    }

    /// Record images and reserve a disc around each of them.
    fn commit(&mut self, images: Vec<EntityPlan>, reserve_radius: f32) {
        mark_footprints(&images, &mut self.occupied);
        if reserve_radius > 0.0 {
            for image in &images {
                self.reserve_disc(image.center(), reserve_radius);
            }
        }
        self.plans.extend(images);
    }

    fn reserve_disc(&mut self, center: (f32, f32), radius: f32) {
        let (cx, cy) = (center.0.floor() as i32, center.1.floor() as i32);
        for (dx, dy) in disc_offsets(radius) {
            if self.reserved.contains(cx + dx, cy + dy) {
                self.reserved.set((cx + dx) as usize, (cy + dy) as usize, true);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Spawns
    // -------------------------------------------------------------------------

    /// Place one spawn per player. Returns the spawn plans ordered by owner.
    pub fn place_spawns(&mut self, rng: &mut ChaCha8Rng) -> GenResult<Vec<EntityPlan>> {
        let copies = self.symmetry.projection_count();
        if self.params.players % copies != 0 {
            return Err(GenerationError::invalid(
                "players",
                format!("{} players cannot be split across {copies} symmetric copies", self.params.players),
            ));
        }

        let mut spawns = Vec::with_capacity(self.params.players);
        for base_index in 0..self.params.players / copies {
            let room = self.current_roominess();
            let cell = self
                .best_spawn_cell(&room, true, rng)
                .or_else(|| self.best_spawn_cell(&room, false, rng))
                .ok_or(GenerationError::NoRoomForSpawn { player: base_index * copies })?;

            let plan = self.catalog.plan(SPAWN, cell).with_zone(self.params.spawn_reservation);
            let images: Vec<EntityPlan> = self
                .images(&plan)
                .into_iter()
                .enumerate()
                .map(|(k, image)| image.with_owner(base_index * copies + k))
                .collect();
            spawns.extend(images.iter().cloned());
            self.commit(images, self.params.spawn_reservation);
        }
        spawns.sort_by_key(|p| p.owner);
        Ok(spawns)
    }

    /// Best spawn cell by roominess, limited by distance to the symmetry's
    /// fixed structures when `central` is set. Ties are broken at random.
    fn best_spawn_cell(&self, room: &Tilemap<i32>, central: bool, rng: &mut ChaCha8Rng) -> Option<(i32, i32)> {
        let mut best = 0;
        let mut candidates = Vec::new();
        for (x, y, &r) in room.iter() {
            let mut score = r;
            if central {
                let center = (x as f32 + 0.5, y as f32 + 0.5);
                let clearance = self.symmetry.central_distance(center) - self.params.central_reservation;
                score = score.min(clearance.floor() as i32);
                if self.symmetry.projection_spacing(center) < self.params.spawn_spacing {
                    score = score.min(0);
                }
            }
            if score < 1 || score < best {
                continue;
            }
            if score > best {
                best = score;
                candidates.clear();
            }
            candidates.push((x as i32, y as i32));
        }
        candidates.choose(rng).copied()
    }

    // -------------------------------------------------------------------------
    // Mines
    // -------------------------------------------------------------------------

    /// Place the starting mines around every spawn owned by a base player
    /// (copies are produced by projection). Returns the number of plans.
    pub fn place_spawn_deposits(&mut self, rng: &mut ChaCha8Rng, spawns: &[EntityPlan]) -> usize {
        let copies = self.symmetry.projection_count();
        let before = self.plans.len();
        let inner = self.params.spawn_mine_inner_radius;
        let outer = self.params.spawn_mine_radius;
        for spawn in spawns.iter().filter(|s| s.owner.is_some_and(|o| o % copies == 0)) {
            self.scatter_mines(rng, spawn.center(), inner, outer, self.params.spawn_mines);
        }
        self.plans.len() - before
    }

    /// Weighted disc sampling: closer cells are favoured and each pick
    /// clears its neighbourhood.
    fn scatter_mines(&mut self, rng: &mut ChaCha8Rng, center: (f32, f32), inner: f32, outer: f32, count: usize) {
        let (cx, cy) = (center.0.floor() as i32, center.1.floor() as i32);
        let mut weights: Vec<((i32, i32), f32)> = disc_offsets(outer)
            .into_iter()
            .filter_map(|(dx, dy)| {
                let d = ((dx * dx + dy * dy) as f32).sqrt();
                let (x, y) = (cx + dx, cy + dy);
                let free = self.base.get_checked(x, y) == Some(&true) && !*self.occupied.get(x as usize, y as usize);
                (free && d >= inner).then_some(((x, y), outer - d + 1.0))
            })
            .collect();

        let spacing = disc_offsets(self.params.mine_spacing);
        for _ in 0..count {
            let Ok(&(cell, _)) = weights.choose_weighted(rng, |&(_, w)| w) else {
                break;
            };
            let kind = if rng.gen_bool(self.params.gem_chance as f64) { GEM_MINE } else { MINE };
            let images = self.images(&self.catalog.plan(kind, cell));
            if self.images_fit(&images) {
                self.commit(images, 0.0);
            }
            for entry in weights.iter_mut() {
                let (dx, dy) = (entry.0 .0 - cell.0, entry.0 .1 - cell.1);
                if spacing.contains(&(dx, dy)) {
                    entry.1 = 0.0;
                }
            }
        }
    }

    /// Pick a cell with at least `min_room`, weighted by how much roomier
    /// than the minimum it is.
    fn pick_roomy_cell(&self, rng: &mut ChaCha8Rng, min_room: i32) -> Option<(i32, i32)> {
        let room = self.current_roominess();
        let candidates: Vec<((i32, i32), i32)> = room
            .iter()
            .filter(|(_, _, &r)| r >= min_room)
            .map(|(x, y, &r)| ((x as i32, y as i32), r - min_room + 1))
            .collect();
        candidates.choose_weighted(rng, |&(_, w)| w).ok().map(|&(cell, _)| cell)
    }

    /// Expansion mine fields, until no cell is roomy enough or the maximum
    /// count is reached. Returns the number of plans.
    pub fn place_expansions(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let before = self.plans.len();
        for _ in 0..self.params.max_expansions {
            let Some(cell) = self.pick_roomy_cell(rng, self.params.expansion_min_room) else {
                break;
            };
            let center = (cell.0 as f32 + 0.5, cell.1 as f32 + 0.5);
            let images = self.images(&self.catalog.plan(MINE, cell).with_zone(self.params.expansion_radius));
            if !self.images_fit(&images) {
                // Too close to its own image; keep the spot from being picked again.
                self.reserve_disc(center, 1.0);
                continue;
            }
            self.commit(images, 0.0);
            self.scatter_mines(rng, center, 1.0, self.params.expansion_radius, self.params.expansion_mines);
            for image in self.symmetry.project_point(center) {
                self.reserve_disc(image, self.params.expansion_radius);
            }
        }
        self.plans.len() - before
    }

    /// Neutral structures chosen by weight. Returns the number of plans.
    pub fn place_neutral_structures(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let params = self.params;
        let kinds: Vec<(&String, f32)> = params
            .neutral_weights
            .iter()
            .filter(|(_, &w)| w > 0.0)
            .map(|(k, &w)| (k, w))
            .collect();
        let before = self.plans.len();
        for _ in 0..params.max_neutral_structures {
            let Ok(&(kind, _)) = kinds.choose_weighted(rng, |&(_, w)| w) else {
                break;
            };
            let Some(cell) = self.pick_roomy_cell(rng, self.params.neutral_min_room) else {
                break;
            };
            let size = self.catalog.size_of(kind).unwrap_or((1, 1));
            let plan = self
                .catalog
                .plan(kind, (cell.0 - size.0 / 2, cell.1 - size.1 / 2))
                .with_zone(self.params.neutral_reservation);
            let images = self.images(&plan);
            if !self.images_fit(&images) {
                self.reserve_disc(plan.center(), 1.0);
                continue;
            }
            self.commit(images, self.params.neutral_reservation);
        }
        self.plans.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::MirrorAxis;
    use rand::SeedableRng;

    fn params() -> EntityParams {
        EntityParams {
            central_reservation: 4.0,
            spawn_spacing: 8.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_roominess_signs_and_edges() {
        let mut mask = Tilemap::new_with(7, 7, true);
        mask.set(0, 0, false);
        let room = roominess(&mask, 10);
        assert_eq!(*room.get(0, 0), -1);
        assert_eq!(*room.get(1, 1), 1);
        // The blocked corner is three steps away, the map edge four.
        assert_eq!(*room.get(3, 3), 3);
        assert_eq!(*room.get(6, 3), 1);
        assert_eq!(*roominess(&mask, 2).get(3, 3), 2);
    }

    #[test]
    fn test_single_spawn_on_tiny_map() {
        let sym = Symmetry::identity(2, 2);
        let catalog = EntityCatalog::builtin();
        let params = EntityParams {
            players: 1,
            ..params()
        };
        let mut placer = EntityPlacer::new(Tilemap::new_with(2, 2, true), &sym, &catalog, &params);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let spawns = placer.place_spawns(&mut rng).unwrap();
        assert_eq!(spawns.len(), 1);
        assert_eq!(spawns[0].owner, Some(0));
        assert_eq!(placer.plans().iter().filter(|p| p.kind == SPAWN).count(), 1);
    }

    #[test]
    fn test_symmetric_spawns() {
        let sym = Symmetry::new(2, MirrorAxis::None, 32, 32);
        let catalog = EntityCatalog::builtin();
        let params = EntityParams {
            players: 4,
            ..params()
        };
        let mut placer = EntityPlacer::new(Tilemap::new_with(32, 32, true), &sym, &catalog, &params);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let spawns = placer.place_spawns(&mut rng).unwrap();
        assert_eq!(spawns.len(), 4);
        let owners: Vec<_> = spawns.iter().map(|s| s.owner).collect();
        assert_eq!(owners, vec![Some(0), Some(1), Some(2), Some(3)]);
        // Owners 0 and 1 are rotations of each other.
        let (a, b) = (spawns[0].location, spawns[1].location);
        assert_eq!((a.0 + b.0, a.1 + b.1), (31, 31));
    }

    #[test]
    fn test_no_room_for_spawn() {
        let sym = Symmetry::identity(4, 4);
        let catalog = EntityCatalog::builtin();
        let params = params();
        let params = EntityParams { players: 1, ..params };
        let mut placer = EntityPlacer::new(Tilemap::new_with(4, 4, false), &sym, &catalog, &params);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            placer.place_spawns(&mut rng),
            Err(GenerationError::NoRoomForSpawn { player: 0 })
        ));
    }

    #[test]
    fn test_mines_expansions_and_structures() {
        let sym = Symmetry::new(2, MirrorAxis::None, 48, 48);
        let catalog = EntityCatalog::builtin();
        let params = EntityParams {
            gem_chance: 0.0,
            ..params()
        };
        let mut placer = EntityPlacer::new(Tilemap::new_with(48, 48, true), &sym, &catalog, &params);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let spawns = placer.place_spawns(&mut rng).unwrap();

        let mines = placer.place_spawn_deposits(&mut rng, &spawns);
        assert_eq!(mines, params.spawn_mines * 2);
        for mine in placer.plans().iter().filter(|p| p.kind == MINE) {
            let d = spawns
                .iter()
                .map(|s| {
                    let (a, b) = (s.center(), mine.center());
                    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
                })
                .fold(f32::INFINITY, f32::min);
            assert!(d <= params.spawn_mine_radius + 1.0);
        }

        let expansions = placer.place_expansions(&mut rng);
        assert_eq!(expansions % 2, 0);
        let structures = placer.place_neutral_structures(&mut rng);
        assert_eq!(structures % 2, 0);

        // No two footprints overlap.
        let mut seen = std::collections::HashSet::new();
        for plan in placer.plans() {
            for cell in plan.cells() {
                assert!(seen.insert(cell), "overlap at {cell:?}");
            }
        }
    }
}

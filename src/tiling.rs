//! Template fitting along paths
//!
//! Chains catalog template segments end to end so that the chain follows
//! a path as closely as possible. The search runs Dijkstra over states
//! `(lattice point, connector)`: an edge is one segment anchored at the
//! state's point whose start connector equals the state's connector, and
//! it costs the summed deviation of the points it visits. The cheapest
//! chain reaching the path's end with its end connector wins; among equal
//! chains one is picked at random during reconstruction.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::catalog::{Connector, TemplateCatalog, TemplateId, TileDescriptor};
use crate::direction::{Direction, DirectionMask};
use crate::error::{GenResult, GenerationError};
use crate::path::Path;
use crate::priority::PriorityArray;
use crate::tilemap::Tilemap;

/// Outcome of fitting one path.
#[derive(Clone, Debug, PartialEq)]
pub struct TiledPath {
    /// Template and map position (top-left) of every placed template, in
    /// path order.
    pub placements: Vec<(TemplateId, (i32, i32))>,
    /// Total deviation of the fitted chain from the path
    pub cost: f32,
}

/// A segment usable on the current path, with points relative to its
/// first point.
struct Candidate {
    template: TemplateId,
    /// Offset from the first segment point to the template origin
    origin: (i32, i32),
    relative: Vec<(i32, i32)>,
    start: usize,
    end: usize,
}

impl Candidate {
    fn exit(&self) -> (i32, i32) {
        self.relative[self.relative.len() - 1]
    }
}

// =============================================================================
// CORRIDOR
// =============================================================================

/// Deviation and direction constraints around a path, over a local window
/// of lattice points that may extend past the map.
struct Corridor {
    min_x: i32,
    min_y: i32,
    width: i32,
    height: i32,
    max_deviation: i32,
    deviation: Vec<i32>,
    traversal: Vec<DirectionMask>,
    progress: Vec<DirectionMask>,
}

impl Corridor {
    fn new(path: &Path) -> Self {
        let margin = path.max_deviation;
        let min_x = path.points.iter().map(|p| p.0).min().unwrap_or(0) - margin;
        let min_y = path.points.iter().map(|p| p.1).min().unwrap_or(0) - margin;
        let max_x = path.points.iter().map(|p| p.0).max().unwrap_or(0) + margin;
        let max_y = path.points.iter().map(|p| p.1).max().unwrap_or(0) + margin;
        let width = max_x - min_x + 1;
        let height = max_y - min_y + 1;
        let size = (width * height) as usize;

        let mut corridor = Self {
            min_x,
            min_y,
            width,
            height,
            max_deviation: margin,
            deviation: vec![i32::MAX; size],
            traversal: vec![DirectionMask::empty(); size],
            progress: vec![DirectionMask::empty(); size],
        };

        let moves = path.moves();
        for (i, &p) in path.points.iter().enumerate() {
            let mut nearby = Vec::with_capacity(2);
            if i > 0 {
                nearby.push(moves[i - 1]);
            }
            if i < moves.len() {
                nearby.push(moves[i]);
            }
            let mut traversal = DirectionMask::empty();
            let mut progress = DirectionMask::empty();
            for &m in &nearby {
                traversal |= DirectionMask::around(m, false);
                progress |= DirectionMask::around(m, true);
            }

            for dy in -margin..=margin {
                for dx in -margin..=margin {
                    let Some(idx) = corridor.index((p.0 + dx, p.1 + dy)) else {
                        continue;
                    };
                    let d = dx.abs().max(dy.abs());
                    corridor.deviation[idx] = corridor.deviation[idx].min(d);
                    corridor.traversal[idx] |= traversal;
                    corridor.progress[idx] |= progress;
                }
            }
        }
        corridor
    }

    fn len(&self) -> usize {
        self.deviation.len()
    }

    fn index(&self, p: (i32, i32)) -> Option<usize> {
        let (x, y) = (p.0 - self.min_x, p.1 - self.min_y);
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some((y * self.width + x) as usize)
        }
    }

    fn point(&self, idx: usize) -> (i32, i32) {
        let idx = idx as i32;
        (idx % self.width + self.min_x, idx / self.width + self.min_y)
    }

    /// Cost of laying `candidate` with its first point at `anchor`, or
    /// `None` if it leaves the corridor or runs against the path.
    fn evaluate(&self, candidate: &Candidate, anchor: (i32, i32)) -> Option<f32> {
        let anchor_idx = self.index(anchor)?;
        let mut cost = 0;
        for (j, &(rx, ry)) in candidate.relative.iter().enumerate() {
            let q = (anchor.0 + rx, anchor.1 + ry);
            let idx = self.index(q)?;
            let dev = self.deviation[idx];
            if dev > self.max_deviation {
                return None;
            }
            if j > 0 {
                cost += dev;
            }
            if let Some(&(nx, ny)) = candidate.relative.get(j + 1) {
                let step = Direction::from_offset(nx - rx, ny - ry)?;
                if !self.traversal[idx].has(step) {
                    return None;
                }
            }
        }
        let (dx, dy) = candidate.exit();
        if let Some(net) = Direction::from_displacement(dx, dy) {
            if !self.progress[anchor_idx].has(net) {
                return None;
            }
        }
        Some(cost as f32)
    }
}

// =============================================================================
// SEARCH
// =============================================================================

fn tiling_error(path: &Path, reason: impl Into<String>) -> GenerationError {
    GenerationError::PathTiling {
        kind: path.label.clone(),
        reason: reason.into(),
    }
}

/// Collect every permitted segment compatible with the path's connector
/// kinds and register the connectors they use.
fn collect_candidates(path: &Path, catalog: &TemplateCatalog) -> (Vec<Candidate>, Vec<Connector>) {
    let start_ok = |c: &Connector| c.kind == path.start.kind || path.inner.contains(&c.kind);
    let end_ok = |c: &Connector| c.kind == path.end.kind || path.inner.contains(&c.kind);

    let mut connectors: Vec<Connector> = Vec::new();
    let mut register = |c: Connector| match connectors.iter().position(|&k| k == c) {
        Some(i) => i,
        None => {
            connectors.push(c);
            connectors.len() - 1
        }
    };

    let mut candidates = Vec::new();
    for &id in &path.templates {
        let template = catalog.template(id);
        for seg in &template.segments {
            if !start_ok(&seg.start) || !end_ok(&seg.end) {
                continue;
            }
            let first = seg.points[0];
            candidates.push(Candidate {
                template: id,
                origin: (-first.0, -first.1),
                relative: seg.points.iter().map(|&(x, y)| (x - first.0, y - first.1)).collect(),
                start: register(seg.start),
                end: register(seg.end),
            });
        }
    }
    (candidates, connectors)
}

/// Fit templates along `path` and stamp them into `tiles`. Footprint cells
/// outside the map are dropped.
pub fn tile_path(
    path: &Path,
    catalog: &TemplateCatalog,
    tiles: &mut Tilemap<TileDescriptor>,
    rng: &mut ChaCha8Rng,
) -> GenResult<TiledPath> {
    if path.points.len() < 2 {
        return Err(tiling_error(path, "path has no steps"));
    }

    let (candidates, connectors) = collect_candidates(path, catalog);
    let start_conn = connectors
        .iter()
        .position(|&c| c == path.start)
        .filter(|&i| candidates.iter().any(|c| c.start == i))
        .ok_or_else(|| tiling_error(path, "no permitted template starts with the path's start connector"))?;
    let end_conn = connectors
        .iter()
        .position(|&c| c == path.end)
        .filter(|&i| candidates.iter().any(|c| c.end == i))
        .ok_or_else(|| tiling_error(path, "no permitted template ends with the path's end connector"))?;

    let corridor = Corridor::new(path);
    let n_conn = connectors.len();
    let mut by_start = vec![Vec::new(); n_conn];
    let mut by_end = vec![Vec::new(); n_conn];
    for (k, c) in candidates.iter().enumerate() {
        by_start[c.start].push(k);
        by_end[c.end].push(k);
    }

    let first = path.points[0];
    let last = path.points[path.points.len() - 1];
    let state = |point: usize, conn: usize| point * n_conn + conn;
    let end_node = corridor.len() * n_conn;
    let total = end_node + 1;
    let start_node = corridor
        .index(first)
        .map(|p| state(p, start_conn))
        .ok_or_else(|| tiling_error(path, "start point outside corridor"))?;

    let mut queue = PriorityArray::new(total, f32::INFINITY);
    let mut cost = vec![f32::INFINITY; total];
    let mut order = vec![u32::MAX; total];
    cost[start_node] = 0.0;
    queue.set(start_node, 0.0);

    let mut finalized = 0u32;
    loop {
        let node = queue.min_index();
        let node_cost = queue.min_priority();
        if !node_cost.is_finite() {
            return Err(tiling_error(path, "no chain of templates fits within the corridor"));
        }
        queue.set(node, f32::INFINITY);
        order[node] = finalized;
        finalized += 1;
        if node == end_node {
            break;
        }

        let anchor = corridor.point(node / n_conn);
        for &k in &by_start[node % n_conn] {
            let candidate = &candidates[k];
            let Some(step) = corridor.evaluate(candidate, anchor) else {
                continue;
            };
            let next_cost = node_cost + step;
            let (ex, ey) = candidate.exit();
            let landing = (anchor.0 + ex, anchor.1 + ey);

            let mut relax = |target: usize| {
                if order[target] == u32::MAX && next_cost < cost[target] {
                    cost[target] = next_cost;
                    queue.set(target, next_cost);
                }
            };
            if landing == last && candidate.end == end_conn {
                relax(end_node);
            }
            if path.inner.contains(&connectors[candidate.end].kind) {
                if let Some(p) = corridor.index(landing) {
                    relax(state(p, candidate.end));
                }
            }
        }
    }

    // Walk back from the end, choosing among equally cheap predecessors
    // that were finalized earlier.
    let mut chain = Vec::new();
    let mut current = end_node;
    while current != start_node {
        let (point, conn) = if current == end_node {
            (last, end_conn)
        } else {
            (corridor.point(current / n_conn), current % n_conn)
        };

        let mut options = Vec::new();
        for &k in &by_end[conn] {
            let candidate = &candidates[k];
            let (ex, ey) = candidate.exit();
            let anchor = (point.0 - ex, point.1 - ey);
            let Some(p) = corridor.index(anchor) else {
                continue;
            };
            let prev = state(p, candidate.start);
            if order[prev] >= order[current] {
                continue;
            }
            if let Some(step) = corridor.evaluate(candidate, anchor) {
                if cost[prev] + step == cost[current] {
                    options.push((k, anchor, prev));
                }
            }
        }
        if options.is_empty() {
            return Err(tiling_error(path, "inconsistent search state during reconstruction"));
        }
        let (k, anchor, prev) = options[rng.gen_range(0..options.len())];
        chain.push((k, anchor));
        current = prev;
    }
    chain.reverse();

    let mut placements = Vec::with_capacity(chain.len());
    for (k, anchor) in chain {
        let candidate = &candidates[k];
        let origin = (anchor.0 + candidate.origin.0, anchor.1 + candidate.origin.1);
        stamp_template(catalog, candidate.template, origin, tiles);
        placements.push((candidate.template, origin));
    }

    Ok(TiledPath {
        placements,
        cost: cost[end_node],
    })
}

/// Write a template's footprint with its top-left corner at `origin`.
pub fn stamp_template(
    catalog: &TemplateCatalog,
    id: TemplateId,
    origin: (i32, i32),
    tiles: &mut Tilemap<TileDescriptor>,
) {
    for ((fx, fy), index) in catalog.template(id).footprint() {
        let (x, y) = (origin.0 + fx, origin.1 + fy);
        if tiles.contains(x, y) {
            tiles.set(x as usize, y as usize, TileDescriptor::new(id, index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::catalog::{CatalogSpec, Playability, SegmentSpec, TemplateSpec, TerrainTypeSpec};
    use crate::contour::trace_contours;
    use crate::path::PathStyle;
    use rand::SeedableRng;

    fn straight_catalog() -> TemplateCatalog {
        let template = |name: &str, pick_any: bool, segments: Vec<SegmentSpec>| TemplateSpec {
            name: name.into(),
            size: (1, 1),
            tiles: vec![Some("Clear".into())],
            categories: vec!["Clear".into()],
            pick_any,
            segments,
        };
        TemplateCatalog::from_spec(&CatalogSpec {
            terrain_types: vec![TerrainTypeSpec {
                name: "Clear".into(),
                playability: Playability::Playable,
                resource_eligible: true,
                color: [0, 0, 0],
            }],
            templates: vec![
                template("blank", true, vec![]),
                template(
                    "clear_r",
                    false,
                    vec![SegmentSpec {
                        start: "Clear.R".into(),
                        inner: "Clear".into(),
                        end: "Clear.R".into(),
                        points: vec![(0, 1), (1, 1)],
                    }],
                ),
            ],
        })
        .unwrap()
    }

    fn straight_path(catalog: &TemplateCatalog, n: i32) -> Path {
        let clear = catalog.connector_kind("Clear").unwrap();
        let connector = Connector {
            kind: clear,
            direction: Direction::R,
        };
        Path {
            points: (0..=n).map(|x| (x, 1)).collect(),
            is_loop: false,
            start: connector,
            end: connector,
            inner: vec![clear],
            templates: vec![catalog.template_by_name("clear_r").unwrap().id],
            max_deviation: 0,
            label: "test".into(),
        }
    }

    #[test]
    fn test_straight_path_places_one_tile_per_step() {
        let catalog = straight_catalog();
        let blank = TileDescriptor::new(TemplateId(0), 0);
        let mut tiles = Tilemap::new_with(6, 2, blank);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = tile_path(&straight_path(&catalog, 6), &catalog, &mut tiles, &mut rng).unwrap();
        assert_eq!(result.placements.len(), 6);
        assert_eq!(result.cost, 0.0);
        for x in 0..6 {
            assert_eq!(tiles.get(x, 0).template, TemplateId(1));
            assert_eq!(*tiles.get(x, 1), blank);
        }
    }

    #[test]
    fn test_missing_connector_fails() {
        let catalog = straight_catalog();
        let mut path = straight_path(&catalog, 4);
        path.start.direction = Direction::D;
        let mut tiles = Tilemap::new_with(4, 2, TileDescriptor::new(TemplateId(0), 0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = tile_path(&path, &catalog, &mut tiles, &mut rng).unwrap_err();
        assert!(matches!(err, GenerationError::PathTiling { .. }));
    }

    #[test]
    fn test_unreachable_end_fails_cleanly() {
        let catalog = straight_catalog();
        let mut path = straight_path(&catalog, 4);
        // A kink the single straight template cannot follow at zero deviation.
        path.points = vec![(0, 1), (1, 1), (2, 1), (2, 2), (3, 2), (4, 2)];
        let mut tiles = Tilemap::new_with(5, 3, TileDescriptor::new(TemplateId(0), 0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(tile_path(&path, &catalog, &mut tiles, &mut rng).is_err());
    }

    #[test]
    fn test_island_coast_is_tiled_with_beach() {
        let catalog = builtin::temperate().unwrap();
        let mask = Tilemap::from_fn(8, 8, |x, y| (2..5).contains(&x) && (3..5).contains(&y));
        let contours = trace_contours(&mask);
        let style = PathStyle::from_catalog(&catalog, "coast", "Beach", "Beach", "Beach", "Beach", 3).unwrap();
        let path = Path::from_contour(&contours[0], &style).unwrap();

        let water = TileDescriptor::new(catalog.template_by_name("water").unwrap().id, 0);
        let mut tiles = Tilemap::new_with(8, 8, water);
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let result = tile_path(&path, &catalog, &mut tiles, &mut rng).unwrap();
        assert_eq!(result.cost, 0.0);

        let beach = catalog.terrain_type_by_name(builtin::BEACH).unwrap();
        for (x, y, &is_land) in mask.iter() {
            if is_land {
                assert_eq!(catalog.terrain_of(*tiles.get(x, y)), Some(beach), "({x}, {y})");
            }
        }
    }

    fn cliff_path(catalog: &TemplateCatalog, points: Vec<(i32, i32)>) -> Path {
        let clear = catalog.connector_kind("Clear").unwrap();
        let cliff = catalog.connector_kind("Cliff").unwrap();
        let moves: Vec<Direction> = points
            .windows(2)
            .filter_map(|w| Direction::from_offset(w[1].0 - w[0].0, w[1].1 - w[0].1))
            .collect();
        Path {
            start: Connector {
                kind: clear,
                direction: moves[0],
            },
            end: Connector {
                kind: clear,
                direction: moves[moves.len() - 1],
            },
            points,
            is_loop: false,
            inner: vec![cliff],
            templates: catalog.templates_in_category("Cliffs"),
            max_deviation: 1,
            label: "cliff".into(),
        }
    }

    #[test]
    fn test_cliff_ending_on_a_turn_is_capped() {
        let catalog = builtin::temperate().unwrap();
        let clear = TileDescriptor::new(catalog.template_by_name("clear").unwrap().id, 0);
        let staircase = vec![(1, 4), (2, 4), (3, 4), (4, 4), (4, 3), (4, 2), (5, 2), (6, 2), (6, 1)];
        let mut tiles = Tilemap::new_with(8, 6, clear);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let result = tile_path(&cliff_path(&catalog, staircase), &catalog, &mut tiles, &mut rng).unwrap();
        assert_eq!(result.cost, 0.0);

        // Turning at both ends.
        let hook = vec![(2, 1), (2, 2), (3, 2), (4, 2), (5, 2), (5, 3)];
        let mut tiles = Tilemap::new_with(8, 6, clear);
        assert!(tile_path(&cliff_path(&catalog, hook), &catalog, &mut tiles, &mut rng).is_ok());
    }

    #[test]
    fn test_tiling_is_deterministic_per_seed() {
        let catalog = builtin::temperate().unwrap();
        let mask = Tilemap::from_fn(12, 12, |x, y| (3..9).contains(&x) && (3..9).contains(&y) && !(x > 6 && y > 6));
        let style = PathStyle::from_catalog(&catalog, "coast", "Beach", "Beach", "Beach", "Beach", 3).unwrap();
        let path = Path::from_contour(&trace_contours(&mask)[0], &style).unwrap();
        let water = TileDescriptor::new(catalog.template_by_name("water").unwrap().id, 0);

        let run = |seed| {
            let mut tiles = Tilemap::new_with(12, 12, water);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            tile_path(&path, &catalog, &mut tiles, &mut rng).unwrap();
            tiles
        };
        assert_eq!(run(4), run(4));
    }
}

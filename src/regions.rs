//! Playable region detection
//!
//! Splits the tile grid into connected playable regions. Fully playable
//! cells connect regions; partially playable cells (beaches, rough
//! ground) join whichever region reaches them first but never carry the
//! flood any further, so a strip of partial terrain is a one-cell-deep
//! membrane rather than a bridge.

use std::collections::VecDeque;

use crate::catalog::{Playability, TemplateCatalog, TileDescriptor};
use crate::error::{GenResult, GenerationError};
use crate::tilemap::Tilemap;

/// Region identifier (0 = no region, 1+ = region index + 1)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegionId(pub u16);

impl RegionId {
    pub const NONE: RegionId = RegionId(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    fn index(&self) -> usize {
        self.0 as usize - 1
    }
}

/// A connected playable component.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub id: RegionId,
    /// All cells including absorbed partial cells
    pub area: usize,
    /// Fully playable cells only
    pub playable_area: usize,
    /// Whether any cell lies outside the admissible (circular) bounds
    pub touches_outside: bool,
}

/// Result of region analysis.
#[derive(Clone, Debug)]
pub struct RegionMap {
    pub ids: Tilemap<RegionId>,
    pub regions: Vec<Region>,
    pub playability: Tilemap<Playability>,
}

impl RegionMap {
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        if id.is_none() {
            None
        } else {
            self.regions.get(id.index())
        }
    }

    /// The largest region by playable area that stays inside the bounds.
    /// Ties go to the region discovered first.
    pub fn primary(&self) -> GenResult<RegionId> {
        let mut best: Option<&Region> = None;
        for region in self.regions.iter().filter(|r| !r.touches_outside && r.playable_area > 0) {
            if best.map_or(true, |b| region.playable_area > b.playable_area) {
                best = Some(region);
            }
        }
        best.map(|r| r.id).ok_or(GenerationError::NoPlayableRegion)
    }

    /// Mask of cells belonging to `id`.
    pub fn mask(&self, id: RegionId) -> Tilemap<bool> {
        self.ids.map(|&r| r == id)
    }
}

/// Cells whose centre lies outside the circle inscribed in the map.
pub fn circle_outside_mask(width: usize, height: usize) -> Tilemap<bool> {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = cx.min(cy);
    Tilemap::from_fn(width, height, |x, y| {
        let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
        dx * dx + dy * dy > radius * radius
    })
}

/// Classify every tile and flood-fill the playable regions.
///
/// `occupied` marks cells under already placed entity footprints; playable
/// cells there are treated as partial. `outside` marks cells beyond the
/// admissible map bounds.
pub fn analyze_regions(
    tiles: &Tilemap<TileDescriptor>,
    catalog: &TemplateCatalog,
    occupied: Option<&Tilemap<bool>>,
    outside: Option<&Tilemap<bool>>,
) -> GenResult<RegionMap> {
    let (width, height) = (tiles.width, tiles.height);

    let mut playability = tiles.map(|&t| catalog.playability_of(t));
    if let Some(occupied) = occupied {
        for (x, y, p) in playability.iter_mut() {
            if *p == Playability::Playable && *occupied.get(x, y) {
                *p = Playability::Partial;
            }
        }
    }

    let mut ids = Tilemap::new_with(width, height, RegionId::NONE);
    let mut regions: Vec<Region> = Vec::new();
    let is_outside = |x: usize, y: usize| outside.is_some_and(|m| *m.get(x, y));

    for y in 0..height {
        for x in 0..width {
            if *playability.get(x, y) != Playability::Playable || !ids.get(x, y).is_none() {
                continue;
            }

            let id = u16::try_from(regions.len() + 1)
                .map(RegionId)
                .map_err(|_| GenerationError::TooManyRegions {
                    limit: u16::MAX as usize,
                })?;
            let mut region = Region {
                id,
                area: 0,
                playable_area: 0,
                touches_outside: false,
            };

            let mut queue = VecDeque::new();
            queue.push_back((x, y));
            ids.set(x, y, id);

            while let Some((cx, cy)) = queue.pop_front() {
                region.area += 1;
                region.touches_outside |= is_outside(cx, cy);
                if *playability.get(cx, cy) != Playability::Playable {
                    // Absorbed partial cell; the flood stops here.
                    continue;
                }
                region.playable_area += 1;

                for (nx, ny) in tiles.neighbors(cx, cy) {
                    if !ids.get(nx, ny).is_none() {
                        continue;
                    }
                    match playability.get(nx, ny) {
                        Playability::Playable | Playability::Partial => {
                            ids.set(nx, ny, id);
                            queue.push_back((nx, ny));
                        }
                        Playability::Unplayable => {}
                    }
                }
            }

            regions.push(region);
        }
    }

    Ok(RegionMap {
        ids,
        regions,
        playability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;

    fn paint(catalog: &TemplateCatalog, rows: &[&str]) -> Tilemap<TileDescriptor> {
        let tile = |name: &str| TileDescriptor::new(catalog.template_by_name(name).unwrap().id, 0);
        let (clear, water, rough) = (tile("clear"), tile("water"), tile("rough"));
        Tilemap::from_fn(rows[0].len(), rows.len(), |x, y| match rows[y].as_bytes()[x] {
            b'.' => clear,
            b'~' => rough,
            _ => water,
        })
    }

    #[test]
    fn test_water_separates_regions() {
        let catalog = builtin::temperate().unwrap();
        let tiles = paint(&catalog, &["...#..", "...#..", "...#.."]);
        let map = analyze_regions(&tiles, &catalog, None, None).unwrap();
        assert_eq!(map.regions.len(), 2);
        assert_eq!(map.regions[0].playable_area, 9);
        assert_eq!(map.primary().unwrap(), RegionId(1));
        assert!(map.ids.get(3, 1).is_none());
    }

    #[test]
    fn test_partial_cells_are_a_membrane() {
        let catalog = builtin::temperate().unwrap();
        let tiles = paint(&catalog, &["..~..", "..~..", "..~.."]);
        let map = analyze_regions(&tiles, &catalog, None, None).unwrap();
        assert_eq!(map.regions.len(), 2);
        let first = &map.regions[0];
        assert_eq!(first.area, 9);
        assert_eq!(first.playable_area, 6);
        assert_eq!(map.regions[1].area, 6);
    }

    #[test]
    fn test_occupied_cells_split_regions() {
        let catalog = builtin::temperate().unwrap();
        let tiles = paint(&catalog, &[".....", ".....", "....."]);
        let occupied = Tilemap::from_fn(5, 3, |x, _| x == 2);
        let map = analyze_regions(&tiles, &catalog, Some(&occupied), None).unwrap();
        assert_eq!(map.regions.len(), 2);
    }

    #[test]
    fn test_outside_regions_are_not_primary() {
        let catalog = builtin::temperate().unwrap();
        let tiles = paint(&catalog, &["##..", "##.."]);
        let outside = Tilemap::from_fn(4, 2, |x, _| x == 3);
        let map = analyze_regions(&tiles, &catalog, None, Some(&outside)).unwrap();
        assert!(matches!(map.primary(), Err(GenerationError::NoPlayableRegion)));
    }

    #[test]
    fn test_region_ids_do_not_wrap() {
        let catalog = builtin::temperate().unwrap();
        let tile = |name: &str| TileDescriptor::new(catalog.template_by_name(name).unwrap().id, 0);
        let (clear, water) = (tile("clear"), tile("water"));
        // Every clear cell is isolated: 80000 regions.
        let tiles = Tilemap::from_fn(400, 400, |x, y| if (x + y) % 2 == 0 { clear } else { water });
        assert!(matches!(
            analyze_regions(&tiles, &catalog, None, None),
            Err(GenerationError::TooManyRegions { .. })
        ));
    }

    #[test]
    fn test_circle_mask_corners() {
        let mask = circle_outside_mask(10, 10);
        assert!(*mask.get(0, 0));
        assert!(!*mask.get(5, 5));
        assert!(!*mask.get(0, 5));
    }
}

//! Entity placement plans
//!
//! A plan is what the generator hands over to whatever instantiates
//! actors: a type name, a cell, the footprint it occupies and an optional
//! owner. The generator only needs footprints, so entity types are
//! described by name and size alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::symmetry::Symmetry;
use crate::tilemap::Tilemap;

pub const SPAWN: &str = "mpspawn";
pub const MINE: &str = "mine";
pub const GEM_MINE: &str = "gmine";

/// One entity to be created on the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityPlan {
    pub kind: String,
    /// Top-left footprint cell
    pub location: (i32, i32),
    /// Footprint size in cells
    pub size: (i32, i32),
    /// Player index for spawn points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<usize>,
    /// Radius kept free around the entity after placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_radius: Option<f32>,
}

impl EntityPlan {
    pub fn new(kind: &str, location: (i32, i32), size: (i32, i32)) -> Self {
        Self {
            kind: kind.to_string(),
            location,
            size,
            owner: None,
            zone_radius: None,
        }
    }

    pub fn with_owner(mut self, owner: usize) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_zone(mut self, radius: f32) -> Self {
        self.zone_radius = Some(radius);
        self
    }

    /// Copy shifted by an offset.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        let mut plan = self.clone();
        plan.location = (self.location.0 + dx, self.location.1 + dy);
        plan
    }

    /// Fractional centre of the footprint.
    pub fn center(&self) -> (f32, f32) {
        (
            self.location.0 as f32 + self.size.0 as f32 / 2.0,
            self.location.1 as f32 + self.size.1 as f32 / 2.0,
        )
    }

    /// Absolute cells covered by the footprint.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (0..self.size.1).flat_map(move |dy| {
            (0..self.size.0).map(move |dx| (self.location.0 + dx, self.location.1 + dy))
        })
    }

    /// Whether the whole footprint lies inside a map of the given size.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.location.0 >= 0
            && self.location.1 >= 0
            && self.location.0 + self.size.0 <= width as i32
            && self.location.1 + self.size.1 <= height as i32
    }

    /// One plan per symmetry image, identity first. Images are positioned
    /// by their projected centre.
    pub fn project(&self, symmetry: &Symmetry) -> Vec<EntityPlan> {
        let (hw, hh) = (self.size.0 as f32 / 2.0, self.size.1 as f32 / 2.0);
        symmetry
            .project_point(self.center())
            .into_iter()
            .map(|(cx, cy)| {
                let mut plan = self.clone();
                plan.location = ((cx - hw).round() as i32, (cy - hh).round() as i32);
                plan
            })
            .collect()
    }
}

/// Mark the footprints of `plans` in a mask.
pub fn mark_footprints(plans: &[EntityPlan], mask: &mut Tilemap<bool>) {
    for plan in plans {
        for (x, y) in plan.cells() {
            if mask.contains(x, y) {
                mask.set(x as usize, y as usize, true);
            }
        }
    }
}

/// Footprint sizes of the entity types the generator may place.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EntityCatalog {
    pub footprints: BTreeMap<String, (i32, i32)>,
}

impl EntityCatalog {
    /// Spawn, ore mines, trees, tree clumps and neutral buildings.
    pub fn builtin() -> Self {
        let entries: [(&str, (i32, i32)); 13] = [
            (SPAWN, (1, 1)),
            (MINE, (1, 1)),
            (GEM_MINE, (1, 1)),
            ("t01", (1, 1)),
            ("t02", (1, 1)),
            ("t05", (1, 1)),
            ("tc01", (2, 1)),
            ("tc02", (2, 2)),
            ("oilb", (2, 2)),
            ("hosp", (2, 2)),
            ("fcom", (2, 2)),
            ("bio", (2, 2)),
            ("miss", (3, 2)),
        ];
        Self {
            footprints: entries.iter().map(|&(k, s)| (k.to_string(), s)).collect(),
        }
    }

    pub fn size_of(&self, kind: &str) -> Option<(i32, i32)> {
        self.footprints.get(kind).copied()
    }

    /// Plan for `kind` at `location`, defaulting to a single cell for
    /// unknown types.
    pub fn plan(&self, kind: &str, location: (i32, i32)) -> EntityPlan {
        EntityPlan::new(kind, location, self.size_of(kind).unwrap_or((1, 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetry::MirrorAxis;

    #[test]
    fn test_cells_cover_footprint() {
        let plan = EntityPlan::new("miss", (2, 3), (3, 2));
        let cells: Vec<_> = plan.cells().collect();
        assert_eq!(cells.len(), 6);
        assert!(cells.contains(&(4, 4)));
        assert!(plan.fits(5, 5));
        assert!(!plan.fits(4, 5));
    }

    #[test]
    fn test_projection_keeps_footprint_on_grid() {
        let sym = Symmetry::new(2, MirrorAxis::None, 10, 10);
        let plan = EntityPlan::new("oilb", (1, 1), (2, 2)).with_owner(0);
        let images = plan.project(&sym);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].location, (1, 1));
        assert_eq!(images[1].location, (7, 7));
        assert_eq!(images[1].owner, Some(0));
    }

    #[test]
    fn test_builtin_catalog_sizes() {
        let catalog = EntityCatalog::builtin();
        assert_eq!(catalog.size_of("tc02"), Some((2, 2)));
        assert_eq!(catalog.plan("unknown", (0, 0)).size, (1, 1));
    }
}

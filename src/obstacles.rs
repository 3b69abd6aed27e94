//! Obstacle packing
//!
//! Fills replaceable cells with obstacles: rock templates, trees, or any
//! combination of backing tiles and entities. Larger obstacles go first
//! so single-cell ones can fill the gaps they leave.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{TemplateCatalog, TemplateId, TileDescriptor};
use crate::plan::EntityPlan;
use crate::tilemap::Tilemap;

/// What may overwrite a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Replaceability {
    #[default]
    None,
    Tile,
    Entity,
    Any,
}

impl Replaceability {
    /// Greatest lower bound: what both contracts allow.
    pub fn meet(self, other: Replaceability) -> Replaceability {
        match (self, other) {
            (Replaceability::Any, x) | (x, Replaceability::Any) => x,
            (a, b) if a == b => a,
            _ => Replaceability::None,
        }
    }
}

/// A paintable unit: backing tiles and/or entities over a fixed shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    pub name: String,
    /// Tiles relative to the obstacle origin
    pub tiles: Vec<((i32, i32), TileDescriptor)>,
    /// Entities positioned relative to the obstacle origin
    pub entities: Vec<EntityPlan>,
    /// Every cell the obstacle occupies, relative to its origin
    pub shape: Vec<(i32, i32)>,
    pub contract: Replaceability,
    pub weight: f32,
}

impl Obstacle {
    /// Obstacle painting a template's footprint.
    pub fn from_template(catalog: &TemplateCatalog, id: TemplateId, weight: f32) -> Self {
        let template = catalog.template(id);
        let tiles: Vec<_> = template
            .footprint()
            .into_iter()
            .map(|(offset, index)| (offset, TileDescriptor::new(id, index)))
            .collect();
        let shape = tiles.iter().map(|&(offset, _)| offset).collect();
        Self {
            name: template.name.clone(),
            tiles,
            entities: Vec::new(),
            shape,
            contract: Replaceability::Tile,
            weight,
        }
    }

    /// Obstacle placing one entity with its footprint at the origin.
    pub fn from_entity(plan: EntityPlan, weight: f32) -> Self {
        let plan = plan.offset(-plan.location.0, -plan.location.1);
        let shape = plan.cells().collect::<Vec<_>>();
        let shape = if shape.is_empty() { vec![(0, 0)] } else { shape };
        Self {
            name: plan.kind.clone(),
            tiles: Vec::new(),
            entities: vec![plan],
            shape,
            contract: Replaceability::Entity,
            weight,
        }
    }

    pub fn area(&self) -> usize {
        self.shape.len()
    }
}

/// Statistics of one packing run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackingReport {
    pub placed: usize,
    pub area: usize,
}

/// Pack `obstacles` into the replaceable cells. Claimed cells are set to
/// `Replaceability::None` in `replace`.
pub fn place_obstacles(
    rng: &mut ChaCha8Rng,
    obstacles: &[Obstacle],
    replace: &mut Tilemap<Replaceability>,
    tiles: &mut Tilemap<TileDescriptor>,
    entities: &mut Vec<EntityPlan>,
) -> PackingReport {
    let mut report = PackingReport::default();
    let total_weight: f32 = obstacles.iter().map(|o| o.weight.max(0.0)).sum();
    if obstacles.is_empty() || total_weight <= 0.0 {
        return report;
    }
    let replaceable_area = replace.as_slice().iter().filter(|&&r| r != Replaceability::None).count();

    let mut groups: BTreeMap<usize, Vec<&Obstacle>> = BTreeMap::new();
    for obstacle in obstacles.iter().filter(|o| o.weight > 0.0) {
        groups.entry(obstacle.area()).or_default().push(obstacle);
    }

    for (&area, group) in groups.iter().rev() {
        let group_weight: f32 = group.iter().map(|o| o.weight).sum();
        let mut remaining = replaceable_area as f32 * group_weight / total_weight;

        let mut anchors: Vec<(i32, i32)> = replace
            .iter()
            .filter(|(_, _, &r)| r != Replaceability::None)
            .map(|(x, y, _)| (x as i32, y as i32))
            .collect();
        anchors.shuffle(rng);

        for (ax, ay) in anchors {
            if remaining <= 0.0 {
                break;
            }
            let Ok(&obstacle) = group.choose_weighted(rng, |o| o.weight) else {
                break;
            };
            let Some(contract) = reserve(obstacle, (ax, ay), replace) else {
                continue;
            };

            if matches!(contract, Replaceability::Tile | Replaceability::Any) {
                for &((dx, dy), tile) in &obstacle.tiles {
                    tiles.set((ax + dx) as usize, (ay + dy) as usize, tile);
                }
            }
            if matches!(contract, Replaceability::Entity | Replaceability::Any) {
                entities.extend(obstacle.entities.iter().map(|e| e.offset(ax, ay)));
            }
            for &(dx, dy) in &obstacle.shape {
                replace.set((ax + dx) as usize, (ay + dy) as usize, Replaceability::None);
            }

            remaining -= area as f32;
            report.placed += 1;
            report.area += area;
        }
    }

    report
}

/// Contract left after intersecting the obstacle's own contract with every
/// covered cell, or `None` if some cell refuses it.
fn reserve(obstacle: &Obstacle, anchor: (i32, i32), replace: &Tilemap<Replaceability>) -> Option<Replaceability> {
    let mut contract = obstacle.contract;
    for &(dx, dy) in &obstacle.shape {
        let cell = replace.get_checked(anchor.0 + dx, anchor.1 + dy)?;
        contract = contract.meet(*cell);
        if contract == Replaceability::None {
            return None;
        }
    }
    Some(contract)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use rand::SeedableRng;

    #[test]
    fn test_meet_lattice() {
        use Replaceability::*;
        assert_eq!(Any.meet(Tile), Tile);
        assert_eq!(Entity.meet(Any), Entity);
        assert_eq!(Tile.meet(Entity), None);
        assert_eq!(Tile.meet(Tile), Tile);
        assert_eq!(None.meet(Any), None);
    }

    #[test]
    fn test_obstacles_never_overlap_and_respect_quota() {
        let catalog = builtin::temperate().unwrap();
        let obstacles: Vec<Obstacle> = ["rock_a", "rock_b", "rock_c", "rock_d"]
            .iter()
            .map(|n| Obstacle::from_template(&catalog, catalog.template_by_name(n).unwrap().id, 1.0))
            .collect();

        let clear = TileDescriptor::new(catalog.template_by_name("clear").unwrap().id, 0);
        let mut tiles = Tilemap::new_with(20, 20, clear);
        let mut replace = Tilemap::new_with(20, 20, Replaceability::Any);
        let mut entities = Vec::new();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let report = place_obstacles(&mut rng, &obstacles, &mut replace, &mut tiles, &mut entities);

        assert!(report.placed > 0);
        // Claimed cells are exactly the painted ones, so painting never overlapped.
        let painted = tiles.as_slice().iter().filter(|&&t| t != clear).count();
        let claimed = replace.as_slice().iter().filter(|&&r| r == Replaceability::None).count();
        assert_eq!(painted, claimed);
        assert_eq!(claimed, report.area);
        // The 3x2 group gets a quarter of the area and may overshoot by less
        // than one obstacle.
        let big = catalog.template_by_name("rock_d").unwrap().id;
        let big_cells = tiles.as_slice().iter().filter(|t| t.template == big).count();
        assert!(big_cells < 100 + 6, "{big_cells}");
        assert!(entities.is_empty());
    }

    #[test]
    fn test_entity_obstacles_skip_tile_only_cells() {
        let obstacle = Obstacle::from_entity(EntityPlan::new("t01", (5, 5), (1, 1)), 1.0);
        assert_eq!(obstacle.shape, vec![(0, 0)]);

        let clear = TileDescriptor::new(TemplateId(0), 0);
        let mut tiles = Tilemap::new_with(4, 4, clear);
        let mut replace = Tilemap::from_fn(4, 4, |x, _| if x < 2 { Replaceability::Tile } else { Replaceability::Entity });
        let mut entities = Vec::new();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        place_obstacles(&mut rng, &[obstacle], &mut replace, &mut tiles, &mut entities);

        assert!(!entities.is_empty());
        assert!(entities.iter().all(|e| e.location.0 >= 2));
        assert_eq!(entities[0].kind, "t01");
    }
}

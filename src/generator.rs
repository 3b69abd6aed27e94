//! Map generation pipeline
//!
//! Runs every stage in order on one set of parameters:
//!
//! 1. Elevation noise calibrated to the water fraction, shaped into land
//! 2. Coastlines traced around the land and fitted with beach templates
//! 3. Mountains inside the land, outlined with cliff templates
//! 4. Forests packed with tree entities
//! 5. Region analysis; everything off the primary landmass is obstructed
//! 6. Roads around the inset primary region
//! 7. Spawns, mines, expansions and neutral structures
//! 8. Resource density
//! 9. Decoration (pick-any variants)
//!
//! Each stage draws from its own random stream so stages can be changed
//! without disturbing the ones before them.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Playability, TemplateCatalog, TemplateId, TileDescriptor};
use crate::contour::trace_contours;
use crate::diagnostics::{DiagnosticSink, GenerationEvent, Stage};
use crate::entities::{roominess, EntityPlacer};
use crate::error::{CatalogError, GenResult};
use crate::heightmap::{
    calibrate_area_fraction, fractal_noise, masked_quantile, pink_amplitude, rough_amplitude,
    symmetric_fractal_noise, AmplitudeFn,
};
use crate::landmass::{fix_thin_mass, shape_landmass, smooth_mask, symmetrize, LandmassParams};
use crate::obstacles::{place_obstacles, Obstacle, Replaceability};
use crate::params::GenerationParams;
use crate::path::{Path, PathStyle};
use crate::plan::{mark_footprints, EntityCatalog, EntityPlan, SPAWN};
use crate::regions::{analyze_regions, circle_outside_mask};
use crate::resources::{place_resources, resource_eligible, ResourceCell};
use crate::seeds::GenerationSeeds;
use crate::symmetry::Symmetry;
use crate::tilemap::{SummedArea, Tilemap};
use crate::tiling::tile_path;

/// Tree entity types and their relative weights in forests.
const TREES: [(&str, f32); 5] = [("t01", 1.0), ("t02", 1.0), ("t05", 1.0), ("tc01", 0.5), ("tc02", 0.5)];

/// Counts gathered while generating.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub land_cells: usize,
    pub coast_paths: usize,
    pub coast_tiles: usize,
    pub mountain_cells: usize,
    pub cliff_paths: usize,
    pub trees: usize,
    pub regions: usize,
    pub primary_area: usize,
    pub obstacles: usize,
    pub road_paths: usize,
    pub spawns: usize,
    pub mines: usize,
    pub neutral_structures: usize,
    pub resource_target: u64,
    pub resource_placed: u64,
    pub resource_shortfall: bool,
}

/// A finished map.
#[derive(Clone, Debug)]
pub struct GeneratedMap {
    pub width: usize,
    pub height: usize,
    pub seeds: GenerationSeeds,
    pub tiles: Tilemap<TileDescriptor>,
    pub resources: Tilemap<ResourceCell>,
    /// Placement plans, spawns first
    pub entities: Vec<EntityPlan>,
    pub report: GenerationReport,
}

/// Base templates the pipeline paints with.
struct Palette {
    clear: TileDescriptor,
    water: TileDescriptor,
    rocks: Vec<TemplateId>,
}

impl Palette {
    fn from_catalog(catalog: &TemplateCatalog) -> GenResult<Self> {
        let base = |category: &str| {
            catalog
                .templates_in_category(category)
                .into_iter()
                .find(|&id| catalog.template(id).pick_any)
                .map(|id| TileDescriptor::new(id, 0))
                .ok_or_else(|| CatalogError::MissingTemplate(format!("pick-any {category} template")))
        };
        Ok(Self {
            clear: base("Clear")?,
            water: base("Water")?,
            rocks: catalog.templates_in_category("Rock"),
        })
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Generate a map from a master seed.
pub fn generate(
    width: usize,
    height: usize,
    seed: u64,
    params: &GenerationParams,
    catalog: &TemplateCatalog,
    entity_catalog: &EntityCatalog,
    sink: &mut dyn DiagnosticSink,
) -> GenResult<GeneratedMap> {
    generate_with_seeds(
        width,
        height,
        GenerationSeeds::from_master(seed),
        params,
        catalog,
        entity_catalog,
        sink,
    )
}

/// Generate a map with explicit per-stage seeds.
pub fn generate_with_seeds(
    width: usize,
    height: usize,
    seeds: GenerationSeeds,
    params: &GenerationParams,
    catalog: &TemplateCatalog,
    entity_catalog: &EntityCatalog,
    sink: &mut dyn DiagnosticSink,
) -> GenResult<GeneratedMap> {
    params.validate(width, height)?;
    let palette = Palette::from_catalog(catalog)?;

    let mut pipeline = Pipeline {
        width,
        height,
        params,
        catalog,
        entity_catalog,
        symmetry: params.symmetry(width, height),
        palette,
        sink,
        report: GenerationReport::default(),
    };

    let outside = params.terrain.circular_map.then(|| circle_outside_mask(width, height));
    let land = pipeline.landmass(&seeds, outside.as_ref());
    let mut tiles = land.map(|&l| if l { pipeline.palette.clear } else { pipeline.palette.water });

    pipeline.coastline(&seeds, &land, &mut tiles)?;
    let mountains = pipeline.mountains(&seeds, &land, &tiles);
    pipeline.cliffs(&seeds, &mountains, &mut tiles)?;
    let mut entities = pipeline.forests(&seeds, &land, &mut tiles);

    pipeline.begin(Stage::Regions);
    let mut occupied = Tilemap::new_with(width, height, false);
    mark_footprints(&entities, &mut occupied);
    let regions = analyze_regions(&tiles, catalog, Some(&occupied), outside.as_ref())?;
    let primary = regions.primary()?;
    let primary_mask = Tilemap::from_fn(width, height, |x, y| {
        *regions.ids.get(x, y) == primary && *regions.playability.get(x, y) == Playability::Playable
    });
    pipeline.report.regions = regions.regions.len();
    pipeline.report.primary_area = primary_mask.count_true();
    let detail = format!(
        "{} regions, primary has {} playable cells",
        pipeline.report.regions, pipeline.report.primary_area
    );
    pipeline.finish(Stage::Regions, detail);

    pipeline.obstruct(&seeds, &regions.playability, &primary_mask, &mut tiles, &mut entities);
    pipeline.roads(&seeds, &primary_mask, &mut tiles, &mut entities)?;

    let mut placed = pipeline.place_entities(&seeds, &primary_mask, &tiles, &entities)?;
    placed.extend(entities);
    let entities = placed;

    let resources = pipeline.resources(&seeds, &tiles, &entities);
    pipeline.decorate(&seeds, &mut tiles);

    Ok(GeneratedMap {
        width,
        height,
        seeds,
        tiles,
        resources,
        entities,
        report: pipeline.report,
    })
}

// =============================================================================
// PIPELINE
// =============================================================================

struct Pipeline<'a> {
    width: usize,
    height: usize,
    params: &'a GenerationParams,
    catalog: &'a TemplateCatalog,
    entity_catalog: &'a EntityCatalog,
    symmetry: Symmetry,
    palette: Palette,
    sink: &'a mut dyn DiagnosticSink,
    report: GenerationReport,
}

impl<'a> Pipeline<'a> {
    fn begin(&mut self, stage: Stage) {
        self.sink.event(&GenerationEvent::StageStarted(stage));
    }

    fn finish(&mut self, stage: Stage, detail: String) {
        self.sink.event(&GenerationEvent::StageFinished { stage, detail });
    }

    /// Noise through the symmetric path when symmetry is enforced.
    fn noise(&self, rng: &mut ChaCha8Rng, feature_size: f32, amplitude: &AmplitudeFn) -> Tilemap<f32> {
        if self.params.symmetry.enforce_symmetry {
            symmetric_fractal_noise(rng, self.width, self.height, feature_size, &self.symmetry, amplitude)
        } else {
            fractal_noise(rng, self.width, self.height, feature_size, amplitude)
        }
    }

    fn enforce_symmetry(&self, mask: Tilemap<bool>) -> Tilemap<bool> {
        if self.params.symmetry.enforce_symmetry {
            symmetrize(&mask, &self.symmetry, true)
        } else {
            mask
        }
    }

    fn landmass(&mut self, seeds: &GenerationSeeds, outside: Option<&Tilemap<bool>>) -> Tilemap<bool> {
        let terrain = &self.params.terrain;
        let (w, h) = (self.width, self.height);

        self.begin(Stage::Elevation);
        let mut rng = GenerationSeeds::rng(seeds.elevation);
        let mut elevation = self.noise(&mut rng, terrain.terrain_feature_size, &rough_amplitude(terrain.roughness));
        calibrate_area_fraction(&mut elevation, 1.0 - terrain.water);
        self.finish(Stage::Elevation, format!("{w}x{h} elevation calibrated to {:.0}% water", terrain.water * 100.0));

        self.begin(Stage::Landmass);
        let mut land = if terrain.water <= 0.0 {
            Tilemap::new_with(w, h, true)
        } else if terrain.water >= 1.0 {
            Tilemap::new_with(w, h, false)
        } else {
            let shaping = LandmassParams {
                smoothing_radius: terrain.terrain_smoothing,
                smoothing_threshold: terrain.smoothing_threshold,
                min_thickness: terrain.min_land_thickness,
                bias: true,
            };
            self.enforce_symmetry(shape_landmass(&elevation, &shaping))
        };
        if let Some(outside) = outside {
            for (x, y, cell) in land.iter_mut() {
                *cell &= !*outside.get(x, y);
            }
            fix_thin_mass(&mut land, terrain.min_land_thickness, true);
        }
        self.report.land_cells = land.count_true();
        let detail = format!("{} land cells", self.report.land_cells);
        self.finish(Stage::Landmass, detail);
        land
    }

    /// Fit every contour of `mask` with templates of `style`.
    fn tile_contours(
        &mut self,
        rng: &mut ChaCha8Rng,
        mask: &Tilemap<bool>,
        style: &PathStyle,
        tiles: &mut Tilemap<TileDescriptor>,
        prepare: impl Fn(&mut Path) -> bool,
    ) -> GenResult<usize> {
        let mut count = 0;
        for contour in trace_contours(mask) {
            let Some(mut path) = Path::from_contour(&contour, style) else {
                continue;
            };
            if !prepare(&mut path) {
                continue;
            }
            let tiled = tile_path(&path, self.catalog, tiles, rng)?;
            self.sink.event(&GenerationEvent::PathTiled {
                kind: path.label.clone(),
                points: path.points.len(),
                cost: tiled.cost,
            });
            count += 1;
        }
        Ok(count)
    }

    fn coastline(
        &mut self,
        seeds: &GenerationSeeds,
        land: &Tilemap<bool>,
        tiles: &mut Tilemap<TileDescriptor>,
    ) -> GenResult<()> {
        self.begin(Stage::Coastline);
        let terrain = &self.params.terrain;
        let mut rng = GenerationSeeds::rng(seeds.coastline);
        if land.count_true() > 0 && land.count_true() < land.len() {
            let style = PathStyle::from_catalog(self.catalog, "coast", "Beach", "Beach", "Beach", "Beach", terrain.coast_thickness)?;
            let (w, h, extension) = (self.width, self.height, terrain.path_extension);
            self.report.coast_paths = self.tile_contours(&mut rng, land, &style, tiles, |path| {
                path.extend_beyond_edges(w, h, extension);
                true
            })?;
        }
        let beach = self.catalog.templates_in_category("Beach");
        self.report.coast_tiles = tiles.as_slice().iter().filter(|t| beach.contains(&t.template)).count();
        let detail = format!("{} coast paths, {} beach tiles", self.report.coast_paths, self.report.coast_tiles);
        self.finish(Stage::Coastline, detail);
        Ok(())
    }

    /// Mountain mask inside the land, kept clear of the coast.
    fn mountains(&mut self, seeds: &GenerationSeeds, land: &Tilemap<bool>, tiles: &Tilemap<TileDescriptor>) -> Tilemap<bool> {
        self.begin(Stage::Mountains);
        let terrain = &self.params.terrain;
        let mut rng = GenerationSeeds::rng(seeds.mountains);
        let (w, h) = (self.width, self.height);

        let inland = {
            let near_water = within_reach(&land.inverted(), terrain.coast_thickness);
            Tilemap::from_fn(w, h, |x, y| {
                *land.get(x, y) && !*near_water.get(x, y) && *tiles.get(x, y) == self.palette.clear
            })
        };

        let mountains = if terrain.mountains <= 0.0 || inland.count_true() == 0 {
            Tilemap::new_with(w, h, false)
        } else {
            let mut field = self.noise(&mut rng, terrain.mountain_feature_size, &rough_amplitude(terrain.roughness));
            let shift = masked_quantile(&field, land, 1.0 - terrain.mountains);
            for v in field.as_mut_slice() {
                *v -= shift;
            }
            let shaping = LandmassParams {
                smoothing_radius: terrain.terrain_smoothing,
                smoothing_threshold: terrain.smoothing_threshold,
                min_thickness: terrain.min_mountain_thickness,
                bias: false,
            };
            for (v, &ok) in field.as_mut_slice().iter_mut().zip(inland.as_slice()) {
                if !ok {
                    *v = f32::NEG_INFINITY;
                }
            }
            let shaped = self.enforce_symmetry(shape_landmass(&field, &shaping));
            let mut clipped = shaped.zip(&inland, |&m, &i| m && i);
            fix_thin_mass(&mut clipped, terrain.min_mountain_thickness, true);
            clipped
        };

        self.report.mountain_cells = mountains.count_true();
        let detail = format!("{} mountain cells", self.report.mountain_cells);
        self.finish(Stage::Mountains, detail);
        mountains
    }

    fn cliffs(&mut self, seeds: &GenerationSeeds, mountains: &Tilemap<bool>, tiles: &mut Tilemap<TileDescriptor>) -> GenResult<()> {
        self.begin(Stage::Cliffs);
        let terrain = &self.params.terrain;
        let mut rng = GenerationSeeds::rng(seeds.cliffs);
        if mountains.count_true() > 0 {
            let style = PathStyle::from_catalog(self.catalog, "cliff", "Cliffs", "Clear", "Cliff", "Clear", terrain.cliff_thickness)?;
            let (trim, min_length) = (terrain.cliff_trim, terrain.cliff_min_length);
            self.report.cliff_paths = self.tile_contours(&mut rng, mountains, &style, tiles, |path| {
                path.trim_ends(trim) && path.len_steps() >= min_length
            })?;
        }
        let detail = format!("{} cliff paths", self.report.cliff_paths);
        self.finish(Stage::Cliffs, detail);
        Ok(())
    }

    fn tree_obstacles(&self) -> Vec<Obstacle> {
        TREES
            .iter()
            .filter(|(kind, _)| self.entity_catalog.size_of(kind).is_some())
            .map(|&(kind, weight)| Obstacle::from_entity(self.entity_catalog.plan(kind, (0, 0)), weight))
            .collect()
    }

    /// Forest mask packed with trees. Returns the tree plans.
    fn forests(&mut self, seeds: &GenerationSeeds, land: &Tilemap<bool>, tiles: &mut Tilemap<TileDescriptor>) -> Vec<EntityPlan> {
        self.begin(Stage::Forests);
        let terrain = &self.params.terrain;
        let mut rng = GenerationSeeds::rng(seeds.forests);
        let mut trees = Vec::new();

        let open = Tilemap::from_fn(self.width, self.height, |x, y| {
            *land.get(x, y) && *tiles.get(x, y) == self.palette.clear
        });
        if terrain.forests > 0.0 && open.count_true() > 0 {
            let mut field = self.noise(&mut rng, terrain.forest_feature_size, &pink_amplitude);
            let shift = masked_quantile(&field, &open, 1.0 - terrain.forests);
            for v in field.as_mut_slice() {
                *v -= shift;
            }
            let forest = smooth_mask(&field.map(|&v| v >= 0.0), 1, terrain.smoothing_threshold, false);
            let mut replace = Tilemap::from_fn(self.width, self.height, |x, y| {
                if *forest.get(x, y) && *open.get(x, y) {
                    Replaceability::Entity
                } else {
                    Replaceability::None
                }
            });
            place_obstacles(&mut rng, &self.tree_obstacles(), &mut replace, tiles, &mut trees);
        }

        self.report.trees = trees.len();
        let detail = format!("{} trees", self.report.trees);
        self.finish(Stage::Forests, detail);
        trees
    }

    /// Fill playable ground outside the primary region with rocks and trees.
    fn obstruct(
        &mut self,
        seeds: &GenerationSeeds,
        playability: &Tilemap<Playability>,
        primary: &Tilemap<bool>,
        tiles: &mut Tilemap<TileDescriptor>,
        entities: &mut Vec<EntityPlan>,
    ) {
        self.begin(Stage::Obstruction);
        let mut rng = GenerationSeeds::rng(seeds.obstruction);
        let mut replace = Tilemap::from_fn(self.width, self.height, |x, y| {
            if *playability.get(x, y) == Playability::Playable && !*primary.get(x, y) {
                Replaceability::Any
            } else {
                Replaceability::None
            }
        });
        let mut obstacles: Vec<Obstacle> = self
            .palette
            .rocks
            .iter()
            .map(|&id| Obstacle::from_template(self.catalog, id, 1.0))
            .collect();
        obstacles.extend(self.tree_obstacles());
        let report = place_obstacles(&mut rng, &obstacles, &mut replace, tiles, entities);
        self.report.obstacles = report.placed;
        self.finish(Stage::Obstruction, format!("{} obstacles over {} cells", report.placed, report.area));
    }

    /// Roads around the primary region, inset by the road spacing. Trees
    /// under a road are removed.
    fn roads(
        &mut self,
        seeds: &GenerationSeeds,
        primary: &Tilemap<bool>,
        tiles: &mut Tilemap<TileDescriptor>,
        entities: &mut Vec<EntityPlan>,
    ) -> GenResult<()> {
        self.begin(Stage::Roads);
        let roads = &self.params.roads;
        let mut rng = GenerationSeeds::rng(seeds.roads);
        if roads.roads {
            let room = roominess(primary, roads.road_spacing + 1);
            let inset = room.map(|&r| r > roads.road_spacing);
            if inset.count_true() > 0 {
                let style = PathStyle::from_catalog(self.catalog, "road", "Road", "Road", "Road", "Road", roads.road_thickness)?;
                let min_length = roads.road_min_length;
                self.report.road_paths =
                    self.tile_contours(&mut rng, &inset, &style, tiles, |path| path.len_steps() >= min_length)?;
            }
            let road_templates = self.catalog.templates_in_category("Road");
            entities.retain(|plan| {
                plan.cells().all(|(x, y)| {
                    tiles.get_checked(x, y).map_or(true, |t| !road_templates.contains(&t.template))
                })
            });
        }
        let detail = format!("{} road paths", self.report.road_paths);
        self.finish(Stage::Roads, detail);
        Ok(())
    }

    /// Spawns, mines, expansions and neutral structures on the primary
    /// region's free cells.
    fn place_entities(
        &mut self,
        seeds: &GenerationSeeds,
        primary: &Tilemap<bool>,
        tiles: &Tilemap<TileDescriptor>,
        existing: &[EntityPlan],
    ) -> GenResult<Vec<EntityPlan>> {
        if !self.params.entities.create_entities {
            self.sink.event(&GenerationEvent::Note("entity placement disabled".to_string()));
            return Ok(Vec::new());
        }
        let mut rng = GenerationSeeds::rng(seeds.entities);

        let mut occupied = Tilemap::new_with(self.width, self.height, false);
        mark_footprints(existing, &mut occupied);
        let base = Tilemap::from_fn(self.width, self.height, |x, y| {
            *primary.get(x, y)
                && !*occupied.get(x, y)
                && self.catalog.playability_of(*tiles.get(x, y)) == Playability::Playable
        });
        let symmetry = self.symmetry;
        let mut placer = EntityPlacer::new(base, &symmetry, self.entity_catalog, &self.params.entities);

        self.begin(Stage::Spawns);
        let spawns = placer.place_spawns(&mut rng)?;
        let mines = placer.place_spawn_deposits(&mut rng, &spawns);
        self.report.spawns = spawns.len();
        self.finish(Stage::Spawns, format!("{} spawns with {mines} mines", spawns.len()));

        self.begin(Stage::Expansions);
        let expansion_mines = placer.place_expansions(&mut rng);
        self.report.mines = mines + expansion_mines;
        self.finish(Stage::Expansions, format!("{expansion_mines} expansion mines"));

        self.begin(Stage::NeutralStructures);
        let structures = placer.place_neutral_structures(&mut rng);
        self.report.neutral_structures = structures;
        self.finish(Stage::NeutralStructures, format!("{structures} neutral structures"));

        let mut plans = placer.into_plans();
        // Stable: spawns keep owner order, everything else keeps placement order.
        plans.sort_by_key(|p| if p.kind == SPAWN { (0, p.owner.unwrap_or(0)) } else { (1, 0) });
        Ok(plans)
    }

    fn resources(
        &mut self,
        seeds: &GenerationSeeds,
        tiles: &Tilemap<TileDescriptor>,
        entities: &[EntityPlan],
    ) -> Tilemap<ResourceCell> {
        self.begin(Stage::Resources);
        let params = &self.params.resources;
        let mut rng = GenerationSeeds::rng(seeds.resources);
        let eligible = resource_eligible(tiles, self.catalog, entities, params.resource_spawn_exclusion);
        let target = params.resources_per_player * self.params.entities.players as u64;
        let layout = place_resources(&mut rng, &eligible, entities, &self.symmetry, params, target);

        self.report.resource_target = layout.target;
        self.report.resource_placed = layout.placed;
        self.report.resource_shortfall = layout.shortfall();
        if layout.shortfall() {
            self.sink.event(&GenerationEvent::ResourceShortfall {
                target: layout.target,
                placed: layout.placed,
            });
        }
        self.finish(Stage::Resources, format!("{} of {} resource value placed", layout.placed, layout.target));
        layout.cells
    }

    /// Give every pick-any tile a random variant.
    fn decorate(&mut self, seeds: &GenerationSeeds, tiles: &mut Tilemap<TileDescriptor>) {
        self.begin(Stage::Decoration);
        let mut rng = GenerationSeeds::rng(seeds.decoration);
        let mut varied = 0;
        for tile in tiles.as_mut_slice() {
            let variants = self.catalog.template(tile.template).variant_count();
            if variants > 1 {
                if let Ok(index) = u8::try_from(rng.gen_range(0..variants)) {
                    tile.index = index;
                    varied += 1;
                }
            }
        }
        self.finish(Stage::Decoration, format!("{varied} tiles decorated"));
    }
}

/// Cells within Chebyshev distance `radius` of a true cell.
fn within_reach(mask: &Tilemap<bool>, radius: usize) -> Tilemap<bool> {
    let sat = SummedArea::new(mask);
    let r = radius as i32;
    Tilemap::from_fn(mask.width, mask.height, |x, y| {
        let (x, y) = (x as i32, y as i32);
        sat.count(x - r, y - r, x + r + 1, y + r + 1).0 > 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::diagnostics::{NullSink, RecordingSink};
    use crate::error::GenerationError;
    use crate::landmass::thin_cells;
    use crate::params::TerrainPreset;
    use crate::plan::MINE;
    use crate::resources::total_value;

    fn run(width: usize, height: usize, seed: u64, params: &GenerationParams) -> GenResult<GeneratedMap> {
        let catalog = builtin::temperate().unwrap();
        generate(width, height, seed, params, &catalog, &EntityCatalog::builtin(), &mut NullSink)
    }

    fn open_ground() -> GenerationParams {
        let mut params = GenerationParams::default();
        params.terrain.water = 0.0;
        params.terrain.mountains = 0.0;
        params.terrain.forests = 0.0;
        params
    }

    #[test]
    fn test_generation_is_deterministic() {
        let params = GenerationParams::default();
        let a = run(40, 40, 17, &params).unwrap();
        let b = run(40, 40, 17, &params).unwrap();
        assert_eq!(a.tiles, b.tiles);
        assert_eq!(a.resources, b.resources);
        assert_eq!(a.entities, b.entities);
        assert_eq!(a.report, b.report);
        assert!(a.report.land_cells > 0);
    }

    #[test]
    fn test_validation_runs_before_any_stage() {
        let mut params = GenerationParams::default();
        params.terrain.water = 1.5;
        let catalog = builtin::temperate().unwrap();
        let mut sink = RecordingSink::new();
        let result = generate(32, 32, 1, &params, &catalog, &EntityCatalog::builtin(), &mut sink);
        assert!(matches!(result, Err(GenerationError::InvalidParameter { ref key, .. }) if key == "water"));
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_tiny_all_land_map() {
        let mut params = open_ground();
        params.symmetry.rotations = 1;
        params.entities.players = 1;
        params.resources.resource_spawn_exclusion = 0.0;
        params.resources.resources_per_player = 2 * params.resources.resource_value as u64;

        let map = run(2, 2, 5, &params).unwrap();
        assert_eq!(map.entities.iter().filter(|e| e.kind == SPAWN).count(), 1);
        assert_eq!(map.report.coast_tiles, 0);

        let value = total_value(&map.resources, params.resources.resource_value);
        let unit = params.resources.resource_value as u64 * (params.resources.max_resource_density as u64 + 1);
        assert!(value.abs_diff(params.resources.resources_per_player) <= unit, "{value}");
        assert!(!map.report.resource_shortfall);
    }

    #[test]
    fn test_spawns_follow_symmetry() {
        let mut params = open_ground();
        params.entities.players = 4;
        params.symmetry.rotations = 2;
        let map = run(48, 48, 9, &params).unwrap();

        let spawns: Vec<_> = map.entities.iter().filter(|e| e.kind == SPAWN).collect();
        assert_eq!(spawns.len(), 4);
        for (k, spawn) in spawns.iter().enumerate() {
            assert_eq!(spawn.owner, Some(k));
        }
        for pair in spawns.chunks(2) {
            let (a, b) = (pair[0].location, pair[1].location);
            assert_eq!((a.0 + b.0, a.1 + b.1), (47, 47));
        }
        let mines = map.entities.iter().filter(|e| e.kind == MINE).count();
        assert_eq!(mines % 2, 0);
        assert!(map.report.road_paths > 0);
    }

    #[test]
    fn test_stages_report_in_order() {
        let mut sink = RecordingSink::new();
        let catalog = builtin::temperate().unwrap();
        generate(32, 32, 3, &open_ground(), &catalog, &EntityCatalog::builtin(), &mut sink).unwrap();
        let stages = sink.finished_stages();
        assert_eq!(stages.first(), Some(&Stage::Elevation));
        assert_eq!(stages.last(), Some(&Stage::Decoration));
        assert!(stages.contains(&Stage::Spawns));
    }

    #[test]
    fn test_circular_map_clips_land() {
        let mut params = open_ground();
        params.terrain.circular_map = true;
        let map = run(32, 32, 2, &params).unwrap();
        let water = builtin::temperate().unwrap().template_by_name("water").unwrap().id;
        assert_eq!(map.tiles.get(0, 0).template, water);
        assert!(map.report.land_cells < 32 * 32);
    }

    fn preset_params(preset: TerrainPreset) -> GenerationParams {
        let mut params = GenerationParams::default();
        preset.apply(&mut params.terrain);
        params
    }

    /// Mountain mask exactly as the pipeline hands it to the cliff stage.
    fn mountain_mask(params: &GenerationParams, size: usize, seed: u64) -> Tilemap<bool> {
        let catalog = builtin::temperate().unwrap();
        let entity_catalog = EntityCatalog::builtin();
        let mut sink = NullSink;
        let seeds = GenerationSeeds::from_master(seed);
        let mut pipeline = Pipeline {
            width: size,
            height: size,
            params,
            catalog: &catalog,
            entity_catalog: &entity_catalog,
            symmetry: params.symmetry(size, size),
            palette: Palette::from_catalog(&catalog).unwrap(),
            sink: &mut sink,
            report: GenerationReport::default(),
        };
        let land = pipeline.landmass(&seeds, None);
        let mut tiles = land.map(|&l| if l { pipeline.palette.clear } else { pipeline.palette.water });
        pipeline.coastline(&seeds, &land, &mut tiles).unwrap();
        pipeline.mountains(&seeds, &land, &tiles)
    }

    #[test]
    fn test_mountains_keep_their_thickness_after_clipping() {
        let params = preset_params(TerrainPreset::Mountains);
        let thickness = params.terrain.min_mountain_thickness;
        let mut mountain_cells = 0;
        for seed in 0..8 {
            let mask = mountain_mask(&params, 64, seed);
            mountain_cells += mask.count_true();
            assert_eq!(thin_cells(&mask, thickness, true).count_true(), 0, "seed {seed}");
        }
        assert!(mountain_cells > 0);
    }

    #[test]
    fn test_every_preset_generates() {
        for &preset in TerrainPreset::all() {
            let params = preset_params(preset);
            let thickness = params.terrain.min_mountain_thickness;
            for seed in 0..4 {
                let map = run(64, 64, seed, &params).unwrap_or_else(|e| panic!("{preset} seed {seed}: {e}"));

                let spawns: Vec<_> = map.entities.iter().filter(|e| e.kind == SPAWN).collect();
                assert_eq!(spawns.len(), params.entities.players, "{preset} seed {seed}");
                for pair in spawns.chunks(2) {
                    let (a, b) = (pair[0].center(), pair[1].center());
                    assert_eq!((a.0 + b.0, a.1 + b.1), (64.0, 64.0), "{preset} seed {seed}");
                }

                let mask = mountain_mask(&params, 64, seed);
                assert_eq!(thin_cells(&mask, thickness, true).count_true(), 0, "{preset} seed {seed}");
            }
        }
    }

    #[test]
    fn test_within_reach() {
        let mask = Tilemap::from_fn(7, 1, |x, _| x == 3);
        let near = within_reach(&mask, 2);
        assert_eq!(near.as_slice(), &[false, true, true, true, true, true, false]);
    }
}

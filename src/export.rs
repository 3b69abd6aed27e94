use std::fs::File;
use std::io::BufWriter;

use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::catalog::{TemplateCatalog, TileDescriptor};
use crate::error::ExportError;
use crate::generator::{GeneratedMap, GenerationReport};
use crate::plan::{EntityPlan, GEM_MINE, MINE, SPAWN};
use crate::resources::ResourceCell;

/// Serialized form of a generated map. Grids are stored row-major.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapDocument {
    pub width: usize,
    pub height: usize,
    pub seed: u64,
    pub tiles: Vec<TileDescriptor>,
    pub resources: Vec<ResourceCell>,
    pub entities: Vec<EntityPlan>,
    pub report: GenerationReport,
}

impl MapDocument {
    pub fn from_map(map: &GeneratedMap) -> Self {
        Self {
            width: map.width,
            height: map.height,
            seed: map.seeds.master,
            tiles: map.tiles.as_slice().to_vec(),
            resources: map.resources.as_slice().to_vec(),
            entities: map.entities.clone(),
            report: map.report.clone(),
        }
    }
}

/// Write the map as pretty-printed JSON.
pub fn write_json(map: &GeneratedMap, path: &str) -> Result<(), ExportError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &MapDocument::from_map(map))?;
    Ok(())
}

/// Overlay colour of an entity type.
fn entity_color(kind: &str) -> [u8; 3] {
    match kind {
        SPAWN => [230, 30, 30],
        MINE => [240, 200, 40],
        GEM_MINE => [80, 220, 240],
        k if k.starts_with('t') => [20, 70, 20],
        _ => [240, 240, 240],
    }
}

/// One pixel per cell coloured by terrain type, with ore tinted and
/// entity footprints drawn on top.
pub fn render_preview(map: &GeneratedMap, catalog: &TemplateCatalog) -> RgbImage {
    let mut img: RgbImage = ImageBuffer::new(map.width as u32, map.height as u32);

    for (x, y, &tile) in map.tiles.iter() {
        let mut color = catalog
            .terrain_of(tile)
            .map(|t| catalog.terrain_type(t).color)
            .unwrap_or([0, 0, 0]);
        let ore = map.resources.get(x, y);
        if !ore.is_empty() {
            // Denser ore blends further towards gold.
            let t = (ore.density as f32 / 12.0).clamp(0.3, 1.0);
            let gold = [200.0, 160.0, 40.0];
            for (c, g) in color.iter_mut().zip(gold) {
                *c = (*c as f32 * (1.0 - t) + g * t) as u8;
            }
        }
        img.put_pixel(x as u32, y as u32, Rgb(color));
    }

    for plan in &map.entities {
        let color = entity_color(&plan.kind);
        for (x, y) in plan.cells() {
            if x >= 0 && y >= 0 && (x as usize) < map.width && (y as usize) < map.height {
                img.put_pixel(x as u32, y as u32, Rgb(color));
            }
        }
    }

    img
}

/// Save the preview as a PNG (format chosen from the extension).
pub fn export_preview(map: &GeneratedMap, catalog: &TemplateCatalog, path: &str) -> Result<(), ExportError> {
    render_preview(map, catalog).save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;
    use crate::diagnostics::NullSink;
    use crate::generator::generate;
    use crate::params::GenerationParams;
    use crate::plan::EntityCatalog;

    fn small_map(catalog: &TemplateCatalog) -> GeneratedMap {
        let mut params = GenerationParams::default();
        params.terrain.water = 0.0;
        params.terrain.mountains = 0.0;
        params.terrain.forests = 0.0;
        params.symmetry.rotations = 1;
        params.entities.players = 1;
        generate(16, 16, 3, &params, catalog, &EntityCatalog::builtin(), &mut NullSink).unwrap()
    }

    #[test]
    fn test_document_is_row_major() {
        let catalog = builtin::temperate().unwrap();
        let map = small_map(&catalog);
        let doc = MapDocument::from_map(&map);
        assert_eq!(doc.tiles.len(), 256);
        assert_eq!(doc.tiles[16 * 2 + 5], *map.tiles.get(5, 2));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"mpspawn\""));
    }

    #[test]
    fn test_preview_marks_spawn() {
        let catalog = builtin::temperate().unwrap();
        let map = small_map(&catalog);
        let img = render_preview(&map, &catalog);
        assert_eq!(img.dimensions(), (16, 16));
        let spawn = map.entities.iter().find(|e| e.kind == SPAWN).unwrap();
        let (x, y) = spawn.location;
        assert_eq!(img.get_pixel(x as u32, y as u32).0, entity_color(SPAWN));
    }

    #[test]
    fn test_write_json_to_disk() {
        let catalog = builtin::temperate().unwrap();
        let map = small_map(&catalog);
        let path = std::env::temp_dir().join("grid_mapgen_export_test.json");
        let path = path.to_string_lossy().to_string();
        write_json(&map, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let doc: MapDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(doc.seed, 3);
        assert_eq!(doc.entities, map.entities);
        let _ = std::fs::remove_file(&path);
    }
}

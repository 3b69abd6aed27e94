//! Built-in temperate tileset.
//!
//! A compact synthetic catalog covering everything the generator needs:
//! pick-any base tiles, beach/cliff/road path templates for every
//! cardinal straight and corner connector pair, and rock obstacles.

use crate::catalog::{
    CatalogSpec, Playability, SegmentSpec, TemplateCatalog, TemplateSpec, TerrainTypeSpec,
};
use crate::direction::Direction;
use crate::error::CatalogError;

pub const CLEAR: &str = "Clear";
pub const WATER: &str = "Water";
pub const BEACH: &str = "Beach";
pub const ROCK: &str = "Rock";
pub const ROAD: &str = "Road";
pub const ROUGH: &str = "Rough";

/// Build the temperate catalog.
pub fn temperate() -> Result<TemplateCatalog, CatalogError> {
    TemplateCatalog::from_spec(&temperate_spec())
}

/// Raw description of the temperate catalog.
pub fn temperate_spec() -> CatalogSpec {
    let terrain_types = vec![
        terrain(CLEAR, Playability::Playable, true, [86, 140, 58]),
        terrain(WATER, Playability::Unplayable, false, [40, 68, 128]),
        terrain(BEACH, Playability::Partial, false, [196, 176, 120]),
        terrain(ROCK, Playability::Unplayable, false, [110, 104, 96]),
        terrain(ROAD, Playability::Playable, false, [150, 120, 80]),
        terrain(ROUGH, Playability::Partial, false, [120, 128, 70]),
    ];

    let mut templates = vec![
        pick_any("clear", CLEAR, 4, &["Clear"]),
        pick_any("water", WATER, 2, &["Water"]),
        pick_any("rough", ROUGH, 2, &["Rough"]),
        block("rock_a", 1, 1, &[true], &["Rock"]),
        block("rock_b", 2, 1, &[true, true], &["Rock"]),
        block("rock_c", 2, 2, &[true, true, true, false], &["Rock"]),
        block("rock_d", 3, 2, &[true; 6], &["Rock"]),
    ];

    templates.extend(path_family("beach", "Beach", BEACH, "Beach"));
    templates.extend(path_family("cliff", "Cliff", ROCK, "Cliffs"));
    templates.extend(path_family("road", "Road", ROAD, "Road"));

    // Cliff end caps joining open ground, straight and turning.
    for d_in in Direction::CARDINAL {
        for d_out in Direction::CARDINAL {
            if d_out == d_in.reverse() {
                continue;
            }
            let moves: Vec<Direction> = if d_in == d_out { vec![d_in] } else { vec![d_in, d_out] };
            templates.push(path_template(
                &format!("cliff_cap_in_{d_in}_{d_out}"),
                &moves,
                &format!("Clear.{d_in}"),
                "Cliff",
                &format!("Cliff.{d_out}"),
                ROCK,
                "Cliffs",
            ));
            templates.push(path_template(
                &format!("cliff_cap_out_{d_in}_{d_out}"),
                &moves,
                &format!("Cliff.{d_in}"),
                "Cliff",
                &format!("Clear.{d_out}"),
                ROCK,
                "Cliffs",
            ));
        }
    }

    CatalogSpec {
        terrain_types,
        templates,
    }
}

fn terrain(name: &str, playability: Playability, resource_eligible: bool, color: [u8; 3]) -> TerrainTypeSpec {
    TerrainTypeSpec {
        name: name.to_string(),
        playability,
        resource_eligible,
        color,
    }
}

fn pick_any(name: &str, terrain: &str, variants: usize, categories: &[&str]) -> TemplateSpec {
    TemplateSpec {
        name: name.to_string(),
        size: (1, 1),
        tiles: vec![Some(terrain.to_string()); variants],
        categories: categories.iter().map(|c| c.to_string()).collect(),
        pick_any: true,
        segments: Vec::new(),
    }
}

fn block(name: &str, width: usize, height: usize, filled: &[bool], categories: &[&str]) -> TemplateSpec {
    TemplateSpec {
        name: name.to_string(),
        size: (width, height),
        tiles: filled
            .iter()
            .map(|&f| if f { Some(ROCK.to_string()) } else { None })
            .collect(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        pick_any: false,
        segments: Vec::new(),
    }
}

/// Straight, long-straight and corner templates for one connector kind.
fn path_family(prefix: &str, kind: &str, terrain: &str, category: &str) -> Vec<TemplateSpec> {
    let mut templates = Vec::new();
    for d_in in Direction::CARDINAL {
        for d_out in Direction::CARDINAL {
            if d_out == d_in.reverse() {
                continue;
            }
            let moves: Vec<Direction> = if d_in == d_out { vec![d_in] } else { vec![d_in, d_out] };
            templates.push(path_template(
                &format!("{prefix}_{d_in}_{d_out}"),
                &moves,
                &format!("{kind}.{d_in}"),
                kind,
                &format!("{kind}.{d_out}"),
                terrain,
                category,
            ));
        }
        templates.push(path_template(
            &format!("{prefix}_long_{d_in}"),
            &[d_in, d_in],
            &format!("{kind}.{d_in}"),
            kind,
            &format!("{kind}.{d_in}"),
            terrain,
            category,
        ));
    }
    templates
}

/// Cell on the left-hand side of a cardinal edge leaving corner `p`.
fn left_cell(p: (i32, i32), d: Direction) -> (i32, i32) {
    match d {
        Direction::R => (p.0, p.1 - 1),
        Direction::L => (p.0 - 1, p.1),
        Direction::D => (p.0, p.1),
        _ => (p.0 - 1, p.1 - 1),
    }
}

/// A template whose footprint covers the left-hand cells of its path.
fn path_template(
    name: &str,
    moves: &[Direction],
    start: &str,
    inner: &str,
    end: &str,
    terrain: &str,
    category: &str,
) -> TemplateSpec {
    let mut points = vec![(0, 0)];
    let mut cells = Vec::new();
    for &d in moves {
        let p = points[points.len() - 1];
        let cell = left_cell(p, d);
        if !cells.contains(&cell) {
            cells.push(cell);
        }
        let (dx, dy) = d.offset();
        points.push((p.0 + dx, p.1 + dy));
    }

    let min_x = cells.iter().map(|c| c.0).min().unwrap_or(0);
    let min_y = cells.iter().map(|c| c.1).min().unwrap_or(0);
    let max_x = cells.iter().map(|c| c.0).max().unwrap_or(0);
    let max_y = cells.iter().map(|c| c.1).max().unwrap_or(0);
    let width = (max_x - min_x + 1) as usize;
    let height = (max_y - min_y + 1) as usize;

    let mut tiles = vec![None; width * height];
    for &(cx, cy) in &cells {
        tiles[(cy - min_y) as usize * width + (cx - min_x) as usize] = Some(terrain.to_string());
    }

    TemplateSpec {
        name: name.to_string(),
        size: (width, height),
        tiles,
        categories: vec![category.to_string()],
        pick_any: false,
        segments: vec![SegmentSpec {
            start: start.to_string(),
            inner: inner.to_string(),
            end: end.to_string(),
            points: points.iter().map(|&(x, y)| (x - min_x, y - min_y)).collect(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperate_catalog_validates() {
        let catalog = temperate().unwrap();
        assert!(catalog.template_by_name("clear").unwrap().pick_any);
        assert_eq!(catalog.templates_in_category("Beach").len(), 16);
        assert_eq!(catalog.templates_in_category("Cliffs").len(), 40);
        assert!(catalog.connector_kind("Clear").is_some());
    }

    #[test]
    fn test_straight_template_footprint_is_left_of_path() {
        let catalog = temperate().unwrap();
        let t = catalog.template_by_name("beach_R_R").unwrap();
        assert_eq!((t.width, t.height), (1, 1));
        // The path runs along the bottom edge of the single cell.
        assert_eq!(t.segments[0].points, vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn test_corner_template_covers_both_edges() {
        let catalog = temperate().unwrap();
        let t = catalog.template_by_name("beach_R_D").unwrap();
        assert_eq!(t.footprint().len(), 2);
        assert_eq!(t.segments[0].displacement(), (1, 1));
    }
}

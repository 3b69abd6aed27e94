//! Terrain template catalog
//!
//! The tileset exposes its templates as loosely structured records. They
//! are validated once, at load time, into a [`TemplateCatalog`] addressed
//! by small integer ids; generation code never looks templates up by
//! string afterwards.

pub mod builtin;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::error::CatalogError;

// =============================================================================
// IDS AND CLASSIFICATIONS
// =============================================================================

/// Index of a template in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub u16);

/// Index of a terrain type in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerrainTypeId(pub u8);

/// Interned connector kind name (e.g. "Beach", "Cliff", "Clear").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectorKind(pub u16);

/// Whether land units can occupy a terrain type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Playability {
    /// Buildable, fully connects regions
    Playable,
    /// Crossable but not buildable; joins a region without extending it
    Partial,
    /// Blocks movement
    Unplayable,
}

/// One concrete tile: a template plus an index within it.
///
/// For pick-any templates the index selects a visual variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileDescriptor {
    pub template: TemplateId,
    pub index: u8,
}

impl TileDescriptor {
    pub fn new(template: TemplateId, index: u8) -> Self {
        Self { template, index }
    }
}

/// Terrain type metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainType {
    pub name: String,
    pub playability: Playability,
    /// Resources may be seeded on this terrain
    pub resource_eligible: bool,
    /// Preview colour
    pub color: [u8; 3],
}

/// A typed path connector: a kind plus the direction of travel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connector {
    pub kind: ConnectorKind,
    pub direction: Direction,
}

/// A chainable sub-path of a template.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub start: Connector,
    pub inner: ConnectorKind,
    pub end: Connector,
    /// Corner-lattice points relative to the template origin; consecutive
    /// points are one step apart.
    pub points: Vec<(i32, i32)>,
}

impl Segment {
    /// Net displacement from first to last point.
    pub fn displacement(&self) -> (i32, i32) {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        (last.0 - first.0, last.1 - first.1)
    }
}

/// A validated terrain template.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub width: usize,
    pub height: usize,
    /// Row-major terrain of each footprint cell (`None` = hole). For
    /// pick-any templates one entry per variant instead.
    pub tiles: Vec<Option<TerrainTypeId>>,
    pub categories: Vec<String>,
    pub pick_any: bool,
    pub segments: Vec<Segment>,
}

impl Template {
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    /// Number of interchangeable variants of a pick-any template.
    pub fn variant_count(&self) -> usize {
        if self.pick_any {
            self.tiles.len()
        } else {
            1
        }
    }

    /// Occupied cells relative to the template origin with their tile index.
    pub fn footprint(&self) -> Vec<((i32, i32), u8)> {
        if self.pick_any {
            return vec![((0, 0), 0)];
        }
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .filter_map(|(i, _)| Some((((i % self.width) as i32, (i / self.width) as i32), u8::try_from(i).ok()?)))
            .collect()
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Validated, id-indexed template catalog.
#[derive(Clone, Debug)]
pub struct TemplateCatalog {
    terrain_types: Vec<TerrainType>,
    templates: Vec<Template>,
    template_names: HashMap<String, TemplateId>,
    connector_kinds: Vec<String>,
}

impl TemplateCatalog {
    /// Validate a raw catalog description.
    pub fn from_spec(spec: &CatalogSpec) -> Result<Self, CatalogError> {
        let mut terrain_types = Vec::with_capacity(spec.terrain_types.len());
        let mut terrain_names = HashMap::new();
        for (i, t) in spec.terrain_types.iter().enumerate() {
            let id = u8::try_from(i).map_err(|_| CatalogError::TooLarge {
                what: "terrain types".to_string(),
                limit: u8::MAX as usize + 1,
            })?;
            terrain_names.insert(t.name.clone(), TerrainTypeId(id));
            terrain_types.push(TerrainType {
                name: t.name.clone(),
                playability: t.playability,
                resource_eligible: t.resource_eligible,
                color: t.color,
            });
        }

        let mut catalog = Self {
            terrain_types,
            templates: Vec::with_capacity(spec.templates.len()),
            template_names: HashMap::new(),
            connector_kinds: Vec::new(),
        };

        for raw in &spec.templates {
            if catalog.template_names.contains_key(&raw.name) {
                return Err(CatalogError::DuplicateTemplate(raw.name.clone()));
            }
            let (width, height) = raw.size;
            if width == 0 || height == 0 || raw.tiles.iter().all(|t| t.is_none()) {
                return Err(CatalogError::EmptyFootprint(raw.name.clone()));
            }
            if raw.tiles.len() > u8::MAX as usize + 1 {
                return Err(CatalogError::TooLarge {
                    what: format!("tiles of template '{}'", raw.name),
                    limit: u8::MAX as usize + 1,
                });
            }
            if !raw.pick_any && raw.tiles.len() != width * height {
                return Err(CatalogError::FootprintMismatch {
                    template: raw.name.clone(),
                    expected: width * height,
                    actual: raw.tiles.len(),
                });
            }

            let mut tiles = Vec::with_capacity(raw.tiles.len());
            for tile in &raw.tiles {
                match tile {
                    None => tiles.push(None),
                    Some(name) => match terrain_names.get(name) {
                        Some(&id) => tiles.push(Some(id)),
                        None => {
                            return Err(CatalogError::UnknownTerrainType {
                                template: raw.name.clone(),
                                terrain: name.clone(),
                            })
                        }
                    },
                }
            }

            let mut segments = Vec::with_capacity(raw.segments.len());
            for (index, seg) in raw.segments.iter().enumerate() {
                segments.push(catalog.validate_segment(&raw.name, index, seg)?);
            }

            let id = u16::try_from(catalog.templates.len()).map(TemplateId).map_err(|_| CatalogError::TooLarge {
                what: "templates".to_string(),
                limit: u16::MAX as usize + 1,
            })?;
            catalog.template_names.insert(raw.name.clone(), id);
            catalog.templates.push(Template {
                id,
                name: raw.name.clone(),
                width: if raw.pick_any { 1 } else { width },
                height: if raw.pick_any { 1 } else { height },
                tiles,
                categories: raw.categories.clone(),
                pick_any: raw.pick_any,
                segments,
            });
        }

        Ok(catalog)
    }

    /// Parse and validate a JSON catalog description.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let spec: CatalogSpec =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_spec(&spec)
    }

    fn validate_segment(
        &mut self,
        template: &str,
        index: usize,
        seg: &SegmentSpec,
    ) -> Result<Segment, CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidSegment {
            template: template.to_string(),
            index,
            reason: reason.to_string(),
        };
        if seg.points.len() < 2 {
            return Err(invalid("needs at least two points"));
        }
        let mut steps = Vec::with_capacity(seg.points.len() - 1);
        for pair in seg.points.windows(2) {
            let step = Direction::from_offset(pair[1].0 - pair[0].0, pair[1].1 - pair[0].1)
                .ok_or_else(|| invalid("consecutive points must be adjacent"))?;
            steps.push(step);
        }

        let start = self.parse_connector(template, &seg.start)?;
        let end = self.parse_connector(template, &seg.end)?;
        if start.direction != steps[0] {
            return Err(invalid("start connector direction does not match first step"));
        }
        if end.direction != steps[steps.len() - 1] {
            return Err(invalid("end connector direction does not match last step"));
        }
        let inner = self.intern_kind(&seg.inner)?;

        Ok(Segment {
            start,
            inner,
            end,
            points: seg.points.clone(),
        })
    }

    fn parse_connector(&mut self, template: &str, text: &str) -> Result<Connector, CatalogError> {
        let err = || CatalogError::InvalidConnector {
            template: template.to_string(),
            connector: text.to_string(),
        };
        let (kind, dir) = text.split_once('.').ok_or_else(err)?;
        if kind.is_empty() {
            return Err(err());
        }
        let direction = Direction::parse(dir).ok_or_else(err)?;
        Ok(Connector {
            kind: self.intern_kind(kind)?,
            direction,
        })
    }

    fn intern_kind(&mut self, name: &str) -> Result<ConnectorKind, CatalogError> {
        if let Some(kind) = self.connector_kind(name) {
            return Ok(kind);
        }
        let index = u16::try_from(self.connector_kinds.len()).map_err(|_| CatalogError::TooLarge {
            what: "connector kinds".to_string(),
            limit: u16::MAX as usize + 1,
        })?;
        self.connector_kinds.push(name.to_string());
        Ok(ConnectorKind(index))
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.0 as usize]
    }

    pub fn template_by_name(&self, name: &str) -> Result<&Template, CatalogError> {
        self.template_names
            .get(name)
            .map(|&id| self.template(id))
            .ok_or_else(|| CatalogError::MissingTemplate(name.to_string()))
    }

    /// Templates carrying a category tag, in catalog order.
    pub fn templates_in_category(&self, category: &str) -> Vec<TemplateId> {
        self.templates
            .iter()
            .filter(|t| t.has_category(category))
            .map(|t| t.id)
            .collect()
    }

    pub fn terrain_types(&self) -> &[TerrainType] {
        &self.terrain_types
    }

    pub fn terrain_type(&self, id: TerrainTypeId) -> &TerrainType {
        &self.terrain_types[id.0 as usize]
    }

    pub fn terrain_type_by_name(&self, name: &str) -> Option<TerrainTypeId> {
        self.terrain_types
            .iter()
            .position(|t| t.name == name)
            .and_then(|i| u8::try_from(i).ok())
            .map(TerrainTypeId)
    }

    /// Terrain type of a concrete tile.
    pub fn terrain_of(&self, tile: TileDescriptor) -> Option<TerrainTypeId> {
        let template = self.template(tile.template);
        template.tiles.get(tile.index as usize).copied().flatten()
    }

    pub fn playability_of(&self, tile: TileDescriptor) -> Playability {
        self.terrain_of(tile)
            .map(|t| self.terrain_type(t).playability)
            .unwrap_or(Playability::Unplayable)
    }

    pub fn connector_kind(&self, name: &str) -> Option<ConnectorKind> {
        self.connector_kinds
            .iter()
            .position(|k| k == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(ConnectorKind)
    }

    pub fn connector_kind_name(&self, kind: ConnectorKind) -> &str {
        &self.connector_kinds[kind.0 as usize]
    }
}

// =============================================================================
// RAW (SERIALIZED) FORM
// =============================================================================

/// Unvalidated catalog description as exposed by a tileset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogSpec {
    pub terrain_types: Vec<TerrainTypeSpec>,
    pub templates: Vec<TemplateSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerrainTypeSpec {
    pub name: String,
    pub playability: Playability,
    #[serde(default)]
    pub resource_eligible: bool,
    #[serde(default)]
    pub color: [u8; 3],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateSpec {
    pub name: String,
    #[serde(default = "default_size")]
    pub size: (usize, usize),
    /// Terrain type name per footprint cell (row-major, `null` = hole),
    /// or per variant for pick-any templates.
    pub tiles: Vec<Option<String>>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub pick_any: bool,
    #[serde(default)]
    pub segments: Vec<SegmentSpec>,
}

fn default_size() -> (usize, usize) {
    (1, 1)
}

/// Connectors are written `Kind.Direction`, e.g. `Beach.R`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub start: String,
    pub inner: String,
    pub end: String,
    pub points: Vec<(i32, i32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_spec() -> CatalogSpec {
        CatalogSpec {
            terrain_types: vec![TerrainTypeSpec {
                name: "Clear".into(),
                playability: Playability::Playable,
                resource_eligible: true,
                color: [0, 200, 0],
            }],
            templates: vec![TemplateSpec {
                name: "clear".into(),
                size: (1, 1),
                tiles: vec![Some("Clear".into())],
                categories: vec!["Clear".into()],
                pick_any: false,
                segments: vec![SegmentSpec {
                    start: "Clear.R".into(),
                    inner: "Clear".into(),
                    end: "Clear.R".into(),
                    points: vec![(0, 0), (1, 0)],
                }],
            }],
        }
    }

    #[test]
    fn test_valid_spec_builds_catalog() {
        let catalog = TemplateCatalog::from_spec(&tiny_spec()).unwrap();
        let template = catalog.template_by_name("clear").unwrap();
        assert_eq!(template.id, TemplateId(0));
        assert_eq!(template.segments[0].displacement(), (1, 0));
        assert_eq!(catalog.connector_kind_name(template.segments[0].start.kind), "Clear");
        let tile = TileDescriptor::new(template.id, 0);
        assert_eq!(catalog.playability_of(tile), Playability::Playable);
    }

    #[test]
    fn test_oversized_template_is_rejected() {
        let mut spec = tiny_spec();
        spec.templates[0].size = (20, 15);
        spec.templates[0].tiles = vec![Some("Clear".into()); 300];
        spec.templates[0].segments.clear();
        assert!(matches!(
            TemplateCatalog::from_spec(&spec),
            Err(CatalogError::TooLarge { limit: 256, .. })
        ));

        spec.templates[0].size = (16, 16);
        spec.templates[0].tiles.truncate(256);
        let catalog = TemplateCatalog::from_spec(&spec).unwrap();
        let footprint = catalog.template_by_name("clear").unwrap().footprint();
        assert_eq!(footprint.len(), 256);
        assert_eq!(footprint[255], ((15, 15), 255));
    }

    #[test]
    fn test_unknown_terrain_is_rejected() {
        let mut spec = tiny_spec();
        spec.templates[0].tiles = vec![Some("Lava".into())];
        assert!(matches!(
            TemplateCatalog::from_spec(&spec),
            Err(CatalogError::UnknownTerrainType { .. })
        ));
    }

    #[test]
    fn test_segment_direction_must_match_connector() {
        let mut spec = tiny_spec();
        spec.templates[0].segments[0].end = "Clear.D".into();
        assert!(matches!(
            TemplateCatalog::from_spec(&spec),
            Err(CatalogError::InvalidSegment { .. })
        ));

        let mut spec = tiny_spec();
        spec.templates[0].segments[0].points = vec![(0, 0), (2, 0)];
        assert!(TemplateCatalog::from_spec(&spec).is_err());
    }

    #[test]
    fn test_bad_connector_text() {
        let mut spec = tiny_spec();
        spec.templates[0].segments[0].start = "Clear".into();
        assert!(matches!(
            TemplateCatalog::from_spec(&spec),
            Err(CatalogError::InvalidConnector { .. })
        ));
    }

    #[test]
    fn test_json_round_trip_parses() {
        let json = serde_json::to_string(&tiny_spec()).unwrap();
        let catalog = TemplateCatalog::from_json(&json).unwrap();
        assert_eq!(catalog.templates().len(), 1);
        assert!(TemplateCatalog::from_json("{not json").is_err());
    }
}

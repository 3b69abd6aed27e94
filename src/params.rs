//! Generation parameters
//!
//! All tunables of one run, grouped by pipeline area. Every field can be
//! set by name through [`GenerationParams::apply_setting`], which is how
//! the ordered key/value settings of a map request are applied.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GenResult, GenerationError};
use crate::symmetry::{MirrorAxis, Symmetry};

/// Largest supported rotation count.
pub const MAX_ROTATIONS: u32 = 16;

/// Terrain style preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainPreset {
    /// Open land with few features
    Plains,
    /// Scattered inland lakes
    #[default]
    Lakes,
    /// Large landmasses split by sea
    Continents,
    /// Many small islands
    Islands,
    /// Rugged high ground and cliffs
    Mountains,
    /// Fragmented land and shallow water
    Wetlands,
    /// Heavily forested land
    Woodlands,
}

impl TerrainPreset {
    pub fn all() -> &'static [Self] {
        &[
            Self::Plains,
            Self::Lakes,
            Self::Continents,
            Self::Islands,
            Self::Mountains,
            Self::Wetlands,
            Self::Woodlands,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Plains => "Open land with few features",
            Self::Lakes => "Scattered inland lakes",
            Self::Continents => "Large landmasses split by sea",
            Self::Islands => "Many small islands",
            Self::Mountains => "Rugged high ground and cliffs",
            Self::Wetlands => "Fragmented land and shallow water",
            Self::Woodlands => "Heavily forested land",
        }
    }

    /// Overwrite the terrain fractions and feature sizes of `terrain`.
    pub fn apply(&self, terrain: &mut TerrainParams) {
        let (water, mountains, forests, feature_size, thickness) = match self {
            Self::Plains => (0.0, 0.05, 0.05, 32.0, 3),
            Self::Lakes => (0.2, 0.1, 0.08, 16.0, 3),
            Self::Continents => (0.45, 0.1, 0.08, 48.0, 4),
            Self::Islands => (0.65, 0.05, 0.05, 16.0, 3),
            Self::Mountains => (0.1, 0.3, 0.05, 24.0, 3),
            Self::Wetlands => (0.35, 0.0, 0.1, 8.0, 2),
            Self::Woodlands => (0.1, 0.05, 0.25, 24.0, 3),
        };
        terrain.water = water;
        terrain.mountains = mountains;
        terrain.forests = forests;
        terrain.terrain_feature_size = feature_size;
        terrain.min_land_thickness = thickness;
    }
}

impl fmt::Display for TerrainPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plains => write!(f, "plains"),
            Self::Lakes => write!(f, "lakes"),
            Self::Continents => write!(f, "continents"),
            Self::Islands => write!(f, "islands"),
            Self::Mountains => write!(f, "mountains"),
            Self::Wetlands => write!(f, "wetlands"),
            Self::Woodlands => write!(f, "woodlands"),
        }
    }
}

impl FromStr for TerrainPreset {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.to_string() == s.to_lowercase())
            .ok_or_else(|| GenerationError::invalid("preset", format!("unknown terrain preset '{s}'")))
    }
}

// =============================================================================
// PARAMETER GROUPS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Fraction of the map covered by water (0.0-1.0)
    pub water: f32,
    /// Fraction of land raised into mountains (0.0-1.0)
    pub mountains: f32,
    /// Fraction of land covered by forest (0.0-1.0)
    pub forests: f32,
    /// Wavelength of the largest elevation octave, in cells
    pub terrain_feature_size: f32,
    pub mountain_feature_size: f32,
    pub forest_feature_size: f32,
    /// 0 = smooth pink noise, higher keeps more small-scale detail
    pub roughness: f32,
    /// Largest majority-blur radius used on land and mountain masks
    pub terrain_smoothing: usize,
    /// Dead band around 50% for the majority blur (0.0-0.5)
    pub smoothing_threshold: f32,
    /// Narrowest land or water feature, in cells
    pub min_land_thickness: usize,
    /// Narrowest mountain feature, in cells
    pub min_mountain_thickness: usize,
    /// Corridor width for fitting coastline templates
    pub coast_thickness: usize,
    /// Corridor width for fitting cliff templates
    pub cliff_thickness: usize,
    /// Shortest cliff kept, in steps
    pub cliff_min_length: usize,
    /// Steps removed from both ends of open cliffs
    pub cliff_trim: usize,
    /// Steps open paths are extended past the map edge
    pub path_extension: usize,
    /// Restrict play to the circle inscribed in the map
    pub circular_map: bool,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            water: 0.2,
            mountains: 0.1,
            forests: 0.08,
            terrain_feature_size: 16.0,
            mountain_feature_size: 12.0,
            forest_feature_size: 6.0,
            roughness: 0.5,
            terrain_smoothing: 3,
            smoothing_threshold: 0.2,
            min_land_thickness: 3,
            min_mountain_thickness: 3,
            coast_thickness: 3,
            cliff_thickness: 3,
            cliff_min_length: 6,
            cliff_trim: 1,
            path_extension: 4,
            circular_map: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymmetryParams {
    /// Number of rotational copies (1 = none)
    pub rotations: u32,
    pub mirror: MirrorAxis,
    /// Render noise through the symmetry group so terrain is symmetric too
    pub enforce_symmetry: bool,
}

impl Default for SymmetryParams {
    fn default() -> Self {
        Self {
            rotations: 2,
            mirror: MirrorAxis::None,
            enforce_symmetry: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadParams {
    pub roads: bool,
    /// Distance kept between roads and the edge of the playable area
    pub road_spacing: i32,
    /// Shortest road kept, in steps
    pub road_min_length: usize,
    pub road_thickness: usize,
}

impl Default for RoadParams {
    fn default() -> Self {
        Self {
            roads: true,
            road_spacing: 5,
            road_min_length: 12,
            road_thickness: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityParams {
    pub create_entities: bool,
    pub players: usize,
    /// Roominess values are clamped to this magnitude
    pub roominess_cap: i32,
    /// Spawns keep this distance from the symmetry centre and axes
    pub central_reservation: f32,
    /// Minimum distance between a spawn and its own symmetric copies
    pub spawn_spacing: f32,
    /// Radius around spawns withheld from expansions and structures
    pub spawn_reservation: f32,
    pub spawn_mines: usize,
    pub spawn_mine_radius: f32,
    /// Spawn mines are kept at least this far from the spawn
    pub spawn_mine_inner_radius: f32,
    /// Minimum distance between two mines of one group
    pub mine_spacing: f32,
    /// Probability of upgrading a mine to a gem mine (0.0-1.0)
    pub gem_chance: f32,
    pub max_expansions: usize,
    pub expansion_min_room: i32,
    pub expansion_radius: f32,
    pub expansion_mines: usize,
    pub max_neutral_structures: usize,
    pub neutral_min_room: i32,
    pub neutral_reservation: f32,
    /// Relative weight per neutral structure type
    pub neutral_weights: BTreeMap<String, f32>,
}

impl Default for EntityParams {
    fn default() -> Self {
        let neutral_weights = [("bio", 1.0), ("fcom", 1.0), ("hosp", 1.0), ("miss", 1.0), ("oilb", 2.0)]
            .iter()
            .map(|&(k, w)| (k.to_string(), w))
            .collect();
        Self {
            create_entities: true,
            players: 2,
            roominess_cap: 16,
            central_reservation: 8.0,
            spawn_spacing: 16.0,
            spawn_reservation: 10.0,
            spawn_mines: 3,
            spawn_mine_radius: 7.0,
            spawn_mine_inner_radius: 3.0,
            mine_spacing: 2.0,
            gem_chance: 0.1,
            max_expansions: 3,
            expansion_min_room: 6,
            expansion_radius: 4.0,
            expansion_mines: 2,
            max_neutral_structures: 3,
            neutral_min_room: 4,
            neutral_reservation: 6.0,
            neutral_weights,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceParams {
    /// Total resource value to seed per player
    pub resources_per_player: u64,
    /// Value of one density step of one cell
    pub resource_value: u32,
    pub max_resource_density: u8,
    /// No resources within this distance of a spawn
    pub resource_spawn_exclusion: f32,
    /// Resources are favoured within this distance of a spawn
    pub resource_spawn_ramp: f32,
    /// Strength of the spawn bias relative to the 0-1 noise value
    pub resource_spawn_bias: f32,
    pub resource_feature_size: f32,
}

impl Default for ResourceParams {
    fn default() -> Self {
        Self {
            resources_per_player: 5000,
            resource_value: 25,
            max_resource_density: 12,
            resource_spawn_exclusion: 3.0,
            resource_spawn_ramp: 14.0,
            resource_spawn_bias: 1.0,
            resource_feature_size: 8.0,
        }
    }
}

/// Complete parameter set of a generation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub terrain: TerrainParams,
    pub symmetry: SymmetryParams,
    pub roads: RoadParams,
    pub entities: EntityParams,
    pub resources: ResourceParams,
}

fn parse<T: FromStr>(key: &str, value: &str) -> GenResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| GenerationError::invalid(key, format!("cannot parse '{value}'")))
}

impl GenerationParams {
    /// Parameters with a terrain preset applied over the defaults.
    pub fn with_preset(preset: TerrainPreset) -> Self {
        let mut params = Self::default();
        preset.apply(&mut params.terrain);
        params
    }

    pub fn symmetry(&self, width: usize, height: usize) -> Symmetry {
        Symmetry::new(self.symmetry.rotations, self.symmetry.mirror, width, height)
    }

    /// Set one parameter by its key. Neutral structure weights use the key
    /// `neutral_weights.<type>`.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> GenResult<()> {
        if let Some(kind) = key.strip_prefix("neutral_weights.") {
            let weight = parse(key, value)?;
            self.entities.neutral_weights.insert(kind.to_string(), weight);
            return Ok(());
        }

        let t = &mut self.terrain;
        let e = &mut self.entities;
        let r = &mut self.resources;
        match key {
            "preset" => parse::<TerrainPreset>(key, value)?.apply(t),
            "water" => t.water = parse(key, value)?,
            "mountains" => t.mountains = parse(key, value)?,
            "forests" => t.forests = parse(key, value)?,
            "terrain_feature_size" => t.terrain_feature_size = parse(key, value)?,
            "mountain_feature_size" => t.mountain_feature_size = parse(key, value)?,
            "forest_feature_size" => t.forest_feature_size = parse(key, value)?,
            "roughness" => t.roughness = parse(key, value)?,
            "terrain_smoothing" => t.terrain_smoothing = parse(key, value)?,
            "smoothing_threshold" => t.smoothing_threshold = parse(key, value)?,
            "min_land_thickness" => t.min_land_thickness = parse(key, value)?,
            "min_mountain_thickness" => t.min_mountain_thickness = parse(key, value)?,
            "coast_thickness" => t.coast_thickness = parse(key, value)?,
            "cliff_thickness" => t.cliff_thickness = parse(key, value)?,
            "cliff_min_length" => t.cliff_min_length = parse(key, value)?,
            "cliff_trim" => t.cliff_trim = parse(key, value)?,
            "path_extension" => t.path_extension = parse(key, value)?,
            "circular_map" => t.circular_map = parse(key, value)?,

            "rotations" => self.symmetry.rotations = parse(key, value)?,
            "mirror" => self.symmetry.mirror = value.trim().parse()?,
            "enforce_symmetry" => self.symmetry.enforce_symmetry = parse(key, value)?,

            "roads" => self.roads.roads = parse(key, value)?,
            "road_spacing" => self.roads.road_spacing = parse(key, value)?,
            "road_min_length" => self.roads.road_min_length = parse(key, value)?,
            "road_thickness" => self.roads.road_thickness = parse(key, value)?,

            "create_entities" => e.create_entities = parse(key, value)?,
            "players" => e.players = parse(key, value)?,
            "roominess_cap" => e.roominess_cap = parse(key, value)?,
            "central_reservation" => e.central_reservation = parse(key, value)?,
            "spawn_spacing" => e.spawn_spacing = parse(key, value)?,
            "spawn_reservation" => e.spawn_reservation = parse(key, value)?,
            "spawn_mines" => e.spawn_mines = parse(key, value)?,
            "spawn_mine_radius" => e.spawn_mine_radius = parse(key, value)?,
            "spawn_mine_inner_radius" => e.spawn_mine_inner_radius = parse(key, value)?,
            "mine_spacing" => e.mine_spacing = parse(key, value)?,
            "gem_chance" => e.gem_chance = parse(key, value)?,
            "max_expansions" => e.max_expansions = parse(key, value)?,
            "expansion_min_room" => e.expansion_min_room = parse(key, value)?,
            "expansion_radius" => e.expansion_radius = parse(key, value)?,
            "expansion_mines" => e.expansion_mines = parse(key, value)?,
            "max_neutral_structures" => e.max_neutral_structures = parse(key, value)?,
            "neutral_min_room" => e.neutral_min_room = parse(key, value)?,
            "neutral_reservation" => e.neutral_reservation = parse(key, value)?,

            "resources_per_player" => r.resources_per_player = parse(key, value)?,
            "resource_value" => r.resource_value = parse(key, value)?,
            "max_resource_density" => r.max_resource_density = parse(key, value)?,
            "resource_spawn_exclusion" => r.resource_spawn_exclusion = parse(key, value)?,
            "resource_spawn_ramp" => r.resource_spawn_ramp = parse(key, value)?,
            "resource_spawn_bias" => r.resource_spawn_bias = parse(key, value)?,
            "resource_feature_size" => r.resource_feature_size = parse(key, value)?,

            _ => return Err(GenerationError::UnknownParameter(key.to_string())),
        }
        Ok(())
    }

    /// Apply an ordered list of settings; later entries win.
    pub fn apply_settings<K: AsRef<str>, V: AsRef<str>>(&mut self, settings: &[(K, V)]) -> GenResult<()> {
        for (key, value) in settings {
            self.apply_setting(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Check every parameter against the map size. Runs before any grid
    /// is allocated.
    pub fn validate(&self, width: usize, height: usize) -> GenResult<()> {
        if width == 0 || height == 0 {
            return Err(GenerationError::invalid("size", format!("map size {width}x{height} is empty")));
        }

        let t = &self.terrain;
        check_fraction("water", t.water)?;
        check_fraction("mountains", t.mountains)?;
        check_fraction("forests", t.forests)?;
        check_fraction("roughness", t.roughness)?;
        check_range("smoothing_threshold", t.smoothing_threshold, 0.0, 0.5)?;
        check_positive("terrain_feature_size", t.terrain_feature_size)?;
        check_positive("mountain_feature_size", t.mountain_feature_size)?;
        check_positive("forest_feature_size", t.forest_feature_size)?;
        for (key, value) in [
            ("min_land_thickness", t.min_land_thickness),
            ("min_mountain_thickness", t.min_mountain_thickness),
            ("coast_thickness", t.coast_thickness),
            ("cliff_thickness", t.cliff_thickness),
            ("road_thickness", self.roads.road_thickness),
        ] {
            if value == 0 {
                return Err(GenerationError::invalid(key, "must be at least 1"));
            }
        }

        let s = &self.symmetry;
        if !(1..=MAX_ROTATIONS).contains(&s.rotations) {
            return Err(GenerationError::invalid(
                "rotations",
                format!("must be within 1..={MAX_ROTATIONS}, got {}", s.rotations),
            ));
        }
        if width != height && (s.rotations > 2 || s.mirror.is_diagonal()) {
            return Err(GenerationError::AmbiguousSymmetry(format!(
                "{} rotations with mirror '{}' require a square map, got {width}x{height}",
                s.rotations, s.mirror
            )));
        }
        if s.enforce_symmetry && !matches!(s.rotations, 1 | 2 | 4) {
            return Err(GenerationError::AmbiguousSymmetry(format!(
                "symmetry can only be enforced with 1, 2 or 4 rotations, got {}",
                s.rotations
            )));
        }

        if self.roads.road_spacing < 1 {
            return Err(GenerationError::invalid("road_spacing", "must be at least 1"));
        }

        let e = &self.entities;
        let copies = self.symmetry(width, height).projection_count();
        if e.players == 0 {
            return Err(GenerationError::invalid("players", "must be at least 1"));
        }
        if e.create_entities && e.players % copies != 0 {
            return Err(GenerationError::invalid(
                "players",
                format!("{} players cannot be split across {copies} symmetric copies", e.players),
            ));
        }
        check_fraction("gem_chance", e.gem_chance)?;
        check_non_negative("central_reservation", e.central_reservation)?;
        check_non_negative("spawn_spacing", e.spawn_spacing)?;
        check_non_negative("spawn_reservation", e.spawn_reservation)?;
        check_non_negative("spawn_mine_radius", e.spawn_mine_radius)?;
        check_non_negative("expansion_radius", e.expansion_radius)?;
        check_non_negative("neutral_reservation", e.neutral_reservation)?;
        if e.roominess_cap < 1 {
            return Err(GenerationError::invalid("roominess_cap", "must be at least 1"));
        }
        for (kind, &weight) in &e.neutral_weights {
            check_non_negative(&format!("neutral_weights.{kind}"), weight)?;
        }
        if e.max_neutral_structures > 0 && e.neutral_weights.values().sum::<f32>() <= 0.0 {
            return Err(GenerationError::invalid(
                "neutral_weights",
                "need a positive total weight when neutral structures are requested",
            ));
        }

        let r = &self.resources;
        if r.resource_value == 0 {
            return Err(GenerationError::invalid("resource_value", "must be at least 1"));
        }
        if r.max_resource_density == 0 {
            return Err(GenerationError::invalid("max_resource_density", "must be at least 1"));
        }
        check_non_negative("resource_spawn_exclusion", r.resource_spawn_exclusion)?;
        check_non_negative("resource_spawn_ramp", r.resource_spawn_ramp)?;
        check_non_negative("resource_spawn_bias", r.resource_spawn_bias)?;
        check_positive("resource_feature_size", r.resource_feature_size)?;

        Ok(())
    }
}

fn check_range(key: &str, value: f32, min: f32, max: f32) -> GenResult<()> {
    if !(min..=max).contains(&value) {
        return Err(GenerationError::invalid(key, format!("must be within {min}..={max}, got {value}")));
    }
    Ok(())
}

fn check_fraction(key: &str, value: f32) -> GenResult<()> {
    check_range(key, value, 0.0, 1.0)
}

fn check_positive(key: &str, value: f32) -> GenResult<()> {
    if !(value > 0.0) {
        return Err(GenerationError::invalid(key, format!("must be positive, got {value}")));
    }
    Ok(())
}

fn check_non_negative(key: &str, value: f32) -> GenResult<()> {
    if !(value >= 0.0) {
        return Err(GenerationError::invalid(key, format!("must not be negative, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GenerationParams::default().validate(64, 64).is_ok());
        for preset in TerrainPreset::all() {
            assert!(GenerationParams::with_preset(*preset).validate(48, 48).is_ok(), "{preset}");
        }
    }

    #[test]
    fn test_water_out_of_range() {
        let mut params = GenerationParams::default();
        params.apply_setting("water", "1.5").unwrap();
        let err = params.validate(32, 32).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidParameter { ref key, .. } if key == "water"));
    }

    #[test]
    fn test_settings_apply_in_order() {
        let mut params = GenerationParams::default();
        params
            .apply_settings(&[("preset", "islands"), ("water", "0.3"), ("mirror", "left_matches_right")])
            .unwrap();
        assert_eq!(params.terrain.water, 0.3);
        assert_eq!(params.terrain.terrain_feature_size, 16.0);
        assert_eq!(params.symmetry.mirror, MirrorAxis::LeftMatchesRight);

        params.apply_setting("neutral_weights.oilb", "5").unwrap();
        assert_eq!(params.entities.neutral_weights["oilb"], 5.0);
    }

    #[test]
    fn test_bad_settings() {
        let mut params = GenerationParams::default();
        assert!(matches!(
            params.apply_setting("lava", "1"),
            Err(GenerationError::UnknownParameter(_))
        ));
        assert!(matches!(
            params.apply_setting("players", "two"),
            Err(GenerationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_symmetry_policy_checks() {
        let mut params = GenerationParams::default();
        params.symmetry.rotations = 3;
        params.entities.players = 3;
        assert!(matches!(params.validate(32, 32), Err(GenerationError::AmbiguousSymmetry(_))));

        params.symmetry.enforce_symmetry = false;
        assert!(params.validate(32, 32).is_ok());
        assert!(matches!(params.validate(32, 40), Err(GenerationError::AmbiguousSymmetry(_))));

        params.symmetry.rotations = 2;
        assert!(params.validate(32, 32).is_err(), "3 players over 2 copies");
    }

    #[test]
    fn test_preset_round_trip_through_str() {
        for preset in TerrainPreset::all() {
            assert_eq!(preset.to_string().parse::<TerrainPreset>().unwrap(), *preset);
        }
    }
}

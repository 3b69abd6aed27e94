//! Procedural map generation for grid-based strategy games
//!
//! Builds terrain, paths, regions, entity placements and resource density
//! for a rectangular map from a single seed.

pub mod catalog;
pub mod contour;
pub mod diagnostics;
pub mod direction;
pub mod entities;
pub mod error;
pub mod export;
pub mod generator;
pub mod heightmap;
pub mod landmass;
pub mod obstacles;
pub mod params;
pub mod path;
pub mod plan;
pub mod priority;
pub mod regions;
pub mod resources;
pub mod seeds;
pub mod symmetry;
pub mod tilemap;
pub mod tiling;

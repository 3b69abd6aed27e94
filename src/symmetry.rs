//! Rotational and mirror symmetry projection.
//!
//! A map's symmetry group is `rotations` evenly spaced turns about the map
//! centre, optionally combined with a reflection across one mirror axis.
//! Projecting a point yields one image per group element, the identity
//! first.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Mirror axis of the symmetry group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorAxis {
    #[default]
    None,
    /// Vertical axis through the centre
    LeftMatchesRight,
    /// Anti-diagonal axis (square maps only)
    TopLeftMatchesBottomRight,
    /// Horizontal axis through the centre
    TopMatchesBottom,
    /// Main diagonal axis (square maps only)
    TopRightMatchesBottomLeft,
}

impl MirrorAxis {
    pub fn all() -> &'static [Self] {
        &[
            Self::None,
            Self::LeftMatchesRight,
            Self::TopLeftMatchesBottomRight,
            Self::TopMatchesBottom,
            Self::TopRightMatchesBottomLeft,
        ]
    }

    pub fn is_diagonal(&self) -> bool {
        matches!(self, Self::TopLeftMatchesBottomRight | Self::TopRightMatchesBottomLeft)
    }

    fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::LeftMatchesRight => "left_matches_right",
            Self::TopLeftMatchesBottomRight => "top_left_matches_bottom_right",
            Self::TopMatchesBottom => "top_matches_bottom",
            Self::TopRightMatchesBottomLeft => "top_right_matches_bottom_left",
        }
    }
}

impl fmt::Display for MirrorAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MirrorAxis {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|axis| axis.name() == s)
            .ok_or_else(|| GenerationError::invalid("mirror", format!("unknown mirror axis '{s}'")))
    }
}

/// Symmetry group of one map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Symmetry {
    pub rotations: u32,
    pub mirror: MirrorAxis,
    width: f32,
    height: f32,
}

impl Symmetry {
    pub fn new(rotations: u32, mirror: MirrorAxis, width: usize, height: usize) -> Self {
        Self {
            rotations: rotations.max(1),
            mirror,
            width: width as f32,
            height: height as f32,
        }
    }

    /// No symmetry at all.
    pub fn identity(width: usize, height: usize) -> Self {
        Self::new(1, MirrorAxis::None, width, height)
    }

    pub fn is_identity(&self) -> bool {
        self.rotations == 1 && self.mirror == MirrorAxis::None
    }

    /// Number of images produced by one projection.
    pub fn projection_count(&self) -> usize {
        self.rotations as usize * if self.mirror == MirrorAxis::None { 1 } else { 2 }
    }

    /// Whether every rotation maps grid cells exactly onto grid cells.
    pub fn is_cell_exact(&self) -> bool {
        matches!(self.rotations, 1 | 2 | 4)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }

    fn rotate(&self, point: (f32, f32), turn: u32) -> (f32, f32) {
        let (cx, cy) = self.center();
        let (dx, dy) = (point.0 - cx, point.1 - cy);
        // Quarter turns are applied exactly so cell projections stay exact.
        let (rx, ry) = if (turn * 4) % self.rotations == 0 {
            match (turn * 4 / self.rotations) % 4 {
                0 => (dx, dy),
                1 => (-dy, dx),
                2 => (-dx, -dy),
                _ => (dy, -dx),
            }
        } else {
            let angle = TAU * turn as f32 / self.rotations as f32;
            let (sin, cos) = angle.sin_cos();
            (dx * cos - dy * sin, dx * sin + dy * cos)
        };
        (cx + rx, cy + ry)
    }

    /// Reflect a point across the mirror axis.
    pub fn mirror_point(&self, point: (f32, f32)) -> (f32, f32) {
        let (x, y) = point;
        match self.mirror {
            MirrorAxis::None => (x, y),
            MirrorAxis::LeftMatchesRight => (self.width - x, y),
            MirrorAxis::TopMatchesBottom => (x, self.height - y),
            MirrorAxis::TopLeftMatchesBottomRight => (self.width - y, self.height - x),
            MirrorAxis::TopRightMatchesBottomLeft => (y, x),
        }
    }

    /// All images of a point under the group, identity first.
    pub fn project_point(&self, point: (f32, f32)) -> Vec<(f32, f32)> {
        let mut result = Vec::with_capacity(self.projection_count());
        for turn in 0..self.rotations {
            result.push(self.rotate(point, turn));
        }
        if self.mirror != MirrorAxis::None {
            for turn in 0..self.rotations {
                result.push(self.rotate(self.mirror_point(point), turn));
            }
        }
        result
    }

    /// All images of a cell (projected through its centre), identity first.
    /// Images may fall outside the grid for inexact rotation counts.
    pub fn project_cell(&self, cell: (i32, i32)) -> Vec<(i32, i32)> {
        self.project_point((cell.0 as f32 + 0.5, cell.1 as f32 + 0.5))
            .into_iter()
            .map(|(x, y)| (x.floor() as i32, y.floor() as i32))
            .collect()
    }

    /// Smallest distance between a point and any of its non-identity images.
    pub fn projection_spacing(&self, point: (f32, f32)) -> f32 {
        self.project_point(point)
            .into_iter()
            .skip(1)
            .map(|(x, y)| ((x - point.0).powi(2) + (y - point.1).powi(2)).sqrt())
            .fold(f32::INFINITY, f32::min)
    }

    /// Distance from a point to the nearest fixed structure of the group:
    /// the rotation centre and/or the mirror axis.
    pub fn central_distance(&self, point: (f32, f32)) -> f32 {
        let (cx, cy) = self.center();
        let (x, y) = point;
        let mut distance = f32::INFINITY;
        if self.rotations > 1 {
            distance = distance.min(((x - cx).powi(2) + (y - cy).powi(2)).sqrt());
        }
        let axis_distance = match self.mirror {
            MirrorAxis::None => f32::INFINITY,
            MirrorAxis::LeftMatchesRight => (x - cx).abs(),
            MirrorAxis::TopMatchesBottom => (y - cy).abs(),
            MirrorAxis::TopRightMatchesBottomLeft => (x - y).abs() / std::f32::consts::SQRT_2,
            MirrorAxis::TopLeftMatchesBottomRight => {
                (x + y - self.width).abs() / std::f32::consts::SQRT_2
            }
        };
        distance.min(axis_distance)
    }
}

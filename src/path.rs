//! Paths to be fitted with terrain templates
//!
//! A path is a traced contour plus everything the tiler needs to know
//! about it: which connector it must begin and end with, which connector
//! kinds may appear in its interior, which templates are allowed and how
//! far the fitted tiles may stray from the traced line.

use crate::catalog::{Connector, ConnectorKind, TemplateCatalog, TemplateId};
use crate::contour::Contour;
use crate::direction::Direction;
use crate::error::{GenResult, GenerationError};

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    /// Corner-lattice points; loops repeat the first point at the end.
    pub points: Vec<(i32, i32)>,
    pub is_loop: bool,
    pub start: Connector,
    pub end: Connector,
    /// Connector kinds allowed between segments in the interior
    pub inner: Vec<ConnectorKind>,
    /// Templates the tiler may use
    pub templates: Vec<TemplateId>,
    /// Largest Chebyshev distance a fitted point may keep from the path
    pub max_deviation: i32,
    /// Human readable kind for diagnostics ("coast", "cliff", ...)
    pub label: String,
}

/// Connector kinds and templates for one family of paths.
#[derive(Clone, Debug)]
pub struct PathStyle {
    pub label: String,
    pub start_kind: ConnectorKind,
    pub inner: Vec<ConnectorKind>,
    pub end_kind: ConnectorKind,
    pub templates: Vec<TemplateId>,
    /// Corridor width in cells
    pub thickness: usize,
}

impl PathStyle {
    /// Style whose templates are all catalog templates in `category`.
    pub fn from_catalog(
        catalog: &TemplateCatalog,
        label: &str,
        category: &str,
        start_kind: &str,
        inner: &str,
        end_kind: &str,
        thickness: usize,
    ) -> GenResult<Self> {
        let kind = |name: &str| {
            catalog.connector_kind(name).ok_or_else(|| GenerationError::PathTiling {
                kind: label.to_string(),
                reason: format!("catalog has no '{name}' connectors"),
            })
        };
        Ok(Self {
            label: label.to_string(),
            start_kind: kind(start_kind)?,
            inner: vec![kind(inner)?],
            end_kind: kind(end_kind)?,
            templates: catalog.templates_in_category(category),
            thickness,
        })
    }
}

impl Path {
    /// Build a path from a contour. Returns `None` for contours with fewer
    /// than two points.
    pub fn from_contour(contour: &Contour, style: &PathStyle) -> Option<Self> {
        let mut path = Self {
            points: contour.points.clone(),
            is_loop: contour.is_loop,
            start: Connector {
                kind: style.start_kind,
                direction: Direction::R,
            },
            end: Connector {
                kind: style.end_kind,
                direction: Direction::R,
            },
            inner: style.inner.clone(),
            templates: style.templates.clone(),
            max_deviation: (style.thickness.max(1) as i32 - 1) / 2,
            label: style.label.clone(),
        };
        if path.is_loop {
            path.rotate_to_longest_straight();
        }
        path.update_directions().then_some(path)
    }

    pub fn len_steps(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    pub fn moves(&self) -> Vec<Direction> {
        self.points
            .windows(2)
            .filter_map(|w| Direction::from_offset(w[1].0 - w[0].0, w[1].1 - w[0].1))
            .collect()
    }

    /// Derive start/end connector directions from the first and last move.
    fn update_directions(&mut self) -> bool {
        let moves = self.moves();
        match (moves.first(), moves.last()) {
            (Some(&first), Some(&last)) => {
                self.start.direction = first;
                self.end.direction = last;
                true
            }
            _ => false,
        }
    }

    /// Re-rotate a loop so it starts in the middle of its longest run of
    /// identical moves.
    pub fn rotate_to_longest_straight(&mut self) {
        let moves = self.moves();
        let n = moves.len();
        if !self.is_loop || n == 0 {
            return;
        }

        // Runs are measured cyclically from a position where the direction
        // changes, so a run crossing the seam is counted whole.
        let Some(anchor) = (0..n).find(|&i| moves[i] != moves[(i + n - 1) % n]) else {
            return;
        };
        let mut best = (0, anchor);
        let mut run_start = anchor;
        let mut run_len = 0;
        for k in 0..n {
            let i = (anchor + k) % n;
            if moves[i] == moves[run_start] {
                run_len += 1;
            } else {
                run_start = i;
                run_len = 1;
            }
            if run_len > best.0 {
                best = (run_len, run_start);
            }
        }

        let (len, start) = best;
        let pivot = (start + len / 2) % n;
        let ring = &self.points[..n];
        let mut rotated: Vec<(i32, i32)> = ring[pivot..].iter().chain(&ring[..pivot]).copied().collect();
        rotated.push(rotated[0]);
        self.points = rotated;
        self.update_directions();
    }

    /// Extend both ends of an open path straight outwards by `cells` steps
    /// where they touch the edge of a `width x height` map.
    pub fn extend_beyond_edges(&mut self, width: usize, height: usize, cells: usize) {
        if self.is_loop || cells == 0 || self.points.len() < 2 {
            return;
        }
        let on_edge = |p: (i32, i32)| p.0 <= 0 || p.1 <= 0 || p.0 >= width as i32 || p.1 >= height as i32;
        let moves = self.moves();
        let n = cells as i32;

        let first = self.points[0];
        if on_edge(first) {
            let (dx, dy) = moves[0].offset();
            let prefix = (1..=n).rev().map(|k| (first.0 - dx * k, first.1 - dy * k));
            self.points.splice(0..0, prefix);
        }

        let last = self.points[self.points.len() - 1];
        if on_edge(last) {
            let (dx, dy) = moves[moves.len() - 1].offset();
            self.points.extend((1..=n).map(|k| (last.0 + dx * k, last.1 + dy * k)));
        }
    }

    /// Drop `cells` steps from both ends of an open path. Returns false if
    /// nothing usable remains.
    pub fn trim_ends(&mut self, cells: usize) -> bool {
        if self.is_loop || cells == 0 {
            return true;
        }
        if self.points.len() <= 2 * cells + 1 {
            return false;
        }
        self.points = self.points[cells..self.points.len() - cells].to_vec();
        self.update_directions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin;

    fn beach_style() -> PathStyle {
        let catalog = builtin::temperate().unwrap();
        PathStyle::from_catalog(&catalog, "coast", "Beach", "Beach", "Beach", "Beach", 3).unwrap()
    }

    #[test]
    fn test_loop_rotates_to_longest_straight() {
        // 3x1 island: the long sides have three moves.
        let contour = Contour {
            points: vec![(1, 1), (1, 2), (2, 2), (3, 2), (4, 2), (4, 1), (3, 1), (2, 1), (1, 1)],
            is_loop: true,
        };
        let path = Path::from_contour(&contour, &beach_style()).unwrap();
        assert_eq!(path.points.first(), path.points.last());
        assert_eq!(path.len_steps(), 8);
        assert_eq!(path.start.direction, path.end.direction);
        assert_eq!(path.points[0], (2, 2));
        assert_eq!(path.max_deviation, 1);
    }

    #[test]
    fn test_open_path_extends_past_edges() {
        let contour = Contour {
            points: vec![(5, 2), (4, 2), (3, 2), (2, 2), (1, 2), (0, 2)],
            is_loop: false,
        };
        let mut path = Path::from_contour(&contour, &beach_style()).unwrap();
        path.extend_beyond_edges(5, 4, 2);
        assert_eq!(path.points.first(), Some(&(7, 2)));
        assert_eq!(path.points.last(), Some(&(-2, 2)));
        assert_eq!(path.start.direction, Direction::L);
    }

    #[test]
    fn test_trim_ends() {
        let contour = Contour {
            points: (0..6).map(|x| (x, 3)).collect(),
            is_loop: false,
        };
        let mut path = Path::from_contour(&contour, &beach_style()).unwrap();
        assert!(path.trim_ends(2));
        assert_eq!(path.points, vec![(2, 3), (3, 3)]);
        assert!(!path.trim_ends(1));
    }
}

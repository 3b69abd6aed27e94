//! Boundary tracing on binary masks
//!
//! Contours run along the corner lattice: point `(x, y)` is the top-left
//! corner of cell `(x, y)`, so a `w x h` mask has `(w + 1) x (h + 1)`
//! lattice points. Every contour keeps the true region on its left-hand
//! side (with `y` growing downwards). Only edges between two cells inside
//! the map are traced; the map border itself is not a boundary, so a
//! contour either closes on itself or starts and ends on the border.

use crate::direction::Direction;
use crate::tilemap::Tilemap;

/// An ordered boundary polyline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    /// Lattice points, consecutive points 4-adjacent. Loops repeat their
    /// first point as the last.
    pub points: Vec<(i32, i32)>,
    pub is_loop: bool,
}

impl Contour {
    /// Number of unit steps.
    pub fn len_steps(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Direction of every step in order.
    pub fn moves(&self) -> Vec<Direction> {
        self.points
            .windows(2)
            .filter_map(|w| Direction::from_offset(w[1].0 - w[0].0, w[1].1 - w[0].1))
            .collect()
    }
}

/// Outgoing boundary edges of every lattice point, as direction bits.
struct EdgeGraph {
    width: i32,
    height: i32,
    out: Tilemap<u8>,
    remaining: usize,
}

impl EdgeGraph {
    fn new(mask: &Tilemap<bool>) -> Self {
        let (w, h) = (mask.width, mask.height);
        let mut graph = Self {
            width: w as i32,
            height: h as i32,
            out: Tilemap::new(w + 1, h + 1),
            remaining: 0,
        };

        // Horizontal edges between vertically adjacent cells.
        for y in 1..h {
            for x in 0..w {
                let above = *mask.get(x, y - 1);
                let below = *mask.get(x, y);
                if above == below {
                    continue;
                }
                let (x, y) = (x as i32, y as i32);
                if above {
                    graph.add((x, y), Direction::R);
                } else {
                    graph.add((x + 1, y), Direction::L);
                }
            }
        }

        // Vertical edges between horizontally adjacent cells.
        for y in 0..h {
            for x in 1..w {
                let left = *mask.get(x - 1, y);
                let right = *mask.get(x, y);
                if left == right {
                    continue;
                }
                let (x, y) = (x as i32, y as i32);
                if right {
                    graph.add((x, y), Direction::D);
                } else {
                    graph.add((x, y + 1), Direction::U);
                }
            }
        }

        graph
    }

    fn add(&mut self, p: (i32, i32), d: Direction) {
        *self.out.get_mut(p.0 as usize, p.1 as usize) |= d.mask().bits();
        self.remaining += 1;
    }

    fn has(&self, p: (i32, i32), d: Direction) -> bool {
        self.out.get(p.0 as usize, p.1 as usize) & d.mask().bits() != 0
    }

    fn take(&mut self, p: (i32, i32), d: Direction) {
        *self.out.get_mut(p.0 as usize, p.1 as usize) &= !d.mask().bits();
        self.remaining -= 1;
    }

    fn outgoing(&self, p: (i32, i32)) -> Vec<Direction> {
        Direction::CARDINAL.into_iter().filter(|&d| self.has(p, d)).collect()
    }

    fn on_border(&self, p: (i32, i32)) -> bool {
        p.0 == 0 || p.1 == 0 || p.0 == self.width || p.1 == self.height
    }

    /// Next edge to follow from `p` having arrived travelling `heading`.
    fn next_edge(&self, p: (i32, i32), heading: Option<Direction>) -> Option<Direction> {
        let out = self.outgoing(p);
        match (out.len(), heading) {
            (0, _) => None,
            (1, _) => Some(out[0]),
            // Saddle point: keep hugging the cell on the left.
            (_, Some(h)) => {
                let left = turn_left(h);
                if out.contains(&left) {
                    Some(left)
                } else if out.contains(&h) {
                    Some(h)
                } else {
                    Some(out[0])
                }
            }
            (_, None) => Some(out[0]),
        }
    }

    fn walk(&mut self, start: (i32, i32)) -> Contour {
        let mut points = vec![start];
        let mut p = start;
        let mut heading = None;
        while let Some(d) = self.next_edge(p, heading) {
            self.take(p, d);
            let (dx, dy) = d.offset();
            p = (p.0 + dx, p.1 + dy);
            points.push(p);
            heading = Some(d);
            if p == start {
                break;
            }
        }
        let is_loop = points.len() > 1 && points[0] == points[points.len() - 1];
        Contour { points, is_loop }
    }
}

fn turn_left(d: Direction) -> Direction {
    let (dx, dy) = d.offset();
    Direction::from_offset(dy, -dx).unwrap_or(d)
}

/// Trace every boundary of a mask. Open contours come first (in order of
/// their starting border point), followed by loops.
pub fn trace_contours(mask: &Tilemap<bool>) -> Vec<Contour> {
    let mut graph = EdgeGraph::new(mask);
    let mut contours = Vec::new();

    let starts: Vec<(i32, i32)> = graph
        .out
        .iter()
        .map(|(x, y, _)| (x as i32, y as i32))
        .filter(|&p| graph.on_border(p))
        .collect();
    for p in starts {
        while !graph.outgoing(p).is_empty() {
            contours.push(graph.walk(p));
        }
    }

    for idx in 0..graph.out.len() {
        if graph.remaining == 0 {
            break;
        }
        let (x, y) = graph.out.coords(idx);
        let p = (x as i32, y as i32);
        while !graph.outgoing(p).is_empty() {
            contours.push(graph.walk(p));
        }
    }

    contours
}

/// Number of boundary edges in a mask (edges between differing cells).
pub fn boundary_edge_count(mask: &Tilemap<bool>) -> usize {
    EdgeGraph::new(mask).remaining
}

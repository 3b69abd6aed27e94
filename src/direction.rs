//! Grid directions and direction bitmasks.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// One of the eight unit steps on the grid. `y` grows downwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    R,
    RD,
    D,
    LD,
    L,
    LU,
    U,
    RU,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::R,
        Direction::RD,
        Direction::D,
        Direction::LD,
        Direction::L,
        Direction::LU,
        Direction::U,
        Direction::RU,
    ];

    pub const CARDINAL: [Direction; 4] = [Direction::R, Direction::D, Direction::L, Direction::U];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::R => (1, 0),
            Direction::RD => (1, 1),
            Direction::D => (0, 1),
            Direction::LD => (-1, 1),
            Direction::L => (-1, 0),
            Direction::LU => (-1, -1),
            Direction::U => (0, -1),
            Direction::RU => (1, -1),
        }
    }

    /// Direction of a unit (or diagonal unit) step, if it is one.
    pub fn from_offset(dx: i32, dy: i32) -> Option<Direction> {
        Direction::ALL.iter().copied().find(|d| d.offset() == (dx, dy))
    }

    /// Direction of the sign vector of an arbitrary non-zero displacement.
    pub fn from_displacement(dx: i32, dy: i32) -> Option<Direction> {
        Direction::from_offset(dx.signum(), dy.signum())
    }

    pub fn reverse(self) -> Direction {
        Direction::ALL[(self.index() + 4) % 8]
    }

    pub fn is_diagonal(self) -> bool {
        self.index() % 2 == 1
    }

    /// Dot product of the two step vectors.
    pub fn dot(self, other: Direction) -> i32 {
        let (ax, ay) = self.offset();
        let (bx, by) = other.offset();
        ax * bx + ay * by
    }

    pub fn mask(self) -> DirectionMask {
        DirectionMask::from_bits_truncate(1 << self.index())
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::R => "R",
            Direction::RD => "RD",
            Direction::D => "D",
            Direction::LD => "LD",
            Direction::L => "L",
            Direction::LU => "LU",
            Direction::U => "U",
            Direction::RU => "RU",
        }
    }

    pub fn parse(name: &str) -> Option<Direction> {
        Direction::ALL.iter().copied().find(|d| d.name() == name)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of directions, one bit per `Direction` index.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DirectionMask: u8 {
        const R = 1 << 0;
        const RD = 1 << 1;
        const D = 1 << 2;
        const LD = 1 << 3;
        const L = 1 << 4;
        const LU = 1 << 5;
        const U = 1 << 6;
        const RU = 1 << 7;
    }
}

impl DirectionMask {
    pub fn has(self, direction: Direction) -> bool {
        self.contains(direction.mask())
    }

    /// Directions making a non-negative (or strictly positive) dot product
    /// with `direction`.
    pub fn around(direction: Direction, strict: bool) -> DirectionMask {
        let mut mask = DirectionMask::empty();
        for d in Direction::ALL {
            let dot = d.dot(direction);
            if dot > 0 || (!strict && dot == 0) {
                mask |= d.mask();
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_round_trip_through_from_offset() {
        for d in Direction::ALL {
            let (dx, dy) = d.offset();
            assert_eq!(Direction::from_offset(dx, dy), Some(d));
            assert_eq!(d.reverse().reverse(), d);
        }
        assert_eq!(Direction::from_offset(2, 0), None);
        assert_eq!(Direction::from_displacement(5, -3), Some(Direction::RU));
    }

    #[test]
    fn test_around_excludes_backwards() {
        let forward = DirectionMask::around(Direction::R, false);
        assert!(forward.has(Direction::R));
        assert!(forward.has(Direction::U));
        assert!(forward.has(Direction::RD));
        assert!(!forward.has(Direction::L));
        assert!(!forward.has(Direction::LU));

        let strict = DirectionMask::around(Direction::R, true);
        assert!(!strict.has(Direction::U));
        assert_eq!(strict.bits().count_ones(), 3);
    }
}

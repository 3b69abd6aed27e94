//! Dense rectangular grids shared by every generation stage.
//!
//! All matrices in one generation run share a single coordinate system:
//! `(x, y)` addresses a tile-sized cell, `x` grows to the right and `y`
//! grows downwards. A grid never changes size after construction.

/// A 2D grid of values with a fixed size (no wrapping at the edges).
#[derive(Clone, Debug, PartialEq)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Tilemap<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![T::default(); width * height],
        }
    }
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a grid by evaluating `f` at every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height, "({x}, {y}) outside grid");
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Whether signed coordinates fall inside the grid.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Bounds-checked lookup with signed coordinates.
    pub fn get_checked(&self, x: i32, y: i32) -> Option<&T> {
        if self.contains(x, y) {
            Some(self.get(x as usize, y as usize))
        } else {
            None
        }
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Flat row-major view of the cells.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Convert a row-major index back to coordinates.
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx % self.width, idx / self.width)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Create a new grid of the same size by mapping every value.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Tilemap<U> {
        Tilemap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Combine two grids of equal size cell by cell.
    pub fn zip<U, V>(&self, other: &Tilemap<U>, f: impl Fn(&T, &U) -> V) -> Tilemap<V> {
        assert_eq!(
            (self.width, self.height),
            (other.width, other.height),
            "zip requires grids of equal size"
        );
        Tilemap {
            width: self.width,
            height: self.height,
            data: self.data.iter().zip(other.data.iter()).map(|(a, b)| f(a, b)).collect(),
        }
    }

    /// Get in-bounds 4-connected neighbors (left, right, up, down).
    pub fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(4);
        if x > 0 {
            result.push((x - 1, y));
        }
        if x + 1 < self.width {
            result.push((x + 1, y));
        }
        if y > 0 {
            result.push((x, y - 1));
        }
        if y + 1 < self.height {
            result.push((x, y + 1));
        }
        result
    }

    /// Get in-bounds 8-connected neighbors.
    pub fn neighbors_8(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(8);
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if self.contains(nx, ny) {
                    result.push((nx as usize, ny as usize));
                }
            }
        }
        result
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| (idx % width, idx / width, val))
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data
            .iter_mut()
            .enumerate()
            .map(move |(idx, val)| (idx % width, idx / width, val))
    }
}

impl Tilemap<bool> {
    /// Number of true cells.
    pub fn count_true(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Logical negation of every cell.
    pub fn inverted(&self) -> Self {
        self.map(|&v| !v)
    }
}

impl Tilemap<f32> {
    /// Sample at fractional coordinates using bilinear interpolation.
    /// Coordinates outside the grid are clamped to the border.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x.floor();
        let fy = y - y.floor();

        let clamp_x = |v: i32| v.clamp(0, self.width as i32 - 1) as usize;
        let clamp_y = |v: i32| v.clamp(0, self.height as i32 - 1) as usize;

        let v00 = *self.get(clamp_x(x0), clamp_y(y0));
        let v10 = *self.get(clamp_x(x0 + 1), clamp_y(y0));
        let v01 = *self.get(clamp_x(x0), clamp_y(y0 + 1));
        let v11 = *self.get(clamp_x(x0 + 1), clamp_y(y0 + 1));

        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        v0 * (1.0 - fy) + v1 * fy
    }

    /// Minimum and maximum value in the grid.
    pub fn range(&self) -> (f32, f32) {
        let mut min_v = f32::MAX;
        let mut max_v = f32::MIN;
        for &v in &self.data {
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        (min_v, max_v)
    }
}

/// Offsets of all cells whose centres lie within `radius` of the origin.
pub fn disc_offsets(radius: f32) -> Vec<(i32, i32)> {
    let r = radius.max(0.0).floor() as i32;
    let limit = radius * radius;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f32 <= limit {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Summed-area table over a boolean grid, used for constant-time window counts.
pub struct SummedArea {
    width: usize,
    height: usize,
    sums: Vec<u32>,
}

impl SummedArea {
    pub fn new(mask: &Tilemap<bool>) -> Self {
        let w = mask.width + 1;
        let mut sums = vec![0u32; w * (mask.height + 1)];
        for y in 0..mask.height {
            let mut row = 0u32;
            for x in 0..mask.width {
                row += *mask.get(x, y) as u32;
                sums[(y + 1) * w + x + 1] = sums[y * w + x + 1] + row;
            }
        }
        Self {
            width: mask.width,
            height: mask.height,
            sums,
        }
    }

    /// Count true cells in the half-open window `[x0, x1) x [y0, y1)`,
    /// clipped to the grid. Returns `(true_count, cell_count)`.
    pub fn count(&self, x0: i32, y0: i32, x1: i32, y1: i32) -> (u32, u32) {
        let cx0 = x0.clamp(0, self.width as i32) as usize;
        let cy0 = y0.clamp(0, self.height as i32) as usize;
        let cx1 = x1.clamp(0, self.width as i32) as usize;
        let cy1 = y1.clamp(0, self.height as i32) as usize;
        if cx1 <= cx0 || cy1 <= cy0 {
            return (0, 0);
        }
        let w = self.width + 1;
        let total = self.sums[cy1 * w + cx1] + self.sums[cy0 * w + cx0]
            - self.sums[cy0 * w + cx1]
            - self.sums[cy1 * w + cx0];
        (total, ((cx1 - cx0) * (cy1 - cy0)) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_zip_preserve_size() {
        let a = Tilemap::from_fn(3, 2, |x, y| (x + y) as f32);
        let b = a.map(|&v| v > 1.0);
        let c = a.zip(&b, |&v, &m| if m { v } else { 0.0 });
        assert_eq!((c.width, c.height), (3, 2));
        assert_eq!(*c.get(2, 1), 3.0);
        assert_eq!(*c.get(0, 0), 0.0);
    }

    #[test]
    fn test_neighbors_do_not_wrap() {
        let map: Tilemap<u8> = Tilemap::new(4, 4);
        assert_eq!(map.neighbors(0, 0).len(), 2);
        assert_eq!(map.neighbors_8(0, 0).len(), 3);
        assert_eq!(map.neighbors(1, 1).len(), 4);
        assert!(!map.contains(-1, 0));
        assert!(!map.contains(4, 0));
    }

    #[test]
    fn test_summed_area_counts_windows() {
        let mask = Tilemap::from_fn(4, 4, |x, y| x >= 2 && y >= 1);
        let sat = SummedArea::new(&mask);
        assert_eq!(sat.count(0, 0, 4, 4), (6, 16));
        assert_eq!(sat.count(2, 1, 4, 3), (4, 4));
        assert_eq!(sat.count(-3, -3, 1, 1), (0, 1));
        assert_eq!(sat.count(5, 5, 7, 7), (0, 0));
    }

    #[test]
    fn test_disc_offsets() {
        assert_eq!(disc_offsets(0.0), vec![(0, 0)]);
        assert_eq!(disc_offsets(1.0).len(), 5);
        assert_eq!(disc_offsets(1.5).len(), 9);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let map = Tilemap::from_fn(2, 1, |x, _| x as f32 * 2.0);
        assert!((map.sample_bilinear(0.5, 0.0) - 1.0).abs() < 1e-6);
    }
}

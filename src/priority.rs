//! Array-backed priority structure keyed by `f32`.
//!
//! Every slot of a fixed-size array carries a priority. The structure is
//! a complete binary tournament tree over the slots, so updating one slot
//! and finding the slot with the lowest priority both take O(log n).
//! Ties go to the lowest index, which keeps searches deterministic.

/// Min-priority tournament tree over `size` slots.
#[derive(Clone, Debug)]
pub struct PriorityArray {
    size: usize,
    leaves: usize,
    values: Vec<f32>,
    /// Winning slot index of each internal node.
    winners: Vec<usize>,
}

impl PriorityArray {
    /// Create a structure with every slot set to `initial`.
    pub fn new(size: usize, initial: f32) -> Self {
        let leaves = size.max(1).next_power_of_two();
        let mut values = vec![f32::INFINITY; leaves];
        for v in values.iter_mut().take(size) {
            *v = initial;
        }
        let mut array = Self {
            size,
            leaves,
            values,
            winners: vec![0; 2 * leaves],
        };
        for i in 0..leaves {
            array.winners[leaves + i] = i;
        }
        for node in (1..leaves).rev() {
            array.winners[node] = array.better(array.winners[2 * node], array.winners[2 * node + 1]);
        }
        array
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn better(&self, a: usize, b: usize) -> usize {
        // NaN never wins.
        if self.values[b] < self.values[a] || (self.values[a].is_nan() && !self.values[b].is_nan()) {
            b
        } else {
            a
        }
    }

    pub fn get(&self, index: usize) -> f32 {
        self.values[index]
    }

    pub fn set(&mut self, index: usize, priority: f32) {
        assert!(index < self.size, "priority index {index} out of range");
        self.values[index] = priority;
        let mut node = (self.leaves + index) / 2;
        while node >= 1 {
            self.winners[node] = self.better(self.winners[2 * node], self.winners[2 * node + 1]);
            node /= 2;
        }
    }

    /// Slot holding the lowest priority (lowest index on ties).
    pub fn min_index(&self) -> usize {
        if self.leaves == 1 {
            0
        } else {
            self.winners[1]
        }
    }

    pub fn min_priority(&self) -> f32 {
        if self.size == 0 {
            f32::INFINITY
        } else {
            self.values[self.min_index()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_tracks_updates() {
        let mut pa = PriorityArray::new(5, f32::INFINITY);
        pa.set(3, 2.0);
        pa.set(1, 5.0);
        assert_eq!(pa.min_index(), 3);
        pa.set(1, 1.0);
        assert_eq!(pa.min_index(), 1);
        pa.set(1, f32::INFINITY);
        assert_eq!(pa.min_index(), 3);
        assert_eq!(pa.min_priority(), 2.0);
    }

    #[test]
    fn test_ties_prefer_lowest_index() {
        let mut pa = PriorityArray::new(7, 4.0);
        assert_eq!(pa.min_index(), 0);
        pa.set(0, 9.0);
        assert_eq!(pa.min_index(), 1);
        pa.set(6, -1.0);
        pa.set(5, -1.0);
        assert_eq!(pa.min_index(), 5);
    }

    #[test]
    fn test_single_slot() {
        let mut pa = PriorityArray::new(1, 3.0);
        assert_eq!(pa.min_index(), 0);
        pa.set(0, 1.0);
        assert_eq!(pa.min_priority(), 1.0);
    }
}

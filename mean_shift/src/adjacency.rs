//! Region adjacency under 4-connectivity.

use smallvec::SmallVec;

use crate::error::{try_alloc, Result};
use crate::grid::Grid;

/// Most regions touch only a handful of others.
pub type Neighbours = SmallVec<[u32; 8]>;

/// Sorted, deduplicated neighbour lists per region label.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAdjacency {
    neighbours: Vec<Neighbours>,
}

impl RegionAdjacency {
    /// Scans right and lower neighbours of every pixel; adjacency is stored
    /// in both directions.
    pub fn build(labels: &Grid<u32>, region_count: usize) -> Result<Self> {
        let mut neighbours = try_alloc("adjacency", region_count, Neighbours::new())?;
        let width = labels.width();
        let data = labels.data();

        let mut link = |a: u32, b: u32| {
            if a == b {
                return;
            }
            let list = &mut neighbours[a as usize];
            if list.last() != Some(&b) {
                list.push(b);
            }
            let list = &mut neighbours[b as usize];
            if list.last() != Some(&a) {
                list.push(a);
            }
        };

        for (idx, &label) in data.iter().enumerate() {
            if (idx + 1) % width != 0 {
                link(label, data[idx + 1]);
            }
            if idx + width < data.len() {
                link(label, data[idx + width]);
            }
        }

        for list in &mut neighbours {
            list.sort_unstable();
            list.dedup();
        }

        Ok(Self { neighbours })
    }

    #[inline]
    pub fn neighbours(&self, label: u32) -> &[u32] {
        &self.neighbours[label as usize]
    }

    /// Each adjacent pair once, as `(lower, higher)`.
    pub fn pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.neighbours
            .iter()
            .enumerate()
            .flat_map(|(label, list)| {
                let label = label as u32;
                list.iter()
                    .copied()
                    .filter(move |&other| other > label)
                    .map(move |other| (label, other))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_is_symmetric_and_sorted() {
        // 0 0 1
        // 2 3 1
        // 2 2 2
        let labels = Grid::from_vec(3, 3, vec![0, 0, 1, 2, 3, 1, 2, 2, 2]);
        let adjacency = RegionAdjacency::build(&labels, 4).unwrap();

        assert_eq!(adjacency.neighbours(0), &[1, 2, 3]);
        assert_eq!(adjacency.neighbours(1), &[0, 2, 3]);
        assert_eq!(adjacency.neighbours(2), &[0, 1, 3]);
        assert_eq!(adjacency.neighbours(3), &[0, 1, 2]);
        assert_eq!(adjacency.pairs().count(), 6);
    }

    #[test]
    fn test_diagonal_contact_is_not_adjacency() {
        // 0 1
        // 2 3
        let labels = Grid::from_vec(2, 2, vec![0, 1, 2, 3]);
        let adjacency = RegionAdjacency::build(&labels, 4).unwrap();
        assert_eq!(adjacency.neighbours(0), &[1, 2]);
        assert_eq!(adjacency.neighbours(3), &[1, 2]);
        assert!(!adjacency.pairs().any(|pair| pair == (0, 3) || pair == (1, 2)));
    }

    #[test]
    fn test_single_region_has_no_neighbours() {
        let labels = Grid::new_filled(4, 3, 0u32);
        let adjacency = RegionAdjacency::build(&labels, 1).unwrap();
        assert!(adjacency.neighbours(0).is_empty());
        assert_eq!(adjacency.pairs().count(), 0);
    }

    #[test]
    fn test_single_row_and_column() {
        let row = Grid::from_vec(3, 1, vec![0, 1, 0]);
        let adjacency = RegionAdjacency::build(&row, 2).unwrap();
        assert_eq!(adjacency.neighbours(0), &[1]);

        let column = Grid::from_vec(1, 3, vec![0, 1, 1]);
        let adjacency = RegionAdjacency::build(&column, 2).unwrap();
        assert_eq!(adjacency.neighbours(1), &[0]);
    }
}

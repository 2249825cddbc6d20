//! Region bookkeeping shared by labeling, fusion, pruning and the classic
//! algorithm.

use crate::color::RangeVector;
use crate::error::{try_alloc, Result};
use crate::grid::Grid;

/// A partition of the image into regions with dense labels `0..region_count`.
///
/// `modes[label]` is the region's representative range vector and
/// `counts[label]` its pixel count.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    pub labels: Grid<u32>,
    pub modes: Vec<RangeVector>,
    pub counts: Vec<usize>,
}

impl RegionSet {
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            labels: Grid::from_vec(width, height, Vec::new()),
            modes: Vec::new(),
            counts: Vec::new(),
        }
    }

    #[inline]
    pub fn region_count(&self) -> usize {
        self.modes.len()
    }

    /// Collapses every union-find group into one region.
    ///
    /// New labels follow the order of each group's root, which is its lowest
    /// old label, so untouched regions keep their relative order. The merged
    /// mode is the pixel-weighted average of the members' modes.
    pub fn merge_groups(&mut self, groups: &mut UnionFind) -> Result<()> {
        let old_count = self.region_count();
        let mut remap = try_alloc("label remap", old_count, u32::MAX)?;
        let mut sums: Vec<[f64; 3]> = Vec::new();
        let mut counts: Vec<usize> = Vec::new();

        for label in 0..old_count {
            let root = groups.find(label as u32) as usize;
            if remap[root] == u32::MAX {
                remap[root] = counts.len() as u32;
                sums.push([0.0; 3]);
                counts.push(0);
            }
            let new_label = remap[root] as usize;
            remap[label] = remap[root];

            let weight = self.counts[label] as f64;
            for (sum, value) in sums[new_label].iter_mut().zip(self.modes[label]) {
                *sum += weight * value as f64;
            }
            counts[new_label] += self.counts[label];
        }

        for label in self.labels.data_mut() {
            *label = remap[*label as usize];
        }
        self.modes = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| sum.map(|value| (value / count as f64) as f32))
            .collect();
        self.counts = counts;

        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Checks that labels are dense and counts match the label map.
    pub fn is_consistent(&self) -> bool {
        if self.counts.len() != self.modes.len() {
            return false;
        }
        let mut observed = vec![0usize; self.counts.len()];
        for &label in self.labels.data() {
            match observed.get_mut(label as usize) {
                Some(count) => *count += 1,
                None => return false,
            }
        }
        observed == self.counts && observed.iter().all(|&count| count > 0)
    }
}

/// Euclidean distance between two range vectors.
#[inline]
pub fn color_distance(a: &RangeVector, b: &RangeVector) -> f64 {
    a.iter()
        .zip(b)
        .map(|(a, b)| {
            let diff = *a as f64 - *b as f64;
            diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

// ============================================================================
// Union-find
// ============================================================================

/// Disjoint sets over region labels. The root of a set is always its lowest
/// label.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    pub fn new(len: usize) -> Result<Self> {
        let mut parent = try_alloc("union-find", len, 0u32)?;
        for (label, parent) in parent.iter_mut().enumerate() {
            *parent = label as u32;
        }
        Ok(Self { parent })
    }

    pub fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression
        let mut current = label;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    /// Joins the sets of `a` and `b` and returns the new root.
    pub fn union(&mut self, a: u32, b: u32) -> u32 {
        let root_a = self.find(a);
        let root_b = self.find(b);
        let (root, child) = if root_a <= root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent[child as usize] = root;
        root
    }
}

//! Fusion of adjacent regions with similar modes.
//!
//! Every pass collects adjacent pairs whose mode distance is below the
//! threshold, visits them closest first (ties by lower, then higher label)
//! and merges each region at most once. Passes repeat until no candidate
//! pair remains, so the result does not depend on scan order.

use crate::adjacency::RegionAdjacency;
use crate::error::{try_alloc, Result};
use crate::regions::{color_distance, RegionSet, UnionFind};

/// Fuses regions in place. Returns the number of passes that merged.
pub fn fuse_regions(regions: &mut RegionSet, max_distance: f64) -> Result<usize> {
    let mut passes = 0;

    loop {
        let adjacency = RegionAdjacency::build(&regions.labels, regions.region_count())?;
        let mut candidates: Vec<(f64, u32, u32)> = adjacency
            .pairs()
            .filter_map(|(a, b)| {
                let distance =
                    color_distance(&regions.modes[a as usize], &regions.modes[b as usize]);
                (distance < max_distance).then_some((distance, a, b))
            })
            .collect();
        if candidates.is_empty() {
            break;
        }

        candidates.sort_by(|x, y| {
            x.0.total_cmp(&y.0)
                .then(x.1.cmp(&y.1))
                .then(x.2.cmp(&y.2))
        });

        let mut merged = try_alloc("fusion flags", regions.region_count(), false)?;
        let mut groups = UnionFind::new(regions.region_count())?;
        for &(_, a, b) in &candidates {
            if merged[a as usize] || merged[b as usize] {
                continue;
            }
            merged[a as usize] = true;
            merged[b as usize] = true;
            groups.union(a, b);
        }

        let before = regions.region_count();
        regions.merge_groups(&mut groups)?;
        passes += 1;
        tracing::trace!(
            "Fusion pass {}: {} -> {} regions",
            passes,
            before,
            regions.region_count()
        );
    }

    Ok(passes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::labeling::label_regions;

    fn strip(values: &[f32]) -> RegionSet {
        let filtered: Vec<_> = values.iter().map(|&value| [value, 0.0, 0.0]).collect();
        label_regions(values.len(), 1, &filtered).unwrap()
    }

    #[test]
    fn test_distant_regions_stay_apart() {
        let mut regions = strip(&[0.0, 10.0, 20.0]);
        let passes = fuse_regions(&mut regions, 5.0).unwrap();
        assert_eq!(passes, 0);
        assert_eq!(regions.region_count(), 3);
    }

    #[test]
    fn test_closest_pair_merges_first() {
        // 0 | 4 | 7: (4, 7) is closer, so 4 pairs with 7 and 0 waits.
        let mut regions = strip(&[0.0, 4.0, 7.0]);
        let passes = fuse_regions(&mut regions, 4.5).unwrap();

        assert_eq!(passes, 1);
        assert_eq!(regions.region_count(), 2);
        assert_eq!(regions.labels.data(), &[0, 1, 1]);
        assert_eq!(regions.modes[1][0], 5.5);
    }

    #[test]
    fn test_fusion_repeats_until_stable() {
        // Pass 1 merges (0, 1) and (2, 3); pass 2 merges the two results.
        let mut regions = strip(&[0.0, 1.0, 2.0, 3.0]);
        let passes = fuse_regions(&mut regions, 2.5).unwrap();

        assert_eq!(passes, 2);
        assert_eq!(regions.region_count(), 1);
        assert_eq!(regions.modes[0][0], 1.5);
        assert_eq!(regions.counts, vec![4]);
    }

    #[test]
    fn test_equal_distances_break_ties_by_label() {
        let mut regions = strip(&[0.0, 2.0, 4.0]);
        fuse_regions(&mut regions, 2.5).unwrap();
        // (0, 1) wins the tie. The merged mode 1.0 is 3.0 away from 4.0.
        assert_eq!(regions.labels.data(), &[0, 0, 1]);
        assert_eq!(regions.modes[0][0], 1.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut regions = strip(&[0.0, 3.0]);
        fuse_regions(&mut regions, 3.0).unwrap();
        assert_eq!(regions.region_count(), 2);
    }

    #[test]
    fn test_non_adjacent_similar_regions_stay_apart() {
        let filtered: Vec<_> = [1.0f32, 50.0, 1.0]
            .iter()
            .map(|&value| [value, 0.0, 0.0])
            .collect();
        let mut regions = label_regions(3, 1, &filtered).unwrap();
        fuse_regions(&mut regions, 5.0).unwrap();
        assert_eq!(regions.region_count(), 3);
        assert_eq!(regions.labels, Grid::from_vec(3, 1, vec![0, 1, 2]));
    }
}

//! Removal of regions smaller than the minimum size.
//!
//! Small regions are visited smallest first (ties by label). Each one still
//! below the minimum joins the adjacent group whose pooled mode is closest.
//! Passes repeat until every small region is either large enough or has no
//! neighbour left, so a single-region image is never pruned away.

use crate::adjacency::RegionAdjacency;
use crate::error::{try_alloc, Result};
use crate::regions::{color_distance, RegionSet, UnionFind};

/// Prunes regions in place. Returns the number of passes that merged.
pub fn prune_regions(regions: &mut RegionSet, min_region_size: usize) -> Result<usize> {
    let mut passes = 0;

    loop {
        let mut small: Vec<u32> = (0..regions.region_count() as u32)
            .filter(|&label| regions.counts[label as usize] < min_region_size)
            .collect();
        if small.is_empty() || regions.region_count() <= 1 {
            break;
        }
        small.sort_by_key(|&label| (regions.counts[label as usize], label));

        let adjacency = RegionAdjacency::build(&regions.labels, regions.region_count())?;
        let mut groups = UnionFind::new(regions.region_count())?;
        let mut pooled_counts = regions.counts.clone();
        let mut pooled_sums = try_alloc("pooled modes", regions.region_count(), [0.0f64; 3])?;
        for ((sum, mode), &count) in pooled_sums
            .iter_mut()
            .zip(&regions.modes)
            .zip(&regions.counts)
        {
            *sum = mode.map(|value| value as f64 * count as f64);
        }
        let pooled_mode = |sums: &[[f64; 3]], counts: &[usize], root: u32| -> [f32; 3] {
            let count = counts[root as usize] as f64;
            sums[root as usize].map(|value| (value / count) as f32)
        };

        let mut merges = 0;
        for &label in &small {
            let root = groups.find(label);
            if pooled_counts[root as usize] >= min_region_size {
                continue;
            }
            let mode = pooled_mode(&pooled_sums, &pooled_counts, root);

            let mut best: Option<(f64, u32)> = None;
            for &neighbour in adjacency.neighbours(label) {
                let target = groups.find(neighbour);
                if target == root {
                    continue;
                }
                let distance =
                    color_distance(&mode, &pooled_mode(&pooled_sums, &pooled_counts, target));
                let closer = match best {
                    None => true,
                    Some((best_distance, best_target)) => {
                        distance < best_distance
                            || (distance == best_distance && target < best_target)
                    }
                };
                if closer {
                    best = Some((distance, target));
                }
            }

            let Some((_, target)) = best else {
                continue;
            };
            let new_root = groups.union(root, target);
            let absorbed = if new_root == root { target } else { root };
            pooled_counts[new_root as usize] += pooled_counts[absorbed as usize];
            let absorbed_sum = pooled_sums[absorbed as usize];
            for (sum, value) in pooled_sums[new_root as usize].iter_mut().zip(absorbed_sum) {
                *sum += value;
            }
            merges += 1;
        }

        if merges == 0 {
            break;
        }

        let before = regions.region_count();
        regions.merge_groups(&mut groups)?;
        passes += 1;
        tracing::trace!(
            "Pruning pass {}: {} -> {} regions",
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
    use crate::labeling::label_regions;

    fn regions_from(width: usize, height: usize, values: &[f32]) -> RegionSet {
        let filtered: Vec<_> = values.iter().map(|&value| [value, 0.0, 0.0]).collect();
        label_regions(width, height, &filtered).unwrap()
    }

    #[test]
    fn test_large_regions_untouched() {
        let mut regions = regions_from(4, 1, &[0.0, 0.0, 9.0, 9.0]);
        let passes = prune_regions(&mut regions, 2).unwrap();
        assert_eq!(passes, 0);
        assert_eq!(regions.region_count(), 2);
    }

    #[test]
    fn test_small_region_joins_closest_neighbour() {
        // 10 10 10 | 14 | 30 30 30
        let mut regions = regions_from(7, 1, &[10.0, 10.0, 10.0, 14.0, 30.0, 30.0, 30.0]);
        prune_regions(&mut regions, 2).unwrap();

        assert_eq!(regions.region_count(), 2);
        assert_eq!(regions.labels.data(), &[0, 0, 0, 0, 1, 1, 1]);
        assert_eq!(regions.counts, vec![4, 3]);
        assert_eq!(regions.modes[0][0], 11.0);
        assert_eq!(regions.modes[1][0], 30.0);
    }

    #[test]
    fn test_equal_distance_prefers_lower_label() {
        // 10 10 | 20 | 30 30: the middle region is 10 away from both sides.
        let mut regions = regions_from(5, 1, &[10.0, 10.0, 20.0, 30.0, 30.0]);
        prune_regions(&mut regions, 2).unwrap();
        assert_eq!(regions.labels.data(), &[0, 0, 0, 1, 1]);
        assert_eq!(regions.counts, vec![3, 2]);
    }

    #[test]
    fn test_small_regions_chain_until_large_enough() {
        let mut regions = regions_from(5, 1, &[0.0, 1.0, 2.0, 3.0, 4.0]);
        prune_regions(&mut regions, 3).unwrap();
        assert!(regions.counts.iter().all(|&count| count >= 3));
        assert_eq!(regions.counts.iter().sum::<usize>(), 5);
        assert!(regions.is_consistent());
    }

    #[test]
    fn test_single_region_is_kept() {
        let mut regions = regions_from(2, 2, &[5.0; 4]);
        let passes = prune_regions(&mut regions, 100).unwrap();
        assert_eq!(passes, 0);
        assert_eq!(regions.region_count(), 1);
        assert_eq!(regions.counts, vec![4]);
    }

    #[test]
    fn test_everything_small_collapses_to_one_region() {
        let values: Vec<f32> = (0..12).map(|idx| (idx * 5) as f32).collect();
        let mut regions = regions_from(4, 3, &values);
        prune_regions(&mut regions, 100).unwrap();
        assert_eq!(regions.region_count(), 1);
        assert_eq!(regions.counts, vec![12]);
        assert!((regions.modes[0][0] - 27.5).abs() < 1e-3);
    }
}

// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::road::Point31;

/// A single road point stored in a [KDTree].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub point: Point31,
    pub road_id: i64,
    pub point_index: usize,
}

/// Squared euclidean distance in the 31-bit tile space.
fn square_distance(a: Point31, b: Point31) -> u64 {
    let dx = a.x.abs_diff(b.x) as u64;
    let dy = a.y.abs_diff(b.y) as u64;
    dx * dx + dy * dy
}

/// KDTree implements the [k-d tree data structure](https://en.wikipedia.org/wiki/K-d_tree)
/// over road points, used to snap arbitrary positions onto the road network.
///
/// Distances are compared in the 31-bit Mercator tile space. Since the projection is conformal,
/// this matches great-circle distances over the short ranges used for snapping,
/// but not across the ante meridian (180°/-180° longitude).
#[derive(Debug, Clone)]
pub struct KDTree {
    pivot: Entry,
    left: Option<Box<KDTree>>,
    right: Option<Box<KDTree>>,
}

impl KDTree {
    /// Finds the closest road point to the given position.
    pub fn find_nearest(&self, target: Point31) -> Entry {
        self.find_nearest_impl(target, false).0
    }

    fn find_nearest_impl(&self, target: Point31, x_divides: bool) -> (Entry, u64) {
        let mut best = self.pivot;
        let mut best_dist = square_distance(target, best.point);

        let (target_axis, pivot_axis) = if x_divides {
            (target.x, self.pivot.point.x)
        } else {
            (target.y, self.pivot.point.y)
        };
        let (first, second) = if target_axis < pivot_axis {
            (&self.left, &self.right)
        } else {
            (&self.right, &self.left)
        };

        for (idx, branch) in [first, second].into_iter().enumerate() {
            let Some(branch) = branch else {
                continue;
            };

            // The second branch may only contain a closer point
            // if the splitting axis is closer than the current best candidate.
            let dist_to_axis = target_axis.abs_diff(pivot_axis) as u64;
            if idx == 1 && dist_to_axis * dist_to_axis >= best_dist {
                continue;
            }

            let (alt, alt_dist) = branch.find_nearest_impl(target, !x_divides);
            if alt_dist < best_dist {
                best = alt;
                best_dist = alt_dist;
            }
        }

        return (best, best_dist);
    }

    /// Builds a k-d tree from a mutable slice of [Entries](Entry).
    /// Entries are reordered in the slice while building the tree.
    pub fn build(entries: &mut [Entry]) -> Option<Self> {
        Self::build_impl(entries, false)
    }

    fn build_impl(entries: &mut [Entry], x_divides: bool) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }

        if x_divides {
            entries.sort_unstable_by_key(|e| e.point.x);
        } else {
            entries.sort_unstable_by_key(|e| e.point.y);
        }

        let median = entries.len() / 2;
        let pivot = entries[median];
        let (left, right_and_pivot) = entries.split_at_mut(median);
        Some(Self {
            pivot,
            left: Self::build_impl(left, !x_divides).map(Box::new),
            right: Self::build_impl(&mut right_and_pivot[1..], !x_divides).map(Box::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(road_id: i64, lat: f64, lon: f64) -> Entry {
        Entry {
            point: Point31::from_lat_lon(lat, lon),
            road_id,
            point_index: 0,
        }
    }

    #[test]
    fn kd_tree() {
        let tree = KDTree::build(&mut [
            entry(1, 0.01, 0.01),
            entry(2, 0.01, 0.05),
            entry(3, 0.03, 0.09),
            entry(4, 0.04, 0.03),
            entry(5, 0.04, 0.07),
            entry(6, 0.07, 0.03),
            entry(7, 0.07, 0.01),
            entry(8, 0.08, 0.05),
            entry(9, 0.08, 0.09),
        ])
        .expect("k-d tree from non-empty slice must not be empty");

        let nearest = |lat, lon| tree.find_nearest(Point31::from_lat_lon(lat, lon)).road_id;
        assert_eq!(nearest(0.02, 0.02), 1);
        assert_eq!(nearest(0.05, 0.03), 4);
        assert_eq!(nearest(0.05, 0.08), 5);
        assert_eq!(nearest(0.09, 0.06), 8);
        assert_eq!(nearest(0.07, 0.03), 6);
    }

    #[test]
    fn empty() {
        assert!(KDTree::build(&mut []).is_none());
    }
}

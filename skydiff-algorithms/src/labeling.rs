//! Connected component labeling of a significance mask.
//!
//! Two-pass scan with a union-find table for label equivalences. Final labels
//! are consecutive from 1 in raster order of each region's first pixel;
//! 0 marks background.
#![allow(clippy::cast_possible_truncation)]

use ndarray::{Array2, ArrayView2};
use skydiff_core::Connectivity;

/// Union-Find data structure for label equivalences.
struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new() -> Self {
        // Slot 0 is reserved for background.
        Self {
            parent: vec![0],
            rank: vec![0],
        }
    }

    fn make_set(&mut self) -> u32 {
        let id = self.parent.len() as u32;
        self.parent.push(id);
        self.rank.push(0);
        id
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut current = x;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, x: u32, y: u32) {
        let px = self.find(x);
        let py = self.find(y);

        if px == py {
            return;
        }

        match self.rank[px as usize].cmp(&self.rank[py as usize]) {
            std::cmp::Ordering::Less => self.parent[px as usize] = py,
            std::cmp::Ordering::Greater => self.parent[py as usize] = px,
            std::cmp::Ordering::Equal => {
                self.parent[py as usize] = px;
                self.rank[px as usize] += 1;
            }
        }
    }
}

/// Pixel count and bounding box of one labeled region (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBounds {
    /// Label id (1-based).
    pub label: u32,
    /// Number of pixels carrying the label.
    pub area: usize,
    /// First row.
    pub row_min: usize,
    /// Last row.
    pub row_max: usize,
    /// First column.
    pub col_min: usize,
    /// Last column.
    pub col_max: usize,
}

impl RegionBounds {
    fn new(label: u32, row: usize, col: usize) -> Self {
        Self {
            label,
            area: 0,
            row_min: row,
            row_max: row,
            col_min: col,
            col_max: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.area += 1;
        self.row_min = self.row_min.min(row);
        self.row_max = self.row_max.max(row);
        self.col_min = self.col_min.min(col);
        self.col_max = self.col_max.max(col);
    }
}

/// Label image plus per-region bounds, indexed by `label - 1`.
#[derive(Debug, Clone)]
pub struct LabelMap {
    /// Label of every pixel, 0 for background.
    pub labels: Array2<u32>,
    /// Bounds of each region in label order.
    pub regions: Vec<RegionBounds>,
}

impl LabelMap {
    /// Number of labeled regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if no region was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Labels the connected `true` regions of `mask`.
#[must_use]
pub fn label_regions(mask: &ArrayView2<bool>, connectivity: Connectivity) -> LabelMap {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut uf = UnionFind::new();
    let mut neighbors: Vec<u32> = Vec::with_capacity(4);

    // First pass: provisional labels and equivalences.
    for row in 0..rows {
        for col in 0..cols {
            if !mask[[row, col]] {
                continue;
            }

            neighbors.clear();
            if col > 0 && labels[[row, col - 1]] > 0 {
                neighbors.push(labels[[row, col - 1]]);
            }
            if row > 0 && labels[[row - 1, col]] > 0 {
                neighbors.push(labels[[row - 1, col]]);
            }
            if connectivity == Connectivity::Eight && row > 0 {
                if col > 0 && labels[[row - 1, col - 1]] > 0 {
                    neighbors.push(labels[[row - 1, col - 1]]);
                }
                if col + 1 < cols && labels[[row - 1, col + 1]] > 0 {
                    neighbors.push(labels[[row - 1, col + 1]]);
                }
            }

            let label = match neighbors.iter().min() {
                None => uf.make_set(),
                Some(&min_label) => {
                    for &other in &neighbors {
                        uf.union(min_label, other);
                    }
                    min_label
                }
            };
            labels[[row, col]] = label;
        }
    }

    // Second pass: resolve roots and renumber in raster order.
    let mut root_to_final = vec![0u32; uf.parent.len()];
    let mut regions: Vec<RegionBounds> = Vec::new();

    for ((row, col), label) in labels.indexed_iter_mut() {
        if *label == 0 {
            continue;
        }
        let root = uf.find(*label) as usize;
        if root_to_final[root] == 0 {
            let next = regions.len() as u32 + 1;
            root_to_final[root] = next;
            regions.push(RegionBounds::new(next, row, col));
        }
        let final_label = root_to_final[root];
        regions[final_label as usize - 1].include(row, col);
        *label = final_label;
    }

    LabelMap { labels, regions }
}

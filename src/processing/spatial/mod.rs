pub mod neighbors;
pub mod shank_map;

pub use neighbors::NeighborTable;
pub use shank_map::{ShankMap, SiteDesc};

use serde::{Deserialize, Serialize};

/// Spatial referencing policy. At most one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SpatialMode {
    #[default]
    Off,
    Local {
        inner_radius: u16,
        outer_radius: u16,
    },
    Global,
    /// Global average within each of `stride` interleaved multiplexer groups.
    GlobalStrided {
        stride: usize,
    },
}

impl SpatialMode {
    pub fn local_near() -> Self {
        SpatialMode::Local {
            inner_radius: 0,
            outer_radius: 2,
        }
    }

    pub fn local_far() -> Self {
        SpatialMode::Local {
            inner_radius: 2,
            outer_radius: 8,
        }
    }
}

// SPATIAL REFERENCER ----------------------------------------------------------

/// Subtracts a neighborhood or shank-wide mean from each neural channel.
///
/// Means use integer sums and truncating division; results saturate to the
/// i16 range. Neural channels are the first `map.len()` of each row.
#[derive(Debug, Clone)]
pub struct SpatialReferencer {
    mode: SpatialMode,
    table: Option<NeighborTable>,
    shank_of: Vec<u16>,
    used: Vec<bool>,
    // per-timepoint scratch, sized at construction
    row_copy: Vec<i16>,
    shank_sum: Vec<i32>,
    shank_count: Vec<i32>,
}

impl SpatialReferencer {
    pub fn new(mode: SpatialMode, map: &ShankMap) -> Self {
        let table = match mode {
            SpatialMode::Local {
                inner_radius,
                outer_radius,
            } => Some(NeighborTable::build(map, inner_radius, outer_radius)),
            _ => None,
        };
        if let SpatialMode::GlobalStrided { stride } = mode {
            assert!(stride > 0, "strided global average needs stride >= 1");
        }
        let n_shanks = map.shanks().max(1) as usize;

        Self {
            mode,
            table,
            shank_of: map.sites().iter().map(|s| s.shank).collect(),
            used: map.sites().iter().map(|s| s.used).collect(),
            row_copy: vec![0; map.len()],
            shank_sum: vec![0; n_shanks],
            shank_count: vec![0; n_shanks],
        }
    }

    pub fn mode(&self) -> SpatialMode {
        self.mode
    }

    pub fn table(&self) -> Option<&NeighborTable> {
        self.table.as_ref()
    }

    pub fn channel_count(&self) -> usize {
        self.used.len()
    }

    pub fn is_active(&self) -> bool {
        self.mode != SpatialMode::Off
    }

    /// References every `step`-th timepoint of the block in place.
    pub fn apply(&mut self, block: &mut [i16], ntpts: usize, stride: usize, step: usize) {
        if !self.is_active() {
            return;
        }
        let n = self.used.len();
        assert!(
            n <= stride,
            "referencer built for {} channels, block stride is {}",
            n,
            stride
        );

        let mode = self.mode;
        for row in block
            .chunks_exact_mut(stride)
            .take(ntpts)
            .step_by(step.max(1))
        {
            let neural = &mut row[..n];
            match mode {
                SpatialMode::Off => {}
                SpatialMode::Local { .. } => self.apply_local(neural),
                SpatialMode::Global => self.apply_global(neural, 0, 1, 0),
                SpatialMode::GlobalStrided { stride: groups } => {
                    for g in 0..groups {
                        self.apply_global(neural, g, groups, 1);
                    }
                }
            }
        }
    }

    fn apply_local(&mut self, neural: &mut [i16]) {
        let table = match &self.table {
            Some(t) => t,
            None => return,
        };
        self.row_copy.copy_from_slice(neural);
        for (ic, v) in neural.iter_mut().enumerate() {
            let list = table.neighbors(ic);
            if list.is_empty() {
                continue;
            }
            let sum: i32 = list.iter().map(|&j| self.row_copy[j] as i32).sum();
            let mean = sum / list.len() as i32;
            *v = saturate(self.row_copy[ic] as i32 - mean);
        }
    }

    // Shank means over channels `first, first + step, ...`; a shank is
    // corrected only when more than `min_count` used channels contribute.
    fn apply_global(&mut self, neural: &mut [i16], first: usize, step: usize, min_count: i32) {
        self.shank_sum.iter_mut().for_each(|s| *s = 0);
        self.shank_count.iter_mut().for_each(|c| *c = 0);

        for ic in (first..neural.len()).step_by(step) {
            if self.used[ic] {
                let s = self.shank_of[ic] as usize;
                self.shank_sum[s] += neural[ic] as i32;
                self.shank_count[s] += 1;
            }
        }
        for ic in (first..neural.len()).step_by(step) {
            let s = self.shank_of[ic] as usize;
            let count = self.shank_count[s];
            if count > min_count {
                neural[ic] = saturate(neural[ic] as i32 - self.shank_sum[s] / count);
            }
        }
    }
}

fn saturate(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

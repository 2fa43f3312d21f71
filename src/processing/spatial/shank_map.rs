use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Physical position of one neural channel's electrode site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteDesc {
    pub shank: u16,
    pub col: u16,
    pub row: u16,
    #[serde(default = "default_used")]
    pub used: bool,
}

fn default_used() -> bool {
    true
}

impl SiteDesc {
    pub fn new(shank: u16, col: u16, row: u16, used: bool) -> Self {
        Self {
            shank,
            col,
            row,
            used,
        }
    }

    fn key(&self) -> (u16, u16, u16) {
        (self.shank, self.col, self.row)
    }
}

/// Channel → site table for the neural channels of a stream.
///
/// `used == false` marks reference or disconnected sites. The inverse
/// `(shank, col, row) → channel` lookup covers used sites only; it is built
/// on first request and kept until the map is edited.
#[derive(Debug, Clone, Default)]
pub struct ShankMap {
    shanks: u16,
    cols: u16,
    rows: u16,
    sites: Vec<SiteDesc>,
    inverse: OnceLock<HashMap<(u16, u16, u16), usize>>,
}

impl PartialEq for ShankMap {
    fn eq(&self, other: &Self) -> bool {
        self.shanks == other.shanks
            && self.cols == other.cols
            && self.rows == other.rows
            && self.sites == other.sites
    }
}

impl ShankMap {
    pub fn new(shanks: u16, cols: u16, rows: u16, sites: Vec<SiteDesc>) -> Self {
        for (ic, s) in sites.iter().enumerate() {
            assert!(
                s.shank < shanks && s.col < cols && s.row < rows,
                "site {:?} of channel {} outside {}x{}x{} map",
                s,
                ic,
                shanks,
                cols,
                rows
            );
        }
        Self {
            shanks,
            cols,
            rows,
            sites,
            inverse: OnceLock::new(),
        }
    }

    /// Fills shanks, then rows, then columns in channel order, all sites
    /// used, stopping after `n_channels`.
    pub fn grid(shanks: u16, cols: u16, rows: u16, n_channels: usize) -> Self {
        let sites = (0..shanks)
            .flat_map(|s| (0..rows).flat_map(move |r| (0..cols).map(move |c| SiteDesc::new(s, c, r, true))))
            .take(n_channels)
            .collect();
        Self::new(shanks, cols, rows, sites)
    }

    /// Single shank, two columns.
    pub fn linear(n_channels: usize) -> Self {
        let rows = ((n_channels + 1) / 2).max(1) as u16;
        Self::grid(1, 2, rows, n_channels)
    }

    pub fn shanks(&self) -> u16 {
        self.shanks
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, channel: usize) -> &SiteDesc {
        &self.sites[channel]
    }

    pub fn sites(&self) -> &[SiteDesc] {
        &self.sites
    }

    pub fn is_used(&self, channel: usize) -> bool {
        self.sites.get(channel).map_or(false, |s| s.used)
    }

    pub fn set_used(&mut self, channel: usize, used: bool) {
        self.sites[channel].used = used;
        self.inverse = OnceLock::new();
    }

    pub fn inverse(&self) -> &HashMap<(u16, u16, u16), usize> {
        self.inverse.get_or_init(|| {
            self.sites
                .iter()
                .enumerate()
                .filter(|(_, s)| s.used)
                .map(|(ic, s)| (s.key(), ic))
                .collect()
        })
    }

    pub fn channel_at(&self, shank: u16, col: u16, row: u16) -> Option<usize> {
        self.inverse().get(&(shank, col, row)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_fills_rows_then_shanks() {
        let map = ShankMap::grid(2, 2, 3, 12);
        assert_eq!(map.site(0), &SiteDesc::new(0, 0, 0, true));
        assert_eq!(map.site(1), &SiteDesc::new(0, 1, 0, true));
        assert_eq!(map.site(2), &SiteDesc::new(0, 0, 1, true));
        assert_eq!(map.site(6), &SiteDesc::new(1, 0, 0, true));
        assert_eq!(map.site(11), &SiteDesc::new(1, 1, 2, true));
    }

    #[test]
    fn test_inverse_skips_unused_sites() {
        let mut map = ShankMap::linear(8);
        assert_eq!(map.channel_at(0, 1, 2), Some(5));
        map.set_used(5, false);
        assert_eq!(map.channel_at(0, 1, 2), None);
        assert_eq!(map.channel_at(0, 0, 2), Some(4));
    }

    #[test]
    fn test_linear_odd_count() {
        let map = ShankMap::linear(5);
        assert_eq!(map.len(), 5);
        assert_eq!(map.rows(), 3);
        assert_eq!(map.site(4), &SiteDesc::new(0, 0, 2, true));
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn test_site_outside_map_panics() {
        ShankMap::new(1, 2, 2, vec![SiteDesc::new(0, 2, 0, true)]);
    }
}

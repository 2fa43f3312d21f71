use super::shank_map::ShankMap;

/// Local-average neighborhoods, one sorted channel list per neural channel.
///
/// Distance is the larger of the column and row offsets on the same shank.
/// A channel's list holds the used sites with `inner < distance <= outer`;
/// the site itself is always in the excluded inner disk. Channels whose own
/// site is unused get an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborTable {
    inner_radius: u16,
    outer_radius: u16,
    lists: Vec<Vec<usize>>,
}

impl NeighborTable {
    pub fn build(map: &ShankMap, inner_radius: u16, outer_radius: u16) -> Self {
        let lists = (0..map.len())
            .map(|ic| neighbors_of(map, ic, inner_radius, outer_radius))
            .collect();
        log::debug!(
            "neighbor table built: {} channels, radius ({}, {}]",
            map.len(),
            inner_radius,
            outer_radius
        );
        Self {
            inner_radius,
            outer_radius,
            lists,
        }
    }

    pub fn radii(&self) -> (u16, u16) {
        (self.inner_radius, self.outer_radius)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn neighbors(&self, channel: usize) -> &[usize] {
        &self.lists[channel]
    }
}

fn window(center: u16, radius: u16, limit: u16) -> std::ops::Range<u16> {
    let lo = center.saturating_sub(radius);
    let hi = (center as u32 + radius as u32 + 1).min(limit as u32) as u16;
    lo..hi
}

fn neighbors_of(map: &ShankMap, ic: usize, inner_radius: u16, outer_radius: u16) -> Vec<usize> {
    let site = map.site(ic);
    if !site.used {
        return Vec::new();
    }

    let mut inner = Vec::new();
    for col in window(site.col, inner_radius, map.cols()) {
        for row in window(site.row, inner_radius, map.rows()) {
            if let Some(j) = map.channel_at(site.shank, col, row) {
                inner.push(j);
            }
        }
    }
    // self is excluded even when its own key is shadowed by a duplicate
    inner.push(ic);

    let mut outer = Vec::new();
    for col in window(site.col, outer_radius, map.cols()) {
        for row in window(site.row, outer_radius, map.rows()) {
            if let Some(j) = map.channel_at(site.shank, col, row) {
                if !inner.contains(&j) {
                    outer.push(j);
                }
            }
        }
    }
    outer.sort_unstable();
    outer
}

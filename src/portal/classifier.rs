use std::collections::HashSet;
use std::sync::OnceLock;

use super::models::{BlockPos, RegionCoord};

/// Region-axis distances that host a portal. Block distance is 16× the value
/// (156 → 2 500, 1 874 995 → 29 999 920).
pub const PORTAL_AXIS_VALUES: [u32; 20] = [
    156, 312, 625, 1_250, 1_875, 3_125, 6_250, 12_500, 31_250, 62_500,
    125_000, 250_000, 312_500, 625_000, 937_500, 1_250_000, 1_562_500,
    1_812_500, 1_843_750, 1_874_995,
];

#[derive(Clone, Debug)]
pub struct PortalAxisSet {
    values: HashSet<u32>,
}

impl Default for PortalAxisSet {
    fn default() -> Self {
        Self { values: PORTAL_AXIS_VALUES.iter().copied().collect() }
    }
}

impl PortalAxisSet {
    /// Process-wide instance; built once on first use.
    pub fn standard() -> &'static PortalAxisSet {
        static SET: OnceLock<PortalAxisSet> = OnceLock::new();
        SET.get_or_init(PortalAxisSet::default)
    }

    pub fn contains(&self, axis: u32) -> bool {
        self.values.contains(&axis)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_portal_region(&self, rx: i32, rz: i32) -> bool {
        // unsigned_abs keeps i32::MIN in range
        self.contains(rx.unsigned_abs()) && self.contains(rz.unsigned_abs())
    }
}

pub fn is_portal_region(rx: i32, rz: i32) -> bool {
    PortalAxisSet::standard().is_portal_region(rx, rz)
}

pub fn is_portal_block(pos: BlockPos) -> bool {
    let r = pos.region();
    is_portal_region(r.x, r.z)
}

/// Every portal region, all four sign quadrants, sorted.
pub fn portal_regions() -> Vec<RegionCoord> {
    let mut out = Vec::with_capacity(PORTAL_AXIS_VALUES.len() * PORTAL_AXIS_VALUES.len() * 4);
    for &ax in PORTAL_AXIS_VALUES.iter() {
        for &az in PORTAL_AXIS_VALUES.iter() {
            let (x, z) = (ax as i32, az as i32);
            for (sx, sz) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
                out.push(RegionCoord::new(x * sx, z * sz));
            }
        }
    }
    out.sort_unstable();
    out
}

use log::trace;

use super::models::BlockPos;
use crate::world::WorldAccess;

/// Horizontal margin scanned around the anchor on each side.
pub const PROBE_MARGIN: i32 = 5;
/// Vertical span: one below ground up to just above the exit gateway cage.
pub const PROBE_BELOW: i32 = 1;
pub const PROBE_ABOVE: i32 = 11;

/// Inclusive bounds of the probed volume: (min, max).
pub fn probe_bounds(anchor: BlockPos) -> (BlockPos, BlockPos) {
    (
        anchor.offset(-PROBE_MARGIN, -PROBE_BELOW, -PROBE_MARGIN),
        anchor.offset(PROBE_MARGIN, PROBE_ABOVE, PROBE_MARGIN),
    )
}

/// True if any frame, void or gateway block lies in the 11×13×11 box around
/// the anchor (`anchor.y` is the ground level). Unknown blocks and read
/// failures count as "no trace".
pub fn portal_exists<W: WorldAccess + ?Sized>(world: &W, anchor: BlockPos) -> bool {
    let (min, max) = probe_bounds(anchor);
    for x in min.x..=max.x {
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                let pos = BlockPos::new(x, y, z);
                match world.block(pos) {
                    Ok(Some(b)) if b.material.is_portal_trace() => {
                        trace!("probe {}: found {:?} at {}", world.name(), b.material, pos);
                        return true;
                    }
                    Ok(_) => {}
                    Err(e) => trace!("probe {}: unreadable {} ({:#})", world.name(), pos, e),
                }
            }
        }
    }
    false
}

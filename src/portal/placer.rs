use anyhow::{bail, Result};
use log::{debug, info};

use super::models::{BlockPos, BlockState, Facing, Material};
use super::prober::portal_exists;
use crate::world::WorldAccess;

/// Footprint edge length; the footprint spans `anchor ..= anchor + 4`.
pub const FOOTPRINT: i32 = 5;
/// Layers above ground cleared to air.
pub const CLEAR_HEIGHT: i32 = 3;
/// Exit gateway height above ground.
pub const GATEWAY_OFFSET: i32 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlaceOutcome {
    Placed { blocks_written: usize },
    AlreadyPresent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FootprintCell {
    /// Left as pre-existing terrain.
    Corner,
    Frame(Facing),
    Interior,
}

/// Classify a footprint cell by its offset from the anchor (both in 0..5).
pub fn footprint_cell(dx: i32, dz: i32) -> FootprintCell {
    let last = FOOTPRINT - 1;
    let x_edge = dx == 0 || dx == last;
    let z_edge = dz == 0 || dz == last;
    if x_edge && z_edge {
        return FootprintCell::Corner;
    }
    match frame_facing(dx, dz) {
        Some(f) => FootprintCell::Frame(f),
        None => FootprintCell::Interior,
    }
}

/// Inward facing of a border cell; `None` for interior cells.
pub fn frame_facing(dx: i32, dz: i32) -> Option<Facing> {
    let last = FOOTPRINT - 1;
    if dx == 0 {
        Some(Facing::East)
    } else if dx == last {
        Some(Facing::West)
    } else if dz == 0 {
        Some(Facing::South)
    } else if dz == last {
        Some(Facing::North)
    } else {
        None
    }
}

/// Centre block of the exit gateway for a structure anchored at `anchor`.
pub fn gateway_center(anchor: BlockPos) -> BlockPos {
    let mid = FOOTPRINT / 2;
    anchor.offset(mid, GATEWAY_OFFSET, mid)
}

/// Ground and cleared-air writes for the footprint at `anchor`. Corners are
/// left out.
pub fn footprint_writes(anchor: BlockPos) -> Vec<(BlockPos, BlockState)> {
    let mut writes = Vec::new();
    for dx in 0..FOOTPRINT {
        for dz in 0..FOOTPRINT {
            let ground = anchor.offset(dx, 0, dz);
            match footprint_cell(dx, dz) {
                FootprintCell::Corner => {}
                FootprintCell::Frame(facing) => writes.push((ground, BlockState::frame(facing))),
                FootprintCell::Interior => writes.push((ground, BlockState::of(Material::PortalVoid))),
            }
            for dy in 1..=CLEAR_HEIGHT {
                writes.push((ground.offset(0, dy, 0), BlockState::AIR));
            }
        }
    }
    writes
}

/// Gateway block with a bedrock sandwich: bedrock two above and two below,
/// plus the four horizontal neighbours of the blocks directly above and
/// below. Those two blocks themselves are left untouched.
pub fn exit_gateway_writes(center: BlockPos) -> Vec<(BlockPos, BlockState)> {
    let cage = BlockState::of(Material::Bedrock);
    let above = center.up();
    let below = center.down();
    let mut writes = vec![
        (center, BlockState::of(Material::Gateway)),
        (above.up(), cage),
        (below.down(), cage),
    ];
    for layer in [above, below] {
        for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            writes.push((layer.offset(dx, 0, dz), cage));
        }
    }
    writes
}

/// Build the portal at `anchor` (`anchor.y` is ground level) unless any trace
/// of one is already nearby. All-or-nothing per call: the footprint and the
/// exit gateway go out as one batch, and a batch with any target outside
/// build height or in an unloaded region is rejected before the first write.
pub fn place_portal<W: WorldAccess + ?Sized>(world: &mut W, anchor: BlockPos) -> Result<PlaceOutcome> {
    if portal_exists(world, anchor) {
        debug!("{}: portal already present near {}", world.name(), anchor);
        return Ok(PlaceOutcome::AlreadyPresent);
    }

    let mut writes = footprint_writes(anchor);
    writes.extend(exit_gateway_writes(gateway_center(anchor)));
    if let Some((pos, _)) = writes.iter().find(|(pos, _)| !world.writable(*pos)) {
        bail!("{}: cannot place portal at {}: {} is not writable", world.name(), anchor, pos);
    }
    world.apply(&writes)?;
    info!("{}: placed portal at {} ({} blocks)", world.name(), anchor, writes.len());
    Ok(PlaceOutcome::Placed { blocks_written: writes.len() })
}

/// Write only the caged exit gateway around `center`. Returns the block count.
pub fn create_exit_gateway<W: WorldAccess + ?Sized>(world: &mut W, center: BlockPos) -> Result<usize> {
    let writes = exit_gateway_writes(center);
    world.apply(&writes)?;
    Ok(writes.len())
}

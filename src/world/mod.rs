//! Host capabilities consumed by the portal core, plus reference hosts.
//!
//! The core only ever talks to a world through [`WorldAccess`] and to the
//! actor roster through [`Host`]. `memory` and `sqlite` are two block stores
//! implementing `WorldAccess`; `sim_host` wires named worlds and actors into a
//! `Host` for the CLI and the tests.

use anyhow::{bail, Result};

use crate::portal::models::{ActorId, ActorSnapshot, BlockPos, BlockState, Location, Vec3};

pub mod memory;
pub mod sim_host;
pub mod sqlite;
pub mod terrain;

pub trait WorldAccess {
    fn name(&self) -> &str;

    /// `Ok(None)` means the block is unknown (ungenerated or out of bounds).
    fn block(&self, pos: BlockPos) -> Result<Option<BlockState>>;

    fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Result<()>;

    /// Whether `set_block` at `pos` can succeed (inside build height, loaded).
    fn writable(&self, pos: BlockPos) -> bool {
        let _ = pos;
        true
    }

    /// Write a batch of blocks. Every target is checked with [`writable`]
    /// before the first write, so a rejected batch leaves the world as it was.
    ///
    /// [`writable`]: WorldAccess::writable
    fn apply(&mut self, writes: &[(BlockPos, BlockState)]) -> Result<()> {
        if let Some((pos, _)) = writes.iter().find(|(pos, _)| !self.writable(*pos)) {
            bail!("{}: {} is not writable, batch of {} rejected", self.name(), pos, writes.len());
        }
        for (pos, state) in writes {
            self.set_block(*pos, *state)?;
        }
        Ok(())
    }

    /// Y of the highest solid block in the column.
    fn highest_solid_y(&self, x: i32, z: i32) -> Result<i32>;

    /// Break the block as a player would: it drops and becomes air.
    /// Returns `false` when there was nothing to break.
    fn break_naturally(&mut self, pos: BlockPos) -> Result<bool>;
}

pub trait Host {
    type World: WorldAccess;

    fn world(&self, name: &str) -> Option<&Self::World>;

    fn world_mut(&mut self, name: &str) -> Option<&mut Self::World>;

    fn world_names(&self) -> Vec<String>;

    /// Actors currently loaded in `world`.
    fn loaded_actors(&self, world: &str) -> Vec<ActorSnapshot>;

    fn teleport(&mut self, actor: ActorId, to: &Location) -> Result<()>;

    fn set_velocity(&mut self, actor: ActorId, velocity: Vec3) -> Result<()>;
}

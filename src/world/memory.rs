use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};

use super::terrain::Terrain;
use super::WorldAccess;
use crate::portal::models::{BlockPos, BlockState, Material, RegionCoord};

/// In-memory world: generated terrain plus a map of changed blocks.
#[derive(Clone, Debug)]
pub struct MemoryWorld {
    name: String,
    terrain: Terrain,
    overrides: HashMap<BlockPos, BlockState>,
    unloaded: HashSet<RegionCoord>,
    writes: u64,
    drops: Vec<(BlockPos, Material)>,
}

impl MemoryWorld {
    pub fn new(name: impl Into<String>, terrain: Terrain) -> Self {
        Self {
            name: name.into(),
            terrain,
            overrides: HashMap::new(),
            unloaded: HashSet::new(),
            writes: 0,
            drops: Vec::new(),
        }
    }

    pub fn flat(name: impl Into<String>, surface_y: i32) -> Self {
        Self::new(name, Terrain::flat(surface_y, Material::Grass))
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Number of `set_block` calls that reached storage.
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    pub fn drops(&self) -> &[(BlockPos, Material)] {
        &self.drops
    }

    /// Changed blocks, for before/after comparisons.
    pub fn snapshot(&self) -> HashMap<BlockPos, BlockState> {
        self.overrides.clone()
    }

    /// Mark a region as unloaded: reads report unknown, writes fail.
    pub fn unload_region(&mut self, region: RegionCoord) {
        self.unloaded.insert(region);
    }

    pub fn load_region(&mut self, region: RegionCoord) {
        self.unloaded.remove(&region);
    }

    /// Block material, treating unknown blocks as air. Test/report helper.
    pub fn material_at(&self, pos: BlockPos) -> Material {
        self.block(pos).ok().flatten().map(|b| b.material).unwrap_or(Material::Air)
    }

    fn is_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.contains(&pos.region())
    }
}

impl WorldAccess for MemoryWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn block(&self, pos: BlockPos) -> Result<Option<BlockState>> {
        if !self.is_loaded(pos) || !self.terrain.in_bounds(pos.y) {
            return Ok(None);
        }
        if let Some(b) = self.overrides.get(&pos) {
            return Ok(Some(*b));
        }
        Ok(self.terrain.generated(pos))
    }

    fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Result<()> {
        if !self.is_loaded(pos) {
            bail!("{}: region {} not loaded for write at {}", self.name, pos.region(), pos);
        }
        if !self.terrain.in_bounds(pos.y) {
            bail!("{}: y={} outside build height", self.name, pos.y);
        }
        self.overrides.insert(pos, state);
        self.writes += 1;
        Ok(())
    }

    fn writable(&self, pos: BlockPos) -> bool {
        self.is_loaded(pos) && self.terrain.in_bounds(pos.y)
    }

    fn highest_solid_y(&self, x: i32, z: i32) -> Result<i32> {
        for y in (self.terrain.min_y..=self.terrain.max_y).rev() {
            let pos = BlockPos::new(x, y, z);
            if let Some(b) = self.block(pos)? {
                if b.material.is_solid() {
                    return Ok(y);
                }
            }
        }
        Ok(self.terrain.min_y)
    }

    fn break_naturally(&mut self, pos: BlockPos) -> Result<bool> {
        let current = match self.block(pos)? {
            Some(b) => b,
            None => bail!("{}: cannot break unknown block at {}", self.name, pos),
        };
        if current.material.is_air() {
            return Ok(false);
        }
        self.set_block(pos, BlockState::AIR)?;
        self.drops.push((pos, current.material));
        Ok(true)
    }
}

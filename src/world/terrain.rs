use serde::{Deserialize, Serialize};

use crate::portal::models::{BlockPos, BlockState, Material};

/// Flat terrain: bedrock floor, stone up to the surface, one surface layer.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub min_y: i32,
    pub max_y: i32,
    pub surface_y: i32,
    pub surface: Material,
}

impl Default for Terrain {
    fn default() -> Self {
        Self { min_y: -64, max_y: 319, surface_y: 64, surface: Material::Grass }
    }
}

impl Terrain {
    pub fn flat(surface_y: i32, surface: Material) -> Self {
        Self { surface_y, surface, ..Self::default() }
    }

    /// Empty world (every in-bounds block is air).
    pub fn void() -> Self {
        Self { surface_y: i32::MIN, ..Self::default() }
    }

    pub fn in_bounds(&self, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y
    }

    pub fn generated(&self, pos: BlockPos) -> Option<BlockState> {
        if !self.in_bounds(pos.y) {
            return None;
        }
        let m = if pos.y > self.surface_y {
            Material::Air
        } else if pos.y == self.min_y {
            Material::Bedrock
        } else if pos.y == self.surface_y {
            self.surface
        } else {
            Material::Stone
        };
        Some(BlockState::of(m))
    }

    /// Highest generated solid y; `min_y` when the column is empty.
    pub fn generated_highest_solid(&self) -> i32 {
        if self.surface_y < self.min_y {
            return self.min_y;
        }
        let top = self.surface_y.min(self.max_y);
        if top == self.surface_y && !self.surface.is_solid() {
            (top - 1).max(self.min_y)
        } else {
            top
        }
    }
}

use anyhow::{bail, Result};
use std::path::Path;

use crate::portal::models::BlockPos;
use crate::portal::prober::{portal_exists, probe_bounds};
use crate::world::sqlite::SqliteWorld;

pub fn cmd_probe(db_path: &Path, world: &str, anchor: BlockPos) -> Result<bool> {
    let Some(w) = SqliteWorld::open_ro(db_path, world)? else {
        bail!("world {} is not registered in {}", world, db_path.display());
    };
    let (min, max) = probe_bounds(anchor);
    let found = portal_exists(&w, anchor);
    println!(
        "{}: probe {}..{} -> {}",
        world,
        min,
        max,
        if found { "portal present" } else { "no portal" }
    );
    Ok(found)
}

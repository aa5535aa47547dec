use anyhow::{bail, Result};
use std::path::Path;

use crate::portal::config::Config;
use crate::portal::coordinator::{LoadOutcome, RegionLoadCoordinator};
use crate::portal::models::RegionCoord;
use crate::world::sim_host::SimHost;
use crate::world::sqlite::SqliteWorld;

/// One region-load event for `(x, z)` in the source world, persisted to the
/// database. The cooldown does not outlive the process, so every call gets a
/// fresh attempt.
pub fn place_region(db_path: &Path, cfg: &Config, x: i32, z: i32) -> Result<LoadOutcome> {
    let Some(world) = SqliteWorld::open(db_path, &cfg.source_world)? else {
        bail!("world {} is not registered in {} (run init-db)", cfg.source_world, db_path.display());
    };
    let mut host = SimHost::new();
    host.add_world(world);
    let coordinator = RegionLoadCoordinator::new(cfg);
    coordinator.on_region_load(&mut host, &cfg.source_world, RegionCoord::new(x, z))
}

pub fn cmd_place(db_path: &Path, cfg: &Config, x: i32, z: i32) -> Result<()> {
    let outcome = place_region(db_path, cfg, x, z)?;
    match outcome {
        LoadOutcome::Placed { anchor, blocks_written } => {
            println!("Placed portal at {} ({} blocks written)", anchor, blocks_written)
        }
        LoadOutcome::AlreadyPresent { anchor } => println!("Portal already present near {}", anchor),
        LoadOutcome::NotPortalRegion => println!("Region ({}, {}) is not a portal region", x, z),
        other => println!("No placement: {:?}", other),
    }
    Ok(())
}

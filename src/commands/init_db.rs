use anyhow::Result;
use log::info;
use std::path::Path;

use crate::db::{create_tables, open_rw};
use crate::portal::config::Config;
use crate::portal::models::Material;
use crate::world::sqlite::{register_world, world_names};
use crate::world::terrain::Terrain;

/// Create the schema and register the source (grass surface) and mirror
/// (stone surface) worlds. Re-running updates their terrain parameters.
pub fn cmd_init_db(db_path: &Path, cfg: &Config, surface_y: i32) -> Result<Vec<String>> {
    let mut conn = open_rw(db_path)?;
    create_tables(&mut conn)?;
    register_world(&conn, &cfg.source_world, &Terrain::flat(surface_y, Material::Grass))?;
    register_world(&conn, &cfg.mirror_world, &Terrain::flat(surface_y, Material::Stone))?;
    let names = world_names(&conn)?;
    info!("initialised {} with worlds {:?}", db_path.display(), names);
    println!("Database ready: {}", db_path.display());
    for n in &names {
        println!("  world {}", n);
    }
    Ok(names)
}

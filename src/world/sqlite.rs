use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

use super::terrain::Terrain;
use super::WorldAccess;
use crate::db::{open_ro, open_rw, with_tx};
use crate::portal::models::{
    ActorId, ActorKind, ActorSnapshot, BlockPos, BlockState, Facing, Location, Material, Vec3,
};

/// A world persisted in SQLite: terrain parameters in `worlds`, changed
/// blocks in `blocks`, broken blocks logged in `drops`.
pub struct SqliteWorld {
    conn: Connection,
    name: String,
    terrain: Terrain,
    writes: u64,
}

impl std::fmt::Debug for SqliteWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteWorld")
            .field("name", &self.name)
            .field("terrain", &self.terrain)
            .field("writes", &self.writes)
            .finish()
    }
}

pub fn register_world(conn: &Connection, name: &str, terrain: &Terrain) -> Result<()> {
    conn.execute(
        "INSERT INTO worlds (name, min_y, max_y, surface_y, surface) VALUES (?1,?2,?3,?4,?5)
         ON CONFLICT(name) DO UPDATE SET min_y=excluded.min_y, max_y=excluded.max_y,
             surface_y=excluded.surface_y, surface=excluded.surface",
        params![name, terrain.min_y, terrain.max_y, terrain.surface_y, terrain.surface.as_str()],
    )?;
    Ok(())
}

pub fn world_names(conn: &Connection) -> Result<Vec<String>> {
    let mut q = conn.prepare("SELECT name FROM worlds ORDER BY name")?;
    let rows = q.query_map([], |r| r.get::<_, String>(0))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn load_terrain(conn: &Connection, name: &str) -> Result<Option<Terrain>> {
    let row: Option<(i32, i32, i32, String)> = conn
        .query_row(
            "SELECT min_y, max_y, surface_y, surface FROM worlds WHERE name=?1",
            params![name],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((min_y, max_y, surface_y, surface)) = row else {
        return Ok(None);
    };
    let surface: Material = surface.parse().with_context(|| format!("world {} surface", name))?;
    Ok(Some(Terrain { min_y, max_y, surface_y, surface }))
}

impl SqliteWorld {
    /// Open a registered world read-write. `Ok(None)` if no such world exists.
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Result<Option<Self>> {
        let conn = open_rw(path)?;
        Self::from_connection(conn, name)
    }

    /// Read-only handle; writes fail with the SQLite error.
    pub fn open_ro<P: AsRef<Path>>(path: P, name: &str) -> Result<Option<Self>> {
        let conn = open_ro(path)?;
        Self::from_connection(conn, name)
    }

    pub fn from_connection(conn: Connection, name: &str) -> Result<Option<Self>> {
        let Some(terrain) = load_terrain(&conn, name)? else {
            return Ok(None);
        };
        Ok(Some(Self { conn, name: name.to_string(), terrain, writes: 0 }))
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn write_count(&self) -> u64 {
        self.writes
    }

    pub fn drop_count(&self) -> Result<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM drops WHERE world=?1",
            params![self.name],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    fn column_overrides(&self, x: i32, z: i32) -> Result<HashMap<i32, bool>> {
        let mut q = self
            .conn
            .prepare_cached("SELECT y, solid FROM blocks WHERE world=?1 AND x=?2 AND z=?3")?;
        let rows = q.query_map(params![self.name, x, z], |r| Ok((r.get::<_, i32>(0)?, r.get::<_, bool>(1)?)))?;
        let mut out = HashMap::new();
        for r in rows {
            let (y, solid) = r?;
            out.insert(y, solid);
        }
        Ok(out)
    }
}

fn decode_state(material: String, facing: Option<String>, lit: bool) -> Result<BlockState> {
    let material: Material = material.parse()?;
    let facing = match facing {
        Some(s) => {
            let c = s.chars().next().ok_or_else(|| anyhow!("empty facing"))?;
            Some(Facing::from_char(c).ok_or_else(|| anyhow!("bad facing '{}'", s))?)
        }
        None => None,
    };
    Ok(BlockState { material, facing, lit })
}

fn upsert_block(conn: &Connection, world: &str, pos: BlockPos, state: BlockState) -> Result<()> {
    let facing = state.facing.map(|f| f.as_char().to_string());
    let mut q = conn.prepare_cached(
        "INSERT INTO blocks (world, x, y, z, material, facing, lit, solid) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
         ON CONFLICT(world, x, y, z) DO UPDATE SET material=excluded.material, facing=excluded.facing,
             lit=excluded.lit, solid=excluded.solid",
    )?;
    q.execute(params![
        world,
        pos.x,
        pos.y,
        pos.z,
        state.material.as_str(),
        facing,
        state.lit,
        state.material.is_solid()
    ])?;
    Ok(())
}

impl WorldAccess for SqliteWorld {
    fn name(&self) -> &str {
        &self.name
    }

    fn block(&self, pos: BlockPos) -> Result<Option<BlockState>> {
        if !self.terrain.in_bounds(pos.y) {
            return Ok(None);
        }
        let mut q = self.conn.prepare_cached(
            "SELECT material, facing, lit FROM blocks WHERE world=?1 AND x=?2 AND y=?3 AND z=?4",
        )?;
        let row: Option<(String, Option<String>, bool)> = q
            .query_row(params![self.name, pos.x, pos.y, pos.z], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .optional()?;
        match row {
            Some((m, f, lit)) => Ok(Some(decode_state(m, f, lit)?)),
            None => Ok(self.terrain.generated(pos)),
        }
    }

    fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Result<()> {
        if !self.writable(pos) {
            bail!("{}: y={} outside build height", self.name, pos.y);
        }
        upsert_block(&self.conn, &self.name, pos, state)?;
        self.writes += 1;
        Ok(())
    }

    fn writable(&self, pos: BlockPos) -> bool {
        self.terrain.in_bounds(pos.y)
    }

    fn apply(&mut self, writes: &[(BlockPos, BlockState)]) -> Result<()> {
        if let Some((pos, _)) = writes.iter().find(|(pos, _)| !self.writable(*pos)) {
            bail!("{}: {} outside build height, batch of {} rejected", self.name, pos, writes.len());
        }
        let name = &self.name;
        with_tx(&mut self.conn, |tx| {
            for (pos, state) in writes {
                upsert_block(tx, name, *pos, *state)?;
            }
            Ok(())
        })?;
        self.writes += writes.len() as u64;
        Ok(())
    }

    fn highest_solid_y(&self, x: i32, z: i32) -> Result<i32> {
        let overrides = self.column_overrides(x, z)?;
        let generated_top = self.terrain.generated_highest_solid();
        for y in (self.terrain.min_y..=self.terrain.max_y).rev() {
            match overrides.get(&y) {
                Some(true) => return Ok(y),
                Some(false) => continue,
                None if y <= generated_top => {
                    let solid = self.terrain.generated(BlockPos::new(x, y, z)).map(|b| b.material.is_solid());
                    if solid == Some(true) {
                        return Ok(y);
                    }
                }
                None => {}
            }
        }
        Ok(self.terrain.min_y)
    }

    fn break_naturally(&mut self, pos: BlockPos) -> Result<bool> {
        let current = self
            .block(pos)?
            .ok_or_else(|| anyhow!("{}: cannot break unknown block at {}", self.name, pos))?;
        if current.material.is_air() {
            return Ok(false);
        }
        let name = self.name.clone();
        with_tx(&mut self.conn, |tx| {
            tx.execute(
                "INSERT INTO blocks (world, x, y, z, material, facing, lit, solid) VALUES (?1,?2,?3,?4,'air',NULL,0,0)
                 ON CONFLICT(world, x, y, z) DO UPDATE SET material='air', facing=NULL, lit=0, solid=0",
                params![name, pos.x, pos.y, pos.z],
            )?;
            tx.execute(
                "INSERT INTO drops (world, x, y, z, material) VALUES (?1,?2,?3,?4,?5)",
                params![name, pos.x, pos.y, pos.z, current.material.as_str()],
            )?;
            Ok(())
        })?;
        self.writes += 1;
        Ok(true)
    }
}

pub fn load_actors(conn: &Connection) -> Result<Vec<ActorSnapshot>> {
    let mut q = conn.prepare(
        "SELECT id, kind, world, px, py, pz, vx, vy, vz, mounted, has_riders FROM actors ORDER BY id",
    )?;
    let rows = q.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            Vec3::new(r.get(3)?, r.get(4)?, r.get(5)?),
            Vec3::new(r.get(6)?, r.get(7)?, r.get(8)?),
            r.get::<_, bool>(9)?,
            r.get::<_, bool>(10)?,
        ))
    })?;
    let mut out = Vec::new();
    for r in rows {
        let (id, kind, world, position, velocity, mounted, has_riders) = r?;
        out.push(ActorSnapshot {
            id: ActorId(id as u64),
            kind: kind.parse::<ActorKind>()?,
            location: Location::new(world, position),
            velocity,
            mounted,
            has_riders,
        });
    }
    Ok(out)
}

pub fn save_actors(conn: &mut Connection, actors: &[ActorSnapshot]) -> Result<()> {
    with_tx(conn, |tx| {
        let mut ins = tx.prepare(
            "INSERT INTO actors (id, kind, world, px, py, pz, vx, vy, vz, mounted, has_riders)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(id) DO UPDATE SET kind=excluded.kind, world=excluded.world,
                 px=excluded.px, py=excluded.py, pz=excluded.pz,
                 vx=excluded.vx, vy=excluded.vy, vz=excluded.vz,
                 mounted=excluded.mounted, has_riders=excluded.has_riders",
        )?;
        for a in actors {
            let p = a.location.position;
            let v = a.velocity;
            ins.execute(params![
                a.id.0 as i64,
                a.kind.as_str(),
                a.location.world,
                p.x, p.y, p.z,
                v.x, v.y, v.z,
                a.mounted,
                a.has_riders
            ])?;
        }
        Ok(())
    })
}

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

pub fn create_tables(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let worlds_columns: BTreeSet<&'static str> =
        ["name", "min_y", "max_y", "surface_y", "surface"].into_iter().collect();
    let blocks_columns: BTreeSet<&'static str> =
        ["world", "x", "y", "z", "material", "facing", "lit", "solid"].into_iter().collect();
    let actors_columns: BTreeSet<&'static str> = [
        "id", "kind", "world", "px", "py", "pz", "vx", "vy", "vz", "mounted", "has_riders",
    ]
    .into_iter()
    .collect();

    // Stale layouts from older builds are dropped and recreated.
    if table_exists(conn, "blocks")? && !table_has_columns(conn, "blocks", &blocks_columns)? {
        conn.execute("DROP TABLE blocks", [])?;
    }
    if table_exists(conn, "actors")? && !table_has_columns(conn, "actors", &actors_columns)? {
        conn.execute("DROP TABLE actors", [])?;
    }
    if table_exists(conn, "worlds")? && !table_has_columns(conn, "worlds", &worlds_columns)? {
        conn.execute_batch("DROP TABLE IF EXISTS drops; DROP TABLE IF EXISTS blocks; DROP TABLE worlds;")?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS worlds (
            name      TEXT PRIMARY KEY,
            min_y     INTEGER NOT NULL,
            max_y     INTEGER NOT NULL,
            surface_y INTEGER NOT NULL,
            surface   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS blocks (
            world    TEXT NOT NULL REFERENCES worlds(name),
            x        INTEGER NOT NULL,
            y        INTEGER NOT NULL,
            z        INTEGER NOT NULL,
            material TEXT NOT NULL,
            facing   TEXT CHECK (facing IS NULL OR facing IN ('N','S','E','W')),
            lit      INTEGER NOT NULL DEFAULT 0,
            solid    INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (world, x, y, z)
        );

        CREATE INDEX IF NOT EXISTS blocks_column ON blocks(world, x, z);

        CREATE TABLE IF NOT EXISTS drops (
            id       INTEGER PRIMARY KEY,
            world    TEXT NOT NULL REFERENCES worlds(name),
            x        INTEGER NOT NULL,
            y        INTEGER NOT NULL,
            z        INTEGER NOT NULL,
            material TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS actors (
            id         INTEGER PRIMARY KEY,
            kind       TEXT NOT NULL,
            world      TEXT NOT NULL,
            px         REAL NOT NULL,
            py         REAL NOT NULL,
            pz         REAL NOT NULL,
            vx         REAL NOT NULL DEFAULT 0,
            vy         REAL NOT NULL DEFAULT 0,
            vz         REAL NOT NULL DEFAULT 0,
            mounted    INTEGER NOT NULL DEFAULT 0,
            has_riders INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;
    Ok(())
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let v: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v.is_some())
}

pub fn table_has_columns(conn: &Connection, table: &str, expected: &BTreeSet<&'static str>) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(1))?;
    let mut have: BTreeSet<String> = BTreeSet::new();
    for r in rows {
        have.insert(r?);
    }
    Ok(expected.iter().all(|c| have.contains(*c)))
}

pub fn open_ro<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("open {} read-only", path.display()))?;
    // Wait for a writer holding the lock
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(conn)
}

pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn with_tx<T, F: FnOnce(&Transaction) -> Result<T>>(conn: &mut Connection, f: F) -> Result<T> {
    // IMMEDIATE takes the reserved lock up-front
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn create_tables_creates_required_tables() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let mut conn = open_rw(tmp.path())?;
        create_tables(&mut conn)?;
        for t in ["worlds", "blocks", "drops", "actors"] {
            assert!(table_exists(&conn, t)?, "expected table {} to exist", t);
        }
        Ok(())
    }

    #[test]
    fn create_tables_replaces_stale_layout() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let mut conn = open_rw(tmp.path())?;
        conn.execute_batch("CREATE TABLE actors (id INTEGER PRIMARY KEY, name TEXT);")?;
        create_tables(&mut conn)?;
        let cols: BTreeSet<&'static str> = ["kind", "px", "has_riders"].into_iter().collect();
        assert!(table_has_columns(&conn, "actors", &cols)?);
        Ok(())
    }

    #[test]
    fn create_tables_is_idempotent() -> Result<()> {
        let tmp = NamedTempFile::new().unwrap();
        let mut conn = open_rw(tmp.path())?;
        create_tables(&mut conn)?;
        conn.execute(
            "INSERT INTO worlds(name,min_y,max_y,surface_y,surface) VALUES ('world',-64,319,64,'grass')",
            [],
        )?;
        create_tables(&mut conn)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM worlds", [], |r| r.get(0))?;
        assert_eq!(n, 1);
        Ok(())
    }
}

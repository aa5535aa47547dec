use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

use extended_portals::commands::init_db::cmd_init_db;
use extended_portals::commands::place::place_region;
use extended_portals::commands::simulate::{cmd_simulate, run_scenario, sqlite_host, Scenario};
use extended_portals::commands::survey::survey_regions;
use extended_portals::portal::clock::ManualClock;
use extended_portals::portal::config::Config;
use extended_portals::portal::coordinator::{LoadOutcome, RegionLoadCoordinator};
use extended_portals::portal::models::{ActorId, BlockPos, Material, RegionCoord};
use extended_portals::portal::placer::gateway_center;
use extended_portals::portal::prober::portal_exists;
use extended_portals::world::sqlite::{load_actors, SqliteWorld};
use extended_portals::world::WorldAccess;
use extended_portals::db;

fn init(tmp: &NamedTempFile) -> Result<Config> {
    let cfg = Config { db: Some(tmp.path().to_path_buf()), ..Config::default() };
    cmd_init_db(tmp.path(), &cfg, 64)?;
    Ok(cfg)
}

#[test]
fn init_registers_both_worlds() -> Result<()> {
    let tmp = NamedTempFile::new().unwrap();
    let cfg = init(&tmp)?;
    let names = cmd_init_db(tmp.path(), &cfg, 70)?;
    assert_eq!(names, vec!["world".to_string(), "world_the_end".to_string()]);
    let end = SqliteWorld::open_ro(tmp.path(), "world_the_end")?.expect("registered");
    assert_eq!(end.terrain().surface_y, 70);
    assert_eq!(end.terrain().surface, Material::Stone);
    Ok(())
}

#[test]
fn placement_persists_and_is_detected() -> Result<()> {
    let tmp = NamedTempFile::new().unwrap();
    let cfg = init(&tmp)?;

    let out = place_region(tmp.path(), &cfg, -625, 1_250)?;
    let anchor = match out {
        LoadOutcome::Placed { anchor, blocks_written } => {
            assert_eq!(blocks_written, 107);
            anchor
        }
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(anchor, BlockPos::new(-9993, 64, 20007));

    // fresh process, fresh cooldown: the prober stops a second structure
    assert!(matches!(place_region(tmp.path(), &cfg, -625, 1_250)?, LoadOutcome::AlreadyPresent { .. }));
    assert_eq!(place_region(tmp.path(), &cfg, 0, 1_250)?, LoadOutcome::NotPortalRegion);

    let w = SqliteWorld::open_ro(tmp.path(), "world")?.expect("registered");
    assert!(portal_exists(&w, anchor));
    let gateway = w.block(gateway_center(anchor))?.expect("known block");
    assert_eq!(gateway.material, Material::Gateway);
    // corner keeps its terrain
    assert_eq!(w.block(anchor)?.map(|b| b.material), Some(Material::Grass));
    Ok(())
}

#[test]
fn survey_finds_placed_portals() -> Result<()> {
    let tmp = NamedTempFile::new().unwrap();
    let cfg = init(&tmp)?;
    place_region(tmp.path(), &cfg, 156, -156)?;
    place_region(tmp.path(), &cfg, 312, 312)?;

    let regions = [
        RegionCoord::new(156, -156),
        RegionCoord::new(156, 156),
        RegionCoord::new(312, 312),
        RegionCoord::new(-312, 312),
    ];
    let report = survey_regions(tmp.path(), "world", &regions)?;
    assert_eq!(report.checked, 4);
    assert_eq!(report.present, vec![RegionCoord::new(156, -156), RegionCoord::new(312, 312)]);

    assert!(survey_regions(tmp.path(), "world_nether", &regions).is_err());
    Ok(())
}

#[test]
fn cooldown_spans_loads_within_one_coordinator() -> Result<()> {
    let tmp = NamedTempFile::new().unwrap();
    let cfg = init(&tmp)?;
    let scenario = Scenario::default();
    let mut host = sqlite_host(tmp.path(), &scenario, &cfg)?;
    let clock = Arc::new(ManualClock::new(5_000));
    let c = RegionLoadCoordinator::with_clock(&cfg, clock.clone());

    let r = RegionCoord::new(1_875, -3_125);
    assert!(matches!(c.on_region_load(&mut host, "world", r)?, LoadOutcome::Placed { .. }));
    clock.advance(15_000);
    assert_eq!(c.on_region_load(&mut host, "world", r)?, LoadOutcome::CoolingDown);
    clock.advance(15_000);
    assert!(matches!(c.on_region_load(&mut host, "world", r)?, LoadOutcome::AlreadyPresent { .. }));
    Ok(())
}

const SCENARIO: &str = r#"{
    "ticks": 20,
    "actors": [
        {"id": 7, "world": "world", "position": {"x": 2505.5, "y": 74.0, "z": 2465.5},
         "velocity": {"x": 0.0, "y": 0.0, "z": 400.0}}
    ],
    "region_loads": [{"tick": 0, "x": 156, "z": 156}]
}"#;

#[test]
fn simulation_on_sqlite_persists_blocks_and_actors() -> Result<()> {
    let tmp = NamedTempFile::new().unwrap();
    let cfg = init(&tmp)?;
    let mut f = NamedTempFile::new()?;
    write!(f, "{}", SCENARIO)?;

    let report = cmd_simulate(&cfg, f.path(), None, false, false)?;
    assert!(matches!(report.placements[0].outcome, LoadOutcome::Placed { .. }));
    assert_eq!(report.transits.len(), 1);
    let t = &report.transits[0].transit;
    assert!((t.velocity.length() - 200.0).abs() < 1e-9);

    let conn = db::open_ro(tmp.path())?;
    let actors = load_actors(&conn)?;
    assert_eq!(actors.len(), 1);
    assert_eq!(actors[0].id, ActorId(7));
    assert_eq!(actors[0].location.world, "world_the_end");

    let end = SqliteWorld::open_ro(tmp.path(), "world_the_end")?.expect("registered");
    let g = gateway_center(BlockPos::new(2503, 64, 2503));
    assert_eq!(end.block(g.down())?.map(|b| b.material), Some(Material::Obsidian));
    Ok(())
}

#[test]
fn in_memory_simulation_matches_sqlite_outcome() -> Result<()> {
    let scenario = Scenario::from_json(SCENARIO)?;
    let cfg = Config::default();
    let mut host = extended_portals::commands::simulate::memory_host(&scenario, &cfg);
    let report = run_scenario(&mut host, &scenario, &cfg, 20, false)?;
    assert_eq!(report.transits.len(), 1);
    assert_eq!(report.transits[0].transit.destination.world, "world_the_end");
    Ok(())
}

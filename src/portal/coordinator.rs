use anyhow::{ensure, Context, Result};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::classifier::PortalAxisSet;
use super::clock::{Clock, SystemClock};
use super::config::Config;
use super::models::{BlockPos, RegionCoord};
use super::placer::{place_portal, PlaceOutcome};
use crate::world::{Host, WorldAccess};

/// Offset of the structure anchor inside its region.
pub const ANCHOR_OFFSET: i32 = 7;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    OtherWorld,
    CoolingDown,
    NotPortalRegion,
    WorldMissing,
    Placed { anchor: BlockPos, blocks_written: usize },
    AlreadyPresent { anchor: BlockPos },
}

/// Reacts to region loads in the source world and places portals in
/// eligible regions, throttled per region.
///
/// The cooldown map is keyed by [`RegionCoord::key`] and holds the time of
/// the last placement attempt. Only eligible regions are ever recorded, so
/// it is bounded by the 1 600 portal regions even without sweeping.
pub struct RegionLoadCoordinator {
    source_world: String,
    cooldown_ms: u64,
    sweep_after_ms: Option<u64>,
    axes: &'static PortalAxisSet,
    clock: Arc<dyn Clock>,
    cooldowns: DashMap<i64, u64>,
}

impl std::fmt::Debug for RegionLoadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionLoadCoordinator")
            .field("source_world", &self.source_world)
            .field("cooldown_ms", &self.cooldown_ms)
            .field("tracked_regions", &self.cooldowns.len())
            .finish()
    }
}

/// Anchor block column for a region: offset (7, 7) from its origin.
pub fn region_anchor(region: RegionCoord) -> Result<(i32, i32)> {
    let x = region
        .x
        .checked_mul(16)
        .with_context(|| format!("region {} outside block range", region))?;
    let z = region
        .z
        .checked_mul(16)
        .with_context(|| format!("region {} outside block range", region))?;
    Ok((x | ANCHOR_OFFSET, z | ANCHOR_OFFSET))
}

impl RegionLoadCoordinator {
    pub fn new(cfg: &Config) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            source_world: cfg.source_world.clone(),
            cooldown_ms: cfg.cooldown_ms,
            sweep_after_ms: cfg.sweep_after_ms(),
            axes: PortalAxisSet::standard(),
            clock,
            cooldowns: DashMap::new(),
        }
    }

    pub fn tracked_regions(&self) -> usize {
        self.cooldowns.len()
    }

    pub fn last_attempt(&self, region: RegionCoord) -> Option<u64> {
        self.cooldowns.get(&region.key()).map(|v| *v)
    }

    fn cooling_down(&self, key: i64, now: u64) -> bool {
        if self.cooldown_ms == 0 {
            return false;
        }
        match self.cooldowns.get(&key) {
            Some(last) => now.saturating_sub(*last) < self.cooldown_ms,
            None => false,
        }
    }

    pub fn on_region_load<H: Host>(&self, host: &mut H, world: &str, region: RegionCoord) -> Result<LoadOutcome> {
        if !world.eq_ignore_ascii_case(&self.source_world) {
            return Ok(LoadOutcome::OtherWorld);
        }

        let key = region.key();
        ensure!(
            RegionCoord::from_key(key) == region,
            "region key {:#x} does not round-trip for {}",
            key,
            region
        );
        let now = self.clock.now_millis();
        if self.cooling_down(key, now) {
            debug!("region {} in {} still cooling down", region, world);
            return Ok(LoadOutcome::CoolingDown);
        }

        if !self.axes.is_portal_region(region.x, region.z) {
            return Ok(LoadOutcome::NotPortalRegion);
        }

        let Some(w) = host.world_mut(world) else {
            warn!("region load for {} but world {} is not available", region, world);
            return Ok(LoadOutcome::WorldMissing);
        };

        let (ax, az) = region_anchor(region)?;
        let ground_y = w.highest_solid_y(ax + 1, az + 1)?;
        let anchor = BlockPos::new(ax, ground_y, az);
        let outcome = match place_portal(w, anchor)? {
            PlaceOutcome::Placed { blocks_written } => {
                info!("region {}: portal placed at {}", region, anchor);
                LoadOutcome::Placed { anchor, blocks_written }
            }
            PlaceOutcome::AlreadyPresent => LoadOutcome::AlreadyPresent { anchor },
        };

        // Recorded even when nothing was written: the cooldown throttles probing.
        if self.cooldown_ms > 0 {
            self.cooldowns.insert(key, now);
        }
        Ok(outcome)
    }

    /// Drop cooldown entries older than the sweep age. Returns how many went.
    pub fn sweep(&self) -> usize {
        let Some(max_age) = self.sweep_after_ms else {
            return 0;
        };
        let now = self.clock.now_millis();
        let before = self.cooldowns.len();
        self.cooldowns.retain(|_, last| now.saturating_sub(*last) < max_age);
        let removed = before.saturating_sub(self.cooldowns.len());
        if removed > 0 {
            debug!("swept {} stale cooldown entries", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::clock::ManualClock;
    use crate::portal::models::Material;
    use crate::world::memory::MemoryWorld;
    use crate::world::sim_host::SimHost;

    fn host() -> SimHost<MemoryWorld> {
        let mut h = SimHost::new();
        h.add_world(MemoryWorld::flat("world", 64));
        h.add_world(MemoryWorld::flat("world_the_end", 48));
        h
    }

    fn coordinator(clock: Arc<ManualClock>) -> RegionLoadCoordinator {
        RegionLoadCoordinator::with_clock(&Config::default(), clock)
    }

    #[test]
    fn anchor_is_offset_seven() -> Result<()> {
        assert_eq!(region_anchor(RegionCoord::new(156, -156))?, (2503, -2489));
        assert_eq!(region_anchor(RegionCoord::new(0, -1))?, (7, -9));
        assert!(region_anchor(RegionCoord::new(i32::MAX, 0)).is_err());
        Ok(())
    }

    #[test]
    fn places_portal_in_eligible_region() -> Result<()> {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let c = coordinator(clock);
        let mut h = host();
        let out = c.on_region_load(&mut h, "world", RegionCoord::new(156, 156))?;
        let anchor = BlockPos::new(2503, 64, 2503);
        assert!(matches!(out, LoadOutcome::Placed { anchor: a, .. } if a == anchor));
        let w = h.world("world").unwrap();
        assert_eq!(w.material_at(BlockPos::new(2505, 74, 2505)), Material::Gateway);
        assert_eq!(c.last_attempt(RegionCoord::new(156, 156)), Some(1_000_000));
        Ok(())
    }

    #[test]
    fn world_name_match_is_case_insensitive() -> Result<()> {
        let c = coordinator(Arc::new(ManualClock::new(0)));
        let mut h = SimHost::new();
        h.add_world(MemoryWorld::flat("WORLD", 64));
        let out = c.on_region_load(&mut h, "WORLD", RegionCoord::new(156, 156))?;
        assert!(matches!(out, LoadOutcome::Placed { .. }));
        assert_eq!(
            c.on_region_load(&mut h, "world_nether", RegionCoord::new(156, 156))?,
            LoadOutcome::OtherWorld
        );
        Ok(())
    }

    #[test]
    fn ineligible_regions_are_not_tracked() -> Result<()> {
        let c = coordinator(Arc::new(ManualClock::new(0)));
        let mut h = host();
        assert_eq!(c.on_region_load(&mut h, "world", RegionCoord::new(156, 157))?, LoadOutcome::NotPortalRegion);
        assert_eq!(c.on_region_load(&mut h, "world", RegionCoord::new(0, 0))?, LoadOutcome::NotPortalRegion);
        assert_eq!(c.tracked_regions(), 0);
        Ok(())
    }

    #[test]
    fn cooldown_limits_attempts() -> Result<()> {
        let clock = Arc::new(ManualClock::new(100_000));
        let c = coordinator(clock.clone());
        let mut h = host();
        let r = RegionCoord::new(-312, 625);
        assert!(matches!(c.on_region_load(&mut h, "world", r)?, LoadOutcome::Placed { .. }));
        clock.advance(29_999);
        assert_eq!(c.on_region_load(&mut h, "world", r)?, LoadOutcome::CoolingDown);
        clock.advance(1);
        assert!(matches!(c.on_region_load(&mut h, "world", r)?, LoadOutcome::AlreadyPresent { .. }));
        // the no-op attempt reset the window
        clock.advance(10_000);
        assert_eq!(c.on_region_load(&mut h, "world", r)?, LoadOutcome::CoolingDown);
        Ok(())
    }

    #[test]
    fn zero_cooldown_disables_throttle() -> Result<()> {
        let cfg = Config { cooldown_ms: 0, ..Config::default() };
        let c = RegionLoadCoordinator::with_clock(&cfg, Arc::new(ManualClock::new(0)));
        let mut h = host();
        let r = RegionCoord::new(156, 156);
        c.on_region_load(&mut h, "world", r)?;
        assert!(matches!(c.on_region_load(&mut h, "world", r)?, LoadOutcome::AlreadyPresent { .. }));
        assert_eq!(c.tracked_regions(), 0);
        Ok(())
    }

    #[test]
    fn missing_world_is_abandoned_quietly() -> Result<()> {
        let c = coordinator(Arc::new(ManualClock::new(0)));
        let mut h: SimHost<MemoryWorld> = SimHost::new();
        assert_eq!(c.on_region_load(&mut h, "world", RegionCoord::new(156, 156))?, LoadOutcome::WorldMissing);
        assert_eq!(c.tracked_regions(), 0);
        Ok(())
    }

    #[test]
    fn write_fault_propagates_without_recording() {
        let c = coordinator(Arc::new(ManualClock::new(0)));
        let mut h = host();
        let r = RegionCoord::new(156, 156);
        h.world_mut("world").unwrap().unload_region(r);
        assert!(c.on_region_load(&mut h, "world", r).is_err());
        assert_eq!(c.tracked_regions(), 0);
    }

    #[test]
    fn sweep_drops_stale_entries() -> Result<()> {
        let clock = Arc::new(ManualClock::new(0));
        let c = coordinator(clock.clone());
        let mut h = host();
        c.on_region_load(&mut h, "world", RegionCoord::new(156, 156))?;
        clock.advance(60_000);
        c.on_region_load(&mut h, "world", RegionCoord::new(312, 312))?;
        clock.advance(60_000);
        assert_eq!(c.sweep(), 1);
        assert_eq!(c.last_attempt(RegionCoord::new(156, 156)), None);
        assert_eq!(c.last_attempt(RegionCoord::new(312, 312)), Some(60_000));
        Ok(())
    }

    #[test]
    fn shared_coordinator_across_worker_threads() -> Result<()> {
        let clock = Arc::new(ManualClock::new(0));
        let c = coordinator(clock.clone());
        let regions = [
            RegionCoord::new(156, 156),
            RegionCoord::new(-156, 312),
            RegionCoord::new(625, -625),
            RegionCoord::new(-1_250, -1_250),
        ];

        let results = std::thread::scope(|s| -> Result<Vec<(RegionCoord, LoadOutcome)>> {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let c = &c;
                    let regions = &regions;
                    s.spawn(move || -> Result<Vec<(RegionCoord, LoadOutcome)>> {
                        let mut h = host();
                        let mut out = Vec::new();
                        for r in regions.iter() {
                            out.push((*r, c.on_region_load(&mut h, "world", *r)?));
                        }
                        Ok(out)
                    })
                })
                .collect();
            let mut all = Vec::new();
            for w in workers {
                all.extend(w.join().expect("worker panicked")?);
            }
            Ok(all)
        })?;

        assert_eq!(results.len(), 16);
        assert_eq!(c.tracked_regions(), regions.len());
        for r in regions {
            let placed = results
                .iter()
                .filter(|(at, o)| *at == r && matches!(o, LoadOutcome::Placed { .. }))
                .count();
            assert!(placed >= 1, "region {} never placed", r);
        }
        for (_, o) in &results {
            assert!(matches!(o, LoadOutcome::Placed { .. } | LoadOutcome::CoolingDown), "{:?}", o);
        }

        // a record made on a worker is seen from another thread
        let late = std::thread::scope(|s| {
            s.spawn(|| c.on_region_load(&mut host(), "world", regions[0]))
                .join()
                .expect("worker panicked")
        })?;
        assert_eq!(late, LoadOutcome::CoolingDown);
        clock.advance(30_000);
        assert!(matches!(c.on_region_load(&mut host(), "world", regions[0])?, LoadOutcome::Placed { .. }));
        Ok(())
    }
}

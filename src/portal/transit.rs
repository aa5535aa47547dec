use anyhow::{bail, Result};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;

use super::classifier::PortalAxisSet;
use super::config::{Config, TransitStrategy};
use super::models::{ActorId, ActorKind, ActorSnapshot, BlockPos, BlockState, Location, Material, Vec3};
use crate::world::{Host, WorldAccess};

/// Half-width of the arrival platform and the cleared volume above it.
pub const ARRIVAL_RADIUS: i32 = 2;
/// Cleared layers above the platform, counting the arrival layer.
pub const ARRIVAL_HEADROOM: i32 = 4;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transit {
    pub actor: ActorId,
    pub gateway: BlockPos,
    pub destination: Location,
    pub velocity: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub scanned: usize,
    pub skipped_mounted: usize,
    pub forgotten: usize,
    pub transits: Vec<Transit>,
}

/// Rescale `v` to `max` if it is longer, keeping its direction.
pub fn cap_velocity(v: Vec3, max: f64) -> Vec3 {
    if v.length() > max {
        v.normalize().scale(max)
    } else {
        v
    }
}

/// Solid platform under `dest` and a cleared pocket above it. Non-air
/// blocks in the pocket are broken naturally so they drop. Nothing is
/// touched unless the platform and the pocket are all writable.
pub fn prepare_arrival<W: WorldAccess + ?Sized>(world: &mut W, dest: BlockPos) -> Result<()> {
    let platform = BlockState::of(Material::Obsidian);
    let mut writes = Vec::new();
    let mut pocket = Vec::new();
    for dx in -ARRIVAL_RADIUS..=ARRIVAL_RADIUS {
        for dz in -ARRIVAL_RADIUS..=ARRIVAL_RADIUS {
            writes.push((dest.offset(dx, -1, dz), platform));
            for dy in 0..ARRIVAL_HEADROOM {
                pocket.push(dest.offset(dx, dy, dz));
            }
        }
    }
    if let Some(pos) = pocket.iter().find(|pos| !world.writable(**pos)) {
        bail!("{}: arrival pocket at {} not writable at {}", world.name(), dest, pos);
    }
    world.apply(&writes)?;

    for pos in pocket {
        match world.block(pos)? {
            Some(b) if !b.material.is_air() => {
                world.break_naturally(pos)?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Detects actors standing in a gateway block and sends them to the same
/// coordinates in the mirror world.
///
/// With [`TransitStrategy::Polling`] the host calls [`tick`](Self::tick)
/// every scheduler tick; with [`TransitStrategy::Event`] it forwards player
/// moves to [`on_actor_move`](Self::on_actor_move). The other entry point is
/// inert.
pub struct ActorTransitTracker {
    strategy: TransitStrategy,
    source_world: String,
    mirror_world: String,
    max_velocity: f64,
    axes: &'static PortalAxisSet,
    last_seen: DashMap<ActorId, Location>,
}

impl std::fmt::Debug for ActorTransitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorTransitTracker")
            .field("strategy", &self.strategy)
            .field("mirror_world", &self.mirror_world)
            .field("tracked_actors", &self.last_seen.len())
            .finish()
    }
}

impl ActorTransitTracker {
    pub fn new(cfg: &Config) -> Self {
        Self {
            strategy: cfg.strategy,
            source_world: cfg.source_world.clone(),
            mirror_world: cfg.mirror_world.clone(),
            max_velocity: cfg.max_velocity,
            axes: PortalAxisSet::standard(),
            last_seen: DashMap::new(),
        }
    }

    pub fn strategy(&self) -> TransitStrategy {
        self.strategy
    }

    pub fn tracked_actors(&self) -> usize {
        self.last_seen.len()
    }

    pub fn last_seen(&self, id: ActorId) -> Option<Location> {
        self.last_seen.get(&id).map(|l| l.clone())
    }

    fn in_portal_region(&self, pos: BlockPos) -> bool {
        let r = pos.region();
        self.axes.is_portal_region(r.x, r.z)
    }

    /// One polling pass over every loaded actor in every world.
    pub fn tick<H: Host>(&self, host: &mut H) -> Result<TickReport> {
        let mut report = TickReport::default();
        if self.strategy != TransitStrategy::Polling {
            debug!("tick ignored: transit strategy is {:?}", self.strategy);
            return Ok(report);
        }

        let mut present: HashSet<ActorId> = HashSet::new();
        for world in host.world_names() {
            for actor in host.loaded_actors(&world) {
                // Riders and their mounts never trigger transit.
                if actor.has_riders || actor.mounted {
                    report.skipped_mounted += 1;
                    continue;
                }
                // already handled this tick before a transit moved it here
                if !present.insert(actor.id) {
                    continue;
                }
                report.scanned += 1;

                let moved = self.last_seen.get(&actor.id).map(|prev| *prev != actor.location);
                if moved == Some(true) {
                    if let Some(t) = self.handle_gateway(host, &actor)? {
                        report.transits.push(t);
                    }
                }
                self.last_seen.insert(actor.id, actor.location.clone());
            }
        }

        let before = self.last_seen.len();
        self.last_seen.retain(|id, _| present.contains(id));
        report.forgotten = before.saturating_sub(self.last_seen.len());
        Ok(report)
    }

    fn handle_gateway<H: Host>(&self, host: &mut H, actor: &ActorSnapshot) -> Result<Option<Transit>> {
        let gateway = actor.location.position.block();
        if !self.in_portal_region(gateway) {
            return Ok(None);
        }
        let Some(world) = host.world(&actor.location.world) else {
            return Ok(None);
        };
        match world.block(gateway)? {
            Some(b) if b.material == Material::Gateway => {}
            _ => return Ok(None),
        }

        let Some(mirror) = host.world_mut(&self.mirror_world) else {
            warn!("{} entered gateway at {} but mirror world {} is missing", actor.id, gateway, self.mirror_world);
            return Ok(None);
        };
        prepare_arrival(mirror, gateway)?;

        let velocity = cap_velocity(actor.velocity, self.max_velocity);
        let destination = Location::new(
            self.mirror_world.clone(),
            Vec3::new(gateway.x as f64, gateway.y as f64, gateway.z as f64),
        );
        host.teleport(actor.id, &destination)?;
        // teleport may reset velocity, so apply afterwards
        host.set_velocity(actor.id, velocity)?;

        info!(
            "{} {} transited {} -> {} {}",
            actor.kind.as_str(),
            actor.id,
            actor.location.world,
            destination.world,
            gateway
        );
        Ok(Some(Transit { actor: actor.id, gateway, destination, velocity }))
    }

    /// Move-event entry point: a player stepping into a gateway block of the
    /// source world is teleported, nothing more.
    pub fn on_actor_move<H: Host>(&self, host: &mut H, actor: &ActorSnapshot, to: &Location) -> Result<Option<Transit>> {
        if self.strategy != TransitStrategy::Event {
            return Ok(None);
        }
        if actor.kind != ActorKind::Player || !to.world.eq_ignore_ascii_case(&self.source_world) {
            return Ok(None);
        }
        let gateway = to.position.block();
        if !self.in_portal_region(gateway) {
            return Ok(None);
        }
        let Some(world) = host.world(&to.world) else {
            return Ok(None);
        };
        match world.block(gateway)? {
            Some(b) if b.material == Material::Gateway => {}
            _ => return Ok(None),
        }
        if host.world(&self.mirror_world).is_none() {
            warn!("{} entered gateway at {} but mirror world {} is missing", actor.id, gateway, self.mirror_world);
            return Ok(None);
        }

        let destination = Location::new(
            self.mirror_world.clone(),
            Vec3::new(gateway.x as f64, gateway.y as f64, gateway.z as f64),
        );
        host.teleport(actor.id, &destination)?;
        info!("player {} transited {} -> {} {}", actor.id, to.world, destination.world, gateway);
        Ok(Some(Transit { actor: actor.id, gateway, destination, velocity: Vec3::ZERO }))
    }
}

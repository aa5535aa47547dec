use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

use super::{Host, WorldAccess};
use crate::portal::models::{ActorId, ActorSnapshot, Location, Vec3};

/// Reference host: named worlds plus an actor roster.
///
/// Teleporting resets the actor's velocity, as most engines do, so callers
/// that want momentum preserved must set it again afterwards.
#[derive(Debug)]
pub struct SimHost<W: WorldAccess> {
    worlds: BTreeMap<String, W>,
    actors: BTreeMap<ActorId, ActorSnapshot>,
    teleports: u64,
}

impl<W: WorldAccess> Default for SimHost<W> {
    fn default() -> Self {
        Self { worlds: BTreeMap::new(), actors: BTreeMap::new(), teleports: 0 }
    }
}

impl<W: WorldAccess> SimHost<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_world(&mut self, world: W) {
        self.worlds.insert(world.name().to_string(), world);
    }

    pub fn add_actor(&mut self, actor: ActorSnapshot) {
        self.actors.insert(actor.id, actor);
    }

    pub fn remove_actor(&mut self, id: ActorId) -> Option<ActorSnapshot> {
        self.actors.remove(&id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&ActorSnapshot> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut ActorSnapshot> {
        self.actors.get_mut(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorSnapshot> {
        self.actors.values()
    }

    pub fn teleport_count(&self) -> u64 {
        self.teleports
    }

    /// Advance every free actor by `velocity * dt_secs`. Mounted actors move
    /// with their vehicle and are left alone here.
    pub fn step(&mut self, dt_secs: f64) {
        for a in self.actors.values_mut() {
            if a.mounted {
                continue;
            }
            a.location.position = a.location.position.add(a.velocity.scale(dt_secs));
        }
    }
}

impl<W: WorldAccess> Host for SimHost<W> {
    type World = W;

    fn world(&self, name: &str) -> Option<&W> {
        self.worlds.get(name)
    }

    fn world_mut(&mut self, name: &str) -> Option<&mut W> {
        self.worlds.get_mut(name)
    }

    fn world_names(&self) -> Vec<String> {
        self.worlds.keys().cloned().collect()
    }

    fn loaded_actors(&self, world: &str) -> Vec<ActorSnapshot> {
        self.actors.values().filter(|a| a.location.world == world).cloned().collect()
    }

    fn teleport(&mut self, actor: ActorId, to: &Location) -> Result<()> {
        if !self.worlds.contains_key(&to.world) {
            return Err(anyhow!("teleport {}: unknown world {}", actor, to.world));
        }
        let a = self.actors.get_mut(&actor).ok_or_else(|| anyhow!("teleport: unknown actor {}", actor))?;
        a.location = to.clone();
        a.velocity = Vec3::ZERO;
        self.teleports += 1;
        Ok(())
    }

    fn set_velocity(&mut self, actor: ActorId, velocity: Vec3) -> Result<()> {
        let a = self.actors.get_mut(&actor).ok_or_else(|| anyhow!("set_velocity: unknown actor {}", actor))?;
        a.velocity = velocity;
        Ok(())
    }
}

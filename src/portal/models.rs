use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Horizontal size of a region (chunk) in blocks.
pub const REGION_SIZE: i32 = 16;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct RegionCoord {
    pub x: i32,
    pub z: i32,
}

impl RegionCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Packed cooldown key: `(x << 32) | (z & 0xFFFFFFFF)`.
    pub fn key(self) -> i64 {
        ((self.x as i64) << 32) | ((self.z as i64) & 0xFFFF_FFFF)
    }

    pub fn from_key(key: i64) -> Self {
        Self { x: (key >> 32) as i32, z: key as i32 }
    }

    /// Block-space origin of the region (its minimum X/Z corner).
    pub fn block_origin(self) -> (i32, i32) {
        (self.x << 4, self.z << 4)
    }
}

impl fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, z: self.z + dz }
    }

    pub fn up(self) -> Self {
        self.offset(0, 1, 0)
    }

    pub fn down(self) -> Self {
        self.offset(0, -1, 0)
    }

    pub fn region(self) -> RegionCoord {
        RegionCoord::new(self.x >> 4, self.z >> 4)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn scale(self, k: f64) -> Self {
        Self { x: self.x * k, y: self.y * k, z: self.z * k }
    }

    pub fn add(self, o: Vec3) -> Self {
        Self { x: self.x + o.x, y: self.y + o.y, z: self.z + o.z }
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            self
        } else {
            self.scale(1.0 / len)
        }
    }

    /// Block containing this point (floor on every axis).
    pub fn block(self) -> BlockPos {
        BlockPos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Air,
    Stone,
    Dirt,
    Grass,
    Sand,
    Water,
    Bedrock,
    Obsidian,
    PortalFrame,
    PortalVoid,
    Gateway,
}

impl Material {
    pub fn is_air(self) -> bool {
        matches!(self, Material::Air)
    }

    /// Solid for the purpose of ground detection and platform checks.
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            Material::Stone
                | Material::Dirt
                | Material::Grass
                | Material::Sand
                | Material::Bedrock
                | Material::Obsidian
                | Material::PortalFrame
        )
    }

    /// Any block that is part of a placed portal structure.
    pub fn is_portal_trace(self) -> bool {
        matches!(self, Material::PortalFrame | Material::PortalVoid | Material::Gateway)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Material::Air => "air",
            Material::Stone => "stone",
            Material::Dirt => "dirt",
            Material::Grass => "grass",
            Material::Sand => "sand",
            Material::Water => "water",
            Material::Bedrock => "bedrock",
            Material::Obsidian => "obsidian",
            Material::PortalFrame => "portal_frame",
            Material::PortalVoid => "portal_void",
            Material::Gateway => "gateway",
        }
    }
}

impl FromStr for Material {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let m = match s.trim().to_ascii_lowercase().as_str() {
            "air" => Material::Air,
            "stone" => Material::Stone,
            "dirt" => Material::Dirt,
            "grass" => Material::Grass,
            "sand" => Material::Sand,
            "water" => Material::Water,
            "bedrock" => Material::Bedrock,
            "obsidian" => Material::Obsidian,
            "portal_frame" => Material::PortalFrame,
            "portal_void" => Material::PortalVoid,
            "gateway" => Material::Gateway,
            other => anyhow::bail!("unknown material '{}'", other),
        };
        Ok(m)
    }
}

/// Horizontal facing. East is +X, South is +Z.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Facing {
    North,
    South,
    East,
    West,
}

impl Facing {
    pub fn as_char(self) -> char {
        match self {
            Facing::North => 'N',
            Facing::South => 'S',
            Facing::East => 'E',
            Facing::West => 'W',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'N' => Some(Facing::North),
            'S' => Some(Facing::South),
            'E' => Some(Facing::East),
            'W' => Some(Facing::West),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Facing::North => (0, -1),
            Facing::South => (0, 1),
            Facing::East => (1, 0),
            Facing::West => (-1, 0),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlockState {
    pub material: Material,
    pub facing: Option<Facing>,
    /// Lit/active visual state (the frame's inserted eye).
    pub lit: bool,
}

impl BlockState {
    pub const AIR: BlockState = BlockState { material: Material::Air, facing: None, lit: false };

    pub fn of(material: Material) -> Self {
        Self { material, facing: None, lit: false }
    }

    pub fn frame(facing: Facing) -> Self {
        Self { material: Material::PortalFrame, facing: Some(facing), lit: true }
    }
}

impl From<Material> for BlockState {
    fn from(m: Material) -> Self {
        BlockState::of(m)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Player,
    Mob,
    Item,
    Projectile,
    Vehicle,
}

impl ActorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorKind::Player => "player",
            ActorKind::Mob => "mob",
            ActorKind::Item => "item",
            ActorKind::Projectile => "projectile",
            ActorKind::Vehicle => "vehicle",
        }
    }
}

impl FromStr for ActorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "player" => ActorKind::Player,
            "mob" => ActorKind::Mob,
            "item" => ActorKind::Item,
            "projectile" => ActorKind::Projectile,
            "vehicle" => ActorKind::Vehicle,
            other => anyhow::bail!("unknown actor kind '{}'", other),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub position: Vec3,
}

impl Location {
    pub fn new(world: impl Into<String>, position: Vec3) -> Self {
        Self { world: world.into(), position }
    }
}

/// What the host reports about one actor during enumeration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub kind: ActorKind,
    pub location: Location,
    pub velocity: Vec3,
    pub mounted: bool,
    pub has_riders: bool,
}

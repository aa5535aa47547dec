use anyhow::Result;
use serde::Serialize;

use crate::portal::classifier::is_portal_region;
use crate::portal::coordinator::region_anchor;
use crate::portal::models::RegionCoord;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Classification {
    pub region: RegionCoord,
    pub key: i64,
    pub portal: bool,
    /// Anchor column, only for portal regions.
    pub anchor: Option<(i32, i32)>,
}

pub fn classify(x: i32, z: i32) -> Result<Classification> {
    let region = RegionCoord::new(x, z);
    let portal = is_portal_region(x, z);
    let anchor = if portal { Some(region_anchor(region)?) } else { None };
    Ok(Classification { region, key: region.key(), portal, anchor })
}

pub fn cmd_classify(x: i32, z: i32) -> Result<()> {
    let c = classify(x, z)?;
    println!("region {} key {:#018x}", c.region, c.key);
    match c.anchor {
        Some((ax, az)) => println!("  portal region, anchor column ({}, {})", ax, az),
        None => println!("  not a portal region"),
    }
    Ok(())
}

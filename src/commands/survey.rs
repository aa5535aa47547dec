use anyhow::{anyhow, Result};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

use crate::portal::classifier::portal_regions;
use crate::portal::coordinator::region_anchor;
use crate::portal::models::{BlockPos, RegionCoord};
use crate::portal::prober::portal_exists;
use crate::world::sqlite::SqliteWorld;
use crate::world::WorldAccess;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SurveyReport {
    pub checked: usize,
    pub present: Vec<RegionCoord>,
}

fn probe_region(world: &SqliteWorld, region: RegionCoord) -> Result<bool> {
    let (ax, az) = region_anchor(region)?;
    let ground = world.highest_solid_y(ax + 1, az + 1)?;
    let found = portal_exists(world, BlockPos::new(ax, ground, az));
    debug!("survey {}: {}", region, found);
    Ok(found)
}

/// Probe `regions` of `world` in parallel; each worker opens its own
/// read-only connection.
pub fn survey_regions(db_path: &Path, world: &str, regions: &[RegionCoord]) -> Result<SurveyReport> {
    let results: Vec<Result<(RegionCoord, bool)>> = regions
        .par_iter()
        .map_init(
            || SqliteWorld::open_ro(db_path, world),
            |handle, &region| {
                let w = match handle {
                    Ok(Some(w)) => w,
                    Ok(None) => return Err(anyhow!("world {} is not registered", world)),
                    Err(e) => return Err(anyhow!("open {}: {:#}", db_path.display(), e)),
                };
                Ok((region, probe_region(w, region)?))
            },
        )
        .collect();

    let mut report = SurveyReport::default();
    for r in results {
        let (region, found) = r?;
        report.checked += 1;
        if found {
            report.present.push(region);
        }
    }
    report.present.sort_unstable();
    Ok(report)
}

pub fn cmd_survey(db_path: &Path, world: &str, limit: Option<usize>) -> Result<SurveyReport> {
    let mut regions = portal_regions();
    if let Some(n) = limit {
        regions.truncate(n);
    }
    let report = survey_regions(db_path, world, &regions)?;
    info!("survey of {} finished: {}/{} regions hold a portal", world, report.present.len(), report.checked);
    for r in &report.present {
        println!("  portal in region {}", r);
    }
    println!("{} of {} region(s) already hold a portal", report.present.len(), report.checked);
    Ok(report)
}

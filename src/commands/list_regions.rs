use anyhow::Result;

use crate::portal::classifier::portal_regions;
use crate::portal::coordinator::region_anchor;
use crate::portal::models::RegionCoord;

/// Portal regions in sorted order with their anchor columns.
pub fn list_regions(limit: Option<usize>) -> Result<Vec<(RegionCoord, (i32, i32))>> {
    let regions = portal_regions();
    let take = limit.unwrap_or(regions.len());
    regions
        .into_iter()
        .take(take)
        .map(|r| Ok((r, region_anchor(r)?)))
        .collect()
}

pub fn cmd_list_regions(limit: Option<usize>) -> Result<()> {
    let rows = list_regions(limit)?;
    for (r, (ax, az)) in &rows {
        println!("{:>9} {:>9}  anchor {:>10} {:>10}", r.x, r.z, ax, az);
    }
    println!("{} region(s)", rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_region_by_default() -> Result<()> {
        let all = list_regions(None)?;
        assert_eq!(all.len(), 1600);
        assert_eq!(list_regions(Some(3))?.len(), 3);
        // sorted: the most negative x comes first
        assert_eq!(all[0].0.x, -1_874_995);
        Ok(())
    }
}

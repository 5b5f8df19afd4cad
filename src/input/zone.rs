//! Code for reading load zones and their demand.
use super::{check_non_negative, input_err_msg, read_csv, try_insert};
use crate::id::IDCollection;
use crate::timescale::Timescales;
use crate::units::Capacity;
use crate::zone::{LoadZone, ZoneID, ZoneMap};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const LOAD_ZONES_FILE_NAME: &str = "load_zones.csv";
const LOADS_FILE_NAME: &str = "loads.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct LoadZoneRaw {
    load_zone: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct LoadRaw {
    load_zone: String,
    timepoint: String,
    zone_demand_mw: f64,
}

/// Read load zones and their demand from the model directory.
///
/// Every zone must have demand for every timepoint.
pub fn read_load_zones(model_dir: &Path, timescales: &Timescales) -> Result<ZoneMap> {
    let file_path = model_dir.join(LOAD_ZONES_FILE_NAME);
    let mut zones = read_zone_ids_from_iter(read_csv(&file_path)?)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(LOADS_FILE_NAME);
    read_loads_from_iter(read_csv(&file_path)?, &mut zones, timescales)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(zones)
}

fn read_zone_ids_from_iter<I>(iter: I) -> Result<ZoneMap>
where
    I: Iterator<Item = LoadZoneRaw>,
{
    let mut zones = IndexMap::new();
    for raw in iter {
        let id = ZoneID::from(raw.load_zone);
        let zone = LoadZone {
            id: id.clone(),
            demand: IndexMap::new(),
        };
        try_insert(&mut zones, id, zone)?;
    }

    Ok(zones)
}

fn read_loads_from_iter<I>(iter: I, zones: &mut ZoneMap, timescales: &Timescales) -> Result<()>
where
    I: Iterator<Item = LoadRaw>,
{
    for raw in iter {
        let zone_id = zones.get_id(&raw.load_zone)?;
        let timepoint = timescales.timepoints.get_id(&raw.timepoint)?;
        check_non_negative(raw.zone_demand_mw, "zone_demand_mw")?;

        let zone = &mut zones[&zone_id];
        ensure!(
            zone.demand
                .insert(timepoint.clone(), Capacity(raw.zone_demand_mw))
                .is_none(),
            "Duplicate demand entry for zone {zone_id} and timepoint {timepoint}"
        );
    }

    for zone in zones.values() {
        for timepoint in timescales.timepoints.keys() {
            ensure!(
                zone.demand.contains_key(timepoint),
                "Zone {} has no demand for timepoint {timepoint}",
                zone.id
            );
        }
    }

    Ok(())
}

//! Code for reading wholesale nodal prices.
use super::{input_err_msg, read_csv};
use crate::id::IDCollection;
use crate::model::{ModelParameters, OptionalModule};
use crate::policy::NodalPriceMap;
use crate::project::{PricingNodeID, ProjectMap};
use crate::timescale::Timescales;
use crate::units::MoneyPerEnergy;
use crate::zone::ZoneMap;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::Path;

const NODAL_PRICES_FILE_NAME: &str = "nodal_prices.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct NodalPriceRaw {
    pricing_node: String,
    timepoint: String,
    nodal_price: f64,
}

/// Read nodal prices, if provided.
///
/// The file is required by the wholesale pricing module, but is also used to value storage
/// arbitrage whenever it is present. Every load zone and every project's pricing node must have a
/// price for every timepoint.
pub fn read_nodal_prices(
    model_dir: &Path,
    projects: &ProjectMap,
    zones: &ZoneMap,
    timescales: &Timescales,
    parameters: &ModelParameters,
) -> Result<Option<NodalPriceMap>> {
    let file_path = model_dir.join(NODAL_PRICES_FILE_NAME);
    if !file_path.is_file() {
        ensure!(
            !parameters.is_module_enabled(OptionalModule::WholesalePricing),
            "The wholesale_pricing module requires {NODAL_PRICES_FILE_NAME}"
        );
        return Ok(None);
    }

    let nodes = pricing_nodes(projects, zones);
    let prices = read_nodal_prices_from_iter(read_csv(&file_path)?, &nodes, timescales)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(Some(prices))
}

/// The pricing nodes of all projects and load zones
fn pricing_nodes(projects: &ProjectMap, zones: &ZoneMap) -> IndexSet<PricingNodeID> {
    zones
        .keys()
        .map(|zone| PricingNodeID::new(&zone.0))
        .chain(projects.values().map(|project| project.pricing_node.clone()))
        .collect()
}

fn read_nodal_prices_from_iter<I>(
    iter: I,
    nodes: &IndexSet<PricingNodeID>,
    timescales: &Timescales,
) -> Result<NodalPriceMap>
where
    I: Iterator<Item = NodalPriceRaw>,
{
    let mut map = NodalPriceMap::new();
    for raw in iter {
        let timepoint = timescales.timepoints.get_id(&raw.timepoint)?;
        ensure!(
            raw.nodal_price.is_finite(),
            "nodal_price must be a finite number"
        );

        // Prices for nodes which nothing uses are allowed but ignored
        let Ok(node) = nodes.get_id(&raw.pricing_node) else {
            continue;
        };
        ensure!(
            map.insert((node.clone(), timepoint.clone()), MoneyPerEnergy(raw.nodal_price))
                .is_none(),
            "Duplicate nodal price for node {node} and timepoint {timepoint}"
        );
    }

    for node in nodes {
        for timepoint in timescales.timepoints.keys() {
            ensure!(
                map.contains_key(&(node.clone(), timepoint.clone())),
                "Pricing node {node} has no price for timepoint {timepoint}"
            );
        }
    }

    Ok(map)
}

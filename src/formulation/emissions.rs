//! Emissions accounting and the internal carbon price.
//!
//! Only "additional" projects are counted. Their direct emissions come from their output and
//! they are credited with the emissions they avoid (or, for storage, cause) on the wider grid,
//! using long-run marginal emission rates.
use super::balance::ZoneBalance;
use super::dispatch::DispatchVariables;
use super::storage::StorageVariables;
use super::{ProjectTimepoint, timepoint_exprs};
use crate::model::Model;
use crate::optimisation::{LinearExpr, ObjectiveBuilder};
use crate::policy::EmissionsData;
use crate::project::GenerationProject;
use crate::timescale::TimepointID;
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// Net emissions of each project in each timepoint, in tonnes
pub type EmissionsMap = IndexMap<ProjectTimepoint, LinearExpr>;

/// The long-run marginal emission rate seen by a project
fn marginal_emission_rate(
    data: &EmissionsData,
    project: &GenerationProject,
    tp: &TimepointID,
) -> Result<f64> {
    let region = project
        .cambium_region
        .as_ref()
        .with_context(|| format!("Additional project {} has no cambium_region", project.id))?;

    data.emission_rates
        .get(&(region.clone(), tp.clone()))
        .copied()
        .with_context(|| format!("No marginal emission rate for {region} in timepoint {tp}"))
}

/// Calculate the emissions of every project and price them.
///
/// The parasitic load of carbon capture is withdrawn from the zone balance (as a negative
/// injection).
pub fn add_emissions_costs(
    objective: &mut ObjectiveBuilder,
    balance: &mut ZoneBalance,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) -> Result<EmissionsMap> {
    let data = model
        .emissions
        .as_ref()
        .context("Emissions data is required by the emissions module")?;

    let mut emissions = EmissionsMap::new();
    for ((project_id, tp), var) in dispatch.iter_dispatch() {
        let project = &model.projects[project_id];
        let mut generation = dispatch.excess_expr(project_id, tp);
        generation += var;

        if let Some(ccs) = &project.carbon_capture {
            balance.add_injection(&project.load_zone, tp, var * -ccs.energy_load);
        }

        // Existing contracts have no consequential emissions
        let mut total = LinearExpr::new();
        if project.is_additional {
            let capture = project
                .carbon_capture
                .as_ref()
                .map_or(0.0, |ccs| ccs.capture_efficiency);
            let rate = marginal_emission_rate(data, project, tp)?;
            total.add_scaled(&generation, project.emission_factor.value() * (1.0 - capture));
            total.add_scaled(&generation, -rate);
        }

        emissions.insert((project_id.clone(), tp.clone()), total);
    }

    for (project_id, tp) in storage.iter_keys() {
        let project = &model.projects[project_id];
        if !project.is_additional {
            continue;
        }

        let rate = marginal_emission_rate(data, project, tp)?;
        let total = storage.net_charge(project_id, tp).scaled(rate);
        emissions.insert((project_id.clone(), tp.clone()), total);
    }

    let mut costs = timepoint_exprs(model);
    for ((_, tp_id), total) in &emissions {
        let period = model.timescales.timepoints[tp_id].period;
        let price = data
            .carbon_prices
            .get(&period)
            .map_or(0.0, |price| price.value());
        costs[tp_id].add_scaled(total, price);
    }
    objective.register_timepoint_cost("GenEmissionsCostInTP", costs)?;

    Ok(emissions)
}

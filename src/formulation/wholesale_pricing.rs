//! Settlement of load and generation at wholesale (nodal) prices.
use super::dispatch::DispatchVariables;
use super::timepoint_exprs;
use crate::model::Model;
use crate::optimisation::{LinearExpr, ObjectiveBuilder};
use crate::project::PricingNodeID;
use crate::timescale::TimepointID;
use crate::units::MoneyPerEnergy;
use anyhow::{Context, Result};

fn price_at(model: &Model, node: &PricingNodeID, tp: &TimepointID) -> Result<MoneyPerEnergy> {
    model
        .nodal_price(node, tp)
        .with_context(|| format!("No nodal price for {node} in timepoint {tp}"))
}

/// Register the cost of load at zone prices and the revenue of generation at nodal prices
pub fn add_wholesale_pricing_costs(
    objective: &mut ObjectiveBuilder,
    model: &Model,
    dispatch: &DispatchVariables,
) -> Result<()> {
    let mut load_costs = timepoint_exprs(model);
    for zone in model.zones.values() {
        for tp in model.timescales.timepoints.keys() {
            let price = model
                .zone_price(&zone.id, tp)
                .with_context(|| format!("No nodal price for zone {} in timepoint {tp}", zone.id))?;
            let cost = LinearExpr::constant(zone.demand_in(tp).value() * price.value());
            load_costs[tp] += cost;
        }
    }
    objective.register_timepoint_cost("DLAPLoadCostInTP", load_costs)?;

    let mut dispatch_revenue = timepoint_exprs(model);
    for ((project, tp), var) in dispatch.iter_dispatch() {
        let price = price_at(model, &model.projects[project].pricing_node, tp)?;
        dispatch_revenue[tp].add_term(var, -price.value());
    }
    objective.register_timepoint_cost("GenPnodeRevenueInTP", dispatch_revenue)?;

    let mut excess_revenue = timepoint_exprs(model);
    for ((project, tp), excess) in dispatch.iter_excess() {
        let price = price_at(model, &model.projects[project].pricing_node, tp)?;
        excess_revenue[tp].add_scaled(excess, -price.value());
    }
    objective.register_timepoint_cost("ExcessGenPnodeRevenueInTP", excess_revenue)?;

    Ok(())
}

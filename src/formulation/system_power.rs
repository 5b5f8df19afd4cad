//! Energy bought from the grid to cover any shortfall in a zone.
use super::balance::ZoneBalance;
use super::timepoint_exprs;
use crate::model::Model;
use crate::optimisation::{ObjectiveBuilder, Problem, Var};
use crate::timescale::TimepointID;
use crate::zone::ZoneID;
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// System power bought in each zone and timepoint
pub type SystemPowerVariables = IndexMap<(ZoneID, TimepointID), Var>;

/// Add a system power variable for every zone and timepoint, paying the hedge premium on it
pub fn add_system_power_variables(
    problem: &mut Problem,
    objective: &mut ObjectiveBuilder,
    balance: &mut ZoneBalance,
    model: &Model,
) -> Result<SystemPowerVariables> {
    let mut vars = SystemPowerVariables::new();
    let mut costs = timepoint_exprs(model);
    for zone in model.zones.keys() {
        for tp in model.timescales.timepoints.keys() {
            let key = (zone.clone(), tp.clone());
            let premium = model
                .hedge_premium_costs
                .get(&key)
                .with_context(|| format!("No hedge premium cost for {zone} in timepoint {tp}"))?;

            let var = problem.add_var(0.0, f64::INFINITY);
            balance.add_injection(zone, tp, var);
            costs[tp].add_term(var, premium.value());
            vars.insert(key, var);
        }
    }
    objective.register_timepoint_cost("HedgePremiumCostInTP", costs)?;

    Ok(vars)
}

//! The renewable (time-coincident) target.
use super::dispatch::DispatchVariables;
use super::storage::StorageVariables;
use super::system_power::SystemPowerVariables;
use crate::model::{Model, RenewableGoalType};
use crate::optimisation::{LinearExpr, Problem};
use crate::timescale::PeriodID;
use crate::zone::total_demand_in_period;

/// Total generator output (dispatch plus excess) in a period
pub fn total_generation(
    model: &Model,
    dispatch: &DispatchVariables,
    period: PeriodID,
) -> LinearExpr {
    let mut total = LinearExpr::new();
    for tp in model.timescales.iter_period_timepoints(period) {
        let weight = tp.weight.value();
        for project in model.iter_generator_projects() {
            let mut generation = dispatch.excess_expr(&project.id, &tp.id);
            generation += dispatch.dispatch_expr(&project.id, &tp.id);
            total.add_scaled(&generation, weight);
        }
    }

    total
}

/// Net generation in a period: total generation less storage losses
pub fn net_generation(
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
    period: PeriodID,
) -> LinearExpr {
    let mut net = total_generation(model, dispatch, period);
    for tp in model.timescales.iter_period_timepoints(period) {
        for project in model.iter_storage_projects() {
            net.add_scaled(&storage.net_charge(&project.id, &tp.id), -tp.weight.value());
        }
    }

    net
}

/// Add the renewable target constraints for the configured goal type
pub fn add_renewable_target_constraints(
    problem: &mut Problem,
    model: &Model,
    system_power: &SystemPowerVariables,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) {
    for period in model.timescales.periods.keys() {
        let target = model.renewable_target(*period);
        match model.parameters.renewable_goal_type {
            RenewableGoalType::Hourly => {
                for zone in model.zones.values() {
                    let mut purchases = LinearExpr::new();
                    for tp in model.timescales.iter_period_timepoints(*period) {
                        if let Some(var) = system_power.get(&(zone.id.clone(), tp.id.clone())) {
                            purchases.add_term(*var, tp.weight.value());
                        }
                    }
                    let demand = zone.demand_in_period(*period, &model.timescales);
                    problem.add_le(&purchases, (1.0 - target) * demand.value());
                }
            }
            RenewableGoalType::Annual => {
                let net = net_generation(model, dispatch, storage, *period);
                let demand = total_demand_in_period(&model.zones, *period, &model.timescales);
                problem.add_ge(&net, target * demand.value());
            }
        }
    }
}

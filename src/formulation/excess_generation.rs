//! Limits and penalties on excess generation.
use super::dispatch::DispatchVariables;
use super::renewable_target::{net_generation, total_generation};
use super::storage::StorageVariables;
use super::{period_exprs, timepoint_exprs};
use crate::model::{ExcessGenerationLimitType, Model, RenewableGoalType};
use crate::optimisation::{ObjectiveBuilder, Problem};
use crate::policy::ExcessGenerationLimit;
use crate::timescale::PeriodID;
use crate::zone::total_demand_in_period;
use anyhow::{Context, Result};

/// The limit on excess generation in a period (required for any limit type but `none`)
fn required_limit(limit: &ExcessGenerationLimit, period: PeriodID) -> Result<f64> {
    limit
        .limit
        .with_context(|| format!("No excess generation limit given for period {period}"))
}

/// Limit excess generation and register the penalty on it.
///
/// The penalty is charged on hourly zone excess when the renewable goal is hourly and on total
/// generation above the target when it is annual. The annual penalty is a period cost, so it is
/// spread over the years of the period.
pub fn add_excess_generation_constraints(
    problem: &mut Problem,
    objective: &mut ObjectiveBuilder,
    model: &Model,
    dispatch: &DispatchVariables,
    storage: &StorageVariables,
) -> Result<()> {
    let limits = model
        .excess_generation
        .as_ref()
        .context("Excess generation limits are required by the excess_generation module")?;

    for (period_id, limit) in limits {
        let period = model.timescales.period(*period_id)?;
        match model.parameters.excess_generation_limit_type {
            ExcessGenerationLimitType::None => {}
            ExcessGenerationLimitType::Annual => {
                let limit = required_limit(limit, period.id)?;
                let net = net_generation(model, dispatch, storage, period.id);
                let demand = total_demand_in_period(&model.zones, period.id, &model.timescales);
                problem.add_le(&net, demand.value() * (1.0 + limit));
            }
            ExcessGenerationLimitType::Hourly => {
                let limit = required_limit(limit, period.id)?;
                for zone in model.zones.values() {
                    for tp in &period.timepoints {
                        let excess = dispatch.zone_excess(model, &zone.id, tp);
                        problem.add_le(&excess, zone.demand_in(tp).value() * limit);
                    }
                }
            }
        }
    }

    match model.parameters.renewable_goal_type {
        RenewableGoalType::Hourly => {
            let mut penalties = timepoint_exprs(model);
            for (tp_id, tp) in &model.timescales.timepoints {
                let penalty = limits.get(&tp.period).map_or(0.0, |limit| limit.penalty.value());
                for zone in model.zones.keys() {
                    let excess = dispatch.zone_excess(model, zone, tp_id);
                    penalties[tp_id].add_scaled(&excess, penalty);
                }
            }
            objective.register_timepoint_cost("ExcessGenPenaltyInTP", penalties)?;
        }
        RenewableGoalType::Annual => {
            let mut penalties = period_exprs(model);
            for (period_id, period) in &model.timescales.periods {
                let Some(limit) = limits.get(period_id) else {
                    continue;
                };
                let target = model.renewable_target(*period_id);
                let demand = total_demand_in_period(&model.zones, *period_id, &model.timescales);
                let mut above_target = total_generation(model, dispatch, *period_id);
                above_target.add_constant(-target * demand.value());

                let years = f64::from(period.length_years());
                penalties[period_id].add_scaled(&above_target, limit.penalty.value() / years);
            }
            objective.register_period_cost("ExcessGenPenalty", penalties)?;
        }
    }

    Ok(())
}

//! Charging, discharging and state of charge of storage projects.
use super::balance::ZoneBalance;
use super::build::BuildVariables;
use super::dispatch::DispatchVariables;
use super::{ProjectTimepoint, timepoint_exprs};
use crate::model::{Model, StorageExclusivity};
use crate::optimisation::{LinearExpr, ObjectiveBuilder, Problem, Var};
use crate::project::{GenerationProject, HybridPairing, ProjectID, StorageParameters};
use crate::timescale::{Period, PeriodID, TimepointID};
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// The operating decisions of storage projects
#[derive(Debug, Default)]
pub struct StorageVariables {
    charge: IndexMap<ProjectTimepoint, Var>,
    discharge: IndexMap<ProjectTimepoint, Var>,
    state_of_charge: IndexMap<ProjectTimepoint, Var>,
    /// Energy discharged over each operating period, as drawn from the store
    throughput: IndexMap<(ProjectID, PeriodID), LinearExpr>,
}

impl StorageVariables {
    pub fn charge_var(&self, project: &ProjectID, tp: &TimepointID) -> Option<Var> {
        self.charge.get(&(project.clone(), tp.clone())).copied()
    }

    pub fn discharge_var(&self, project: &ProjectID, tp: &TimepointID) -> Option<Var> {
        self.discharge.get(&(project.clone(), tp.clone())).copied()
    }

    pub fn state_of_charge_var(&self, project: &ProjectID, tp: &TimepointID) -> Option<Var> {
        self.state_of_charge
            .get(&(project.clone(), tp.clone()))
            .copied()
    }

    /// Charge minus discharge (zero if the project is not operating)
    pub fn net_charge(&self, project: &ProjectID, tp: &TimepointID) -> LinearExpr {
        let mut expr = LinearExpr::new();
        if let Some(charge) = self.charge_var(project, tp) {
            expr += charge;
        }
        if let Some(discharge) = self.discharge_var(project, tp) {
            expr -= discharge;
        }

        expr
    }

    /// The keys of every (storage project, timepoint) pair in operation
    pub fn iter_keys(&self) -> impl Iterator<Item = &ProjectTimepoint> {
        self.charge.keys()
    }

    /// Iterate over the throughput of each project in each period
    pub fn iter_throughput(&self) -> impl Iterator<Item = (&(ProjectID, PeriodID), &LinearExpr)> {
        self.throughput.iter()
    }
}

/// Add storage variables and operating constraints.
///
/// Discharge is injected into, and charge withdrawn from, the zone balance.
pub fn add_storage_variables(
    problem: &mut Problem,
    objective: &mut ObjectiveBuilder,
    balance: &mut ZoneBalance,
    model: &Model,
    build: &BuildVariables,
    dispatch: &DispatchVariables,
) -> Result<StorageVariables> {
    let mut vars = StorageVariables::default();
    for project in model.iter_storage_projects() {
        let Some(storage) = project.storage() else {
            continue;
        };
        for period in model.operational_periods(project) {
            add_period_operation(problem, &mut vars, model, build, project, storage, period);
            if let Some(HybridPairing::Storage { generator, .. }) = &project.hybrid {
                let generator = model
                    .projects
                    .get(generator)
                    .with_context(|| format!("Unknown hybrid generator {generator}"))?;
                add_hybrid_constraints(
                    problem, &vars, model, build, dispatch, project, generator, period,
                );
            }
        }
    }

    add_zonal_charging_limits(problem, model, &vars, dispatch);

    for ((project, tp), charge) in &vars.charge {
        let zone = &model.projects[project].load_zone;
        balance.add_withdrawal(zone, tp, *charge);
        balance.add_injection(zone, tp, vars.discharge[&(project.clone(), tp.clone())]);
    }

    let mut energy_costs = timepoint_exprs(model);
    for ((project, tp), discharge) in &vars.discharge {
        let cost = model.projects[project].ppa_energy_cost.value();
        energy_costs[tp].add_term(*discharge, cost);
    }
    objective.register_timepoint_cost("StorageEnergyPPACostInTP", energy_costs)?;

    if model.nodal_prices.is_some() {
        let mut nodal_costs = timepoint_exprs(model);
        for (project, tp) in vars.iter_keys() {
            let node = &model.projects[project].pricing_node;
            let price = model
                .nodal_price(node, tp)
                .with_context(|| format!("No nodal price for {node} in timepoint {tp}"))?;
            nodal_costs[tp].add_scaled(&vars.net_charge(project, tp), price.value());
        }
        objective.register_timepoint_cost("StorageNodalEnergyCostInTP", nodal_costs)?;
    }

    Ok(vars)
}

/// Add the variables and constraints for one storage project over one period
fn add_period_operation(
    problem: &mut Problem,
    vars: &mut StorageVariables,
    model: &Model,
    build: &BuildVariables,
    project: &GenerationProject,
    storage: &StorageParameters,
    period: &Period,
) {
    let capacity = build.capacity_in_period(model, project, period);
    let energy_capacity = build.energy_capacity_in_period(model, project, period);
    let big_m = model.parameters.storage_big_m;

    for tp in &period.timepoints {
        let charge = problem.add_var(0.0, f64::INFINITY);
        let discharge = problem.add_var(0.0, f64::INFINITY);
        let soc = problem.add_var(0.0, f64::INFINITY);

        problem.add_le(&(discharge - capacity.clone()), 0.0);
        problem.add_le(
            &(charge - capacity.scaled(storage.charge_to_discharge_ratio)),
            0.0,
        );
        match model.parameters.storage_exclusivity {
            StorageExclusivity::Convex => {
                problem.add_le(&(charge + discharge - capacity.clone()), 0.0);
            }
            StorageExclusivity::Binary => {
                let charging = problem.add_binary_var();
                problem.add_le(&(charge - charging * big_m), 0.0);
                problem.add_le(&(discharge + charging * big_m), big_m);
            }
        }
        problem.add_le(&(soc - energy_capacity.clone()), 0.0);

        let key = (project.id.clone(), tp.clone());
        vars.charge.insert(key.clone(), charge);
        vars.discharge.insert(key.clone(), discharge);
        vars.state_of_charge.insert(key, soc);
    }

    // The state of charge wraps around at the start of each timeseries
    let efficiency = storage.one_way_efficiency();
    let mut throughput = LinearExpr::new();
    for tp_id in &period.timepoints {
        let tp = &model.timescales.timepoints[tp_id];
        let key = (project.id.clone(), tp_id.clone());
        let previous = vars.state_of_charge[&(project.id.clone(), tp.previous.clone())];
        let duration = tp.duration.value();
        let discharge = vars.discharge[&key];
        let recursion = vars.state_of_charge[&key] - previous * (1.0 - storage.leakage_loss)
            - vars.charge[&key] * (efficiency * duration)
            + discharge * (duration / efficiency);
        problem.add_eq(&recursion, 0.0);

        throughput.add_term(discharge, tp.weight.value() / efficiency);
    }

    if let Some(cycles) = storage.max_annual_cycles {
        let limit = energy_capacity.scaled(cycles * f64::from(period.length_years()));
        problem.add_le(&(throughput.clone() - limit), 0.0);
    }
    vars.throughput
        .insert((project.id.clone(), period.id), throughput);
}

/// Constrain the storage half of a hybrid by its generator's output and shared interconnect
#[allow(clippy::too_many_arguments)]
fn add_hybrid_constraints(
    problem: &mut Problem,
    vars: &StorageVariables,
    model: &Model,
    build: &BuildVariables,
    dispatch: &DispatchVariables,
    storage: &GenerationProject,
    generator: &GenerationProject,
    period: &Period,
) {
    let generator_capacity = build.capacity_in_period(model, generator, period);
    for tp in &period.timepoints {
        let key = (storage.id.clone(), tp.clone());
        let charge = vars.charge[&key];
        let generator_dispatch = dispatch.dispatch_expr(&generator.id, tp);

        // Only charge from the paired generator
        problem.add_le(&(charge - generator_dispatch.clone()), 0.0);

        let mut interconnect = vars.discharge[&key] - charge;
        interconnect += generator_dispatch;
        interconnect += &dispatch.excess_expr(&generator.id, tp);
        interconnect -= &generator_capacity;
        problem.add_le(&interconnect, 0.0);
    }
}

/// Storage in a zone may only charge from generation in the same zone
fn add_zonal_charging_limits(
    problem: &mut Problem,
    model: &Model,
    vars: &StorageVariables,
    dispatch: &DispatchVariables,
) {
    for zone in model.zones.keys() {
        for tp in model.timescales.timepoints.keys() {
            let mut charge = LinearExpr::new();
            for project in model.iter_projects_in_zone(zone) {
                if let Some(var) = vars.charge_var(&project.id, tp) {
                    charge += var;
                }
            }
            if charge.is_constant() {
                continue;
            }

            problem.add_le(&(charge - dispatch.zone_dispatch(model, zone, tp)), 0.0);
        }
    }
}

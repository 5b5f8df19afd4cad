//! Dispatch of generation projects, with curtailment and excess generation.
use super::balance::ZoneBalance;
use super::build::BuildVariables;
use super::{ProjectTimepoint, period_exprs, timepoint_exprs};
use crate::model::Model;
use crate::optimisation::{LinearExpr, ObjectiveBuilder, Problem, Var};
use crate::project::{DispatchRule, GenerationProject, ProjectID};
use crate::timescale::{Period, Timepoint, TimepointID};
use crate::zone::ZoneID;
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// Dispatch decisions of non-storage projects
#[derive(Debug, Default)]
pub struct DispatchVariables {
    dispatch: IndexMap<ProjectTimepoint, Var>,
    curtailment: IndexMap<ProjectTimepoint, Var>,
    /// Headroom below the dispatch limit, for classes which track it
    excess: IndexMap<ProjectTimepoint, LinearExpr>,
}

impl DispatchVariables {
    /// The dispatch variable, if the project operates in the timepoint
    pub fn dispatch_var(&self, project: &ProjectID, tp: &TimepointID) -> Option<Var> {
        self.dispatch.get(&(project.clone(), tp.clone())).copied()
    }

    /// Dispatch as an expression (zero if the project is not operating)
    pub fn dispatch_expr(&self, project: &ProjectID, tp: &TimepointID) -> LinearExpr {
        self.dispatch_var(project, tp)
            .map(LinearExpr::from)
            .unwrap_or_default()
    }

    /// Excess generation as an expression (zero if it is not tracked)
    pub fn excess_expr(&self, project: &ProjectID, tp: &TimepointID) -> LinearExpr {
        self.excess
            .get(&(project.clone(), tp.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// The curtailment variable, for curtailable projects
    pub fn curtailment_var(&self, project: &ProjectID, tp: &TimepointID) -> Option<Var> {
        self.curtailment.get(&(project.clone(), tp.clone())).copied()
    }

    /// Iterate over every dispatch variable
    pub fn iter_dispatch(&self) -> impl Iterator<Item = (&ProjectTimepoint, Var)> {
        self.dispatch.iter().map(|(key, var)| (key, *var))
    }

    /// Iterate over every excess generation expression
    pub fn iter_excess(&self) -> impl Iterator<Item = (&ProjectTimepoint, &LinearExpr)> {
        self.excess.iter()
    }

    /// Total dispatch of the generators in a zone
    pub fn zone_dispatch(&self, model: &Model, zone: &ZoneID, tp: &TimepointID) -> LinearExpr {
        model
            .iter_projects_in_zone(zone)
            .filter(|project| !project.is_storage())
            .map(|project| self.dispatch_expr(&project.id, tp))
            .sum()
    }

    /// Total excess generation of the generators in a zone
    pub fn zone_excess(&self, model: &Model, zone: &ZoneID, tp: &TimepointID) -> LinearExpr {
        model
            .iter_projects_in_zone(zone)
            .filter(|project| !project.is_storage())
            .map(|project| self.excess_expr(&project.id, tp))
            .sum()
    }
}

/// Add dispatch variables for every generator in its operating window.
///
/// Dispatch is injected into the zone balance of each project's load zone.
pub fn add_dispatch_variables(
    problem: &mut Problem,
    objective: &mut ObjectiveBuilder,
    balance: &mut ZoneBalance,
    model: &Model,
    build: &BuildVariables,
) -> Result<DispatchVariables> {
    let mut vars = DispatchVariables::default();
    for project in model.iter_generator_projects() {
        for period in model.operational_periods(project) {
            let capacity = build.capacity_in_period(model, project, period);
            for tp in model.timescales.iter_period_timepoints(period.id) {
                add_project_dispatch(problem, &mut vars, model, project, period, tp, &capacity);
                let dispatch = vars.dispatch_expr(&project.id, &tp.id);
                balance.add_injection(&project.load_zone, &tp.id, dispatch);
            }
        }
    }

    let mut energy_costs = timepoint_exprs(model);
    let mut curtailment_costs = timepoint_exprs(model);
    let mut excess_costs = timepoint_exprs(model);
    for ((project, tp), var) in &vars.dispatch {
        let cost = model.projects[project].ppa_energy_cost.value();
        energy_costs[tp].add_term(*var, cost);
        if let Some(curtail) = vars.curtailment.get(&(project.clone(), tp.clone())) {
            curtailment_costs[tp].add_term(*curtail, cost);
        }
        excess_costs[tp].add_scaled(&vars.excess_expr(project, tp), cost);
    }
    objective.register_timepoint_cost("GenPPACostInTP", energy_costs)?;
    objective.register_timepoint_cost("GenCurtailedEnergyCostInTP", curtailment_costs)?;
    objective.register_timepoint_cost("ExcessGenPPACostInTP", excess_costs)?;

    if model.parameters.sell_excess_recs {
        add_rec_value(objective, model, &vars)?;
    }

    Ok(vars)
}

/// Add the dispatch (and curtailment) variables of one project in one timepoint
fn add_project_dispatch(
    problem: &mut Problem,
    vars: &mut DispatchVariables,
    model: &Model,
    project: &GenerationProject,
    period: &Period,
    tp: &Timepoint,
    capacity: &LinearExpr,
) {
    let Some(rule) = project.class.dispatch_rule() else {
        return;
    };

    let availability = project.availability(period.start, model.parameters.solar_degradation_rate);
    let capacity_factor = model.capacity_factor(&project.id, &tp.id);
    let factor = project
        .class
        .dispatch_upper_limit(availability, capacity_factor.map(|cf| cf.value));
    let limit = capacity.scaled(factor);

    // A negative factor represents a fixed load (e.g. station service)
    let (rule, lower) = if factor < 0.0 {
        (DispatchRule::Fixed, f64::NEG_INFINITY)
    } else {
        (rule, 0.0)
    };

    let key = (project.id.clone(), tp.id.clone());
    let dispatch = problem.add_var(lower, f64::INFINITY);
    let mut headroom = limit.clone() - dispatch;
    match rule {
        DispatchRule::Fixed => {
            problem.add_eq(&(dispatch - limit), 0.0);
        }
        DispatchRule::Bounded => {
            problem.add_le(&(dispatch - limit), 0.0);
        }
        DispatchRule::Curtailable => {
            let curtail = problem.add_var(0.0, f64::INFINITY);
            problem.add_le(&(dispatch + curtail - limit), 0.0);
            if let Some(curtailment) = capacity_factor.and_then(|cf| cf.curtailment) {
                let curtail_limit = capacity.scaled(availability * curtailment);
                problem.add_le(&(curtail - curtail_limit), 0.0);
            }
            headroom -= curtail;
            vars.curtailment.insert(key.clone(), curtail);
        }
    }

    if project.class.tracks_excess() {
        vars.excess.insert(key.clone(), headroom);
    }
    vars.dispatch.insert(key, dispatch);
}

/// Register the value of reselling the RECs of excess generation
fn add_rec_value(
    objective: &mut ObjectiveBuilder,
    model: &Model,
    vars: &DispatchVariables,
) -> Result<()> {
    let rec_values = model
        .rec_values
        .as_ref()
        .context("REC resale values are required when sell_excess_recs is set")?;

    let mut values = period_exprs(model);
    for ((_, tp_id), excess) in &vars.excess {
        let tp = &model.timescales.timepoints[tp_id];
        let price = rec_values.get(&tp.period).map_or(0.0, |value| value.value());
        values[&tp.period].add_scaled(excess, -price * tp.weight_in_year.value());
    }

    objective.register_period_cost("ExcessRECValue", values)
}

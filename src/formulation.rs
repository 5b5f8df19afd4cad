//! Formulation of the capacity expansion and dispatch problem.
//!
//! Each submodule adds the variables and constraints for one part of the model and registers its
//! costs with the [`ObjectiveBuilder`]. Submodules are called in dependency order: builds first,
//! then dispatch and storage (which need built capacity), then the policy modules (which need
//! dispatch). The zone energy balance is added once everything injecting into or withdrawing from
//! a zone has been formulated.
use crate::model::{Model, OptionalModule};
use crate::optimisation::{LinearExpr, ObjectiveBuilder, Problem};
use crate::project::ProjectID;
use crate::timescale::{PeriodID, TimepointID};
use anyhow::Result;
use indexmap::IndexMap;
use log::debug;

pub mod balance;
pub mod build;
pub mod dispatch;
pub mod emissions;
pub mod excess_generation;
pub mod renewable_target;
pub mod resource_adequacy;
pub mod storage;
pub mod system_power;
pub mod wholesale_pricing;

use balance::{ZoneBalance, ZoneBalanceKeys, add_zone_balance_constraints};
use build::{BuildVariables, add_build_variables};
use dispatch::{DispatchVariables, add_dispatch_variables};
use emissions::{EmissionsMap, add_emissions_costs};
use excess_generation::add_excess_generation_constraints;
use renewable_target::add_renewable_target_constraints;
use resource_adequacy::{
    ResourceAdequacyVariables, add_midterm_reliability_constraints,
    add_resource_adequacy_constraints,
};
use storage::{StorageVariables, add_storage_variables};
use system_power::{SystemPowerVariables, add_system_power_variables};
use wholesale_pricing::add_wholesale_pricing_costs;

/// A key for values indexed by project and timepoint
pub type ProjectTimepoint = (ProjectID, TimepointID);

/// The complete problem along with the variables needed to interpret its solution
pub struct Formulation {
    /// The problem to be solved
    pub problem: Problem,
    /// All cost terms making up the objective
    pub objective: ObjectiveBuilder,
    pub build: BuildVariables,
    pub dispatch: DispatchVariables,
    pub storage: StorageVariables,
    pub system_power: SystemPowerVariables,
    /// Keys for the zone energy balance constraints, whose duals are marginal energy costs
    pub zone_balance_keys: ZoneBalanceKeys,
    /// RA positions, if the module is enabled
    pub resource_adequacy: Option<ResourceAdequacyVariables>,
    /// Emissions of each project, if the module is enabled
    pub emissions: Option<EmissionsMap>,
}

/// Formulate the optimisation problem for a model.
///
/// # Arguments
///
/// * `model` - The model to formulate
///
/// # Returns
///
/// The problem with its objective set, ready to be solved.
pub fn formulate(model: &Model) -> Result<Formulation> {
    let mut problem = Problem::new();
    let mut objective = ObjectiveBuilder::new();
    let mut balance = ZoneBalance::default();

    let build = add_build_variables(&mut problem, &mut objective, model)?;
    let dispatch =
        add_dispatch_variables(&mut problem, &mut objective, &mut balance, model, &build)?;
    let storage = if model.is_module_enabled(OptionalModule::Storage) {
        add_storage_variables(
            &mut problem,
            &mut objective,
            &mut balance,
            model,
            &build,
            &dispatch,
        )?
    } else {
        StorageVariables::default()
    };
    let system_power =
        add_system_power_variables(&mut problem, &mut objective, &mut balance, model)?;
    let emissions = if model.is_module_enabled(OptionalModule::Emissions) {
        Some(add_emissions_costs(
            &mut objective,
            &mut balance,
            model,
            &dispatch,
            &storage,
        )?)
    } else {
        None
    };

    let zone_balance_keys = add_zone_balance_constraints(&mut problem, model, &balance);
    add_renewable_target_constraints(&mut problem, model, &system_power, &dispatch, &storage);

    if model.is_module_enabled(OptionalModule::ExcessGeneration) {
        add_excess_generation_constraints(
            &mut problem,
            &mut objective,
            model,
            &dispatch,
            &storage,
        )?;
    }

    let resource_adequacy = if model.is_module_enabled(OptionalModule::ResourceAdequacy) {
        Some(add_resource_adequacy_constraints(
            &mut problem,
            &mut objective,
            model,
            &build,
        )?)
    } else {
        None
    };
    if model.is_module_enabled(OptionalModule::MidtermReliability) {
        add_midterm_reliability_constraints(&mut problem, model, &build)?;
    }

    if model.is_module_enabled(OptionalModule::WholesalePricing) {
        add_wholesale_pricing_costs(&mut objective, model, &dispatch)?;
    }

    problem.set_objective(objective.assemble(&model.timescales));
    debug!(
        "Formulated problem with {} variables, {} constraints and cost terms: {}",
        problem.num_vars(),
        problem.num_rows(),
        objective.iter_term_names().collect::<Vec<_>>().join(", ")
    );

    Ok(Formulation {
        problem,
        objective,
        build,
        dispatch,
        storage,
        system_power,
        zone_balance_keys,
        resource_adequacy,
        emissions,
    })
}

/// An expression for every timepoint of the model, all initially zero
fn timepoint_exprs(model: &Model) -> IndexMap<TimepointID, LinearExpr> {
    model
        .timescales
        .timepoints
        .keys()
        .map(|tp| (tp.clone(), LinearExpr::new()))
        .collect()
}

/// An expression for every period of the model, all initially zero
fn period_exprs(model: &Model) -> IndexMap<PeriodID, LinearExpr> {
    model
        .timescales
        .periods
        .keys()
        .map(|period| (*period, LinearExpr::new()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::optimisation::SolverOptions;
    use rstest::rstest;

    #[rstest]
    fn test_formulate_registers_core_terms(model: Model) {
        let formulation = formulate(&model).unwrap();
        let names: Vec<_> = formulation.objective.iter_term_names().collect();
        for name in [
            "TotalGenCapacityCost",
            "GenPPACostInTP",
            "StorageEnergyPPACostInTP",
            "HedgePremiumCostInTP",
        ] {
            assert!(names.contains(&name), "{name} not registered");
        }
        assert!(!names.contains(&"GenEmissionsCostInTP"));
        assert_eq!(formulation.zone_balance_keys.len(), 2);
    }

    #[rstest]
    fn test_formulate_solves(model: Model) {
        let formulation = formulate(&model).unwrap();
        assert!(formulation.problem.solve(&SolverOptions::default()).is_ok());
    }
}

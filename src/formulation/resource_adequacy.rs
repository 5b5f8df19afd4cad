//! System and flexible resource adequacy (RA), and midterm reliability procurement.
//!
//! Each month of each period has a capacity requirement. Qualifying capacity is built capacity
//! derated by an ELCC-style factor, with any shortfall bought as an "open position".
use super::build::BuildVariables;
use super::period_exprs;
use crate::model::Model;
use crate::optimisation::{LinearExpr, ObjectiveBuilder, Problem, Var};
use crate::policy::{RaCapacityValue, RaRequirement, ResourceAdequacyData};
use crate::project::{GenerationProject, GeneratorClass, HybridPairing, ProjectID};
use crate::timescale::{Period, PeriodID};
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// Storage with at least this many hours of energy capacity counts as long duration
const LONG_DURATION_STORAGE_HOURS: f64 = 8.0;

/// The RA position for one requirement
#[derive(Debug, Clone)]
pub struct RaPosition {
    pub requirement: RaRequirement,
    /// Qualifying capacity from the portfolio
    pub available: LinearExpr,
    /// Capacity bought to cover a shortfall
    pub open_position: Var,
    /// Qualifying capacity beyond the requirement
    pub excess: LinearExpr,
    /// Flexible excess which can be resold (flexible RA only, when resale is allowed)
    pub sellable_excess: Option<Var>,
}

/// RA positions for each (period, month)
#[derive(Debug, Default)]
pub struct ResourceAdequacyVariables {
    pub system: IndexMap<(PeriodID, u32), RaPosition>,
    pub flexible: IndexMap<(PeriodID, u32), RaPosition>,
}

/// ELCC of the storage half of a hybrid.
///
/// The storage can count for no more than the generator's peak production could charge it with,
/// spread over four hours.
pub fn hybrid_storage_elcc(
    capacity_ratio: f64,
    elcc: f64,
    energy_to_power_ratio: f64,
    generator_production_factor: f64,
) -> f64 {
    let chargeable = (capacity_ratio * energy_to_power_ratio).min(generator_production_factor);
    (capacity_ratio * elcc).min(chargeable / 4.0)
}

/// ELCC of the generator half of a hybrid, reduced by the output absorbed by its storage
pub fn hybrid_generator_elcc(
    elcc: f64,
    production_factor: f64,
    storage_capacity_ratio: f64,
    storage_energy_to_power_ratio: f64,
) -> f64 {
    if production_factor <= 0.0 {
        return 0.0;
    }

    let absorbed = (storage_capacity_ratio * storage_energy_to_power_ratio).min(production_factor);
    elcc * (production_factor - absorbed) / production_factor
}

fn capacity_value<'a>(
    data: &'a ResourceAdequacyData,
    project: &GenerationProject,
    period: PeriodID,
    month: u32,
) -> Result<&'a RaCapacityValue> {
    data.capacity_values
        .get(&(period, project.energy_source.clone(), month))
        .with_context(|| {
            format!(
                "No RA capacity value for {} in period {period} and month {month}",
                project.energy_source
            )
        })
}

/// The storage/generator capacity ratio and energy to power ratio of a hybrid's storage half
fn hybrid_storage_ratios(storage: &GenerationProject) -> Result<(f64, f64)> {
    let ratio = storage
        .hybrid_capacity_ratio()
        .with_context(|| format!("{} is not the storage half of a hybrid", storage.id))?;
    let energy_to_power = storage
        .storage()
        .and_then(|params| params.energy_to_power_ratio)
        .with_context(|| {
            format!(
                "Hybrid storage project {} needs a storage_energy_to_power_ratio",
                storage.id
            )
        })?;

    Ok((ratio, energy_to_power))
}

fn hybrid_partner<'a>(model: &'a Model, id: &ProjectID) -> Result<&'a GenerationProject> {
    model
        .projects
        .get(id)
        .with_context(|| format!("Unknown hybrid partner {id}"))
}

/// The fraction of a project's capacity which qualifies for RA in a month
pub fn effective_elcc(
    model: &Model,
    data: &ResourceAdequacyData,
    project: &GenerationProject,
    period: PeriodID,
    month: u32,
) -> Result<f64> {
    if !project.is_ra_eligible {
        return Ok(0.0);
    }
    if project.class == GeneratorClass::Dispatchable {
        return Ok(1.0);
    }

    let value = capacity_value(data, project, period, month)?;
    match &project.hybrid {
        Some(HybridPairing::Storage { generator, .. }) => {
            let generator = hybrid_partner(model, generator)?;
            let (ratio, energy_to_power) = hybrid_storage_ratios(project)?;
            let generator_value = capacity_value(data, generator, period, month)?;
            Ok(hybrid_storage_elcc(
                ratio,
                value.elcc,
                energy_to_power,
                generator_value.production_factor,
            ))
        }
        Some(HybridPairing::Generator { storage }) => {
            let storage = hybrid_partner(model, storage)?;
            let (ratio, energy_to_power) = hybrid_storage_ratios(storage)?;
            Ok(hybrid_generator_elcc(
                value.elcc,
                value.production_factor,
                ratio,
                energy_to_power,
            ))
        }
        None => Ok(value.elcc),
    }
}

/// Qualifying system RA capacity in a month
fn available_capacity(
    model: &Model,
    data: &ResourceAdequacyData,
    build: &BuildVariables,
    period: &Period,
    month: u32,
) -> Result<LinearExpr> {
    let mut available = LinearExpr::new();
    for project in model.projects.values() {
        if !project.is_ra_eligible || !model.is_operational(project, period) {
            continue;
        }

        let elcc = effective_elcc(model, data, project, period.id, month)?;
        // Hybrid storage ELCC is relative to the paired generator's capacity
        let multiplier = match project.hybrid_capacity_ratio() {
            Some(ratio) if ratio <= 0.0 => 0.0,
            Some(ratio) => 1.0 / ratio,
            None => 1.0,
        };
        let capacity = build.capacity_in_period(model, project, period);
        available.add_scaled(&capacity, elcc * multiplier);
    }

    Ok(available)
}

/// Qualifying flexible RA capacity: storage, counting both charging and discharging
fn available_flexible_capacity(
    model: &Model,
    build: &BuildVariables,
    period: &Period,
) -> LinearExpr {
    let mut available = LinearExpr::new();
    for project in model.iter_storage_projects() {
        let Some(storage) = project.storage() else {
            continue;
        };
        if !project.is_ra_eligible {
            continue;
        }

        let capacity = build.capacity_in_period(model, project, period);
        available.add_scaled(&capacity, 1.0 + storage.charge_to_discharge_ratio);
    }

    available
}

/// Add an open position covering any shortfall of `available` against the requirement
fn add_position(
    problem: &mut Problem,
    requirement: &RaRequirement,
    available: LinearExpr,
) -> RaPosition {
    let open_position = problem.add_var(0.0, f64::INFINITY);
    let requirement_value = requirement.requirement.value();
    problem.add_ge(&(available.clone() + open_position), requirement_value);

    let mut excess = available.clone() + open_position;
    excess.add_constant(-requirement_value);
    RaPosition {
        requirement: requirement.clone(),
        available,
        open_position,
        excess,
        sellable_excess: None,
    }
}

/// Add system and flexible RA positions, registering their costs and resale values
pub fn add_resource_adequacy_constraints(
    problem: &mut Problem,
    objective: &mut ObjectiveBuilder,
    model: &Model,
    build: &BuildVariables,
) -> Result<ResourceAdequacyVariables> {
    let data = model
        .resource_adequacy
        .as_ref()
        .context("RA data is required by the resource_adequacy module")?;

    let mut vars = ResourceAdequacyVariables::default();
    for ((period_id, month), requirement) in &data.requirements {
        let period = model.timescales.period(*period_id)?;
        let available = available_capacity(model, data, build, period, *month)?;
        let position = add_position(problem, requirement, available);
        vars.system.insert((*period_id, *month), position);
    }

    for (key, requirement) in &data.flexible_requirements {
        let period = model.timescales.period(key.0)?;
        let available = available_flexible_capacity(model, build, period);
        let mut position = add_position(problem, requirement, available);
        if model.parameters.sell_excess_ra {
            // Only capacity in excess of both requirements can be resold
            let system = vars.system.get(key).with_context(|| {
                format!(
                    "No system RA requirement for period {} and month {}",
                    key.0, key.1
                )
            })?;
            let sellable = problem.add_var(0.0, f64::INFINITY);
            problem.add_le(&(sellable - system.excess.clone()), 0.0);
            problem.add_le(&(sellable - position.excess.clone()), 0.0);
            position.sellable_excess = Some(sellable);
        }
        vars.flexible.insert(*key, position);
    }

    let mut open_costs = period_exprs(model);
    for ((period, _), position) in vars.system.iter().chain(&vars.flexible) {
        open_costs[period].add_term(position.open_position, position.requirement.cost.value());
    }
    objective.register_period_cost("TotalRAOpenPositionCost", open_costs)?;

    if model.parameters.sell_excess_ra {
        let mut resale = period_exprs(model);
        for ((period, _), position) in &vars.system {
            resale[period].add_scaled(&position.excess, -position.requirement.resell_value.value());
        }
        for ((period, _), position) in &vars.flexible {
            if let Some(sellable) = position.sellable_excess {
                resale[period].add_term(sellable, -position.requirement.resell_value.value());
            }
        }
        objective.register_period_cost("TotalRAExcessValue", resale)?;
    }

    Ok(vars)
}

/// Require procurement of new firm capacity and long-duration storage
pub fn add_midterm_reliability_constraints(
    problem: &mut Problem,
    model: &Model,
    build: &BuildVariables,
) -> Result<()> {
    let requirements = model
        .midterm_reliability
        .as_ref()
        .context(
            "Midterm reliability requirements are required by the midterm_reliability module",
        )?;
    let base_year = model.timescales.financials.base_financial_year;

    for (period_id, requirement) in requirements {
        let period = model.timescales.period(*period_id)?;
        let mut firm = LinearExpr::new();
        let mut long_duration = LinearExpr::new();
        for project in model.projects.values().filter(|project| project.is_ra_eligible) {
            let capacity = build.capacity_in_period(model, project, period);
            let is_new = project.cod_year.is_some_and(|year| year > base_year);
            match &project.class {
                GeneratorClass::Baseload if is_new => firm += &capacity,
                GeneratorClass::Storage(storage)
                    if storage
                        .energy_to_power_ratio
                        .is_some_and(|ratio| ratio >= LONG_DURATION_STORAGE_HOURS) =>
                {
                    long_duration += &capacity;
                }
                _ => {}
            }
        }

        problem.add_ge(&firm, requirement.firm.value());
        problem.add_ge(&long_duration, requirement.long_duration_storage.value());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::formulation::build::add_build_variables;
    use crate::optimisation::SolverOptions;
    use crate::policy::MidtermRequirement;
    use crate::project::{EnergySourceID, StorageParameters};
    use crate::units::{Capacity, MoneyPerCapacity};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn requirement(value: f64) -> RaRequirement {
        RaRequirement {
            requirement: Capacity(value),
            cost: MoneyPerCapacity(10.0),
            resell_value: MoneyPerCapacity(1.0),
        }
    }

    fn ra_data(elcc: f64) -> ResourceAdequacyData {
        let value = RaCapacityValue {
            elcc,
            production_factor: 0.6,
        };
        ResourceAdequacyData {
            requirements: [((2025, 8), requirement(50.0))].into_iter().collect(),
            flexible_requirements: [((2025, 8), requirement(4.0))].into_iter().collect(),
            capacity_values: [
                ((2025, EnergySourceID::new("Gas"), 8), value),
                ((2025, EnergySourceID::new("Battery"), 8), value),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_hybrid_storage_elcc() {
        assert_approx_eq!(f64, hybrid_storage_elcc(0.5, 0.9, 4.0, 0.6), 0.15, epsilon = 1e-12);
        // Limited by the storage's own ELCC
        assert_approx_eq!(f64, hybrid_storage_elcc(0.5, 0.2, 4.0, 0.6), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_hybrid_generator_elcc() {
        assert_approx_eq!(f64, hybrid_generator_elcc(0.3, 0.6, 0.5, 4.0), 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, hybrid_generator_elcc(0.3, 0.6, 0.5, 0.5), 0.175, epsilon = 1e-12);
        assert_eq!(hybrid_generator_elcc(0.3, 0.0, 0.5, 0.5), 0.0);
    }

    #[rstest]
    fn test_effective_elcc(mut model: Model) {
        let data = ra_data(0.8);
        let gen1 = model.projects["gen1"].clone();
        assert_eq!(effective_elcc(&model, &data, &gen1, 2025, 8).unwrap(), 0.0);

        model.projects["gen1"].is_ra_eligible = true;
        model.projects["battery"].is_ra_eligible = true;
        let gen1 = &model.projects["gen1"];
        let battery = &model.projects["battery"];
        assert_eq!(effective_elcc(&model, &data, gen1, 2025, 8).unwrap(), 1.0);
        assert_eq!(effective_elcc(&model, &data, battery, 2025, 8).unwrap(), 0.8);
        assert!(effective_elcc(&model, &data, battery, 2025, 1).is_err());
    }

    #[rstest]
    fn test_effective_elcc_hybrid(mut model: Model) {
        let data = ra_data(0.9);
        let gen1 = &mut model.projects["gen1"];
        gen1.class = GeneratorClass::Variable;
        gen1.is_ra_eligible = true;
        gen1.hybrid = Some(HybridPairing::Generator {
            storage: "battery".into(),
        });
        let battery = &mut model.projects["battery"];
        battery.is_ra_eligible = true;
        battery.hybrid = Some(HybridPairing::Storage {
            generator: "gen1".into(),
            min_capacity_ratio: 0.5,
            max_capacity_ratio: None,
        });

        let battery = &model.projects["battery"];
        let elcc = effective_elcc(&model, &data, battery, 2025, 8).unwrap();
        assert_approx_eq!(f64, elcc, 0.15, epsilon = 1e-12);

        // min(0.5 * 2, 0.6) absorbs the whole production factor
        let gen1 = &model.projects["gen1"];
        assert_eq!(effective_elcc(&model, &data, gen1, 2025, 8).unwrap(), 0.0);

        let GeneratorClass::Storage(storage) = &mut model.projects["battery"].class else {
            panic!("battery should be storage");
        };
        storage.energy_to_power_ratio = None;
        let battery = &model.projects["battery"];
        assert!(effective_elcc(&model, &data, battery, 2025, 8).is_err());
    }

    #[rstest]
    fn test_open_position(mut model: Model) {
        model.projects["gen1"].is_ra_eligible = true;
        model.projects["battery"].is_ra_eligible = true;
        model.resource_adequacy = Some(ra_data(0.8));
        model.parameters.sell_excess_ra = true;

        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let build = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let vars =
            add_resource_adequacy_constraints(&mut problem, &mut objective, &model, &build)
                .unwrap();

        // 30 MW of gas and 1 MW of storage
        let gen1 = build.capacity_var(&"gen1".into(), 2025).unwrap();
        let battery = build.capacity_var(&"battery".into(), 2025).unwrap();
        problem.add_eq(&LinearExpr::from(gen1), 30.0);
        problem.add_eq(&LinearExpr::from(battery), 1.0);
        problem.set_objective(objective.assemble(&model.timescales));
        let solution = problem.solve(&SolverOptions::default()).unwrap();

        let system = &vars.system[&(2025, 8)];
        assert_approx_eq!(f64, solution.evaluate(&system.available), 30.8, epsilon = 1e-7);
        assert_approx_eq!(f64, solution.value(system.open_position), 19.2, epsilon = 1e-7);
        let flexible = &vars.flexible[&(2025, 8)];
        assert_approx_eq!(f64, solution.value(flexible.open_position), 2.0, epsilon = 1e-7);
        assert!(flexible.sellable_excess.is_some());
        assert_eq!(
            objective.iter_term_names().collect::<Vec<_>>(),
            [
                "TotalGenCapacityCost",
                "TotalRAOpenPositionCost",
                "TotalRAExcessValue"
            ]
        );
    }

    #[rstest]
    fn test_midterm_reliability(mut model: Model) {
        model.timescales.financials.base_financial_year = 2024;
        let gen1 = &mut model.projects["gen1"];
        gen1.class = GeneratorClass::Baseload;
        gen1.is_ra_eligible = true;
        gen1.cod_year = Some(2025);
        let battery = &mut model.projects["battery"];
        battery.is_ra_eligible = true;
        battery.class = GeneratorClass::Storage(StorageParameters {
            energy_to_power_ratio: Some(8.0),
            ..battery.storage().unwrap().clone()
        });
        model.midterm_reliability = Some(
            [(
                2025,
                MidtermRequirement {
                    firm: Capacity(40.0),
                    long_duration_storage: Capacity(3.0),
                },
            )]
            .into_iter()
            .collect(),
        );

        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let build = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        add_midterm_reliability_constraints(&mut problem, &model, &build).unwrap();
        let gen1 = build.capacity_var(&"gen1".into(), 2025).unwrap();
        let battery = build.capacity_var(&"battery".into(), 2025).unwrap();
        problem.set_objective(gen1 + battery);
        let solution = problem.solve(&SolverOptions::default()).unwrap();
        assert_approx_eq!(f64, solution.value(gen1), 40.0, epsilon = 1e-7);
        assert_approx_eq!(f64, solution.value(battery), 3.0, epsilon = 1e-7);
    }
}

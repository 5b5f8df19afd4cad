//! Capacity build decisions and the rules linking them.
use super::period_exprs;
use crate::model::{Model, VariantSelection};
use crate::optimisation::{LinearExpr, ObjectiveBuilder, Problem, Var};
use crate::project::{
    BuildKind, BuildYear, GenerationProject, HybridPairing, ProjectID, StorageParameters,
    VariantGroupID,
};
use crate::timescale::Period;
use anyhow::Result;
use indexmap::IndexMap;

/// A key for values indexed by project and build year
pub type BuildKey = (ProjectID, u32);

/// The variables describing what is built
#[derive(Debug, Default)]
pub struct BuildVariables {
    /// Power capacity built in each build year
    capacity: IndexMap<BuildKey, Var>,
    /// Energy capacity built in each build year (storage only)
    energy: IndexMap<BuildKey, Var>,
    /// Whether each project in a variant group is the one selected
    variant_selected: IndexMap<ProjectID, Var>,
}

impl BuildVariables {
    /// The capacity variable for a build year
    pub fn capacity_var(&self, project: &ProjectID, year: u32) -> Option<Var> {
        self.capacity.get(&(project.clone(), year)).copied()
    }

    /// The energy capacity variable for a storage build year
    pub fn energy_var(&self, project: &ProjectID, year: u32) -> Option<Var> {
        self.energy.get(&(project.clone(), year)).copied()
    }

    /// Iterate over the capacity variable of every build year
    pub fn iter_capacity_vars(&self) -> impl Iterator<Item = (&BuildKey, Var)> {
        self.capacity.iter().map(|(key, var)| (key, *var))
    }

    /// The selection indicator of a project in a variant group
    pub fn variant_selected_var(&self, project: &ProjectID) -> Option<Var> {
        self.variant_selected.get(project).copied()
    }

    fn sum_online(
        vars: &IndexMap<BuildKey, Var>,
        model: &Model,
        project: &GenerationProject,
        period: &Period,
    ) -> LinearExpr {
        model
            .online_build_years(project, period)
            .filter_map(|build| vars.get(&(project.id.clone(), build.year)))
            .map(|var| LinearExpr::from(*var))
            .sum()
    }

    /// Power capacity online in a period (zero if no build years are online)
    pub fn capacity_in_period(
        &self,
        model: &Model,
        project: &GenerationProject,
        period: &Period,
    ) -> LinearExpr {
        Self::sum_online(&self.capacity, model, project, period)
    }

    /// Energy capacity online in a period (zero for non-storage projects)
    pub fn energy_capacity_in_period(
        &self,
        model: &Model,
        project: &GenerationProject,
        period: &Period,
    ) -> LinearExpr {
        Self::sum_online(&self.energy, model, project, period)
    }
}

/// Add build variables and the constraints on them.
///
/// # Arguments
///
/// * `problem` - The optimisation problem
/// * `objective` - For registering capacity costs
/// * `model` - The model
///
/// # Returns
///
/// The build variables, for use by the rest of the formulation.
pub fn add_build_variables(
    problem: &mut Problem,
    objective: &mut ObjectiveBuilder,
    model: &Model,
) -> Result<BuildVariables> {
    let mut vars = BuildVariables::default();
    for project in model.projects.values() {
        for build in model.build_years(&project.id) {
            let key = (project.id.clone(), build.year);
            let capacity = match &build.kind {
                // Predetermined capacity is a floor which may be built on
                BuildKind::Predetermined { capacity, .. } => {
                    problem.add_var(capacity.value(), project.capacity_limit.value())
                }
                BuildKind::Optimisable { .. } => add_optimisable_build(problem, project),
            };
            vars.capacity.insert(key.clone(), capacity);

            if let Some(storage) = project.storage() {
                let energy = add_energy_build(problem, storage, build, capacity);
                vars.energy.insert(key, energy);
            }
        }
    }

    add_max_build_potential_constraints(problem, model, &vars);
    add_hybrid_build_ratio_constraints(problem, model, &vars);
    if model.parameters.select_variants != VariantSelection::None {
        add_variant_constraints(problem, model, &mut vars);
    }

    let mut costs = period_exprs(model);
    for project in model.projects.values() {
        for period in model.operational_periods(project) {
            let capacity = vars.capacity_in_period(model, project, period);
            costs[&period.id].add_scaled(&capacity, project.ppa_capacity_cost.value());
        }
    }
    objective.register_period_cost("TotalGenCapacityCost", costs)?;

    Ok(vars)
}

/// Add the capacity variable for an optimisable build, along with any discrete sizing rules
fn add_optimisable_build(problem: &mut Problem, project: &GenerationProject) -> Var {
    let limit = project.capacity_limit.value();
    let capacity = problem.add_var(0.0, limit);

    if let Some(unit_size) = project.unit_size {
        let max_units = (limit / unit_size.value()).floor();
        let units = problem.add_integer_var(0.0, max_units);
        problem.add_eq(&(capacity - units * unit_size.value()), 0.0);
    }

    let min_build = project.min_build_capacity.value();
    if min_build > 0.0 {
        // Either nothing is built or at least the minimum
        let committed = problem.add_binary_var();
        problem.add_ge(&(capacity - committed * min_build), 0.0);
        problem.add_le(&(capacity - committed * limit), 0.0);
    }

    capacity
}

/// Add the energy capacity variable for a storage build
fn add_energy_build(
    problem: &mut Problem,
    storage: &StorageParameters,
    build: &BuildYear,
    capacity: Var,
) -> Var {
    match &build.kind {
        BuildKind::Predetermined {
            capacity: power,
            energy_capacity,
        } => {
            let energy = energy_capacity.map_or_else(
                || power.value() * storage.energy_to_power_ratio.unwrap_or(0.0),
                |energy| energy.value(),
            );
            problem.add_var(energy, energy)
        }
        BuildKind::Optimisable { .. } => {
            let energy = problem.add_var(0.0, f64::INFINITY);
            if let Some(ratio) = storage.energy_to_power_ratio {
                problem.add_eq(&(energy - capacity * ratio), 0.0);
            }
            energy
        }
    }
}

/// Installed capacity can never exceed the capacity limit
fn add_max_build_potential_constraints(
    problem: &mut Problem,
    model: &Model,
    vars: &BuildVariables,
) {
    for project in model.projects.values() {
        for period in model.operational_periods(project) {
            let capacity = vars.capacity_in_period(model, project, period);
            problem.add_le(&capacity, project.capacity_limit.value());
        }
    }
}

/// Bound hybrid storage builds relative to the paired generator's build in the same year
fn add_hybrid_build_ratio_constraints(
    problem: &mut Problem,
    model: &Model,
    vars: &BuildVariables,
) {
    for project in model.iter_storage_projects() {
        let Some(HybridPairing::Storage {
            generator,
            min_capacity_ratio,
            max_capacity_ratio,
        }) = &project.hybrid
        else {
            continue;
        };

        for build in model.build_years(&project.id) {
            let (Some(storage_var), Some(generator_var)) = (
                vars.capacity_var(&project.id, build.year),
                vars.capacity_var(generator, build.year),
            ) else {
                continue;
            };

            problem.add_ge(&(storage_var - generator_var * *min_capacity_ratio), 0.0);
            if let Some(max_ratio) = max_capacity_ratio {
                problem.add_le(&(storage_var - generator_var * *max_ratio), 0.0);
            }
        }
    }
}

/// At most one project in each variant group may be built
fn add_variant_constraints(problem: &mut Problem, model: &Model, vars: &mut BuildVariables) {
    let mut groups: IndexMap<&VariantGroupID, Vec<&GenerationProject>> = IndexMap::new();
    for project in model.projects.values() {
        if let Some(group) = &project.variant_group {
            groups.entry(group).or_default().push(project);
        }
    }

    for projects in groups.values() {
        let mut selected_sum = LinearExpr::new();
        for project in projects {
            let selected = match model.parameters.select_variants {
                VariantSelection::Binary => problem.add_binary_var(),
                _ => problem.add_var(0.0, 1.0),
            };
            for period in model.operational_periods(project) {
                let capacity = vars.capacity_in_period(model, project, period);
                let limit = project.capacity_limit.value();
                problem.add_le(&(capacity - selected * limit), 0.0);
            }
            selected_sum += selected;
            vars.variant_selected.insert(project.id.clone(), selected);
        }
        problem.add_le(&selected_sum, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::optimisation::SolverOptions;
    use crate::units::{Capacity, Energy};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Solve, maximising the capacity of `gen1`
    fn solve_max_gen1(model: &Model) -> (BuildVariables, crate::optimisation::ProblemSolution) {
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, model).unwrap();
        let gen1 = &model.projects["gen1"];
        let period = &model.timescales.periods[&2025];
        problem.set_objective(-vars.capacity_in_period(model, gen1, period));
        let solution = problem.solve(&SolverOptions::default()).unwrap();
        (vars, solution)
    }

    #[rstest]
    fn test_capacity_in_period(mut model: Model) {
        model.build_years["gen1"].push(BuildYear {
            year: 2010,
            kind: BuildKind::Predetermined {
                capacity: Capacity(30.0),
                energy_capacity: None,
            },
            online_year: 2010,
        });
        // Retired before the period starts
        model.build_years["gen1"].push(BuildYear {
            year: 1990,
            kind: BuildKind::Predetermined {
                capacity: Capacity(20.0),
                energy_capacity: None,
            },
            online_year: 1990,
        });

        let (vars, solution) = solve_max_gen1(&model);
        let existing = vars.capacity_var(&"gen1".into(), 2010).unwrap();
        assert!(solution.value(existing) >= 30.0 - 1e-7);
        // The limit applies to the total in the period
        assert_approx_eq!(f64, solution.objective_value, -100.0, epsilon = 1e-7);
    }

    #[rstest]
    #[case(-1.0, 100.0)]
    #[case(1.0, 10.0)]
    fn test_predetermined_bounds(mut model: Model, #[case] sense: f64, #[case] expected: f64) {
        model.build_years["gen1"] = vec![BuildYear {
            year: 2025,
            kind: BuildKind::Predetermined {
                capacity: Capacity(10.0),
                energy_capacity: None,
            },
            online_year: 2025,
        }];
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let var = vars.capacity_var(&"gen1".into(), 2025).unwrap();
        problem.set_objective(var * sense);
        let solution = problem.solve(&SolverOptions::default()).unwrap();

        // At least the predetermined 10 MW and at most the 100 MW limit
        assert_approx_eq!(f64, solution.value(var), expected, epsilon = 1e-7);
    }

    #[rstest]
    #[case(-1.0, 3.2)]
    #[case(1.0, 2.0)]
    fn test_hybrid_build_ratio(mut model: Model, #[case] sense: f64, #[case] expected: f64) {
        model.projects["battery"].hybrid = Some(HybridPairing::Storage {
            generator: "gen1".into(),
            min_capacity_ratio: 0.5,
            max_capacity_ratio: Some(0.8),
        });
        model.projects["gen1"].hybrid = Some(HybridPairing::Generator {
            storage: "battery".into(),
        });
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let generator = vars.capacity_var(&"gen1".into(), 2025).unwrap();
        let battery = vars.capacity_var(&"battery".into(), 2025).unwrap();
        problem.add_eq(&LinearExpr::from(generator), 4.0);
        problem.set_objective(battery * sense);
        let solution = problem.solve(&SolverOptions::default()).unwrap();

        // Between 0.5 and 0.8 times the 4 MW generator
        assert_approx_eq!(f64, solution.value(battery), expected, epsilon = 1e-7);
    }

    #[rstest]
    fn test_unit_size(mut model: Model) {
        model.projects["gen1"].unit_size = Some(Capacity(30.0));
        let (_, solution) = solve_max_gen1(&model);
        assert_approx_eq!(f64, solution.objective_value, -90.0, epsilon = 1e-7);
    }

    #[rstest]
    fn test_min_build(mut model: Model) {
        model.projects["gen1"].min_build_capacity = Capacity(40.0);
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let var = vars.capacity_var(&"gen1".into(), 2025).unwrap();

        // Needing 10 MW, building 40 MW is cheaper than the shortfall
        let shortfall = problem.add_var(0.0, f64::INFINITY);
        problem.add_ge(&(var + shortfall), 10.0);
        problem.set_objective(var * 1.0 + shortfall * 10.0);
        let solution = problem.solve(&SolverOptions::default()).unwrap();
        assert!(problem.is_mip());
        assert_approx_eq!(f64, solution.value(var), 40.0, epsilon = 1e-7);
    }

    #[rstest]
    fn test_storage_energy_ratio(model: Model) {
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let battery = &model.projects["battery"];
        let period = &model.timescales.periods[&2025];
        problem.set_objective(-vars.energy_capacity_in_period(&model, battery, period));
        let solution = problem.solve(&SolverOptions::default()).unwrap();

        // 5 MW limit with a 2 hour energy to power ratio
        assert_approx_eq!(f64, -solution.objective_value, 10.0, epsilon = 1e-7);
    }

    #[rstest]
    fn test_predetermined_energy(mut model: Model) {
        model.build_years["battery"] = vec![BuildYear {
            year: 2020,
            kind: BuildKind::Predetermined {
                capacity: Capacity(2.0),
                energy_capacity: Some(Energy(7.0)),
            },
            online_year: 2020,
        }];
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let energy = vars.energy_var(&"battery".into(), 2020).unwrap();
        problem.set_objective(LinearExpr::from(energy));
        let solution = problem.solve(&SolverOptions::default()).unwrap();
        assert_approx_eq!(f64, solution.value(energy), 7.0, epsilon = 1e-7);
    }

    #[rstest]
    fn test_variants(mut model: Model) {
        model.parameters.select_variants = VariantSelection::Binary;
        let mut gen2 = model.projects["gen1"].clone();
        gen2.id = "gen2".into();
        model.projects["gen1"].variant_group = Some("group".into());
        gen2.variant_group = Some("group".into());
        let builds = model.build_years["gen1"].clone();
        model.build_years.insert(gen2.id.clone(), builds);
        model.projects.insert(gen2.id.clone(), gen2);

        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        let vars = add_build_variables(&mut problem, &mut objective, &model).unwrap();
        let period = &model.timescales.periods[&2025];
        let total = vars.capacity_in_period(&model, &model.projects["gen1"], period)
            + vars.capacity_in_period(&model, &model.projects["gen2"], period);
        problem.set_objective(-total);
        let solution = problem.solve(&SolverOptions::default()).unwrap();

        // Only one of the two can be built
        assert!(vars.variant_selected_var(&"gen2".into()).is_some());
        assert_approx_eq!(f64, solution.objective_value, -100.0, epsilon = 1e-7);
    }

    #[rstest]
    fn test_capacity_cost_registered(model: Model) {
        let mut problem = Problem::new();
        let mut objective = ObjectiveBuilder::new();
        add_build_variables(&mut problem, &mut objective, &model).unwrap();
        assert_eq!(
            objective.iter_term_names().collect::<Vec<_>>(),
            ["TotalGenCapacityCost"]
        );
    }
}

//! Reading results out of a solved problem.
use crate::formulation::Formulation;
use crate::formulation::resource_adequacy::RaPosition;
use crate::model::Model;
use crate::optimisation::{ProblemSolution, TermValue};
use crate::project::ProjectID;
use crate::timescale::{PeriodID, Timepoint, TimepointID};
use crate::units::{Capacity, Energy, Money, MoneyPerCapacity};
use crate::zone::ZoneID;

/// The kind of resource adequacy requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RaCategory {
    /// System (peak) capacity
    #[strum(to_string = "system_RA")]
    System,
    /// Flexible (ramping) capacity
    #[strum(to_string = "flexible_RA")]
    Flexible,
}

/// The solved RA position for one requirement
#[derive(Debug, Clone, PartialEq)]
pub struct RaSummary {
    pub period: PeriodID,
    pub category: RaCategory,
    pub month: u32,
    pub requirement: Capacity,
    /// Qualifying capacity in the portfolio
    pub available: Capacity,
    pub open_position: Capacity,
    pub excess: Capacity,
    /// Annual cost of covering the open position
    pub open_position_cost: Money,
    /// Annual value from reselling excess capacity
    pub excess_value: Money,
}

/// An unbuilt project which could be built without changing the objective value
#[derive(Debug, Clone, PartialEq)]
pub struct AlternateOptimum<'a> {
    pub project: &'a ProjectID,
    pub build_year: u32,
    pub reduced_cost: f64,
}

/// The solution to the capacity expansion and dispatch problem
pub struct Solution<'a> {
    model: &'a Model,
    formulation: &'a Formulation,
    solution: ProblemSolution,
}

impl<'a> Solution<'a> {
    /// Wrap the raw solution to a formulated problem
    pub fn new(model: &'a Model, formulation: &'a Formulation, solution: ProblemSolution) -> Self {
        Self {
            model,
            formulation,
            solution,
        }
    }

    /// The value of the objective, including constant terms
    pub fn objective_value(&self) -> Money {
        Money(self.solution.objective_value)
    }

    /// Whether the problem had integer variables, in which case duals are not available
    pub fn is_mip(&self) -> bool {
        self.solution.is_mip
    }

    /// Iterate over the capacity built in each build year.
    ///
    /// # Returns
    ///
    /// An iterator of project ID, build year, power capacity and energy capacity (storage only).
    pub fn iter_builds(
        &self,
    ) -> impl Iterator<Item = (&'a ProjectID, u32, Capacity, Option<Energy>)> {
        let build = &self.formulation.build;
        build.iter_capacity_vars().map(move |((project, year), var)| {
            let energy = build
                .energy_var(project, *year)
                .map(|var| Energy(self.solution.value(var)));
            (project, *year, Capacity(self.solution.value(var)), energy)
        })
    }

    /// Iterate over the capacity online in each operational period along with its annual cost
    pub fn iter_capacity(
        &self,
    ) -> impl Iterator<Item = (&'a ProjectID, PeriodID, Capacity, Money)> {
        let model = self.model;
        model.projects.values().flat_map(move |project| {
            model.operational_periods(project).map(move |period| {
                let expr = self
                    .formulation
                    .build
                    .capacity_in_period(model, project, period);
                let capacity = Capacity(self.solution.evaluate(&expr));
                (&project.id, period.id, capacity, project.ppa_capacity_cost * capacity)
            })
        })
    }

    /// Iterate over the dispatch, excess generation and curtailment of each generator
    pub fn iter_dispatch(
        &self,
    ) -> impl Iterator<Item = (&'a ProjectID, &'a Timepoint, Capacity, Capacity, Capacity)> {
        let model = self.model;
        let dispatch = &self.formulation.dispatch;
        dispatch.iter_dispatch().map(move |((project, tp), var)| {
            let excess = self.solution.evaluate(&dispatch.excess_expr(project, tp));
            let curtailment = dispatch
                .curtailment_var(project, tp)
                .map_or(0.0, |var| self.solution.value(var));
            (
                project,
                &model.timescales.timepoints[tp],
                Capacity(self.solution.value(var)),
                Capacity(excess),
                Capacity(curtailment),
            )
        })
    }

    /// Iterate over the charge, discharge and state of charge of each storage project
    pub fn iter_storage_dispatch(
        &self,
    ) -> impl Iterator<Item = (&'a ProjectID, &'a TimepointID, Capacity, Capacity, Energy)> {
        let storage = &self.formulation.storage;
        storage.iter_keys().filter_map(move |(project, tp)| {
            let charge = storage.charge_var(project, tp)?;
            let discharge = storage.discharge_var(project, tp)?;
            let soc = storage.state_of_charge_var(project, tp)?;
            Some((
                project,
                tp,
                Capacity(self.solution.value(charge)),
                Capacity(self.solution.value(discharge)),
                Energy(self.solution.value(soc)),
            ))
        })
    }

    /// Iterate over the number of full discharge cycles per year of each storage project.
    ///
    /// Projects with no energy capacity in a period have zero cycles.
    pub fn iter_storage_cycles(&self) -> impl Iterator<Item = (&'a ProjectID, PeriodID, f64)> {
        let model = self.model;
        self.formulation
            .storage
            .iter_throughput()
            .map(move |((project_id, period_id), throughput)| {
                let project = &model.projects[project_id];
                let period = &model.timescales.periods[period_id];
                let energy_capacity = self.solution.evaluate(
                    &self
                        .formulation
                        .build
                        .energy_capacity_in_period(model, project, period),
                );
                let annual_throughput =
                    self.solution.evaluate(throughput) / f64::from(period.length_years());
                let cycles = if energy_capacity > 0.0 {
                    annual_throughput / energy_capacity
                } else {
                    0.0
                };
                (project_id, *period_id, cycles)
            })
    }

    /// Iterate over system power bought in each zone and timepoint
    pub fn iter_system_power(
        &self,
    ) -> impl Iterator<Item = (&'a ZoneID, &'a TimepointID, Capacity)> {
        self.formulation
            .system_power
            .iter()
            .map(move |((zone, tp), var)| (zone, tp, Capacity(self.solution.value(*var))))
    }

    fn ra_summary(
        &self,
        period: PeriodID,
        month: u32,
        category: RaCategory,
        position: &RaPosition,
    ) -> RaSummary {
        let open_position = Capacity(self.solution.value(position.open_position));
        let excess = Capacity(self.solution.evaluate(&position.excess));
        let resell_value = if self.model.parameters.sell_excess_ra {
            position.requirement.resell_value
        } else {
            MoneyPerCapacity(0.0)
        };
        let excess_value = match category {
            RaCategory::System => resell_value * excess,
            RaCategory::Flexible => position.sellable_excess.map_or(Money(0.0), |var| {
                resell_value * Capacity(self.solution.value(var))
            }),
        };

        RaSummary {
            period,
            category,
            month,
            requirement: position.requirement.requirement,
            available: Capacity(self.solution.evaluate(&position.available)),
            open_position,
            excess,
            open_position_cost: position.requirement.cost * open_position,
            excess_value,
        }
    }

    /// The solved RA positions, if the RA module is enabled
    pub fn ra_summaries(&self) -> Vec<RaSummary> {
        let Some(ra) = &self.formulation.resource_adequacy else {
            return Vec::new();
        };

        let system = ra
            .system
            .iter()
            .map(|((period, month), position)| (*period, *month, RaCategory::System, position));
        let flexible = ra
            .flexible
            .iter()
            .map(|((period, month), position)| (*period, *month, RaCategory::Flexible, position));
        system
            .chain(flexible)
            .map(|(period, month, category, position)| {
                self.ra_summary(period, month, category, position)
            })
            .collect()
    }

    /// Iterate over the net emissions of each project in each timepoint (in tonnes)
    pub fn iter_emissions(&self) -> impl Iterator<Item = (&'a ProjectID, &'a TimepointID, f64)> {
        self.formulation
            .emissions
            .iter()
            .flatten()
            .map(move |((project, tp), expr)| (project, tp, self.solution.evaluate(expr)))
    }

    /// The value of every objective term in every period
    pub fn objective_terms(&self) -> Vec<TermValue> {
        self.formulation
            .objective
            .evaluate_terms(&self.model.timescales, &self.solution)
    }

    /// Iterate over the duals of the zone energy balance constraints (marginal energy costs)
    pub fn iter_zone_balance_duals(
        &self,
    ) -> impl Iterator<Item = (&'a ZoneID, &'a TimepointID, f64)> {
        self.formulation
            .zone_balance_keys
            .zip_duals(self.solution.dual_rows())
            .map(|((zone, tp), dual)| (zone, tp, dual))
    }

    /// Iterate over the build level and reduced cost of every optimisable build
    pub fn iter_build_reduced_costs(
        &self,
    ) -> impl Iterator<Item = (&'a ProjectID, u32, Capacity, f64)> {
        let model = self.model;
        self.formulation
            .build
            .iter_capacity_vars()
            .filter(move |((project, year), _)| {
                model
                    .build_years(project)
                    .iter()
                    .any(|build| build.year == *year && build.is_optimisable())
            })
            .map(move |((project, year), var)| {
                (
                    project,
                    *year,
                    Capacity(self.solution.value(var)),
                    self.solution.reduced_cost(var),
                )
            })
    }

    /// Find unbuilt projects whose reduced cost is zero.
    ///
    /// Building some of such a project would give another solution with the same objective value.
    /// Reduced costs are only meaningful for LPs, so nothing is returned for MIPs.
    pub fn find_alternate_optima(&self, tolerance: f64) -> Vec<AlternateOptimum<'a>> {
        if self.is_mip() {
            return Vec::new();
        }

        self.iter_build_reduced_costs()
            .filter(|(_, _, capacity, reduced_cost)| {
                capacity.value().abs() < tolerance && reduced_cost.abs() < tolerance
            })
            .map(|(project, build_year, _, reduced_cost)| AlternateOptimum {
                project,
                build_year,
                reduced_cost,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::formulation::formulate;
    use crate::optimisation::SolverOptions;
    use crate::units::MoneyPerEnergy;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// The fixture model without storage, with system power dearer than the generator
    fn toy_model(mut model: Model) -> Model {
        model.parameters.modules.clear();
        model.projects.swap_remove("battery");
        model.build_years.swap_remove("battery");
        model.projects_by_zone = Model::index_projects_by_zone(&model.zones, &model.projects);
        for cost in model.hedge_premium_costs.values_mut() {
            *cost = MoneyPerEnergy(200.0);
        }
        model
    }

    #[rstest]
    fn test_toy_solution(model: Model) {
        let model = toy_model(model);
        let formulation = formulate(&model).unwrap();
        let solution = formulation.problem.solve(&SolverOptions::default()).unwrap();
        let solution = Solution::new(&model, &formulation, solution);

        let builds: Vec<_> = solution.iter_builds().collect();
        assert_eq!(builds.len(), 1);
        assert_approx_eq!(f64, builds[0].2.value(), 100.0, epsilon = 1e-6);
        assert_eq!(builds[0].3, None);

        let dispatch: Vec<_> = solution
            .iter_dispatch()
            .map(|(_, _, dispatch, _, _)| dispatch.value())
            .collect();
        assert_approx_eq!(f64, dispatch[0], 80.0, epsilon = 1e-6);
        assert_approx_eq!(f64, dispatch[1], 100.0, epsilon = 1e-6);

        let system_power: Vec<_> = solution
            .iter_system_power()
            .map(|(_, _, power)| power.value())
            .collect();
        assert_approx_eq!(f64, system_power[0], 0.0, epsilon = 1e-6);
        assert_approx_eq!(f64, system_power[1], 20.0, epsilon = 1e-6);

        let expected = 50.0 * 180.0 + 200.0 * 20.0;
        assert_approx_eq!(f64, solution.objective_value().value(), expected, epsilon = 1e-6);
        let total: f64 = solution
            .objective_terms()
            .iter()
            .map(|term| term.discounted_value.value())
            .sum();
        assert_approx_eq!(f64, total, expected, epsilon = 1e-6);

        assert!(solution.ra_summaries().is_empty());
        assert_eq!(solution.iter_emissions().count(), 0);
        assert!(solution.iter_storage_dispatch().next().is_none());
    }

    #[rstest]
    fn test_zone_balance_duals(model: Model) {
        let model = toy_model(model);
        let formulation = formulate(&model).unwrap();
        let solution = formulation.problem.solve(&SolverOptions::default()).unwrap();
        let solution = Solution::new(&model, &formulation, solution);

        // The marginal unit is the generator in tp1 and system power in tp2
        let duals: Vec<_> = solution
            .iter_zone_balance_duals()
            .map(|(_, _, dual)| dual.abs())
            .collect();
        assert_approx_eq!(f64, duals[0], 50.0, epsilon = 1e-6);
        assert_approx_eq!(f64, duals[1], 200.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_alternate_optima(model: Model) {
        let mut model = toy_model(model);
        let mut spare = model.projects["gen1"].clone();
        spare.id = "spare".into();
        model
            .build_years
            .insert(spare.id.clone(), model.build_years["gen1"].clone());
        model.projects.insert(spare.id.clone(), spare);
        model.projects_by_zone = Model::index_projects_by_zone(&model.zones, &model.projects);
        let formulation = formulate(&model).unwrap();
        let gen1 = formulation.build.capacity_var(&"gen1".into(), 2025).unwrap();
        let spare = formulation.build.capacity_var(&"spare".into(), 2025).unwrap();

        // gen1 is built, spare isn't and has a zero reduced cost
        let num_vars = formulation.problem.num_vars();
        let mut columns = vec![0.0; num_vars];
        columns[gen1.index()] = 100.0;
        let mut reduced_costs = vec![0.0; num_vars];
        let raw = ProblemSolution::from_columns(columns.clone(), reduced_costs.clone(), false);
        let solution = Solution::new(&model, &formulation, raw);
        assert_eq!(
            solution.find_alternate_optima(1e-6),
            [AlternateOptimum {
                project: &ProjectID::new("spare"),
                build_year: 2025,
                reduced_cost: 0.0,
            }]
        );

        // A positive reduced cost means building it would make things worse
        reduced_costs[spare.index()] = 1.0;
        let raw = ProblemSolution::from_columns(columns.clone(), reduced_costs, false);
        let solution = Solution::new(&model, &formulation, raw);
        assert!(solution.find_alternate_optima(1e-6).is_empty());

        // Reduced costs aren't meaningful for MIPs
        let raw = ProblemSolution::from_columns(columns, vec![0.0; num_vars], true);
        let solution = Solution::new(&model, &formulation, raw);
        assert!(solution.find_alternate_optima(1e-6).is_empty());
    }

    #[rstest]
    fn test_storage_cycles(mut model: Model) {
        for cost in model.hedge_premium_costs.values_mut() {
            *cost = MoneyPerEnergy(200.0);
        }
        let formulation = formulate(&model).unwrap();
        let solution = formulation.problem.solve(&SolverOptions::default()).unwrap();
        let solution = Solution::new(&model, &formulation, solution);

        for (_, _, charge, discharge, soc) in solution.iter_storage_dispatch() {
            assert!(charge.value() >= -1e-6);
            assert!(discharge.value() >= -1e-6);
            assert!(soc.value() <= 10.0 + 1e-6);
        }
        let cycles: Vec<_> = solution.iter_storage_cycles().collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].2 >= 0.0);
    }
}

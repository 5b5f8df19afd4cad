//! The objective is assembled from named cost terms registered by each part of the formulation.
//!
//! Terms are either per timepoint (e.g. the cost of energy in each hour) or per period (e.g. annual
//! capacity costs). At assembly time, timepoint terms are scaled up to an annual value and every
//! period's annual cost is discounted back to the base financial year.
use super::{LinearExpr, ProblemSolution};
use crate::timescale::{PeriodID, TimepointID, Timescales};
use crate::units::Money;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};

/// A named cost with one expression per key
#[derive(Debug, Clone)]
struct CostTerm<K> {
    name: String,
    values: IndexMap<K, LinearExpr>,
}

/// The value of one cost term in one period
#[derive(Debug, Clone, PartialEq)]
pub struct TermValue {
    pub name: String,
    pub period: PeriodID,
    /// Annual cost in the period
    pub annual_value: Money,
    /// Annual cost discounted over the period to the base year
    pub discounted_value: Money,
}

/// Collects the cost terms of the model
#[derive(Debug, Default)]
pub struct ObjectiveBuilder {
    names: IndexSet<String>,
    timepoint_terms: Vec<CostTerm<TimepointID>>,
    period_terms: Vec<CostTerm<PeriodID>>,
}

impl ObjectiveBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    fn register_name(&mut self, name: &str) -> Result<()> {
        ensure!(
            self.names.insert(name.to_string()),
            "Cost term {name} has already been registered"
        );

        Ok(())
    }

    /// Register a cost incurred in every timepoint.
    ///
    /// Timepoints without an entry contribute nothing.
    pub fn register_timepoint_cost(
        &mut self,
        name: &str,
        values: IndexMap<TimepointID, LinearExpr>,
    ) -> Result<()> {
        self.register_name(name)?;
        self.timepoint_terms.push(CostTerm {
            name: name.to_string(),
            values,
        });

        Ok(())
    }

    /// Register an annual cost incurred in every period.
    ///
    /// Periods without an entry contribute nothing.
    pub fn register_period_cost(
        &mut self,
        name: &str,
        values: IndexMap<PeriodID, LinearExpr>,
    ) -> Result<()> {
        self.register_name(name)?;
        self.period_terms.push(CostTerm {
            name: name.to_string(),
            values,
        });

        Ok(())
    }

    /// Names of all registered terms, in order of registration
    pub fn iter_term_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// The annual expression of every term in every period
    fn annual_exprs<'a>(&'a self, timescales: &Timescales) -> Vec<(&'a str, PeriodID, LinearExpr)> {
        let mut exprs = Vec::new();
        for term in &self.timepoint_terms {
            for period in timescales.periods.keys() {
                let mut expr = LinearExpr::new();
                for tp in timescales.iter_period_timepoints(*period) {
                    if let Some(value) = term.values.get(&tp.id) {
                        expr.add_scaled(value, tp.weight_in_year.value());
                    }
                }
                exprs.push((term.name.as_str(), *period, expr));
            }
        }

        for term in &self.period_terms {
            for period in timescales.periods.keys() {
                let expr = term.values.get(period).cloned().unwrap_or_default();
                exprs.push((term.name.as_str(), *period, expr));
            }
        }

        exprs
    }

    /// Sum all terms, discounted to the base year, into the expression to be minimised
    pub fn assemble(&self, timescales: &Timescales) -> LinearExpr {
        let mut objective = LinearExpr::new();
        for (_, period, expr) in self.annual_exprs(timescales) {
            let discount = timescales.periods[&period].discount_weight.value();
            objective.add_scaled(&expr, discount);
        }

        objective
    }

    /// Evaluate every term in every period for the given solution
    pub fn evaluate_terms(
        &self,
        timescales: &Timescales,
        solution: &ProblemSolution,
    ) -> Vec<TermValue> {
        self.annual_exprs(timescales)
            .into_iter()
            .map(|(name, period, expr)| {
                let annual_value = Money(solution.evaluate(&expr));
                let discount = timescales.periods[&period].discount_weight;
                TermValue {
                    name: name.to_string(),
                    period,
                    annual_value,
                    discounted_value: annual_value * discount,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, timescales};
    use crate::optimisation::{Problem, SolverOptions};
    use crate::units::Dimensionless;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_register_twice() {
        let mut builder = ObjectiveBuilder::new();
        builder
            .register_period_cost("Cost", IndexMap::new())
            .unwrap();
        assert_error!(
            builder.register_timepoint_cost("Cost", IndexMap::new()),
            "Cost term Cost has already been registered"
        );
    }

    #[rstest]
    fn test_assemble(mut timescales: Timescales) {
        timescales.periods[&2025].discount_weight = Dimensionless(0.5);
        timescales.timepoints["tp2"].weight_in_year = crate::units::Hours(3.0);

        let mut problem = Problem::new();
        let x = problem.add_var(2.0, 2.0);
        let mut builder = ObjectiveBuilder::new();
        builder
            .register_timepoint_cost(
                "Energy",
                [
                    (TimepointID::new("tp1"), x * 10.0),
                    (TimepointID::new("tp2"), x * 1.0),
                ]
                .into_iter()
                .collect(),
            )
            .unwrap();
        builder
            .register_period_cost(
                "Fixed",
                [(2025, LinearExpr::constant(4.0))].into_iter().collect(),
            )
            .unwrap();

        // 0.5 * (10x + 3x + 4)
        let objective = builder.assemble(&timescales);
        assert_approx_eq!(f64, objective.coefficient(x), 6.5);
        assert_approx_eq!(f64, objective.constant_value(), 2.0);

        problem.set_objective(objective);
        let solution = problem.solve(&SolverOptions::default()).unwrap();
        assert_approx_eq!(f64, solution.objective_value, 15.0, epsilon = 1e-7);

        let terms = builder.evaluate_terms(&timescales, &solution);
        assert_eq!(
            terms.iter().map(|term| term.name.as_str()).collect::<Vec<_>>(),
            ["Energy", "Fixed"]
        );
        assert_approx_eq!(f64, terms[0].annual_value.value(), 26.0, epsilon = 1e-7);
        assert_approx_eq!(f64, terms[0].discounted_value.value(), 13.0, epsilon = 1e-7);
        assert_approx_eq!(f64, terms[1].discounted_value.value(), 2.0, epsilon = 1e-7);
    }
}

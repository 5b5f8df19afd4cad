//! A solver-independent builder for linear (and mixed-integer) problems.
//!
//! Variables and constraints are collected in a [`Problem`] while the model is formulated. The
//! costs of HiGHS columns are fixed when the columns are created, so the problem is only translated
//! to a [`highs::RowProblem`] once the objective is complete. This also lets the same problem be
//! solved more than once with different solver options.
use crate::model::ModelParameters;
use highs::{HighsModelStatus, HighsStatus, RowProblem, Sense};
use log::{debug, log_enabled};
use std::error::Error;
use std::fmt;

pub mod expr;
pub mod objective;
pub use expr::LinearExpr;
pub use objective::{ObjectiveBuilder, TermValue};

/// The feasibility tolerance used when retrying a failed solve
const RELAXED_FEASIBILITY_TOLERANCE: f64 = 1e-5;

/// A decision variable in the optimisation.
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(usize);

impl Var {
    /// The index of the column corresponding to this variable
    pub fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// Refers to a constraint (row) of the problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowID(usize);

/// The kind of values a variable can take
#[derive(Debug, Clone, Copy, PartialEq)]
enum VarKind {
    Continuous,
    Integer,
}

#[derive(Debug, Clone, PartialEq)]
struct Column {
    lower: f64,
    upper: f64,
    kind: VarKind,
}

#[derive(Debug, Clone, PartialEq)]
struct Row {
    lower: f64,
    upper: f64,
    coefficients: Vec<(usize, f64)>,
}

/// A linear minimisation problem
#[derive(Debug, Default)]
pub struct Problem {
    columns: Vec<Column>,
    rows: Vec<Row>,
    objective: LinearExpr,
}

impl Problem {
    /// Create an empty problem
    pub fn new() -> Self {
        Self::default()
    }

    fn add_column(&mut self, lower: f64, upper: f64, kind: VarKind) -> Var {
        assert!(lower <= upper, "Bad variable bounds: {lower} > {upper}");

        self.columns.push(Column { lower, upper, kind });
        Var(self.columns.len() - 1)
    }

    /// Add a continuous variable with the given bounds (either of which may be infinite)
    pub fn add_var(&mut self, lower: f64, upper: f64) -> Var {
        self.add_column(lower, upper, VarKind::Continuous)
    }

    /// Add an integer variable with the given bounds
    pub fn add_integer_var(&mut self, lower: f64, upper: f64) -> Var {
        self.add_column(lower, upper, VarKind::Integer)
    }

    /// Add a variable which is either 0 or 1
    pub fn add_binary_var(&mut self) -> Var {
        self.add_integer_var(0.0, 1.0)
    }

    fn add_row(&mut self, expr: &LinearExpr, lower: f64, upper: f64) -> RowID {
        // Constants are moved to the other side of the constraint
        let constant = expr.constant_value();
        let coefficients = expr
            .iter_terms()
            .map(|(var, coeff)| (var.index(), coeff))
            .collect();
        self.rows.push(Row {
            lower: lower - constant,
            upper: upper - constant,
            coefficients,
        });

        RowID(self.rows.len() - 1)
    }

    /// Add the constraint `expr <= rhs`
    pub fn add_le(&mut self, expr: &LinearExpr, rhs: f64) -> RowID {
        self.add_row(expr, f64::NEG_INFINITY, rhs)
    }

    /// Add the constraint `expr >= rhs`
    pub fn add_ge(&mut self, expr: &LinearExpr, rhs: f64) -> RowID {
        self.add_row(expr, rhs, f64::INFINITY)
    }

    /// Add the constraint `expr == rhs`
    pub fn add_eq(&mut self, expr: &LinearExpr, rhs: f64) -> RowID {
        self.add_row(expr, rhs, rhs)
    }

    /// Set the expression to be minimised
    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    /// The expression to be minimised
    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    /// Number of variables added so far
    pub fn num_vars(&self) -> usize {
        self.columns.len()
    }

    /// Number of constraints added so far
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether the problem has any integer variables
    pub fn is_mip(&self) -> bool {
        self.columns
            .iter()
            .any(|column| column.kind == VarKind::Integer)
    }

    /// Translate the problem into a HiGHS problem
    fn to_highs(&self) -> RowProblem {
        let mut problem = RowProblem::default();
        let cols: Vec<_> = self
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let cost = self.objective.coefficient(Var(index));
                let bounds = column.lower..=column.upper;
                match column.kind {
                    VarKind::Continuous => problem.add_column(cost, bounds),
                    VarKind::Integer => problem.add_integer_column(cost, bounds),
                }
            })
            .collect();

        for row in &self.rows {
            problem.add_row(
                row.lower..=row.upper,
                row.coefficients
                    .iter()
                    .map(|(index, coeff)| (cols[*index], *coeff)),
            );
        }

        problem
    }

    /// Solve the problem to optimality
    pub fn solve(&self, options: &SolverOptions) -> Result<ProblemSolution, ModelError> {
        debug!(
            "Solving problem with {} variables and {} constraints",
            self.num_vars(),
            self.num_rows()
        );

        let mut model = self.to_highs().optimise(Sense::Minimise);
        options.apply(&mut model);
        let solved = solve_optimal(model)?;
        let solution = solved.get_solution();

        Ok(ProblemSolution {
            columns: solution.columns().to_vec(),
            dual_rows: solution.dual_rows().to_vec(),
            dual_columns: solution.dual_columns().to_vec(),
            // HiGHS doesn't know about the constant part of the objective
            objective_value: solved.objective_value() + self.objective.constant_value(),
            is_mip: self.is_mip(),
        })
    }
}

/// Options passed to the solver
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverOptions {
    /// Time limit in seconds
    pub time_limit: Option<f64>,
    /// Relative gap at which to stop solving a MIP
    pub mip_rel_gap: Option<f64>,
    /// Primal and dual feasibility tolerance
    pub feasibility_tolerance: Option<f64>,
}

impl SolverOptions {
    /// Take the solver options from the model parameters
    pub fn from_parameters(parameters: &ModelParameters) -> Self {
        Self {
            time_limit: parameters.solver_time_limit,
            mip_rel_gap: parameters.mip_rel_gap,
            feasibility_tolerance: None,
        }
    }

    /// The same options with relaxed feasibility tolerances
    pub fn relaxed(&self) -> Self {
        Self {
            feasibility_tolerance: Some(RELAXED_FEASIBILITY_TOLERANCE),
            ..self.clone()
        }
    }

    fn apply(&self, model: &mut highs::Model) {
        // The solver's own output is only wanted when debugging
        let verbose = log_enabled!(log::Level::Debug);
        model.set_option("output_flag", verbose);
        model.set_option("log_to_console", verbose);

        if let Some(time_limit) = self.time_limit {
            model.set_option("time_limit", time_limit);
        }
        if let Some(gap) = self.mip_rel_gap {
            model.set_option("mip_rel_gap", gap);
        }
        if let Some(tolerance) = self.feasibility_tolerance {
            model.set_option("primal_feasibility_tolerance", tolerance);
            model.set_option("dual_feasibility_tolerance", tolerance);
        }
    }
}

/// The values of variables and duals at the optimum
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemSolution {
    columns: Vec<f64>,
    dual_rows: Vec<f64>,
    dual_columns: Vec<f64>,
    /// The value of the objective, including any constant terms
    pub objective_value: f64,
    /// Whether the problem had integer variables (in which case duals are not meaningful)
    pub is_mip: bool,
}

impl ProblemSolution {
    /// The value of a variable
    pub fn value(&self, var: Var) -> f64 {
        self.columns[var.index()]
    }

    /// The value of an expression
    pub fn evaluate(&self, expr: &LinearExpr) -> f64 {
        expr.evaluate(&self.columns)
    }

    /// The reduced cost of a variable
    pub fn reduced_cost(&self, var: Var) -> f64 {
        self.dual_columns.get(var.index()).copied().unwrap_or(0.0)
    }

    /// The dual values of all rows, in the order the rows were added
    pub fn dual_rows(&self) -> &[f64] {
        &self.dual_rows
    }
}

#[cfg(test)]
impl ProblemSolution {
    /// A solution with the given variable values and reduced costs, and no duals
    pub fn from_columns(columns: Vec<f64>, dual_columns: Vec<f64>, is_mip: bool) -> Self {
        Self {
            columns,
            dual_rows: Vec::new(),
            dual_columns,
            objective_value: 0.0,
            is_mip,
        }
    }
}

/// Keys for a contiguous block of constraints along with the row offset of the first one
#[derive(Debug, Clone, PartialEq)]
pub struct KeysWithOffset<T> {
    offset: usize,
    keys: Vec<T>,
}

impl<T> KeysWithOffset<T> {
    /// Start a block of keys for rows added after the first `offset` rows
    pub fn new(offset: usize) -> Self {
        Self {
            offset,
            keys: Vec::new(),
        }
    }

    /// Record the key for the next row in the block
    pub fn push(&mut self, key: T, row: RowID) {
        assert_eq!(
            row.0,
            self.offset + self.keys.len(),
            "Bad constraint keys: rows are not contiguous"
        );
        self.keys.push(key);
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether there are no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Zip the keys with the corresponding dual values in the solution, accounting for the offset
    pub fn zip_duals<'a, 'b>(&'a self, duals: &'b [f64]) -> impl Iterator<Item = (&'a T, f64)> {
        assert!(
            self.offset + self.keys.len() <= duals.len(),
            "Bad constraint keys: dual rows out of range"
        );

        self.keys.iter().zip(duals[self.offset..].iter().copied())
    }
}

/// Defines the possible errors that can occur when running the solver
#[derive(Debug, Clone)]
pub enum ModelError {
    /// The model definition is incoherent.
    ///
    /// Users should not be able to trigger this error.
    Incoherent(HighsStatus),
    /// The constraints cannot all be satisfied
    Infeasible(HighsModelStatus),
    /// An optimal solution could not be found
    NonOptimal(HighsModelStatus),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::Incoherent(status) => write!(f, "Incoherent model: {status:?}"),
            ModelError::Infeasible(status) => {
                write!(f, "The problem is infeasible: {status:?}")
            }
            ModelError::NonOptimal(status) => {
                write!(f, "Could not find optimal result: {status:?}")
            }
        }
    }
}

impl Error for ModelError {}

/// Try to solve the model, returning an error if the model is incoherent or result is non-optimal
pub fn solve_optimal(model: highs::Model) -> Result<highs::SolvedModel, ModelError> {
    let solved = model.try_solve().map_err(ModelError::Incoherent)?;

    match solved.status() {
        HighsModelStatus::Optimal => Ok(solved),
        HighsModelStatus::Infeasible => Err(ModelError::Infeasible(HighsModelStatus::Infeasible)),
        status => Err(ModelError::NonOptimal(status)),
    }
}

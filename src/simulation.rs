//! Functionality for formulating, solving and reporting on a portfolio model.
use crate::formulation::formulate;
use crate::model::Model;
use crate::optimisation::{ModelError, ProblemSolution, SolverOptions};
use crate::output::DataWriter;
use crate::output::metadata::write_metadata;
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

pub mod solution;
use solution::Solution;

/// Solve a problem, trying again with relaxed tolerances if the solver fails.
///
/// Infeasible problems are never retried, as loosening tolerances cannot help.
///
/// # Arguments
///
/// * `options` - Options for the first attempt
/// * `allow_retry` - Whether a second attempt may be made
/// * `solve` - Solve the problem with the given options
pub fn solve_with_retry<F>(
    options: &SolverOptions,
    allow_retry: bool,
    mut solve: F,
) -> Result<ProblemSolution, ModelError>
where
    F: FnMut(&SolverOptions) -> Result<ProblemSolution, ModelError>,
{
    match solve(options) {
        Err(err @ (ModelError::Incoherent(_) | ModelError::NonOptimal(_))) if allow_retry => {
            warn!("{err}. Retrying with relaxed tolerances.");
            solve(&options.relaxed())
        }
        result => result,
    }
}

/// Formulate and solve the model, writing results to `output_path`.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information (e.g. duals) to output files
pub fn run(model: &Model, output_path: &Path, debug_model: bool) -> Result<()> {
    write_metadata(output_path, model).context("Failed to save metadata")?;

    info!("Formulating problem");
    let formulation = formulate(model)?;

    info!(
        "Solving problem with {} variables and {} constraints",
        formulation.problem.num_vars(),
        formulation.problem.num_rows()
    );
    let options = SolverOptions::from_parameters(&model.parameters);
    let raw = solve_with_retry(
        &options,
        model.parameters.retry_with_relaxed_tolerances,
        |options| formulation.problem.solve(options),
    )
    .context("Failed to solve model")?;

    let solution = Solution::new(model, &formulation, raw);
    info!("Objective value: {}", solution.objective_value().value());

    let alternate_optima =
        solution.find_alternate_optima(model.parameters.alternate_optima_tolerance);
    for optimum in &alternate_optima {
        warn!(
            "Project {} (build year {}) is unbuilt but has a reduced cost of {}. \
            An alternate optimum including it may exist.",
            optimum.project, optimum.build_year, optimum.reduced_cost
        );
    }

    // Duals are only available for LPs
    let save_debug_info = debug_model && !solution.is_mip();
    let mut writer = DataWriter::create(output_path, model, save_debug_info)?;
    writer.write_solution(&solution, &alternate_optima)?;
    writer.flush()?;

    info!("Results written to {}", output_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use highs::HighsModelStatus;
    use rstest::rstest;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn ok_solution() -> Result<ProblemSolution, ModelError> {
        Ok(ProblemSolution::from_columns(Vec::new(), Vec::new(), false))
    }

    #[test]
    fn test_solve_with_retry_success() {
        let calls = Cell::new(0);
        let result = solve_with_retry(&SolverOptions::default(), true, |_| {
            calls.set(calls.get() + 1);
            ok_solution()
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_solve_with_retry_non_optimal() {
        let calls = Cell::new(0);
        let result = solve_with_retry(&SolverOptions::default(), true, |options| {
            calls.set(calls.get() + 1);
            if options.feasibility_tolerance.is_some() {
                ok_solution()
            } else {
                Err(ModelError::NonOptimal(HighsModelStatus::ReachedTimeLimit))
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_solve_with_retry_disabled() {
        let calls = Cell::new(0);
        let result = solve_with_retry(&SolverOptions::default(), false, |_| {
            calls.set(calls.get() + 1);
            Err(ModelError::NonOptimal(HighsModelStatus::ReachedTimeLimit))
        });
        assert!(matches!(result, Err(ModelError::NonOptimal(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_solve_with_retry_infeasible() {
        let calls = Cell::new(0);
        let result = solve_with_retry(&SolverOptions::default(), true, |_| {
            calls.set(calls.get() + 1);
            Err(ModelError::Infeasible(HighsModelStatus::Infeasible))
        });
        assert!(matches!(result, Err(ModelError::Infeasible(_))));
        assert_eq!(calls.get(), 1);
    }

    #[rstest]
    fn test_run(model: Model) {
        let dir = tempdir().unwrap();
        run(&model, dir.path(), true).unwrap();

        for file_name in [
            "metadata.toml",
            "gen_cap.csv",
            "dispatch.csv",
            "storage_dispatch.csv",
            "objective.csv",
            "debug_zone_balance_duals.csv",
        ] {
            assert!(dir.path().join(file_name).is_file(), "{file_name} missing");
        }
        assert!(!dir.path().join("RA_summary.csv").exists());
    }
}

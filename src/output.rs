//! The module responsible for writing output data to disk.
use crate::model::{Model, OptionalModule};
use crate::optimisation::TermValue;
use crate::project::ProjectID;
use crate::simulation::solution::{AlternateOptimum, RaSummary, Solution};
use crate::timescale::{PeriodID, TimepointID};
use crate::zone::ZoneID;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "portfolio_results";

const GEN_CAP_FILE_NAME: &str = "gen_cap.csv";
const GEN_BUILD_FILE_NAME: &str = "gen_build.csv";
const DISPATCH_FILE_NAME: &str = "dispatch.csv";
const STORAGE_DISPATCH_FILE_NAME: &str = "storage_dispatch.csv";
const STORAGE_CYCLE_COUNT_FILE_NAME: &str = "storage_cycle_count.csv";
const SYSTEM_POWER_FILE_NAME: &str = "system_power.csv";
const RA_SUMMARY_FILE_NAME: &str = "RA_summary.csv";
const GEN_EMISSIONS_FILE_NAME: &str = "gen_emissions.csv";
const OBJECTIVE_TERMS_FILE_NAME: &str = "objective_terms.csv";
const OBJECTIVE_FILE_NAME: &str = "objective.csv";

/// The output file name for zone energy balance duals
const ZONE_BALANCE_DUALS_FILE_NAME: &str = "debug_zone_balance_duals.csv";

/// The output file name for build reduced costs
const REDUCED_COSTS_FILE_NAME: &str = "debug_reduced_costs.csv";

/// The output file name for unbuilt projects with zero reduced cost
const ALTERNATE_OPTIMA_FILE_NAME: &str = "debug_alternate_optima.csv";

/// Get the default output directory for the model at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Canonicalise in case the user has specified "."
    let model_dir = model_dir
        .canonicalize()
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory.
///
/// A non-empty existing directory is only reused (after deleting its contents) if
/// `allow_overwrite` is set.
///
/// # Returns
///
/// Whether the contents of an existing directory were deleted.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut entries) = fs::read_dir(output_dir) {
        if entries.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
            --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir)?;
        true
    } else {
        false
    };

    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// A row of `gen_cap.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct GenCapacityRow {
    project_id: ProjectID,
    period: PeriodID,
    capacity: f64,
    capacity_cost: f64,
}

/// A row of `gen_build.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct GenBuildRow {
    project_id: ProjectID,
    build_year: u32,
    built_capacity: f64,
    built_energy_capacity: Option<f64>,
}

/// A row of `dispatch.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    project_id: ProjectID,
    timepoint: TimepointID,
    timestamp: String,
    dispatch: f64,
    excess: f64,
    curtailment: f64,
}

/// A row of `storage_dispatch.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StorageDispatchRow {
    project_id: ProjectID,
    timepoint: TimepointID,
    charge: f64,
    discharge: f64,
    state_of_charge: f64,
}

/// A row of `storage_cycle_count.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct StorageCycleRow {
    project_id: ProjectID,
    period: PeriodID,
    annual_cycles: f64,
}

/// A row of `system_power.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SystemPowerRow {
    load_zone: ZoneID,
    timepoint: TimepointID,
    system_power: f64,
}

/// A row of `RA_summary.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RaSummaryRow {
    period: PeriodID,
    ra_category: String,
    month: u32,
    requirement: f64,
    available: f64,
    open_position: f64,
    excess: f64,
    open_position_cost: f64,
    excess_value: f64,
}

impl From<&RaSummary> for RaSummaryRow {
    fn from(summary: &RaSummary) -> Self {
        Self {
            period: summary.period,
            ra_category: summary.category.to_string(),
            month: summary.month,
            requirement: summary.requirement.value(),
            available: summary.available.value(),
            open_position: summary.open_position.value(),
            excess: summary.excess.value(),
            open_position_cost: summary.open_position_cost.value(),
            excess_value: summary.excess_value.value(),
        }
    }
}

/// A row of `gen_emissions.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct EmissionsRow {
    project_id: ProjectID,
    timepoint: TimepointID,
    emissions: f64,
}

/// A row of `objective_terms.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ObjectiveTermRow {
    term: String,
    period: PeriodID,
    annual_value: f64,
    discounted_value: f64,
}

impl From<&TermValue> for ObjectiveTermRow {
    fn from(term: &TermValue) -> Self {
        Self {
            term: term.name.clone(),
            period: term.period,
            annual_value: term.annual_value.value(),
            discounted_value: term.discounted_value.value(),
        }
    }
}

/// A row of `objective.csv`
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ObjectiveRow {
    objective_value: f64,
}

/// A row of the zone balance duals file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ZoneBalanceDualsRow {
    load_zone: ZoneID,
    timepoint: TimepointID,
    value: f64,
}

/// A row of the reduced costs file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ReducedCostRow {
    project_id: ProjectID,
    build_year: u32,
    built_capacity: f64,
    reduced_cost: f64,
}

/// A row of the alternate optima file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct AlternateOptimumRow {
    project_id: ProjectID,
    build_year: u32,
    reduced_cost: f64,
}

/// Open a CSV file for writing in the output folder
fn new_writer(output_path: &Path, file_name: &str) -> Result<csv::Writer<File>> {
    let file_path = output_path.join(file_name);
    csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    zone_balance_duals_writer: csv::Writer<File>,
    reduced_costs_writer: csv::Writer<File>,
    alternate_optima_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    fn create(output_path: &Path) -> Result<Self> {
        Ok(Self {
            zone_balance_duals_writer: new_writer(output_path, ZONE_BALANCE_DUALS_FILE_NAME)?,
            reduced_costs_writer: new_writer(output_path, REDUCED_COSTS_FILE_NAME)?,
            alternate_optima_writer: new_writer(output_path, ALTERNATE_OPTIMA_FILE_NAME)?,
        })
    }

    fn write_zone_balance_duals<'a, I>(&mut self, iter: I) -> Result<()>
    where
        I: Iterator<Item = (&'a ZoneID, &'a TimepointID, f64)>,
    {
        for (zone, tp, value) in iter {
            self.zone_balance_duals_writer
                .serialize(ZoneBalanceDualsRow {
                    load_zone: zone.clone(),
                    timepoint: tp.clone(),
                    value,
                })?;
        }

        Ok(())
    }

    fn write_reduced_costs<'a, I>(&mut self, iter: I) -> Result<()>
    where
        I: Iterator<Item = (&'a ProjectID, u32, f64, f64)>,
    {
        for (project, build_year, built_capacity, reduced_cost) in iter {
            self.reduced_costs_writer.serialize(ReducedCostRow {
                project_id: project.clone(),
                build_year,
                built_capacity,
                reduced_cost,
            })?;
        }

        Ok(())
    }

    fn write_alternate_optima(&mut self, optima: &[AlternateOptimum]) -> Result<()> {
        for optimum in optima {
            self.alternate_optima_writer.serialize(AlternateOptimumRow {
                project_id: optimum.project.clone(),
                build_year: optimum.build_year,
                reduced_cost: optimum.reduced_cost,
            })?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.zone_balance_duals_writer.flush()?;
        self.reduced_costs_writer.flush()?;
        self.alternate_optima_writer.flush()?;

        Ok(())
    }
}

/// An object for writing the results of a model run to CSV files
pub struct DataWriter {
    gen_cap_writer: csv::Writer<File>,
    gen_build_writer: csv::Writer<File>,
    dispatch_writer: csv::Writer<File>,
    storage_dispatch_writer: csv::Writer<File>,
    storage_cycle_writer: csv::Writer<File>,
    system_power_writer: csv::Writer<File>,
    ra_summary_writer: Option<csv::Writer<File>>,
    emissions_writer: Option<csv::Writer<File>>,
    objective_terms_writer: csv::Writer<File>,
    objective_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `model` - The model, which determines which optional files are written
    /// * `save_debug_info` - Whether to include extra CSV files for debugging the model
    pub fn create(output_path: &Path, model: &Model, save_debug_info: bool) -> Result<Self> {
        let optional_writer = |module, file_name| {
            model
                .is_module_enabled(module)
                .then(|| new_writer(output_path, file_name))
                .transpose()
        };

        let debug_writer = if save_debug_info {
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            gen_cap_writer: new_writer(output_path, GEN_CAP_FILE_NAME)?,
            gen_build_writer: new_writer(output_path, GEN_BUILD_FILE_NAME)?,
            dispatch_writer: new_writer(output_path, DISPATCH_FILE_NAME)?,
            storage_dispatch_writer: new_writer(output_path, STORAGE_DISPATCH_FILE_NAME)?,
            storage_cycle_writer: new_writer(output_path, STORAGE_CYCLE_COUNT_FILE_NAME)?,
            system_power_writer: new_writer(output_path, SYSTEM_POWER_FILE_NAME)?,
            ra_summary_writer: optional_writer(
                OptionalModule::ResourceAdequacy,
                RA_SUMMARY_FILE_NAME,
            )?,
            emissions_writer: optional_writer(OptionalModule::Emissions, GEN_EMISSIONS_FILE_NAME)?,
            objective_terms_writer: new_writer(output_path, OBJECTIVE_TERMS_FILE_NAME)?,
            objective_writer: new_writer(output_path, OBJECTIVE_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write every result file for a solution
    pub fn write_solution(
        &mut self,
        solution: &Solution,
        alternate_optima: &[AlternateOptimum],
    ) -> Result<()> {
        self.write_capacity(solution)?;
        self.write_builds(solution)?;
        self.write_dispatch(solution)?;
        self.write_storage(solution)?;
        self.write_system_power(solution)?;
        self.write_ra_summary(&solution.ra_summaries())?;
        self.write_emissions(solution)?;
        self.write_objective(solution.objective_value().value(), &solution.objective_terms())?;

        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_zone_balance_duals(solution.iter_zone_balance_duals())?;
            wtr.write_reduced_costs(solution.iter_build_reduced_costs().map(
                |(project, year, capacity, reduced_cost)| {
                    (project, year, capacity.value(), reduced_cost)
                },
            ))?;
            wtr.write_alternate_optima(alternate_optima)?;
        }

        Ok(())
    }

    fn write_capacity(&mut self, solution: &Solution) -> Result<()> {
        for (project, period, capacity, cost) in solution.iter_capacity() {
            self.gen_cap_writer.serialize(GenCapacityRow {
                project_id: project.clone(),
                period,
                capacity: capacity.value(),
                capacity_cost: cost.value(),
            })?;
        }

        Ok(())
    }

    fn write_builds(&mut self, solution: &Solution) -> Result<()> {
        for (project, build_year, capacity, energy) in solution.iter_builds() {
            self.gen_build_writer.serialize(GenBuildRow {
                project_id: project.clone(),
                build_year,
                built_capacity: capacity.value(),
                built_energy_capacity: energy.map(|energy| energy.value()),
            })?;
        }

        Ok(())
    }

    fn write_dispatch(&mut self, solution: &Solution) -> Result<()> {
        for (project, tp, dispatch, excess, curtailment) in solution.iter_dispatch() {
            self.dispatch_writer.serialize(DispatchRow {
                project_id: project.clone(),
                timepoint: tp.id.clone(),
                timestamp: tp.timestamp.clone(),
                dispatch: dispatch.value(),
                excess: excess.value(),
                curtailment: curtailment.value(),
            })?;
        }

        Ok(())
    }

    fn write_storage(&mut self, solution: &Solution) -> Result<()> {
        for (project, tp, charge, discharge, soc) in solution.iter_storage_dispatch() {
            self.storage_dispatch_writer.serialize(StorageDispatchRow {
                project_id: project.clone(),
                timepoint: tp.clone(),
                charge: charge.value(),
                discharge: discharge.value(),
                state_of_charge: soc.value(),
            })?;
        }

        for (project, period, annual_cycles) in solution.iter_storage_cycles() {
            self.storage_cycle_writer.serialize(StorageCycleRow {
                project_id: project.clone(),
                period,
                annual_cycles,
            })?;
        }

        Ok(())
    }

    fn write_system_power(&mut self, solution: &Solution) -> Result<()> {
        for (zone, tp, power) in solution.iter_system_power() {
            self.system_power_writer.serialize(SystemPowerRow {
                load_zone: zone.clone(),
                timepoint: tp.clone(),
                system_power: power.value(),
            })?;
        }

        Ok(())
    }

    fn write_ra_summary(&mut self, summaries: &[RaSummary]) -> Result<()> {
        if let Some(wtr) = &mut self.ra_summary_writer {
            for summary in summaries {
                wtr.serialize(RaSummaryRow::from(summary))?;
            }
        }

        Ok(())
    }

    fn write_emissions(&mut self, solution: &Solution) -> Result<()> {
        if let Some(wtr) = &mut self.emissions_writer {
            for (project, tp, emissions) in solution.iter_emissions() {
                wtr.serialize(EmissionsRow {
                    project_id: project.clone(),
                    timepoint: tp.clone(),
                    emissions,
                })?;
            }
        }

        Ok(())
    }

    fn write_objective(&mut self, objective_value: f64, terms: &[TermValue]) -> Result<()> {
        for term in terms {
            self.objective_terms_writer
                .serialize(ObjectiveTermRow::from(term))?;
        }
        self.objective_writer
            .serialize(ObjectiveRow { objective_value })?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        for wtr in [
            &mut self.gen_cap_writer,
            &mut self.gen_build_writer,
            &mut self.dispatch_writer,
            &mut self.storage_dispatch_writer,
            &mut self.storage_cycle_writer,
            &mut self.system_power_writer,
            &mut self.objective_terms_writer,
            &mut self.objective_writer,
        ] {
            wtr.flush()?;
        }
        for wtr in [&mut self.ra_summary_writer, &mut self.emissions_writer]
            .into_iter()
            .flatten()
        {
            wtr.flush()?;
        }
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use crate::simulation::solution::RaCategory;
    use crate::units::{Capacity, Money};
    use itertools::{Itertools, assert_equal};
    use rstest::rstest;
    use std::iter;
    use tempfile::tempdir;

    fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
        csv::Reader::from_path(path)
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[test]
    fn test_create_output_directory_new() {
        let tmp = tempdir().unwrap();
        let output_dir = tmp.path().join("results").join("model");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_empty() {
        let tmp = tempdir().unwrap();
        assert!(!create_output_directory(tmp.path(), false).unwrap());
    }

    #[test]
    fn test_create_output_directory_not_empty() {
        let tmp = tempdir().unwrap();
        let file_path = tmp.path().join(OBJECTIVE_FILE_NAME);
        fs::write(&file_path, "objective_value\n1.0\n").unwrap();

        assert!(create_output_directory(tmp.path(), false).is_err());
        assert!(file_path.is_file());

        assert!(create_output_directory(tmp.path(), true).unwrap());
        assert!(tmp.path().is_dir());
        assert!(!file_path.exists());
    }

    #[test]
    fn test_get_output_dir() {
        let tmp = tempdir().unwrap();
        let model_dir = tmp.path().join("my_model");
        fs::create_dir(&model_dir).unwrap();
        assert_eq!(
            get_output_dir(&model_dir).unwrap(),
            PathBuf::from("portfolio_results/my_model")
        );
    }

    #[rstest]
    fn test_create_optional_files(mut model: Model) {
        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), &model, false).unwrap();
            writer.flush().unwrap();
        }
        assert!(dir.path().join(GEN_CAP_FILE_NAME).is_file());
        assert!(!dir.path().join(RA_SUMMARY_FILE_NAME).exists());
        assert!(!dir.path().join(ZONE_BALANCE_DUALS_FILE_NAME).exists());

        model.parameters.modules.push(OptionalModule::ResourceAdequacy);
        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), &model, true).unwrap();
            writer.flush().unwrap();
        }
        assert!(dir.path().join(RA_SUMMARY_FILE_NAME).is_file());
        assert!(!dir.path().join(GEN_EMISSIONS_FILE_NAME).exists());
        assert!(dir.path().join(ALTERNATE_OPTIMA_FILE_NAME).is_file());
    }

    #[rstest]
    fn test_write_ra_summary(mut model: Model) {
        model.parameters.modules.push(OptionalModule::ResourceAdequacy);
        let summary = RaSummary {
            period: 2025,
            category: RaCategory::Flexible,
            month: 7,
            requirement: Capacity(10.0),
            available: Capacity(4.0),
            open_position: Capacity(6.0),
            excess: Capacity(0.0),
            open_position_cost: Money(60.0),
            excess_value: Money(0.0),
        };

        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), &model, false).unwrap();
            writer.write_ra_summary(&[summary]).unwrap();
            writer.flush().unwrap();
        }

        let expected = RaSummaryRow {
            period: 2025,
            ra_category: "flexible_RA".into(),
            month: 7,
            requirement: 10.0,
            available: 4.0,
            open_position: 6.0,
            excess: 0.0,
            open_position_cost: 60.0,
            excess_value: 0.0,
        };
        let records: Vec<RaSummaryRow> = read_rows(&dir.path().join(RA_SUMMARY_FILE_NAME));
        assert_equal(records, iter::once(expected));
    }

    #[rstest]
    fn test_write_objective(model: Model) {
        let terms = [TermValue {
            name: "HedgePremiumCostInTP".into(),
            period: 2025,
            annual_value: Money(20.0),
            discounted_value: Money(10.0),
        }];

        let dir = tempdir().unwrap();
        {
            let mut writer = DataWriter::create(dir.path(), &model, false).unwrap();
            writer.write_objective(10.0, &terms).unwrap();
            writer.flush().unwrap();
        }

        let records: Vec<ObjectiveTermRow> =
            read_rows(&dir.path().join(OBJECTIVE_TERMS_FILE_NAME));
        assert_equal(
            records,
            iter::once(ObjectiveTermRow {
                term: "HedgePremiumCostInTP".into(),
                period: 2025,
                annual_value: 20.0,
                discounted_value: 10.0,
            }),
        );
        let records: Vec<ObjectiveRow> = read_rows(&dir.path().join(OBJECTIVE_FILE_NAME));
        assert_equal(
            records,
            iter::once(ObjectiveRow {
                objective_value: 10.0,
            }),
        );
    }

    #[rstest]
    fn test_write_alternate_optima() {
        let project = ProjectID::new("spare");
        let dir = tempdir().unwrap();
        {
            let mut writer = DebugDataWriter::create(dir.path()).unwrap();
            writer
                .write_alternate_optima(&[AlternateOptimum {
                    project: &project,
                    build_year: 2025,
                    reduced_cost: 0.0,
                }])
                .unwrap();
            writer.flush().unwrap();
        }

        let records: Vec<AlternateOptimumRow> =
            read_rows(&dir.path().join(ALTERNATE_OPTIMA_FILE_NAME));
        assert_equal(
            records,
            iter::once(AlternateOptimumRow {
                project_id: project,
                build_year: 2025,
                reduced_cost: 0.0,
            }),
        );
    }
}

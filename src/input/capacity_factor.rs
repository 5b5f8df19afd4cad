//! Code for reading capacity factors for variable and baseload projects.
use super::{deserialise_optional, input_err_msg, read_csv_optional};
use crate::id::IDCollection;
use crate::project::{
    BuildYearMap, CapacityFactor, CapacityFactorMap, GeneratorClass, ProjectMap,
};
use crate::timescale::Timescales;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const VARIABLE_FILE_NAME: &str = "variable_capacity_factors.csv";
const BASELOAD_FILE_NAME: &str = "baseload_capacity_factors.csv";

/// Capacity factors must lie strictly inside this range
const VALID_RANGE: (f64, f64) = (-1.0, 2.0);

#[derive(Debug, Deserialize, PartialEq)]
struct VariableCapacityFactorRaw {
    project_id: String,
    timepoint: String,
    variable_capacity_factor: f64,
    #[serde(default, deserialize_with = "deserialise_optional")]
    curtailment_capacity_factor: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct BaseloadCapacityFactorRaw {
    project_id: String,
    timepoint: String,
    baseload_capacity_factor: f64,
}

/// A capacity factor row from either file
struct CapacityFactorRow {
    project_id: String,
    timepoint: String,
    factor: CapacityFactor,
}

impl From<VariableCapacityFactorRaw> for CapacityFactorRow {
    fn from(raw: VariableCapacityFactorRaw) -> Self {
        Self {
            project_id: raw.project_id,
            timepoint: raw.timepoint,
            factor: CapacityFactor {
                value: raw.variable_capacity_factor,
                curtailment: raw.curtailment_capacity_factor,
            },
        }
    }
}

impl From<BaseloadCapacityFactorRaw> for CapacityFactorRow {
    fn from(raw: BaseloadCapacityFactorRaw) -> Self {
        Self {
            project_id: raw.project_id,
            timepoint: raw.timepoint,
            factor: CapacityFactor {
                value: raw.baseload_capacity_factor,
                curtailment: None,
            },
        }
    }
}

/// Read capacity factors for variable and baseload projects.
///
/// Each file is only required if there are projects of the corresponding class. Every such
/// project must have a capacity factor for every timepoint in which it operates.
pub fn read_capacity_factors(
    model_dir: &Path,
    projects: &ProjectMap,
    build_years: &BuildYearMap,
    timescales: &Timescales,
) -> Result<CapacityFactorMap> {
    let mut map = CapacityFactorMap::new();

    let file_path = model_dir.join(VARIABLE_FILE_NAME);
    let iter = read_csv_optional::<VariableCapacityFactorRaw>(&file_path)?.map(Into::into);
    read_capacity_factors_from_iter(iter, &GeneratorClass::Variable, projects, timescales, &mut map)
        .with_context(|| input_err_msg(&file_path))?;
    check_capacity_factors_complete(
        &GeneratorClass::Variable,
        projects,
        build_years,
        timescales,
        &map,
    )
    .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(BASELOAD_FILE_NAME);
    let iter = read_csv_optional::<BaseloadCapacityFactorRaw>(&file_path)?.map(Into::into);
    read_capacity_factors_from_iter(iter, &GeneratorClass::Baseload, projects, timescales, &mut map)
        .with_context(|| input_err_msg(&file_path))?;
    check_capacity_factors_complete(
        &GeneratorClass::Baseload,
        projects,
        build_years,
        timescales,
        &map,
    )
    .with_context(|| input_err_msg(&file_path))?;

    Ok(map)
}

fn check_capacity_factor_value(value: f64, name: &str) -> Result<()> {
    let (lower, upper) = VALID_RANGE;
    ensure!(
        value > lower && value < upper,
        "{name} must be between {lower} and {upper} (exclusive), but got {value}"
    );

    Ok(())
}

fn read_capacity_factors_from_iter<I>(
    iter: I,
    class: &GeneratorClass,
    projects: &ProjectMap,
    timescales: &Timescales,
    map: &mut CapacityFactorMap,
) -> Result<()>
where
    I: Iterator<Item = CapacityFactorRow>,
{
    for row in iter {
        let project_id = projects.get_id(&row.project_id)?;
        let timepoint = timescales.timepoints.get_id(&row.timepoint)?;
        ensure!(
            projects[&project_id].class == *class,
            "Project {project_id} has a {class:?} capacity factor but is not of that class"
        );
        check_capacity_factor_value(row.factor.value, "Capacity factor")?;
        if let Some(curtailment) = row.factor.curtailment {
            check_capacity_factor_value(curtailment, "Curtailment capacity factor")?;
        }

        ensure!(
            map.insert((project_id.clone(), timepoint.clone()), row.factor)
                .is_none(),
            "Duplicate capacity factor for project {project_id} and timepoint {timepoint}"
        );
    }

    Ok(())
}

/// Check that every project of the class has a capacity factor in each operating timepoint
fn check_capacity_factors_complete(
    class: &GeneratorClass,
    projects: &ProjectMap,
    build_years: &BuildYearMap,
    timescales: &Timescales,
    map: &CapacityFactorMap,
) -> Result<()> {
    for project in projects.values().filter(|project| project.class == *class) {
        let builds = build_years
            .get(&project.id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for period in timescales.periods.values() {
            if !builds
                .iter()
                .any(|build| build.is_online_in(period.start, project.max_age))
            {
                continue;
            }

            for timepoint in &period.timepoints {
                ensure!(
                    map.contains_key(&(project.id.clone(), timepoint.clone())),
                    "Project {} is missing a capacity factor for timepoint {timepoint}",
                    project.id
                );
            }
        }
    }

    Ok(())
}

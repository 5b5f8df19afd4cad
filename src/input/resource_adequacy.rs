//! Code for reading resource adequacy and midterm reliability inputs.
use super::{check_non_negative, deserialise_optional, input_err_msg, read_csv, read_csv_optional};
use crate::id::IDCollection;
use crate::policy::{
    MidtermRequirement, MidtermRequirementMap, RaCapacityValue, RaRequirement,
    ResourceAdequacyData,
};
use crate::project::{EnergySourceID, GeneratorClass, ProjectMap};
use crate::timescale::{PeriodID, Timescales};
use crate::units::{Capacity, MoneyPerCapacity};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const RA_REQUIREMENT_FILE_NAME: &str = "ra_requirement.csv";
const FLEXIBLE_RA_REQUIREMENT_FILE_NAME: &str = "flexible_ra_requirement.csv";
const RA_CAPACITY_VALUE_FILE_NAME: &str = "ra_capacity_value.csv";
const MIDTERM_FILE_NAME: &str = "midterm_reliability_requirement.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct RaRequirementRaw {
    period: PeriodID,
    month: u32,
    ra_requirement: f64,
    ra_cost: f64,
    #[serde(default, deserialize_with = "deserialise_optional")]
    ra_resell_value: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct FlexibleRaRequirementRaw {
    period: PeriodID,
    month: u32,
    flexible_ra_requirement: f64,
    flexible_ra_cost: f64,
    #[serde(default, deserialize_with = "deserialise_optional")]
    flexible_ra_resell_value: Option<f64>,
}

impl From<FlexibleRaRequirementRaw> for RaRequirementRaw {
    fn from(raw: FlexibleRaRequirementRaw) -> Self {
        Self {
            period: raw.period,
            month: raw.month,
            ra_requirement: raw.flexible_ra_requirement,
            ra_cost: raw.flexible_ra_cost,
            ra_resell_value: raw.flexible_ra_resell_value,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct RaCapacityValueRaw {
    period: PeriodID,
    energy_source: String,
    month: u32,
    elcc: f64,
    ra_production_factor: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct MidtermRequirementRaw {
    period: PeriodID,
    midterm_firm_requirement: f64,
    midterm_ldes_requirement: f64,
}

/// Read RA requirements and capacity values.
///
/// Every period must have a requirement for every month that appears in `ra_requirement.csv` and
/// every RA-eligible project needs a capacity value for its energy source in each of these.
pub fn read_resource_adequacy(
    model_dir: &Path,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<ResourceAdequacyData> {
    let file_path = model_dir.join(RA_REQUIREMENT_FILE_NAME);
    let requirements = read_requirements_from_iter(read_csv(&file_path)?, timescales, true)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(FLEXIBLE_RA_REQUIREMENT_FILE_NAME);
    let iter = read_csv_optional::<FlexibleRaRequirementRaw>(&file_path)?.map(Into::into);
    let flexible_requirements = read_requirements_from_iter(iter, timescales, false)
        .and_then(|flexible| {
            check_flexible_months(&flexible, &requirements)?;
            Ok(flexible)
        })
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(RA_CAPACITY_VALUE_FILE_NAME);
    let capacity_values =
        read_capacity_values_from_iter(read_csv(&file_path)?, projects, timescales)
            .with_context(|| input_err_msg(&file_path))?;

    let data = ResourceAdequacyData {
        requirements,
        flexible_requirements,
        capacity_values,
    };
    check_eligible_projects(&data, projects, timescales)
        .with_context(|| input_err_msg(model_dir.join(RA_CAPACITY_VALUE_FILE_NAME)))?;

    Ok(data)
}

fn check_month(month: u32) -> Result<()> {
    ensure!((1..=12).contains(&month), "Invalid month {month}");

    Ok(())
}

fn read_requirements_from_iter<I>(
    iter: I,
    timescales: &Timescales,
    require_all_periods: bool,
) -> Result<IndexMap<(PeriodID, u32), RaRequirement>>
where
    I: Iterator<Item = RaRequirementRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        check_month(raw.month)?;
        check_non_negative(raw.ra_requirement, "requirement")?;
        check_non_negative(raw.ra_cost, "cost")?;
        let resell_value = raw.ra_resell_value.unwrap_or(0.0);
        check_non_negative(resell_value, "resell value")?;

        let requirement = RaRequirement {
            requirement: Capacity(raw.ra_requirement),
            cost: MoneyPerCapacity(raw.ra_cost),
            resell_value: MoneyPerCapacity(resell_value),
        };
        ensure!(
            map.insert((raw.period, raw.month), requirement).is_none(),
            "Duplicate requirement for period {} and month {}",
            raw.period,
            raw.month
        );
    }

    if require_all_periods {
        let months: IndexSet<u32> = map.keys().map(|(_, month)| *month).collect();
        for period in timescales.periods.keys() {
            for month in &months {
                ensure!(
                    map.contains_key(&(*period, *month)),
                    "No requirement given for period {period} and month {month}"
                );
            }
        }
    }

    Ok(map)
}

/// Flexible RA is sold out of system RA, so each flexible requirement needs a system one
fn check_flexible_months(
    flexible: &IndexMap<(PeriodID, u32), RaRequirement>,
    requirements: &IndexMap<(PeriodID, u32), RaRequirement>,
) -> Result<()> {
    for (period, month) in flexible.keys() {
        ensure!(
            requirements.contains_key(&(*period, *month)),
            "Flexible requirement for period {period} and month {month} has no matching system \
            requirement"
        );
    }

    Ok(())
}

fn read_capacity_values_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<IndexMap<(PeriodID, EnergySourceID, u32), RaCapacityValue>>
where
    I: Iterator<Item = RaCapacityValueRaw>,
{
    let energy_sources: IndexSet<EnergySourceID> = projects
        .values()
        .map(|project| project.energy_source.clone())
        .collect();

    let mut map = IndexMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        check_month(raw.month)?;
        check_non_negative(raw.elcc, "elcc")?;
        check_non_negative(raw.ra_production_factor, "ra_production_factor")?;

        // Sources which no project uses are skipped
        let Ok(source) = energy_sources.get_id(&raw.energy_source) else {
            continue;
        };
        let value = RaCapacityValue {
            elcc: raw.elcc,
            production_factor: raw.ra_production_factor,
        };
        ensure!(
            map.insert((raw.period, source.clone(), raw.month), value)
                .is_none(),
            "Duplicate capacity value for period {}, energy source {source} and month {}",
            raw.period,
            raw.month
        );
    }

    Ok(map)
}

/// Check that RA-eligible projects have the data needed to value their capacity
fn check_eligible_projects(
    data: &ResourceAdequacyData,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<()> {
    let months = data.months();
    for project in projects.values().filter(|project| project.is_ra_eligible) {
        if project.class == GeneratorClass::Dispatchable {
            continue;
        }

        if project.hybrid_capacity_ratio().is_some() {
            ensure!(
                project
                    .storage()
                    .is_some_and(|storage| storage.energy_to_power_ratio.is_some()),
                "RA-eligible hybrid storage project {} needs a storage_energy_to_power_ratio",
                project.id
            );
        }

        for period in timescales.periods.keys() {
            for month in &months {
                ensure!(
                    data.capacity_values.contains_key(&(
                        *period,
                        project.energy_source.clone(),
                        *month
                    )),
                    "No RA capacity value for energy source {} (project {}) in period {period} \
                    and month {month}",
                    project.energy_source,
                    project.id
                );
            }
        }
    }

    Ok(())
}

/// Read midterm reliability requirements. Periods which are not listed have no requirement.
pub fn read_midterm_reliability(
    model_dir: &Path,
    timescales: &Timescales,
) -> Result<MidtermRequirementMap> {
    let file_path = model_dir.join(MIDTERM_FILE_NAME);
    read_midterm_from_iter(read_csv(&file_path)?, timescales)
        .with_context(|| input_err_msg(&file_path))
}

fn read_midterm_from_iter<I>(iter: I, timescales: &Timescales) -> Result<MidtermRequirementMap>
where
    I: Iterator<Item = MidtermRequirementRaw>,
{
    let mut map = MidtermRequirementMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        check_non_negative(raw.midterm_firm_requirement, "midterm_firm_requirement")?;
        check_non_negative(raw.midterm_ldes_requirement, "midterm_ldes_requirement")?;
        let requirement = MidtermRequirement {
            firm: Capacity(raw.midterm_firm_requirement),
            long_duration_storage: Capacity(raw.midterm_ldes_requirement),
        };
        ensure!(
            map.insert(raw.period, requirement).is_none(),
            "Duplicate midterm requirement for period {}",
            raw.period
        );
    }

    for period in timescales.periods.keys() {
        map.entry(*period).or_insert(MidtermRequirement {
            firm: Capacity(0.0),
            long_duration_storage: Capacity(0.0),
        });
    }

    Ok(map)
}

//! Common routines for handling input data.
use crate::model::{Model, ModelParameters, OptionalModule};
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use log::debug;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fmt::Display;
use std::fs;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;

mod build;
mod capacity_factor;
mod emissions;
mod policy;
mod pricing;
mod project;
mod resource_adequacy;
mod timescale;
mod zone;

pub use build::read_build_years;
pub use capacity_factor::read_capacity_factors;
pub use emissions::read_emissions_data;
pub use policy::{
    read_excess_generation_limits, read_hedge_premium_costs, read_rec_values,
    read_renewable_targets,
};
pub use pricing::read_nodal_prices;
pub use project::read_projects;
pub use resource_adequacy::{read_midterm_reliability, read_resource_adequacy};
pub use timescale::{read_financials, read_timescales};
pub use zone::read_load_zones;

/// The value used in input files to indicate a missing entry
const MISSING_VALUE: &str = ".";

/// Read a series of type `T`s from a CSV file.
///
/// Returns an error if the file cannot be read or contains no rows.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_as_vec(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file which the user may omit.
///
/// An absent file yields an empty iterator. An empty file is allowed.
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.is_file() {
        debug!("Optional file {} not found", file_path.display());
        return Ok(Vec::new().into_iter());
    }

    Ok(read_csv_as_vec(file_path)?.into_iter())
}

/// Read all rows of a CSV file into a `Vec`
fn read_csv_as_vec<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;

    let mut vec = Vec::new();
    for result in reader.deserialize() {
        let record: T = result.with_context(|| input_err_msg(file_path))?;
        vec.push(record);
    }

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read an optional value, treating empty cells and `.` as missing
pub fn deserialise_optional<'de, D, T>(deserialiser: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let value: Option<String> = Deserialize::deserialize(deserialiser)?;
    match value.as_deref().map(str::trim) {
        None | Some("" | MISSING_VALUE) => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Read a boolean flag, which may be written as `0`/`1` or `true`/`false`.
///
/// Missing values are treated as false.
pub fn deserialise_flag<'de, D>(deserialiser: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserialiser)?;
    match value.as_deref().map(str::trim) {
        None | Some("" | MISSING_VALUE) => Ok(false),
        Some(s) if s == "1" || s.eq_ignore_ascii_case("true") => Ok(true),
        Some(s) if s == "0" || s.eq_ignore_ascii_case("false") => Ok(false),
        Some(s) => Err(serde::de::Error::custom(format!(
            "Invalid boolean value: {s}"
        ))),
    }
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = Deserialize::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(value)
}

/// Check that a value is a non-negative, finite number
pub fn check_non_negative(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero (got {value})"
    );

    Ok(())
}

/// Check that a value lies in [0, 1]
pub fn check_fraction(value: f64, name: &str) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "{name} must be between 0 and 1 (got {value})"
    );

    Ok(())
}

/// Check that the values are in ascending order with no duplicates
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Insert a key-value pair into a map, returning an error if the key is already present
pub fn try_insert<K, V>(map: &mut indexmap::IndexMap<K, V>, key: K, value: V) -> Result<()>
where
    K: Eq + Hash + Display,
{
    let entry = map.entry(key);
    if let indexmap::map::Entry::Occupied(entry) = entry {
        bail!("Duplicate entry for {}", entry.key());
    }
    entry.or_insert(value);

    Ok(())
}

/// Format a list of items, showing at most a few of them
pub fn format_items_with_cap<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    const MAX_ITEMS: usize = 10;

    let items = items.into_iter().collect_vec();
    let shown = items.iter().take(MAX_ITEMS).join(", ");
    if items.len() > MAX_ITEMS {
        format!("{shown} and {} more", items.len() - MAX_ITEMS)
    } else {
        shown
    }
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data or an error describing the first invalid input found.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;

    let financials = read_financials(model_dir)?;
    let timescales = read_timescales(model_dir, &financials)?;
    let zones = read_load_zones(model_dir, &timescales)?;
    let projects = read_projects(model_dir, &zones, &parameters)?;
    let build_years = read_build_years(model_dir, &projects, &timescales)?;
    let capacity_factors = read_capacity_factors(model_dir, &projects, &build_years, &timescales)?;
    let hedge_premium_costs =
        read_hedge_premium_costs(model_dir, &zones, &timescales, &parameters)?;
    let renewable_targets = read_renewable_targets(model_dir, &timescales)?;
    let rec_values = parameters
        .sell_excess_recs
        .then(|| read_rec_values(model_dir, &timescales))
        .transpose()?;
    let excess_generation = parameters
        .is_module_enabled(OptionalModule::ExcessGeneration)
        .then(|| read_excess_generation_limits(model_dir, &timescales, &parameters))
        .transpose()?;
    let nodal_prices = read_nodal_prices(model_dir, &projects, &zones, &timescales, &parameters)?;
    let resource_adequacy = parameters
        .is_module_enabled(OptionalModule::ResourceAdequacy)
        .then(|| read_resource_adequacy(model_dir, &projects, &timescales))
        .transpose()?;
    let midterm_reliability = parameters
        .is_module_enabled(OptionalModule::MidtermReliability)
        .then(|| read_midterm_reliability(model_dir, &timescales))
        .transpose()?;
    let emissions = parameters
        .is_module_enabled(OptionalModule::Emissions)
        .then(|| read_emissions_data(model_dir, &projects, &timescales))
        .transpose()?;

    debug!(
        "Read {} projects in {} load zones over {} periods",
        projects.len(),
        zones.len(),
        timescales.periods.len()
    );

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        parameters,
        projects_by_zone: Model::index_projects_by_zone(&zones, &projects),
        timescales,
        zones,
        projects,
        build_years,
        capacity_factors,
        hedge_premium_costs,
        renewable_targets,
        rec_values,
        excess_generation,
        nodal_prices,
        resource_adequacy,
        midterm_reliability,
        emissions,
    })
}

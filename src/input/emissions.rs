//! Code for reading carbon prices and marginal emission rates.
use super::{check_non_negative, input_err_msg, read_csv_optional};
use crate::id::IDCollection;
use crate::policy::{EmissionRateMap, EmissionsData};
use crate::project::{CambiumRegionID, ProjectMap};
use crate::timescale::{PeriodID, Timescales};
use crate::units::MoneyPerEmissions;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const CARBON_PRICE_FILE_NAME: &str = "internal_carbon_price.csv";
const LRMER_FILE_NAME: &str = "lrmer.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct CarbonPriceRaw {
    period: PeriodID,
    internal_carbon_price: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct EmissionRateRaw {
    cambium_region: String,
    timepoint: String,
    lrmer: f64,
}

/// Read carbon prices and the marginal emission rates needed by additional projects
pub fn read_emissions_data(
    model_dir: &Path,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<EmissionsData> {
    let file_path = model_dir.join(CARBON_PRICE_FILE_NAME);
    let carbon_prices = read_carbon_prices_from_iter(read_csv_optional(&file_path)?, timescales)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(LRMER_FILE_NAME);
    let emission_rates =
        read_emission_rates_from_iter(read_csv_optional(&file_path)?, projects, timescales)
            .with_context(|| input_err_msg(&file_path))?;

    Ok(EmissionsData {
        carbon_prices,
        emission_rates,
    })
}

fn read_carbon_prices_from_iter<I>(
    iter: I,
    timescales: &Timescales,
) -> Result<IndexMap<PeriodID, MoneyPerEmissions>>
where
    I: Iterator<Item = CarbonPriceRaw>,
{
    let mut map = IndexMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        check_non_negative(raw.internal_carbon_price, "internal_carbon_price")?;
        ensure!(
            map.insert(raw.period, MoneyPerEmissions(raw.internal_carbon_price))
                .is_none(),
            "Duplicate carbon price for period {}",
            raw.period
        );
    }

    for period in timescales.periods.keys() {
        map.entry(*period).or_insert(MoneyPerEmissions(0.0));
    }

    Ok(map)
}

fn read_emission_rates_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<EmissionRateMap>
where
    I: Iterator<Item = EmissionRateRaw>,
{
    let mut regions = IndexSet::new();
    for project in projects.values().filter(|project| project.is_additional) {
        let region = project.cambium_region.as_ref().with_context(|| {
            format!("Additional project {} must have a cambium_region", project.id)
        })?;
        regions.insert(region.clone());
    }

    let mut map = EmissionRateMap::new();
    for raw in iter {
        let timepoint = timescales.timepoints.get_id(&raw.timepoint)?;
        ensure!(raw.lrmer.is_finite(), "lrmer must be a finite number");
        let region = CambiumRegionID::from(raw.cambium_region);
        ensure!(
            map.insert((region.clone(), timepoint.clone()), raw.lrmer)
                .is_none(),
            "Duplicate emission rate for region {region} and timepoint {timepoint}"
        );
    }

    for region in &regions {
        for timepoint in timescales.timepoints.keys() {
            ensure!(
                map.contains_key(&(region.clone(), timepoint.clone())),
                "Region {region} has no emission rate for timepoint {timepoint}"
            );
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{projects, timescales};
    use rstest::rstest;

    fn rate(timepoint: &str) -> EmissionRateRaw {
        EmissionRateRaw {
            cambium_region: "CA".into(),
            timepoint: timepoint.into(),
            lrmer: 0.4,
        }
    }

    #[rstest]
    fn test_read_carbon_prices_default(timescales: Timescales) {
        let map = read_carbon_prices_from_iter(std::iter::empty(), &timescales).unwrap();
        assert_eq!(map[&2025], MoneyPerEmissions(0.0));
    }

    #[rstest]
    fn test_read_emission_rates(mut projects: ProjectMap, timescales: Timescales) {
        projects["gen1"].is_additional = true;
        projects["gen1"].cambium_region = Some("CA".into());

        let map = read_emission_rates_from_iter(
            [rate("tp1"), rate("tp2")].into_iter(),
            &projects,
            &timescales,
        )
        .unwrap();
        assert_eq!(map.len(), 2);

        // Incomplete series
        assert!(
            read_emission_rates_from_iter([rate("tp1")].into_iter(), &projects, &timescales)
                .is_err()
        );

        // No region
        projects["gen1"].cambium_region = None;
        assert!(
            read_emission_rates_from_iter(
                [rate("tp1"), rate("tp2")].into_iter(),
                &projects,
                &timescales
            )
            .is_err()
        );
    }
}

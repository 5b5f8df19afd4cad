//! Fixtures for tests
#![allow(missing_docs)]
use crate::model::{Model, ModelParameters, OptionalModule};
use crate::project::{
    BuildKind, BuildYear, BuildYearMap, CapacityFactorMap, GenerationProject, GeneratorClass,
    ProjectMap, StorageParameters,
};
use crate::timescale::{Financials, Period, Timepoint, TimepointID, Timescales, Timeseries};
use crate::units::{
    Capacity, Dimensionless, EmissionsPerEnergy, Hours, MoneyPerCapacity, MoneyPerEnergy,
};
use crate::zone::{LoadZone, ZoneMap};
use rstest::fixture;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// One single-year period (2025) with two one-hour timepoints and no discounting
#[fixture]
pub fn timescales() -> Timescales {
    let financials = Financials {
        base_financial_year: 2025,
        dollar_year: 2025,
        discount_rate: Dimensionless(0.0),
    };
    let mut period = Period::new(2025, 2025, 2025, &financials);
    let ids = [TimepointID::new("tp1"), TimepointID::new("tp2")];
    period.timepoints = ids.to_vec();

    let timeseries = Timeseries {
        id: "ts1".into(),
        period: 2025,
        duration_of_tp: Hours(1.0),
        num_tps: 2,
        scale_to_period: 1.0,
        timepoints: ids.to_vec(),
    };
    let timepoints = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let timepoint = Timepoint {
                id: id.clone(),
                timestamp: format!("2025-01-01 0{i}:00"),
                timeseries: timeseries.id.clone(),
                period: 2025,
                duration: Hours(1.0),
                weight: Hours(1.0),
                weight_in_year: Hours(1.0),
                previous: ids[1 - i].clone(),
            };
            (id.clone(), timepoint)
        })
        .collect();

    Timescales {
        financials,
        periods: [(2025, period)].into_iter().collect(),
        timeseries: [(timeseries.id.clone(), timeseries)].into_iter().collect(),
        timepoints,
    }
}

/// One zone with demand of 80 MW then 120 MW
#[fixture]
pub fn zones() -> ZoneMap {
    let zone = LoadZone {
        id: "zone1".into(),
        demand: [
            (TimepointID::new("tp1"), Capacity(80.0)),
            (TimepointID::new("tp2"), Capacity(120.0)),
        ]
        .into_iter()
        .collect(),
    };
    [(zone.id.clone(), zone)].into_iter().collect()
}

/// A 100 MW dispatchable project costing $50/MWh
#[fixture]
pub fn dispatchable_project() -> GenerationProject {
    GenerationProject {
        id: "gen1".into(),
        load_zone: "zone1".into(),
        technology: "Gas_CC".into(),
        energy_source: "Gas".into(),
        pricing_node: "zone1".into(),
        class: GeneratorClass::Dispatchable,
        hybrid: None,
        capacity_limit: Capacity(100.0),
        min_build_capacity: Capacity(0.0),
        unit_size: None,
        max_age: 25,
        forced_outage_rate: 0.0,
        scheduled_outage_rate: 0.0,
        cod_year: None,
        ppa_energy_cost: MoneyPerEnergy(50.0),
        ppa_capacity_cost: MoneyPerCapacity(0.0),
        is_ra_eligible: false,
        variant_group: None,
        emission_factor: EmissionsPerEnergy(0.0),
        is_additional: false,
        cambium_region: None,
        carbon_capture: None,
    }
}

/// A battery with 2 hours of storage and a round-trip efficiency of 81%
#[fixture]
pub fn storage_project() -> GenerationProject {
    GenerationProject {
        id: "battery".into(),
        technology: "Battery_Storage".into(),
        energy_source: "Battery".into(),
        class: GeneratorClass::Storage(StorageParameters {
            roundtrip_efficiency: 0.81,
            charge_to_discharge_ratio: 1.0,
            energy_to_power_ratio: Some(2.0),
            max_annual_cycles: None,
            leakage_loss: 0.0,
        }),
        capacity_limit: Capacity(5.0),
        ppa_energy_cost: MoneyPerEnergy(0.0),
        ..dispatchable_project()
    }
}

#[fixture]
pub fn projects(
    dispatchable_project: GenerationProject,
    storage_project: GenerationProject,
) -> ProjectMap {
    [dispatchable_project, storage_project]
        .into_iter()
        .map(|project| (project.id.clone(), project))
        .collect()
}

/// One optimisable build in 2025 for every project
#[fixture]
pub fn build_years(projects: ProjectMap) -> BuildYearMap {
    projects
        .keys()
        .map(|id| {
            let build = BuildYear {
                year: 2025,
                kind: BuildKind::Optimisable { period: 2025 },
                online_year: 2025,
            };
            (id.clone(), vec![build])
        })
        .collect()
}

/// A model with the fixture timescales, zone and projects, and the storage module enabled
#[fixture]
pub fn model(
    timescales: Timescales,
    zones: ZoneMap,
    projects: ProjectMap,
    build_years: BuildYearMap,
) -> Model {
    let parameters = ModelParameters {
        modules: vec![OptionalModule::Storage],
        ..ModelParameters::default()
    };
    let default_cost = parameters.default_hedge_premium_cost;
    let hedge_premium_costs = zones
        .keys()
        .flat_map(|zone| {
            timescales
                .timepoints
                .keys()
                .map(move |tp| ((zone.clone(), tp.clone()), default_cost))
        })
        .collect();

    Model {
        model_path: PathBuf::from("model"),
        renewable_targets: [(2025, 0.0)].into_iter().collect(),
        projects_by_zone: Model::index_projects_by_zone(&zones, &projects),
        parameters,
        timescales,
        zones,
        projects,
        build_years,
        capacity_factors: CapacityFactorMap::new(),
        hedge_premium_costs,
        rec_values: None,
        excess_generation: None,
        nodal_prices: None,
        resource_adequacy: None,
        midterm_reliability: None,
        emissions: None,
    }
}

//! End-to-end tests which solve small models written to a temporary directory.
use float_cmp::assert_approx_eq;
use portfolio::formulation::formulate;
use portfolio::input::load_model;
use portfolio::optimisation::SolverOptions;
use portfolio::simulation::solution::Solution;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Files shared by every scenario: one zone and one single-year period with two hourly timepoints
const COMMON_FILES: [(&str, &str); 7] = [
    (
        "financials.csv",
        "base_financial_year,dollar_year,discount_rate\n2025,2025,0.0\n",
    ),
    ("periods.csv", "period,period_start,period_end\n2025,2025,2025\n"),
    (
        "timeseries.csv",
        "timeseries,period,duration_of_tp,num_tps,scale_to_period\nts1,2025,1,2,1\n",
    ),
    (
        "timepoints.csv",
        "timepoint,timestamp,timeseries\ntp1,2025-01-01 00:00,ts1\ntp2,2025-01-01 01:00,ts1\n",
    ),
    ("load_zones.csv", "load_zone\nzone1\n"),
    (
        "loads.csv",
        "load_zone,timepoint,zone_demand_mw\nzone1,tp1,80\nzone1,tp2,120\n",
    ),
    ("energy_sources.csv", "energy_source\nGas\nSolar\nBattery\n"),
];

fn write_model(dir: &Path, files: &[(&str, &str)]) {
    for (name, contents) in COMMON_FILES.iter().chain(files) {
        fs::write(dir.join(name), contents).unwrap();
    }
}

/// One 100 MW dispatchable project at $50/MWh, with system power at $200/MWh.
///
/// The project is built to its limit and system power covers the 20 MW shortfall in tp2.
#[test]
fn test_single_dispatchable_project() {
    let dir = tempdir().unwrap();
    write_model(
        dir.path(),
        &[
            ("model.toml", "default_hedge_premium_cost = 200.0\n"),
            (
                "generation_projects.csv",
                "id,load_zone,tech,energy_source,capacity_limit,ppa_energy_cost\n\
                gen1,zone1,Gas_CC,Gas,100,50\n",
            ),
        ],
    );

    let model = load_model(dir.path()).unwrap();
    let formulation = formulate(&model).unwrap();
    let raw = formulation.problem.solve(&SolverOptions::default()).unwrap();
    let solution = Solution::new(&model, &formulation, raw);

    let builds: Vec<_> = solution.iter_builds().collect();
    assert_eq!(builds.len(), 1);
    assert_approx_eq!(f64, builds[0].2.value(), 100.0, epsilon = 1e-6);

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

    assert_approx_eq!(
        f64,
        solution.objective_value().value(),
        50.0 * (80.0 + 100.0) + 200.0 * 20.0,
        epsilon = 1e-6
    );
    assert!(!solution.is_mip());
}

/// Solve the single dispatchable project model with the given hedge premium
fn solve_with_hedge_premium(premium: f64) -> f64 {
    let dir = tempdir().unwrap();
    let parameters = format!("default_hedge_premium_cost = {premium:?}\n");
    write_model(
        dir.path(),
        &[
            ("model.toml", &parameters),
            (
                "generation_projects.csv",
                "id,load_zone,tech,energy_source,capacity_limit,ppa_energy_cost\n\
                gen1,zone1,Gas_CC,Gas,100,50\n",
            ),
        ],
    );

    let model = load_model(dir.path()).unwrap();
    let formulation = formulate(&model).unwrap();
    let raw = formulation.problem.solve(&SolverOptions::default()).unwrap();
    Solution::new(&model, &formulation, raw)
        .objective_value()
        .value()
}

/// Making system power dearer can never make the portfolio cheaper
#[test]
fn test_hedge_premium_never_lowers_objective() {
    let objectives: Vec<_> = [0.0, 25.0, 50.0, 200.0, 1000.0]
        .into_iter()
        .map(solve_with_hedge_premium)
        .collect();
    for pair in objectives.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-6, "{objectives:?}");
    }

    // Once system power is dearer than the project, only the tp2 shortfall is bought
    assert_approx_eq!(
        f64,
        objectives[4],
        50.0 * 180.0 + 1000.0 * 20.0,
        epsilon = 1e-6
    );
}

/// A 5 MW/10 MWh battery which is charged from 5 MW of excess solar in tp1.
///
/// Both projects are built to their capacity limits in advance.
///
/// With a round-trip efficiency of 81%, no more than 4.5 MW can be discharged in tp2.
#[test]
fn test_storage_shifts_excess_generation() {
    let dir = tempdir().unwrap();
    write_model(
        dir.path(),
        &[
            (
                "model.toml",
                "modules = [\"storage\"]\ndefault_hedge_premium_cost = 200.0\n",
            ),
            (
                "generation_projects.csv",
                "id,load_zone,tech,energy_source,is_variable,is_storage,capacity_limit,\
                ppa_energy_cost,storage_roundtrip_efficiency\n\
                solar,zone1,Solar_PV,Solar,1,0,85,0,\n\
                battery,zone1,Battery_Storage,Battery,0,1,5,0,0.81\n",
            ),
            (
                "gen_build_predetermined.csv",
                "project_id,build_year,predetermined_capacity,predetermined_energy_capacity\n\
                solar,2025,85,\n\
                battery,2025,5,10\n",
            ),
            (
                "variable_capacity_factors.csv",
                "project_id,timepoint,variable_capacity_factor\nsolar,tp1,1.0\nsolar,tp2,0.0\n",
            ),
        ],
    );

    let model = load_model(dir.path()).unwrap();
    let formulation = formulate(&model).unwrap();
    let raw = formulation.problem.solve(&SolverOptions::default()).unwrap();
    let solution = Solution::new(&model, &formulation, raw);

    let storage: Vec<_> = solution.iter_storage_dispatch().collect();
    assert_eq!(storage.len(), 2);
    for (_, _, charge, discharge, soc) in &storage {
        assert!(charge.value() <= 5.0 + 1e-6);
        assert!(charge.value() + discharge.value() <= 5.0 + 1e-6);
        assert!(soc.value() >= -1e-6);
        assert!(soc.value() <= 10.0 + 1e-6);
    }

    let (_, _, charge, _, _) = storage[0];
    let (_, _, _, discharge, _) = storage[1];
    assert!(charge.value() > 0.0);
    assert!(discharge.value() > 0.0);
    assert!(discharge.value() <= 4.5 + 1e-6);

    // Discharging reduces what must be bought in tp2
    let system_power: Vec<_> = solution
        .iter_system_power()
        .map(|(_, _, power)| power.value())
        .collect();
    assert_approx_eq!(
        f64,
        system_power[1],
        120.0 - discharge.value(),
        epsilon = 1e-6
    );
}

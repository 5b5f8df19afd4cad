//! Code for reading predetermined builds and working out the build years of each project.
use super::{check_non_negative, deserialise_optional, input_err_msg, read_csv_optional};
use crate::id::IDCollection;
use crate::project::{BuildKind, BuildYear, BuildYearMap, ProjectID, ProjectMap};
use crate::timescale::Timescales;
use crate::units::{Capacity, Energy};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const PREDETERMINED_FILE_NAME: &str = "gen_build_predetermined.csv";
const BUILD_YEARS_FILE_NAME: &str = "gen_build_years.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct PredeterminedBuildRaw {
    project_id: String,
    build_year: u32,
    predetermined_capacity: f64,
    #[serde(default, deserialize_with = "deserialise_optional")]
    predetermined_energy_capacity: Option<f64>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct BuildYearRaw {
    project_id: String,
    build_year: u32,
}

/// Read the build years for every project.
///
/// Predetermined builds come from `gen_build_predetermined.csv`. Every project can also be built
/// in every period, unless `gen_build_years.csv` is given, in which case only the (project,
/// period) pairs it lists are optimisable.
pub fn read_build_years(
    model_dir: &Path,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<BuildYearMap> {
    let file_path = model_dir.join(PREDETERMINED_FILE_NAME);
    let predetermined = read_predetermined_from_iter(read_csv_optional(&file_path)?, projects)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(BUILD_YEARS_FILE_NAME);
    let optimisable = if file_path.is_file() {
        let pairs = read_optimisable_from_iter(read_csv_optional(&file_path)?, projects, timescales)
            .with_context(|| input_err_msg(&file_path))?;
        Some(pairs)
    } else {
        None
    };

    Ok(build_year_map(
        projects,
        predetermined,
        optimisable.as_ref(),
        timescales,
    ))
}

fn read_predetermined_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
) -> Result<IndexMap<ProjectID, Vec<BuildYear>>>
where
    I: Iterator<Item = PredeterminedBuildRaw>,
{
    let mut map: IndexMap<ProjectID, Vec<BuildYear>> = IndexMap::new();
    for raw in iter {
        let id = projects.get_id(&raw.project_id)?;
        let project = &projects[&id];
        check_non_negative(raw.predetermined_capacity, "predetermined_capacity")?;
        let capacity = Capacity(raw.predetermined_capacity);
        ensure!(
            capacity <= project.capacity_limit,
            "Predetermined capacity for {id} in {} exceeds its capacity limit",
            raw.build_year
        );

        let energy_capacity = match raw.predetermined_energy_capacity {
            Some(energy) => {
                ensure!(
                    project.is_storage(),
                    "predetermined_energy_capacity given for non-storage project {id}"
                );
                check_non_negative(energy, "predetermined_energy_capacity")?;
                Some(Energy(energy))
            }
            None => {
                ensure!(
                    project
                        .storage()
                        .is_none_or(|storage| storage.energy_to_power_ratio.is_some()),
                    "Predetermined build for storage project {id} in {} needs a \
                    predetermined_energy_capacity",
                    raw.build_year
                );
                None
            }
        };

        let builds = map.entry(id.clone()).or_default();
        ensure!(
            builds.iter().all(|build| build.year != raw.build_year),
            "Duplicate predetermined build for {id} in {}",
            raw.build_year
        );
        builds.push(BuildYear {
            year: raw.build_year,
            kind: BuildKind::Predetermined {
                capacity,
                energy_capacity,
            },
            online_year: raw.build_year,
        });
    }

    Ok(map)
}

fn read_optimisable_from_iter<I>(
    iter: I,
    projects: &ProjectMap,
    timescales: &Timescales,
) -> Result<IndexSet<(ProjectID, u32)>>
where
    I: Iterator<Item = BuildYearRaw>,
{
    let mut pairs = IndexSet::new();
    for raw in iter {
        let id = projects.get_id(&raw.project_id)?;
        ensure!(
            timescales.periods.contains_key(&raw.build_year),
            "Build year {} for project {id} is not a period",
            raw.build_year
        );
        ensure!(
            pairs.insert((id.clone(), raw.build_year)),
            "Duplicate build year {} for project {id}",
            raw.build_year
        );
    }

    Ok(pairs)
}

/// Combine predetermined and optimisable builds for each project
fn build_year_map(
    projects: &ProjectMap,
    mut predetermined: IndexMap<ProjectID, Vec<BuildYear>>,
    optimisable: Option<&IndexSet<(ProjectID, u32)>>,
    timescales: &Timescales,
) -> BuildYearMap {
    let mut map = BuildYearMap::new();
    for id in projects.keys() {
        let mut builds = predetermined.swap_remove(id).unwrap_or_default();
        for period in timescales.periods.values() {
            // A predetermined build in the same year takes precedence and comes online with the
            // period
            if let Some(build) = builds.iter_mut().find(|build| build.year == period.id) {
                build.online_year = period.start;
                continue;
            }
            if optimisable.is_some_and(|pairs| !pairs.contains(&(id.clone(), period.id))) {
                continue;
            }

            builds.push(BuildYear {
                year: period.id,
                kind: BuildKind::Optimisable { period: period.id },
                online_year: period.start,
            });
        }

        if builds.is_empty() {
            warn!("Project {id} has no build years and will never be built");
        }
        map.insert(id.clone(), builds);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{projects, timescales};
    use rstest::rstest;

    fn predetermined_raw(project: &str, year: u32, capacity: f64) -> PredeterminedBuildRaw {
        PredeterminedBuildRaw {
            project_id: project.into(),
            build_year: year,
            predetermined_capacity: capacity,
            predetermined_energy_capacity: None,
        }
    }

    #[rstest]
    fn test_build_year_map(projects: ProjectMap, timescales: Timescales) {
        let predetermined = read_predetermined_from_iter(
            [predetermined_raw("gen1", 2010, 5.0)].into_iter(),
            &projects,
        )
        .unwrap();
        let map = build_year_map(&projects, predetermined, None, &timescales);
        let builds = &map["gen1"];
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].predetermined_capacity(), Capacity(5.0));
        assert_eq!(builds[0].online_year, 2010);
        assert_eq!(builds[1].kind, BuildKind::Optimisable { period: 2025 });

        // Every project gets one optimisable build per period
        assert!(map.values().all(|builds| builds.iter().any(BuildYear::is_optimisable)));
    }

    #[rstest]
    fn test_build_year_map_predetermined_in_period(projects: ProjectMap, timescales: Timescales) {
        let predetermined = read_predetermined_from_iter(
            [predetermined_raw("gen1", 2025, 5.0)].into_iter(),
            &projects,
        )
        .unwrap();
        let map = build_year_map(&projects, predetermined, None, &timescales);
        let builds = &map["gen1"];
        assert_eq!(builds.len(), 1);
        assert!(!builds[0].is_optimisable());
        assert_eq!(builds[0].online_year, 2025);
    }

    #[rstest]
    fn test_predetermined_in_period_online_at_start(
        projects: ProjectMap,
        mut timescales: Timescales,
    ) {
        // A period labelled by a year other than its first
        timescales.periods[&2025].start = 2023;
        let predetermined = read_predetermined_from_iter(
            [predetermined_raw("gen1", 2025, 5.0)].into_iter(),
            &projects,
        )
        .unwrap();
        let map = build_year_map(&projects, predetermined, None, &timescales);
        assert_eq!(map["gen1"][0].online_year, 2023);
        assert_eq!(map["battery"][0].online_year, 2023);
    }

    #[rstest]
    fn test_build_year_map_restricted(projects: ProjectMap, timescales: Timescales) {
        let optimisable = read_optimisable_from_iter(
            [BuildYearRaw {
                project_id: "gen1".into(),
                build_year: 2025,
            }]
            .into_iter(),
            &projects,
            &timescales,
        )
        .unwrap();
        let map = build_year_map(&projects, IndexMap::new(), Some(&optimisable), &timescales);
        assert_eq!(map["gen1"].len(), 1);
        assert!(map["battery"].is_empty());
    }

    #[rstest]
    #[case(predetermined_raw("missing", 2010, 5.0))]
    #[case(predetermined_raw("gen1", 2010, -5.0))]
    #[case(predetermined_raw("gen1", 2010, 1e9))]
    #[case(PredeterminedBuildRaw {
        predetermined_energy_capacity: Some(10.0),
        ..predetermined_raw("gen1", 2010, 5.0)
    })]
    fn test_read_predetermined_invalid(projects: ProjectMap, #[case] raw: PredeterminedBuildRaw) {
        assert!(read_predetermined_from_iter([raw].into_iter(), &projects).is_err());
    }

    #[rstest]
    fn test_read_optimisable_not_a_period(projects: ProjectMap, timescales: Timescales) {
        let raw = BuildYearRaw {
            project_id: "gen1".into(),
            build_year: 2024,
        };
        assert!(read_optimisable_from_iter([raw].into_iter(), &projects, &timescales).is_err());
    }
}

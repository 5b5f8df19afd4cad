//! Code for reading generation and storage projects.
use super::{
    check_fraction, check_non_negative, deserialise_flag, deserialise_optional, input_err_msg,
    read_csv, try_insert,
};
use crate::id::IDCollection;
use crate::model::{ModelParameters, OptionalModule};
use crate::project::{
    CambiumRegionID, CarbonCapture, EnergySourceID, GenerationProject, GeneratorClass,
    HybridPairing, PricingNodeID, ProjectID, ProjectMap, StorageParameters, VariantGroupID,
};
use crate::units::{Capacity, EmissionsPerEnergy, MoneyPerCapacity, MoneyPerEnergy};
use crate::zone::ZoneMap;
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const PROJECTS_FILE_NAME: &str = "generation_projects.csv";
const ENERGY_SOURCES_FILE_NAME: &str = "energy_sources.csv";

/// Energy source label for projects which use more than one source
const MULTIPLE_ENERGY_SOURCES: &str = "multiple";

/// Default age at which builds retire
const DEFAULT_MAX_AGE: u32 = 25;

#[derive(Debug, Deserialize, PartialEq)]
struct EnergySourceRaw {
    energy_source: String,
}

#[derive(Debug, Deserialize, PartialEq, Default)]
#[allow(clippy::struct_excessive_bools)]
struct ProjectRaw {
    id: String,
    load_zone: String,
    tech: String,
    energy_source: String,
    #[serde(default, deserialize_with = "deserialise_optional")]
    pricing_node: Option<String>,
    #[serde(default, deserialize_with = "deserialise_flag")]
    is_variable: bool,
    #[serde(default, deserialize_with = "deserialise_flag")]
    is_baseload: bool,
    #[serde(default, deserialize_with = "deserialise_flag")]
    is_storage: bool,
    #[serde(default, deserialize_with = "deserialise_flag")]
    is_hybrid: bool,
    #[serde(default, deserialize_with = "deserialise_optional")]
    capacity_limit: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    min_build_capacity: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    unit_size: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    max_age: Option<u32>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    forced_outage_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    scheduled_outage_rate: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    cod_year: Option<u32>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    ppa_energy_cost: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    ppa_capacity_cost: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_flag")]
    is_ra_eligible: bool,
    #[serde(default, deserialize_with = "deserialise_optional")]
    variant_group: Option<String>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    emission_factor: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_flag")]
    is_additional: bool,
    #[serde(default, deserialize_with = "deserialise_optional")]
    cambium_region: Option<String>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    ccs_capture_efficiency: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    ccs_energy_load: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_roundtrip_efficiency: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_charge_to_discharge_ratio: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_energy_to_power_ratio: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_max_annual_cycles: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_leakage_loss: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_hybrid_generation_project: Option<String>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_hybrid_min_capacity_ratio: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    storage_hybrid_max_capacity_ratio: Option<f64>,
}

/// Read projects from `generation_projects.csv`.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `zones` - Known load zones
/// * `parameters` - Model parameters, for defaults and enabled modules
pub fn read_projects(
    model_dir: &Path,
    zones: &ZoneMap,
    parameters: &ModelParameters,
) -> Result<ProjectMap> {
    let file_path = model_dir.join(ENERGY_SOURCES_FILE_NAME);
    let energy_sources = read_energy_sources_from_iter(read_csv(&file_path)?)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(PROJECTS_FILE_NAME);
    read_projects_from_iter(read_csv(&file_path)?, zones, &energy_sources, parameters)
        .with_context(|| input_err_msg(&file_path))
}

fn read_energy_sources_from_iter<I>(iter: I) -> Result<IndexSet<EnergySourceID>>
where
    I: Iterator<Item = EnergySourceRaw>,
{
    let mut sources = IndexSet::new();
    for raw in iter {
        let id = EnergySourceID::from(raw.energy_source);
        ensure!(!sources.contains(&id), "Duplicate energy source {id}");
        sources.insert(id);
    }

    Ok(sources)
}

fn read_projects_from_iter<I>(
    iter: I,
    zones: &ZoneMap,
    energy_sources: &IndexSet<EnergySourceID>,
    parameters: &ModelParameters,
) -> Result<ProjectMap>
where
    I: Iterator<Item = ProjectRaw>,
{
    let mut projects = IndexMap::new();
    let mut hybrid_generators = IndexSet::new();
    for raw in iter {
        let id = ProjectID::new(&raw.id);
        if raw.is_hybrid && !raw.is_storage {
            hybrid_generators.insert(id.clone());
        }
        let project = project_from_raw(raw, zones, energy_sources, parameters)
            .with_context(|| format!("Invalid project {id}"))?;
        try_insert(&mut projects, id, project)?;
    }

    resolve_hybrid_pairings(&mut projects, &hybrid_generators)?;

    Ok(projects)
}

/// Work out which class a project belongs to from its flags
fn classify(raw: &ProjectRaw) -> Result<GeneratorClass> {
    let class = match (raw.is_variable, raw.is_baseload, raw.is_storage) {
        (false, false, false) => GeneratorClass::Dispatchable,
        (true, false, false) => GeneratorClass::Variable,
        (false, true, false) => GeneratorClass::Baseload,
        (false, false, true) => GeneratorClass::Storage(storage_parameters_from_raw(raw)?),
        _ => bail!("At most one of is_variable, is_baseload and is_storage may be set"),
    };

    Ok(class)
}

fn storage_parameters_from_raw(raw: &ProjectRaw) -> Result<StorageParameters> {
    let roundtrip_efficiency = raw
        .storage_roundtrip_efficiency
        .context("storage_roundtrip_efficiency is required for storage projects")?;
    ensure!(
        roundtrip_efficiency > 0.0 && roundtrip_efficiency <= 1.0,
        "storage_roundtrip_efficiency must be in (0, 1]"
    );

    let charge_to_discharge_ratio = raw.storage_charge_to_discharge_ratio.unwrap_or(1.0);
    ensure!(
        charge_to_discharge_ratio.is_finite() && charge_to_discharge_ratio > 0.0,
        "storage_charge_to_discharge_ratio must be greater than zero"
    );
    if let Some(ratio) = raw.storage_energy_to_power_ratio {
        ensure!(
            ratio.is_finite() && ratio > 0.0,
            "storage_energy_to_power_ratio must be greater than zero"
        );
    }
    if let Some(cycles) = raw.storage_max_annual_cycles {
        ensure!(
            cycles.is_finite() && cycles > 0.0,
            "storage_max_annual_cycles must be greater than zero"
        );
    }
    let leakage_loss = raw.storage_leakage_loss.unwrap_or(0.0);
    ensure!(
        (0.0..1.0).contains(&leakage_loss),
        "storage_leakage_loss must be in [0, 1)"
    );

    Ok(StorageParameters {
        roundtrip_efficiency,
        charge_to_discharge_ratio,
        energy_to_power_ratio: raw.storage_energy_to_power_ratio,
        max_annual_cycles: raw.storage_max_annual_cycles,
        leakage_loss,
    })
}

fn project_from_raw(
    raw: ProjectRaw,
    zones: &ZoneMap,
    energy_sources: &IndexSet<EnergySourceID>,
    parameters: &ModelParameters,
) -> Result<GenerationProject> {
    let load_zone = zones.get_id(&raw.load_zone)?;
    let energy_source = if raw.energy_source == MULTIPLE_ENERGY_SOURCES {
        EnergySourceID::new(MULTIPLE_ENERGY_SOURCES)
    } else {
        energy_sources.get_id(&raw.energy_source)?
    };

    let class = classify(&raw)?;
    ensure!(
        !matches!(class, GeneratorClass::Storage(_))
            || parameters.is_module_enabled(OptionalModule::Storage),
        "Storage projects require the storage module to be enabled"
    );

    let capacity_limit = raw
        .capacity_limit
        .map_or(parameters.default_capacity_limit, Capacity);
    check_non_negative(capacity_limit.value(), "capacity_limit")?;
    let min_build_capacity = Capacity(raw.min_build_capacity.unwrap_or(0.0));
    check_non_negative(min_build_capacity.value(), "min_build_capacity")?;
    ensure!(
        min_build_capacity <= capacity_limit,
        "min_build_capacity cannot exceed capacity_limit"
    );
    if let Some(unit_size) = raw.unit_size {
        ensure!(
            unit_size.is_finite() && unit_size > 0.0,
            "unit_size must be greater than zero"
        );
    }

    let max_age = raw.max_age.unwrap_or(DEFAULT_MAX_AGE);
    ensure!(max_age > 0, "max_age must be greater than zero");
    let forced_outage_rate = raw.forced_outage_rate.unwrap_or(0.0);
    check_fraction(forced_outage_rate, "forced_outage_rate")?;
    let scheduled_outage_rate = raw.scheduled_outage_rate.unwrap_or(0.0);
    check_fraction(scheduled_outage_rate, "scheduled_outage_rate")?;

    let ppa_energy_cost = raw.ppa_energy_cost.unwrap_or(0.0);
    check_non_negative(ppa_energy_cost, "ppa_energy_cost")?;
    let ppa_capacity_cost = raw.ppa_capacity_cost.unwrap_or(0.0);
    check_non_negative(ppa_capacity_cost, "ppa_capacity_cost")?;

    let emission_factor = raw.emission_factor.unwrap_or(0.0);
    check_non_negative(emission_factor, "emission_factor")?;
    let carbon_capture = match (raw.ccs_capture_efficiency, raw.ccs_energy_load) {
        (None, None) => None,
        (capture_efficiency, energy_load) => {
            let capture_efficiency = capture_efficiency.unwrap_or(0.0);
            check_fraction(capture_efficiency, "ccs_capture_efficiency")?;
            let energy_load = energy_load.unwrap_or(0.0);
            check_fraction(energy_load, "ccs_energy_load")?;
            Some(CarbonCapture {
                capture_efficiency,
                energy_load,
            })
        }
    };

    let hybrid = hybrid_pairing_from_raw(&raw, &class)?;
    ensure!(
        hybrid.is_none() || raw.variant_group.is_none(),
        "Hybrid projects cannot belong to a variant group"
    );

    // Load zones double as pricing nodes
    let pricing_node =
        PricingNodeID::from(raw.pricing_node.unwrap_or_else(|| raw.load_zone.clone()));

    Ok(GenerationProject {
        id: raw.id.into(),
        load_zone,
        technology: raw.tech,
        energy_source,
        pricing_node,
        class,
        hybrid,
        capacity_limit,
        min_build_capacity,
        unit_size: raw.unit_size.map(Capacity),
        max_age,
        forced_outage_rate,
        scheduled_outage_rate,
        cod_year: raw.cod_year,
        ppa_energy_cost: MoneyPerEnergy(ppa_energy_cost),
        ppa_capacity_cost: MoneyPerCapacity(ppa_capacity_cost),
        is_ra_eligible: raw.is_ra_eligible,
        variant_group: raw.variant_group.map(VariantGroupID::from),
        emission_factor: EmissionsPerEnergy(emission_factor),
        is_additional: raw.is_additional,
        cambium_region: raw.cambium_region.map(CambiumRegionID::from),
        carbon_capture,
    })
}

/// Read the storage half of a hybrid pairing.
///
/// The generator half is filled in once all projects are known.
fn hybrid_pairing_from_raw(
    raw: &ProjectRaw,
    class: &GeneratorClass,
) -> Result<Option<HybridPairing>> {
    let is_storage = matches!(class, GeneratorClass::Storage(_));
    match (&raw.storage_hybrid_generation_project, is_storage) {
        (Some(generator), true) => {
            ensure!(
                raw.is_hybrid,
                "storage_hybrid_generation_project given but is_hybrid is not set"
            );
            let min_capacity_ratio = raw.storage_hybrid_min_capacity_ratio.unwrap_or(0.0);
            check_non_negative(min_capacity_ratio, "storage_hybrid_min_capacity_ratio")?;
            if let Some(max) = raw.storage_hybrid_max_capacity_ratio {
                ensure!(
                    max >= min_capacity_ratio,
                    "storage_hybrid_max_capacity_ratio cannot be less than \
                    storage_hybrid_min_capacity_ratio"
                );
            }

            Ok(Some(HybridPairing::Storage {
                generator: generator.as_str().into(),
                min_capacity_ratio,
                max_capacity_ratio: raw.storage_hybrid_max_capacity_ratio,
            }))
        }
        (Some(_), false) => {
            bail!("Only storage projects can have a storage_hybrid_generation_project")
        }
        (None, true) if raw.is_hybrid => {
            bail!("Hybrid storage projects must give a storage_hybrid_generation_project")
        }
        // Hybrid generators are linked to their storage in resolve_hybrid_pairings
        (None, _) => Ok(None),
    }
}

/// Check hybrid storage references and link each hybrid generator to its storage project
fn resolve_hybrid_pairings(
    projects: &mut ProjectMap,
    hybrid_generators: &IndexSet<ProjectID>,
) -> Result<()> {
    let mut storage_for_generator: IndexMap<ProjectID, ProjectID> = IndexMap::new();
    for project in projects.values() {
        let Some(HybridPairing::Storage { generator, .. }) = &project.hybrid else {
            continue;
        };

        let generator_project = projects.get(generator).with_context(|| {
            format!(
                "Hybrid storage project {} refers to unknown generator {generator}",
                project.id
            )
        })?;
        ensure!(
            !generator_project.is_storage(),
            "Hybrid storage project {} cannot be paired with another storage project ({generator})",
            project.id
        );
        ensure!(
            hybrid_generators.contains(generator),
            "Generator {generator} is paired with hybrid storage project {} but is_hybrid is not \
            set",
            project.id
        );
        ensure!(
            !storage_for_generator.contains_key(generator),
            "Generator {generator} is paired with more than one hybrid storage project"
        );
        storage_for_generator.insert(generator_project.id.clone(), project.id.clone());
    }

    for id in hybrid_generators {
        let storage = storage_for_generator
            .get(id)
            .with_context(|| {
                format!("Hybrid generator {id} is not paired with a storage project")
            })?;
        let project = &mut projects[id];
        ensure!(
            project.variant_group.is_none(),
            "Hybrid generator {id} cannot belong to a variant group"
        );
        project.hybrid = Some(HybridPairing::Generator {
            storage: storage.clone(),
        });
    }

    Ok(())
}

//! The model represents the static input data provided by the user.
use crate::policy::{
    EmissionsData, ExcessGenerationLimitMap, HedgePremiumCostMap, MidtermRequirementMap,
    NodalPriceMap, RecValueMap, RenewableTargetMap, ResourceAdequacyData,
};
use crate::project::{
    BuildYear, BuildYearMap, CapacityFactor, CapacityFactorMap, GenerationProject, PricingNodeID,
    ProjectID, ProjectMap,
};
use crate::timescale::{Period, PeriodID, TimepointID, Timescales};
use crate::units::MoneyPerEnergy;
use crate::zone::{ZoneID, ZoneMap};
use indexmap::IndexMap;
use itertools::Itertools;
use std::path::PathBuf;

pub mod parameters;
pub use parameters::{
    ExcessGenerationLimitType, ModelParameters, OptionalModule, RenewableGoalType,
    StorageExclusivity, VariantSelection,
};

/// Model definition
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Periods, timeseries and timepoints
    pub timescales: Timescales,
    /// Load zones and demand
    pub zones: ZoneMap,
    /// Generation and storage projects
    pub projects: ProjectMap,
    /// Build years for each project
    pub build_years: BuildYearMap,
    /// Capacity factors for variable and baseload projects
    pub capacity_factors: CapacityFactorMap,
    /// Hedge premium for system power, for every zone and timepoint
    pub hedge_premium_costs: HedgePremiumCostMap,
    /// Renewable target for every period
    pub renewable_targets: RenewableTargetMap,
    /// REC resale values, if excess RECs can be sold
    pub rec_values: Option<RecValueMap>,
    /// Excess generation limits, if the module is enabled
    pub excess_generation: Option<ExcessGenerationLimitMap>,
    /// Nodal prices, if provided
    pub nodal_prices: Option<NodalPriceMap>,
    /// RA requirements and capacity values, if the module is enabled
    pub resource_adequacy: Option<ResourceAdequacyData>,
    /// Midterm reliability requirements, if the module is enabled
    pub midterm_reliability: Option<MidtermRequirementMap>,
    /// Carbon prices and emission rates, if the module is enabled
    pub emissions: Option<EmissionsData>,
    /// Projects in each load zone
    pub projects_by_zone: IndexMap<ZoneID, Vec<ProjectID>>,
}

impl Model {
    /// Build the index of projects by load zone
    pub fn index_projects_by_zone(
        zones: &ZoneMap,
        projects: &ProjectMap,
    ) -> IndexMap<ZoneID, Vec<ProjectID>> {
        let mut by_zone = projects
            .values()
            .map(|project| (project.load_zone.clone(), project.id.clone()))
            .into_group_map();

        zones
            .keys()
            .map(|zone| (zone.clone(), by_zone.remove(zone).unwrap_or_default()))
            .collect()
    }

    /// Whether the given optional module is enabled
    pub fn is_module_enabled(&self, module: OptionalModule) -> bool {
        self.parameters.is_module_enabled(module)
    }

    /// Iterate over storage projects
    pub fn iter_storage_projects(&self) -> impl Iterator<Item = &GenerationProject> {
        self.projects.values().filter(|project| project.is_storage())
    }

    /// Iterate over non-storage projects
    pub fn iter_generator_projects(&self) -> impl Iterator<Item = &GenerationProject> {
        self.projects
            .values()
            .filter(|project| !project.is_storage())
    }

    /// Iterate over the projects in a load zone
    pub fn iter_projects_in_zone(&self, zone: &ZoneID) -> impl Iterator<Item = &GenerationProject> {
        self.projects_by_zone
            .get(zone)
            .into_iter()
            .flatten()
            .map(|id| &self.projects[id])
    }

    /// All build years of a project
    pub fn build_years(&self, project: &ProjectID) -> &[BuildYear] {
        self.build_years.get(project).map_or(&[][..], Vec::as_slice)
    }

    /// The build years of a project which are online in a period
    pub fn online_build_years(
        &self,
        project: &GenerationProject,
        period: &Period,
    ) -> impl Iterator<Item = &BuildYear> {
        let max_age = project.max_age;
        let start = period.start;
        self.build_years(&project.id)
            .iter()
            .filter(move |build| build.is_online_in(start, max_age))
    }

    /// Whether the project has any capacity online in the period
    pub fn is_operational(&self, project: &GenerationProject, period: &Period) -> bool {
        self.online_build_years(project, period).next().is_some()
    }

    /// The periods in which a project has capacity online
    pub fn operational_periods<'a>(
        &'a self,
        project: &'a GenerationProject,
    ) -> impl Iterator<Item = &'a Period> {
        self.timescales
            .periods
            .values()
            .filter(move |period| self.is_operational(project, period))
    }

    /// The capacity factor of a project in a timepoint, if one was given
    pub fn capacity_factor(
        &self,
        project: &ProjectID,
        timepoint: &TimepointID,
    ) -> Option<&CapacityFactor> {
        self.capacity_factors
            .get(&(project.clone(), timepoint.clone()))
    }

    /// The nodal price at a pricing node in a timepoint, if nodal prices were given
    pub fn nodal_price(
        &self,
        node: &PricingNodeID,
        timepoint: &TimepointID,
    ) -> Option<MoneyPerEnergy> {
        self.nodal_prices
            .as_ref()?
            .get(&(node.clone(), timepoint.clone()))
            .copied()
    }

    /// The nodal price at a load zone in a timepoint, if nodal prices were given
    pub fn zone_price(&self, zone: &ZoneID, timepoint: &TimepointID) -> Option<MoneyPerEnergy> {
        self.nodal_price(&PricingNodeID::new(&zone.0), timepoint)
    }

    /// The renewable target for a period (zero if none was given)
    pub fn renewable_target(&self, period: PeriodID) -> f64 {
        self.renewable_targets.get(&period).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use rstest::rstest;

    #[rstest]
    fn test_index_projects_by_zone(model: Model) {
        let in_zone: Vec<_> = model
            .iter_projects_in_zone(&"zone1".into())
            .map(|project| project.id.clone())
            .collect();
        assert_eq!(in_zone, [ProjectID::new("gen1"), ProjectID::new("battery")]);
        assert_eq!(model.iter_projects_in_zone(&"zone9".into()).count(), 0);
    }

    #[rstest]
    fn test_operational_periods(model: Model) {
        let gen1 = &model.projects["gen1"];
        let periods: Vec<_> = model.operational_periods(gen1).map(|p| p.id).collect();
        assert_eq!(periods, [2025]);
        assert_eq!(model.iter_storage_projects().count(), 1);
        assert_eq!(model.iter_generator_projects().count(), 1);
    }

    #[rstest]
    fn test_renewable_target_default(model: Model) {
        assert_eq!(model.renewable_target(2025), 0.0);
    }
}

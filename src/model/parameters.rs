//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::input::{check_fraction, check_non_negative, input_err_msg, read_toml};
use crate::units::{Capacity, MoneyPerEnergy};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_capacity_limit, Capacity, 1000.0);
define_unit_param_default!(default_hedge_premium_cost, MoneyPerEnergy, 1.0);
define_param_default!(default_solar_degradation_rate, f64, 0.005);
define_param_default!(default_storage_big_m, f64, 2000.0);
define_param_default!(default_retry_with_relaxed_tolerances, bool, true);
define_param_default!(default_alternate_optima_tolerance, f64, 1e-6);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// Optional modules to add to the formulation
    #[serde(default)]
    pub modules: Vec<OptionalModule>,
    /// Whether the renewable target is enforced hour by hour or over the year
    #[serde(default)]
    pub renewable_goal_type: RenewableGoalType,
    /// How excess generation is limited (if at all)
    #[serde(default)]
    pub excess_generation_limit_type: ExcessGenerationLimitType,
    /// How simultaneous charging and discharging of storage is prevented
    #[serde(default)]
    pub storage_exclusivity: StorageExclusivity,
    /// The big-M constant used with binary storage exclusivity
    #[serde(default = "default_storage_big_m")]
    pub storage_big_m: f64,
    /// How mutually exclusive project variants are selected
    #[serde(default)]
    pub select_variants: VariantSelection,
    /// Whether RECs from excess generation can be resold
    #[serde(default)]
    pub sell_excess_recs: bool,
    /// Whether excess RA capacity can be resold
    #[serde(default)]
    pub sell_excess_ra: bool,
    /// Capacity limit for projects which don't specify one
    #[serde(default = "default_capacity_limit")]
    pub default_capacity_limit: Capacity,
    /// Hedge premium paid for system power where none is given in the input data
    #[serde(default = "default_hedge_premium_cost")]
    pub default_hedge_premium_cost: MoneyPerEnergy,
    /// Fraction of solar output lost per year of age
    #[serde(default = "default_solar_degradation_rate")]
    pub solar_degradation_rate: f64,
    /// Maximum time the solver may take, in seconds
    #[serde(default)]
    pub solver_time_limit: Option<f64>,
    /// Relative optimality gap for MIP solves
    #[serde(default)]
    pub mip_rel_gap: Option<f64>,
    /// Whether to solve again with looser tolerances if the solver fails
    #[serde(default = "default_retry_with_relaxed_tolerances")]
    pub retry_with_relaxed_tolerances: bool,
    /// Reduced cost below which an unbuilt project is reported as an alternate optimum
    #[serde(default = "default_alternate_optima_tolerance")]
    pub alternate_optima_tolerance: f64,
}

/// An optional part of the formulation, enabled by listing it in `modules`
#[derive(
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
)]
pub enum OptionalModule {
    /// Storage projects
    #[string = "storage"]
    Storage,
    /// System and flexible resource adequacy
    #[string = "resource_adequacy"]
    ResourceAdequacy,
    /// Midterm reliability procurement requirements
    #[string = "midterm_reliability"]
    MidtermReliability,
    /// Limits and penalties on excess generation
    #[string = "excess_generation"]
    ExcessGeneration,
    /// Emissions accounting and internal carbon price
    #[string = "emissions"]
    Emissions,
    /// Nodal revenues and load settlement costs
    #[string = "wholesale_pricing"]
    WholesalePricing,
}

/// How the renewable target is enforced
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Default, Clone, Copy)]
pub enum RenewableGoalType {
    /// Limit system power over the period for each zone
    #[default]
    #[string = "hourly"]
    Hourly,
    /// Require net generation to cover a share of total demand
    #[string = "annual"]
    Annual,
}

/// The kind of limit put on excess generation
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Default, Clone, Copy)]
pub enum ExcessGenerationLimitType {
    #[default]
    #[string = "none"]
    None,
    #[string = "annual"]
    Annual,
    #[string = "hourly"]
    Hourly,
}

/// How storage is stopped from charging and discharging at once
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Default, Clone, Copy)]
pub enum StorageExclusivity {
    /// Charge plus discharge may not exceed power capacity
    #[default]
    #[string = "convex"]
    Convex,
    /// A binary variable selects charging or discharging
    #[string = "binary"]
    Binary,
}

/// How variant indicators are represented
#[derive(DeserializeLabeledStringEnum, Debug, PartialEq, Default, Clone, Copy)]
pub enum VariantSelection {
    /// Variant groups are ignored
    #[default]
    #[string = "none"]
    None,
    /// Indicators are continuous in [0, 1]
    #[string = "relaxed"]
    Relaxed,
    /// Indicators are binary
    #[string = "binary"]
    Binary,
}

/// Check that a limit on the capacity of projects is valid
fn check_capacity_limit(value: Capacity) -> Result<()> {
    ensure!(
        value.is_finite() && value > Capacity(0.0),
        "default_capacity_limit must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `storage_big_m` parameter is valid
fn check_storage_big_m(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "storage_big_m must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that the `solver_time_limit` parameter is valid
fn check_solver_time_limit(value: Option<f64>) -> Result<()> {
    if let Some(value) = value {
        ensure!(
            value > 0.0,
            "solver_time_limit must be greater than zero"
        );
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Whether the given optional module is enabled
    pub fn is_module_enabled(&self, module: OptionalModule) -> bool {
        self.modules.contains(&module)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        // modules
        for (i, module) in self.modules.iter().enumerate() {
            ensure!(
                !self.modules[..i].contains(module),
                "Module {module:?} listed more than once"
            );
        }
        ensure!(
            !self.is_module_enabled(OptionalModule::MidtermReliability)
                || self.is_module_enabled(OptionalModule::ResourceAdequacy),
            "The midterm_reliability module requires the resource_adequacy module"
        );

        check_capacity_limit(self.default_capacity_limit)?;
        check_non_negative(
            self.default_hedge_premium_cost.value(),
            "default_hedge_premium_cost",
        )?;
        check_fraction(self.solar_degradation_rate, "solar_degradation_rate")?;
        check_storage_big_m(self.storage_big_m)?;
        check_solver_time_limit(self.solver_time_limit)?;
        if let Some(gap) = self.mip_rel_gap {
            check_non_negative(gap, "mip_rel_gap")?;
        }
        check_non_negative(self.alternate_optima_tolerance, "alternate_optima_tolerance")?;

        Ok(())
    }
}

#[cfg(test)]
impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            renewable_goal_type: RenewableGoalType::default(),
            excess_generation_limit_type: ExcessGenerationLimitType::default(),
            storage_exclusivity: StorageExclusivity::default(),
            storage_big_m: default_storage_big_m(),
            select_variants: VariantSelection::default(),
            sell_excess_recs: false,
            sell_excess_ra: false,
            default_capacity_limit: default_capacity_limit(),
            default_hedge_premium_cost: default_hedge_premium_cost(),
            solar_degradation_rate: default_solar_degradation_rate(),
            solver_time_limit: None,
            mip_rel_gap: None,
            retry_with_relaxed_tolerances: default_retry_with_relaxed_tolerances(),
            alternate_optima_tolerance: default_alternate_optima_tolerance(),
        }
    }
}

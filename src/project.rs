//! Generation and storage projects, their classes and build years.
use crate::id::define_id_type;
use crate::timescale::{PeriodID, TimepointID};
use crate::units::{Capacity, EmissionsPerEnergy, Energy, MoneyPerCapacity, MoneyPerEnergy};
use crate::zone::ZoneID;
use indexmap::IndexMap;
use unicase::UniCase;

define_id_type! {ProjectID}
define_id_type! {EnergySourceID}
define_id_type! {PricingNodeID}
define_id_type! {VariantGroupID}
define_id_type! {CambiumRegionID}

/// The technology name which is subject to age-related degradation
const SOLAR_TECHNOLOGY: &str = "Solar_PV";

/// A map of projects, keyed by project ID
pub type ProjectMap = IndexMap<ProjectID, GenerationProject>;

/// A map of the build years for each project
pub type BuildYearMap = IndexMap<ProjectID, Vec<BuildYear>>;

/// A map of capacity factors, keyed by project and timepoint
pub type CapacityFactorMap = IndexMap<(ProjectID, TimepointID), CapacityFactor>;

/// Operating parameters of a storage project
#[derive(Debug, Clone, PartialEq)]
pub struct StorageParameters {
    /// Fraction of energy recovered over a full charge/discharge cycle
    pub roundtrip_efficiency: f64,
    /// Maximum charging power as a multiple of discharging power
    pub charge_to_discharge_ratio: f64,
    /// If set, energy capacity is fixed to this many hours of power capacity
    pub energy_to_power_ratio: Option<f64>,
    /// If set, the number of full discharge cycles allowed per year
    pub max_annual_cycles: Option<f64>,
    /// Fraction of stored energy lost in each timepoint
    pub leakage_loss: f64,
}

impl StorageParameters {
    /// The efficiency of charging (or discharging) alone
    pub fn one_way_efficiency(&self) -> f64 {
        self.roundtrip_efficiency.sqrt()
    }
}

/// The class of a project, which determines how it is dispatched
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorClass {
    /// Output follows a capacity factor profile and may be curtailed
    Variable,
    /// Output is fixed to a capacity factor profile
    Baseload,
    /// Output is freely chosen up to available capacity
    Dispatchable,
    /// Energy storage
    Storage(StorageParameters),
}

/// How dispatch relates to its upper limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchRule {
    /// Dispatch equals the limit
    Fixed,
    /// Dispatch plus curtailment is at most the limit
    Curtailable,
    /// Dispatch is at most the limit
    Bounded,
}

impl GeneratorClass {
    /// Whether the class requires a capacity factor for every operating timepoint
    pub fn needs_capacity_factor(&self) -> bool {
        matches!(self, Self::Variable | Self::Baseload)
    }

    /// How dispatch is constrained, or `None` for storage
    pub fn dispatch_rule(&self) -> Option<DispatchRule> {
        match self {
            Self::Variable => Some(DispatchRule::Curtailable),
            Self::Baseload => Some(DispatchRule::Fixed),
            Self::Dispatchable => Some(DispatchRule::Bounded),
            Self::Storage(_) => None,
        }
    }

    /// Whether headroom below the dispatch limit counts as excess generation
    pub fn tracks_excess(&self) -> bool {
        matches!(self, Self::Variable | Self::Baseload)
    }

    /// The fraction of built capacity which may be dispatched.
    ///
    /// Classes without a capacity factor use a factor of 1.
    pub fn dispatch_upper_limit(&self, availability: f64, capacity_factor: Option<f64>) -> f64 {
        if self.needs_capacity_factor() {
            availability * capacity_factor.unwrap_or(0.0)
        } else {
            availability
        }
    }
}

/// How a project takes part in a hybrid (co-located generator and storage) pair
#[derive(Debug, Clone, PartialEq)]
pub enum HybridPairing {
    /// The storage half of the pair
    Storage {
        generator: ProjectID,
        /// Minimum storage build relative to the generator's build in the same year
        min_capacity_ratio: f64,
        /// Maximum storage build relative to the generator's build in the same year
        max_capacity_ratio: Option<f64>,
    },
    /// The generator half of the pair
    Generator { storage: ProjectID },
}

impl HybridPairing {
    /// The midpoint of the allowed storage/generator capacity ratios (storage half only)
    pub fn mean_capacity_ratio(&self) -> Option<f64> {
        match self {
            Self::Storage {
                min_capacity_ratio,
                max_capacity_ratio,
                ..
            } => {
                let max_capacity_ratio = max_capacity_ratio.unwrap_or(*min_capacity_ratio);
                Some((min_capacity_ratio + max_capacity_ratio) / 2.0)
            }
            Self::Generator { .. } => None,
        }
    }
}

/// Carbon capture equipment fitted to a project
#[derive(Debug, Clone, PartialEq)]
pub struct CarbonCapture {
    /// Fraction of emissions captured
    pub capture_efficiency: f64,
    /// Parasitic load per unit of dispatch
    pub energy_load: f64,
}

/// A candidate or existing generation or storage project
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProject {
    pub id: ProjectID,
    pub load_zone: ZoneID,
    /// Technology name
    pub technology: String,
    pub energy_source: EnergySourceID,
    /// Node at whose price the project is settled
    pub pricing_node: PricingNodeID,
    pub class: GeneratorClass,
    pub hybrid: Option<HybridPairing>,
    /// Maximum total installed capacity
    pub capacity_limit: Capacity,
    /// If positive, new builds must be zero or at least this large
    pub min_build_capacity: Capacity,
    /// If set, new builds must be whole multiples of this size
    pub unit_size: Option<Capacity>,
    /// Years a build remains online
    pub max_age: u32,
    pub forced_outage_rate: f64,
    pub scheduled_outage_rate: f64,
    /// The year of commercial operation
    pub cod_year: Option<u32>,
    pub ppa_energy_cost: MoneyPerEnergy,
    pub ppa_capacity_cost: MoneyPerCapacity,
    pub is_ra_eligible: bool,
    pub variant_group: Option<VariantGroupID>,
    pub emission_factor: EmissionsPerEnergy,
    /// Whether the project's avoided emissions are counted
    pub is_additional: bool,
    /// Region of the marginal emission rates used for avoided emissions
    pub cambium_region: Option<CambiumRegionID>,
    pub carbon_capture: Option<CarbonCapture>,
}

impl GenerationProject {
    /// Storage parameters if this is a storage project
    pub fn storage(&self) -> Option<&StorageParameters> {
        match &self.class {
            GeneratorClass::Storage(params) => Some(params),
            _ => None,
        }
    }

    /// Whether this is a storage project
    pub fn is_storage(&self) -> bool {
        self.storage().is_some()
    }

    /// The fraction of capacity available in a period starting in `period_start`
    pub fn availability(&self, period_start: u32, solar_degradation_rate: f64) -> f64 {
        let forced = 1.0 - self.forced_outage_rate;
        if self.class == GeneratorClass::Baseload {
            return forced * (1.0 - self.scheduled_outage_rate);
        }

        if UniCase::new(self.technology.as_str()) == UniCase::new(SOLAR_TECHNOLOGY) {
            let age = self
                .cod_year
                .map_or(0, |cod_year| period_start.saturating_sub(cod_year));
            let remaining = 1.0 - solar_degradation_rate * f64::from(age);
            return (forced * remaining).max(0.0);
        }

        forced
    }

    /// The project's own storage/generator capacity ratio, for the storage half of a hybrid
    pub fn hybrid_capacity_ratio(&self) -> Option<f64> {
        self.hybrid.as_ref().and_then(HybridPairing::mean_capacity_ratio)
    }
}

/// Whether a build year's capacity is fixed or chosen by the model
#[derive(Debug, Clone, PartialEq)]
pub enum BuildKind {
    /// Capacity that already exists or has been contracted
    Predetermined {
        capacity: Capacity,
        energy_capacity: Option<Energy>,
    },
    /// Capacity chosen by the optimisation, one per period
    Optimisable { period: PeriodID },
}

/// One vintage of a project
#[derive(Debug, Clone, PartialEq)]
pub struct BuildYear {
    /// Year label (a period label for optimisable builds)
    pub year: u32,
    pub kind: BuildKind,
    /// The first year in which the build is online
    pub online_year: u32,
}

impl BuildYear {
    /// Whether the build is online in a period starting in `period_start`
    pub fn is_online_in(&self, period_start: u32, max_age: u32) -> bool {
        self.online_year <= period_start && period_start < self.online_year + max_age
    }

    /// Whether the capacity of this build is a decision of the model
    pub fn is_optimisable(&self) -> bool {
        matches!(self.kind, BuildKind::Optimisable { .. })
    }

    /// Predetermined capacity (zero for optimisable builds)
    pub fn predetermined_capacity(&self) -> Capacity {
        match self.kind {
            BuildKind::Predetermined { capacity, .. } => capacity,
            BuildKind::Optimisable { .. } => Capacity(0.0),
        }
    }
}

/// Capacity factors for a variable or baseload project in one timepoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityFactor {
    pub value: f64,
    /// Cap on economic curtailment as a fraction of capacity (variable projects only)
    pub curtailment: Option<f64>,
}

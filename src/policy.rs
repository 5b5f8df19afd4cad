//! Policy and market data: targets, prices, resource adequacy requirements and emissions.
use crate::project::{CambiumRegionID, EnergySourceID, PricingNodeID};
use crate::timescale::{PeriodID, TimepointID};
use crate::units::{Capacity, MoneyPerCapacity, MoneyPerEmissions, MoneyPerEnergy};
use crate::zone::ZoneID;
use indexmap::IndexMap;

/// Hedge premium paid for system power in each zone and timepoint
pub type HedgePremiumCostMap = IndexMap<(ZoneID, TimepointID), MoneyPerEnergy>;

/// The renewable target for each period, as a fraction of demand
pub type RenewableTargetMap = IndexMap<PeriodID, f64>;

/// The resale value of RECs from excess generation in each period
pub type RecValueMap = IndexMap<PeriodID, MoneyPerEnergy>;

/// Wholesale prices for each pricing node and timepoint
pub type NodalPriceMap = IndexMap<(PricingNodeID, TimepointID), MoneyPerEnergy>;

/// Marginal emission rates for each region and timepoint, in tonnes/MWh
pub type EmissionRateMap = IndexMap<(CambiumRegionID, TimepointID), f64>;

/// The limit and penalty on excess generation in a period
#[derive(Debug, Clone, PartialEq)]
pub struct ExcessGenerationLimit {
    /// Allowed excess as a fraction of demand
    pub limit: Option<f64>,
    /// Cost for each unit of excess generation
    pub penalty: MoneyPerEnergy,
}

/// Limits on excess generation for each period
pub type ExcessGenerationLimitMap = IndexMap<PeriodID, ExcessGenerationLimit>;

/// A monthly capacity requirement with its market prices
#[derive(Debug, Clone, PartialEq)]
pub struct RaRequirement {
    pub requirement: Capacity,
    /// Cost of buying capacity to cover an open position
    pub cost: MoneyPerCapacity,
    /// Value of reselling excess capacity
    pub resell_value: MoneyPerCapacity,
}

/// How much of a resource's capacity counts towards RA
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaCapacityValue {
    /// Effective load-carrying capability
    pub elcc: f64,
    /// Share of nameplate output produced in peak hours
    pub production_factor: f64,
}

/// Resource adequacy requirements and capacity values
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAdequacyData {
    /// System RA requirement for each (period, month)
    pub requirements: IndexMap<(PeriodID, u32), RaRequirement>,
    /// Flexible RA requirement for each (period, month)
    pub flexible_requirements: IndexMap<(PeriodID, u32), RaRequirement>,
    /// Capacity values for each (period, energy source, month)
    pub capacity_values: IndexMap<(PeriodID, EnergySourceID, u32), RaCapacityValue>,
}

impl ResourceAdequacyData {
    /// The months with a requirement, in order
    pub fn months(&self) -> Vec<u32> {
        let mut months: Vec<u32> = self.requirements.keys().map(|(_, month)| *month).collect();
        months.sort_unstable();
        months.dedup();
        months
    }
}

/// Midterm reliability procurement requirements for a period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidtermRequirement {
    /// Capacity required from new firm resources
    pub firm: Capacity,
    /// Capacity required from long-duration storage
    pub long_duration_storage: Capacity,
}

/// Midterm reliability requirements for each period
pub type MidtermRequirementMap = IndexMap<PeriodID, MidtermRequirement>;

/// Carbon prices and marginal emission rates
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionsData {
    pub carbon_prices: IndexMap<PeriodID, MoneyPerEmissions>,
    pub emission_rates: EmissionRateMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_months() {
        let requirement = RaRequirement {
            requirement: Capacity(1.0),
            cost: MoneyPerCapacity(1.0),
            resell_value: MoneyPerCapacity(0.0),
        };
        let data = ResourceAdequacyData {
            requirements: [
                ((2025, 8), requirement.clone()),
                ((2025, 1), requirement.clone()),
                ((2030, 8), requirement),
            ]
            .into_iter()
            .collect(),
            flexible_requirements: IndexMap::new(),
            capacity_values: IndexMap::new(),
        };
        assert_eq!(data.months(), [1, 8]);
    }
}

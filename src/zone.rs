//! Load zones and their demand.
use crate::id::define_id_type;
use crate::timescale::{PeriodID, TimepointID, Timescales};
use crate::units::{Capacity, Energy};
use indexmap::IndexMap;

define_id_type! {ZoneID}

/// A load zone with hourly demand
#[derive(Debug, Clone, PartialEq)]
pub struct LoadZone {
    pub id: ZoneID,
    /// Demand in each timepoint
    pub demand: IndexMap<TimepointID, Capacity>,
}

/// A map of load zones, keyed by zone ID
pub type ZoneMap = IndexMap<ZoneID, LoadZone>;

impl LoadZone {
    /// Demand in the given timepoint (zero if none was given)
    pub fn demand_in(&self, timepoint: &TimepointID) -> Capacity {
        self.demand.get(timepoint).copied().unwrap_or_default()
    }

    /// Total demand over a period, weighting each timepoint by the hours it represents
    pub fn demand_in_period(&self, period: PeriodID, timescales: &Timescales) -> Energy {
        timescales
            .iter_period_timepoints(period)
            .map(|tp| self.demand_in(&tp.id) * tp.weight)
            .sum()
    }
}

/// Total demand over all zones in a period
pub fn total_demand_in_period(
    zones: &ZoneMap,
    period: PeriodID,
    timescales: &Timescales,
) -> Energy {
    zones
        .values()
        .map(|zone| zone.demand_in_period(period, timescales))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{timescales, zones};
    use rstest::rstest;

    #[rstest]
    fn test_demand_in_period(zones: ZoneMap, timescales: Timescales) {
        let zone = &zones["zone1"];
        assert_eq!(zone.demand_in_period(2025, &timescales), Energy(200.0));
        assert_eq!(zone.demand_in_period(2030, &timescales), Energy(0.0));
        assert_eq!(total_demand_in_period(&zones, 2025, &timescales), Energy(200.0));
    }
}

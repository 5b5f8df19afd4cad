//! Periods, timeseries and timepoints: the time structure of the model.
//!
//! Each period is represented by one sampled year, made up of one or more timeseries of
//! consecutive timepoints. Timepoints carry weights that scale their values up to the whole period.
use crate::finance::annual_costs_to_base_year;
use crate::id::define_id_type;
use crate::units::{Dimensionless, Hours};
use anyhow::{Context, Result};
use indexmap::IndexMap;

define_id_type! {TimepointID}
define_id_type! {TimeseriesID}

/// The label of a period (conventionally its first year)
pub type PeriodID = u32;

/// Financial parameters shared by the whole model
#[derive(Debug, Clone, PartialEq)]
pub struct Financials {
    /// The year to which all costs are discounted
    pub base_financial_year: u32,
    /// The year whose dollars all costs are expressed in
    pub dollar_year: u32,
    /// Real discount rate
    pub discount_rate: Dimensionless,
}

/// A multi-year investment period
#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    /// Label of the period
    pub id: PeriodID,
    /// First year of the period
    pub start: u32,
    /// Last year of the period (inclusive)
    pub end: u32,
    /// Factor bringing an annual cost in each year of the period back to the base year
    pub discount_weight: Dimensionless,
    /// Timepoints sampled for this period, in order
    pub timepoints: Vec<TimepointID>,
}

impl Period {
    /// Create a new period, calculating its discount weight
    pub fn new(id: PeriodID, start: u32, end: u32, financials: &Financials) -> Self {
        let length = f64::from(end - start + 1);
        let years_after_base = f64::from(start) - f64::from(financials.base_financial_year);
        Self {
            id,
            start,
            end,
            discount_weight: annual_costs_to_base_year(
                financials.discount_rate,
                length,
                years_after_base,
            ),
            timepoints: Vec::new(),
        }
    }

    /// Number of years in the period
    pub fn length_years(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// A run of consecutive timepoints within one period
#[derive(Debug, Clone, PartialEq)]
pub struct Timeseries {
    pub id: TimeseriesID,
    pub period: PeriodID,
    /// Duration of each timepoint
    pub duration_of_tp: Hours,
    /// Number of timepoints in the timeseries
    pub num_tps: u32,
    /// How many times this timeseries occurs in the period
    pub scale_to_period: f64,
    /// Member timepoints, in order
    pub timepoints: Vec<TimepointID>,
}

/// A single timepoint (normally one hour)
#[derive(Debug, Clone, PartialEq)]
pub struct Timepoint {
    pub id: TimepointID,
    /// Human-readable date and time
    pub timestamp: String,
    pub timeseries: TimeseriesID,
    pub period: PeriodID,
    /// Length of the timepoint
    pub duration: Hours,
    /// Number of hours in the whole period this timepoint stands for
    pub weight: Hours,
    /// Number of hours in a year of the period this timepoint stands for
    pub weight_in_year: Hours,
    /// The timepoint before this one in its timeseries, wrapping around at the start
    pub previous: TimepointID,
}

/// All time-related sets for a model
#[derive(Debug, Clone, PartialEq)]
pub struct Timescales {
    pub financials: Financials,
    pub periods: IndexMap<PeriodID, Period>,
    pub timeseries: IndexMap<TimeseriesID, Timeseries>,
    pub timepoints: IndexMap<TimepointID, Timepoint>,
}

impl Timescales {
    /// Get the period with the given label
    pub fn period(&self, id: PeriodID) -> Result<&Period> {
        self.periods
            .get(&id)
            .with_context(|| format!("Unknown period {id}"))
    }

    /// Get the period a timepoint belongs to.
    ///
    /// # Panics
    ///
    /// If the timepoint's period is not part of this set of timescales.
    pub fn period_of(&self, timepoint: &Timepoint) -> &Period {
        &self.periods[&timepoint.period]
    }

    /// Iterate over the timepoints in a period
    pub fn iter_period_timepoints(&self, period: PeriodID) -> impl Iterator<Item = &Timepoint> {
        self.periods
            .get(&period)
            .into_iter()
            .flat_map(|period| period.timepoints.iter())
            .map(|id| &self.timepoints[id])
    }

    /// The period that is active in a given year, if any
    pub fn period_for_year(&self, year: u32) -> Option<&Period> {
        self.periods
            .values()
            .find(|period| (period.start..=period.end).contains(&year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::timescales;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_period_new() {
        let financials = Financials {
            base_financial_year: 2020,
            dollar_year: 2020,
            discount_rate: Dimensionless(0.1),
        };
        let period = Period::new(2022, 2022, 2023, &financials);
        assert_eq!(period.length_years(), 2);
        assert_approx_eq!(
            f64,
            period.discount_weight.value(),
            (1.0 / 1.1 + 1.0 / 1.21) / 1.21,
            epsilon = 1e-12
        );
    }

    #[rstest]
    fn test_iter_period_timepoints(timescales: Timescales) {
        let ids: Vec<_> = timescales
            .iter_period_timepoints(2025)
            .map(|tp| tp.id.clone())
            .collect();
        assert_eq!(ids, [TimepointID::new("tp1"), TimepointID::new("tp2")]);
        assert_eq!(timescales.iter_period_timepoints(1999).count(), 0);
    }

    #[rstest]
    fn test_period_for_year(timescales: Timescales) {
        assert_eq!(timescales.period_for_year(2025).map(|p| p.id), Some(2025));
        assert!(timescales.period_for_year(2030).is_none());
    }
}

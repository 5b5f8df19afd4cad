//! Code for reading financial parameters, periods, timeseries and timepoints.
use super::{check_non_negative, input_err_msg, read_csv};
use crate::id::IDCollection;
use crate::timescale::{
    Financials, Period, PeriodID, Timepoint, TimepointID, Timescales, Timeseries, TimeseriesID,
};
use crate::units::{Dimensionless, Hours};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const FINANCIALS_FILE_NAME: &str = "financials.csv";
const PERIODS_FILE_NAME: &str = "periods.csv";
const TIMESERIES_FILE_NAME: &str = "timeseries.csv";
const TIMEPOINTS_FILE_NAME: &str = "timepoints.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct FinancialsRaw {
    base_financial_year: u32,
    dollar_year: u32,
    discount_rate: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct PeriodRaw {
    period: PeriodID,
    period_start: u32,
    period_end: u32,
}

#[derive(Debug, Deserialize, PartialEq)]
struct TimeseriesRaw {
    timeseries: String,
    period: PeriodID,
    duration_of_tp: f64,
    num_tps: u32,
    scale_to_period: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct TimepointRaw {
    timepoint: String,
    timestamp: String,
    timeseries: String,
}

/// Read the financial parameters from `financials.csv`, which must contain exactly one row
pub fn read_financials(model_dir: &Path) -> Result<Financials> {
    let file_path = model_dir.join(FINANCIALS_FILE_NAME);
    let rows: Vec<FinancialsRaw> = read_csv(&file_path)?.collect();
    read_financials_from_rows(rows).with_context(|| input_err_msg(&file_path))
}

fn read_financials_from_rows(rows: Vec<FinancialsRaw>) -> Result<Financials> {
    ensure!(rows.len() == 1, "Expected exactly one row of financial parameters");
    let raw = rows.into_iter().next().context("No financial parameters")?;
    ensure!(
        raw.discount_rate.is_finite() && raw.discount_rate > -1.0,
        "discount_rate must be a finite number greater than -1"
    );

    Ok(Financials {
        base_financial_year: raw.base_financial_year,
        dollar_year: raw.dollar_year,
        discount_rate: Dimensionless(raw.discount_rate),
    })
}

/// Read periods, timeseries and timepoints from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `financials` - Financial parameters, used to calculate discount weights
pub fn read_timescales(model_dir: &Path, financials: &Financials) -> Result<Timescales> {
    let file_path = model_dir.join(PERIODS_FILE_NAME);
    let periods = read_periods_from_iter(read_csv(&file_path)?, financials)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(TIMESERIES_FILE_NAME);
    let timeseries = read_timeseries_from_iter(read_csv(&file_path)?, &periods)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(TIMEPOINTS_FILE_NAME);
    read_timepoints_from_iter(read_csv(&file_path)?, financials.clone(), periods, timeseries)
        .with_context(|| input_err_msg(&file_path))
}

fn read_periods_from_iter<I>(iter: I, financials: &Financials) -> Result<IndexMap<PeriodID, Period>>
where
    I: Iterator<Item = PeriodRaw>,
{
    let mut periods: IndexMap<PeriodID, Period> = IndexMap::new();
    for raw in iter {
        ensure!(
            raw.period_end >= raw.period_start,
            "Period {} ends before it starts",
            raw.period
        );
        if let Some(last) = periods.values().last() {
            ensure!(
                raw.period_start > last.end,
                "Periods must be in increasing order and must not overlap (period {})",
                raw.period
            );
        }
        ensure!(
            !periods.contains_key(&raw.period),
            "Duplicate period {}",
            raw.period
        );

        let period = Period::new(raw.period, raw.period_start, raw.period_end, financials);
        periods.insert(raw.period, period);
    }

    Ok(periods)
}

fn read_timeseries_from_iter<I>(
    iter: I,
    periods: &IndexMap<PeriodID, Period>,
) -> Result<IndexMap<TimeseriesID, Timeseries>>
where
    I: Iterator<Item = TimeseriesRaw>,
{
    let mut timeseries = IndexMap::new();
    for raw in iter {
        ensure!(
            periods.contains_key(&raw.period),
            "Timeseries {} refers to unknown period {}",
            raw.timeseries,
            raw.period
        );
        ensure!(
            raw.duration_of_tp.is_finite() && raw.duration_of_tp > 0.0,
            "duration_of_tp for timeseries {} must be greater than zero",
            raw.timeseries
        );
        ensure!(
            raw.num_tps > 0,
            "Timeseries {} must have at least one timepoint",
            raw.timeseries
        );
        check_non_negative(raw.scale_to_period, "scale_to_period")?;

        let id = TimeseriesID::from(raw.timeseries);
        let ts = Timeseries {
            id: id.clone(),
            period: raw.period,
            duration_of_tp: Hours(raw.duration_of_tp),
            num_tps: raw.num_tps,
            scale_to_period: raw.scale_to_period,
            timepoints: Vec::new(),
        };
        super::try_insert(&mut timeseries, id, ts)?;
    }

    Ok(timeseries)
}

fn read_timepoints_from_iter<I>(
    iter: I,
    financials: Financials,
    mut periods: IndexMap<PeriodID, Period>,
    mut timeseries: IndexMap<TimeseriesID, Timeseries>,
) -> Result<Timescales>
where
    I: Iterator<Item = TimepointRaw>,
{
    // Gather the timepoints of each timeseries in file order
    let mut raw_timepoints = IndexMap::new();
    for raw in iter {
        let ts_id = timeseries.get_id(&raw.timeseries)?;
        let id = TimepointID::from(raw.timepoint);
        timeseries[&ts_id].timepoints.push(id.clone());
        super::try_insert(&mut raw_timepoints, id, (raw.timestamp, ts_id))?;
    }

    for ts in timeseries.values() {
        ensure!(
            ts.timepoints.len() == ts.num_tps as usize,
            "Timeseries {} should have {} timepoints, but {} were given",
            ts.id,
            ts.num_tps,
            ts.timepoints.len()
        );
    }

    let mut timepoints = IndexMap::new();
    for (id, (timestamp, ts_id)) in raw_timepoints {
        let ts = &timeseries[&ts_id];
        let period = &mut periods[&ts.period];
        let length = f64::from(period.length_years());
        let index = ts
            .timepoints
            .iter()
            .position(|other| *other == id)
            .context("Timepoint missing from its timeseries")?;
        let previous = if index == 0 {
            ts.timepoints.last()
        } else {
            ts.timepoints.get(index - 1)
        }
        .context("Timepoint missing from its timeseries")?
        .clone();

        let weight = ts.duration_of_tp * Dimensionless(ts.scale_to_period);
        period.timepoints.push(id.clone());
        timepoints.insert(
            id.clone(),
            Timepoint {
                id,
                timestamp,
                timeseries: ts_id.clone(),
                period: ts.period,
                duration: ts.duration_of_tp,
                weight,
                weight_in_year: weight / Dimensionless(length),
                previous,
            },
        );
    }

    for period in periods.values() {
        ensure!(
            !period.timepoints.is_empty(),
            "Period {} has no timepoints",
            period.id
        );
    }

    Ok(Timescales {
        financials,
        periods,
        timeseries,
        timepoints,
    })
}

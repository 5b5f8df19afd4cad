//! Code for reading renewable targets, hedge premiums, REC values and excess generation limits.
use super::{
    check_fraction, check_non_negative, deserialise_optional, input_err_msg, read_csv,
    read_csv_optional,
};
use crate::id::IDCollection;
use crate::model::{ExcessGenerationLimitType, ModelParameters};
use crate::policy::{
    ExcessGenerationLimit, ExcessGenerationLimitMap, HedgePremiumCostMap, RecValueMap,
    RenewableTargetMap,
};
use crate::timescale::{PeriodID, Timescales};
use crate::units::MoneyPerEnergy;
use crate::zone::ZoneMap;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const HEDGE_PREMIUM_COST_FILE_NAME: &str = "hedge_premium_cost.csv";
const RENEWABLE_TARGET_FILE_NAME: &str = "renewable_target.csv";
const REC_VALUE_FILE_NAME: &str = "rec_value.csv";
const EXCESS_GENERATION_FILE_NAME: &str = "excessgen_limits.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct HedgePremiumCostRaw {
    load_zone: String,
    timepoint: String,
    hedge_premium_cost: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct RenewableTargetRaw {
    period: PeriodID,
    renewable_target: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct RecValueRaw {
    period: PeriodID,
    rec_resale_value: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ExcessGenerationLimitRaw {
    period: PeriodID,
    #[serde(default, deserialize_with = "deserialise_optional")]
    excess_generation_limit: Option<f64>,
    #[serde(default, deserialize_with = "deserialise_optional")]
    excessgen_penalty: Option<f64>,
}

/// Read hedge premium costs for system power.
///
/// Zones and timepoints which are not listed take the model's default hedge premium.
pub fn read_hedge_premium_costs(
    model_dir: &Path,
    zones: &ZoneMap,
    timescales: &Timescales,
    parameters: &ModelParameters,
) -> Result<HedgePremiumCostMap> {
    let file_path = model_dir.join(HEDGE_PREMIUM_COST_FILE_NAME);
    read_hedge_premium_costs_from_iter(
        read_csv_optional(&file_path)?,
        zones,
        timescales,
        parameters.default_hedge_premium_cost,
    )
    .with_context(|| input_err_msg(&file_path))
}

fn read_hedge_premium_costs_from_iter<I>(
    iter: I,
    zones: &ZoneMap,
    timescales: &Timescales,
    default_cost: MoneyPerEnergy,
) -> Result<HedgePremiumCostMap>
where
    I: Iterator<Item = HedgePremiumCostRaw>,
{
    let mut map = HedgePremiumCostMap::new();
    for raw in iter {
        let zone = zones.get_id(&raw.load_zone)?;
        let timepoint = timescales.timepoints.get_id(&raw.timepoint)?;
        ensure!(
            raw.hedge_premium_cost.is_finite(),
            "hedge_premium_cost must be a finite number"
        );
        ensure!(
            map.insert(
                (zone.clone(), timepoint.clone()),
                MoneyPerEnergy(raw.hedge_premium_cost)
            )
            .is_none(),
            "Duplicate hedge premium cost for zone {zone} and timepoint {timepoint}"
        );
    }

    for zone in zones.keys() {
        for timepoint in timescales.timepoints.keys() {
            map.entry((zone.clone(), timepoint.clone()))
                .or_insert(default_cost);
        }
    }

    Ok(map)
}

/// Read the renewable target for each period, which defaults to zero
pub fn read_renewable_targets(
    model_dir: &Path,
    timescales: &Timescales,
) -> Result<RenewableTargetMap> {
    let file_path = model_dir.join(RENEWABLE_TARGET_FILE_NAME);
    read_renewable_targets_from_iter(read_csv_optional(&file_path)?, timescales)
        .with_context(|| input_err_msg(&file_path))
}

fn read_renewable_targets_from_iter<I>(
    iter: I,
    timescales: &Timescales,
) -> Result<RenewableTargetMap>
where
    I: Iterator<Item = RenewableTargetRaw>,
{
    let mut map = RenewableTargetMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        check_fraction(raw.renewable_target, "renewable_target")?;
        ensure!(
            map.insert(raw.period, raw.renewable_target).is_none(),
            "Duplicate renewable target for period {}",
            raw.period
        );
    }

    for period in timescales.periods.keys() {
        map.entry(*period).or_insert(0.0);
    }

    Ok(map)
}

/// Read the REC resale value for each period. Every period must have a value.
pub fn read_rec_values(model_dir: &Path, timescales: &Timescales) -> Result<RecValueMap> {
    let file_path = model_dir.join(REC_VALUE_FILE_NAME);
    read_rec_values_from_iter(read_csv(&file_path)?, timescales)
        .with_context(|| input_err_msg(&file_path))
}

fn read_rec_values_from_iter<I>(iter: I, timescales: &Timescales) -> Result<RecValueMap>
where
    I: Iterator<Item = RecValueRaw>,
{
    let mut map = RecValueMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        check_non_negative(raw.rec_resale_value, "rec_resale_value")?;
        ensure!(
            map.insert(raw.period, MoneyPerEnergy(raw.rec_resale_value))
                .is_none(),
            "Duplicate REC value for period {}",
            raw.period
        );
    }

    for period in timescales.periods.keys() {
        ensure!(map.contains_key(period), "No REC value given for period {period}");
    }

    Ok(map)
}

/// Read limits and penalties on excess generation
pub fn read_excess_generation_limits(
    model_dir: &Path,
    timescales: &Timescales,
    parameters: &ModelParameters,
) -> Result<ExcessGenerationLimitMap> {
    let file_path = model_dir.join(EXCESS_GENERATION_FILE_NAME);
    read_excess_generation_limits_from_iter(
        read_csv(&file_path)?,
        timescales,
        parameters.excess_generation_limit_type,
    )
    .with_context(|| input_err_msg(&file_path))
}

fn read_excess_generation_limits_from_iter<I>(
    iter: I,
    timescales: &Timescales,
    limit_type: ExcessGenerationLimitType,
) -> Result<ExcessGenerationLimitMap>
where
    I: Iterator<Item = ExcessGenerationLimitRaw>,
{
    let mut map = ExcessGenerationLimitMap::new();
    for raw in iter {
        timescales.period(raw.period)?;
        if let Some(limit) = raw.excess_generation_limit {
            check_non_negative(limit, "excess_generation_limit")?;
        }
        let penalty = raw.excessgen_penalty.unwrap_or(0.0);
        check_non_negative(penalty, "excessgen_penalty")?;

        let limit = ExcessGenerationLimit {
            limit: raw.excess_generation_limit,
            penalty: MoneyPerEnergy(penalty),
        };
        ensure!(
            map.insert(raw.period, limit).is_none(),
            "Duplicate excess generation limit for period {}",
            raw.period
        );
    }

    if limit_type != ExcessGenerationLimitType::None {
        for period in timescales.periods.keys() {
            ensure!(
                map.get(period).is_some_and(|limit| limit.limit.is_some()),
                "An excess generation limit is required for period {period} with limit type \
                {limit_type:?}"
            );
        }
    }

    for period in timescales.periods.keys() {
        map.entry(*period).or_insert(ExcessGenerationLimit {
            limit: None,
            penalty: MoneyPerEnergy(0.0),
        });
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{timescales, zones};
    use crate::timescale::TimepointID;
    use crate::zone::ZoneID;
    use rstest::rstest;

    #[rstest]
    fn test_read_hedge_premium_costs(zones: ZoneMap, timescales: Timescales) {
        let raw = HedgePremiumCostRaw {
            load_zone: "zone1".into(),
            timepoint: "tp2".into(),
            hedge_premium_cost: 200.0,
        };
        let map = read_hedge_premium_costs_from_iter(
            [raw].into_iter(),
            &zones,
            &timescales,
            MoneyPerEnergy(1.0),
        )
        .unwrap();
        let key = |tp: &str| (ZoneID::new("zone1"), TimepointID::new(tp));
        assert_eq!(map[&key("tp1")], MoneyPerEnergy(1.0));
        assert_eq!(map[&key("tp2")], MoneyPerEnergy(200.0));
    }

    #[rstest]
    fn test_read_renewable_targets(timescales: Timescales) {
        let map = read_renewable_targets_from_iter(std::iter::empty(), &timescales).unwrap();
        assert_eq!(map[&2025], 0.0);

        let raw = RenewableTargetRaw {
            period: 2025,
            renewable_target: 0.8,
        };
        let map = read_renewable_targets_from_iter([raw].into_iter(), &timescales).unwrap();
        assert_eq!(map[&2025], 0.8);
    }

    #[rstest]
    #[case(2025, 1.5)]
    #[case(2025, -0.1)]
    #[case(2030, 0.5)]
    fn test_read_renewable_targets_invalid(
        timescales: Timescales,
        #[case] period: PeriodID,
        #[case] renewable_target: f64,
    ) {
        let raw = RenewableTargetRaw {
            period,
            renewable_target,
        };
        assert!(read_renewable_targets_from_iter([raw].into_iter(), &timescales).is_err());
    }

    #[rstest]
    fn test_read_rec_values_missing_period(timescales: Timescales) {
        assert!(read_rec_values_from_iter(std::iter::empty(), &timescales).is_err());
    }

    #[rstest]
    fn test_read_excess_generation_limits(timescales: Timescales) {
        let raw = || ExcessGenerationLimitRaw {
            period: 2025,
            excess_generation_limit: None,
            excessgen_penalty: Some(5.0),
        };

        let map = read_excess_generation_limits_from_iter(
            [raw()].into_iter(),
            &timescales,
            ExcessGenerationLimitType::None,
        )
        .unwrap();
        assert_eq!(map[&2025].penalty, MoneyPerEnergy(5.0));

        // A limit value is needed if the limit type is set
        assert!(
            read_excess_generation_limits_from_iter(
                [raw()].into_iter(),
                &timescales,
                ExcessGenerationLimitType::Annual,
            )
            .is_err()
        );
    }
}

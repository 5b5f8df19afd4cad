//! General functions related to finance.
use crate::units::Dimensionless;

/// The present value of a uniform series of payments of 1 at the end of each year.
///
/// Returns the number of years if the discount rate is zero.
pub fn uniform_series_to_present_value(discount_rate: Dimensionless, years: f64) -> Dimensionless {
    let rate = discount_rate.value();
    if rate == 0.0 {
        return Dimensionless(years);
    }

    Dimensionless((1.0 - (1.0 + rate).powf(-years)) / rate)
}

/// The present value of a payment of 1 made `years` years in the future.
///
/// A negative number of years gives a compounded (future) value.
pub fn future_to_present_value(discount_rate: Dimensionless, years: f64) -> Dimensionless {
    Dimensionless((1.0 + discount_rate.value()).powf(-years))
}

/// The factor which brings a uniform annual cost incurred over a period back to the base year.
///
/// # Arguments
///
/// * `discount_rate` - The real discount rate
/// * `period_length` - Length of the period in years
/// * `years_after_base` - Number of years between the base financial year and the period's start
pub fn annual_costs_to_base_year(
    discount_rate: Dimensionless,
    period_length: f64,
    years_after_base: f64,
) -> Dimensionless {
    uniform_series_to_present_value(discount_rate, period_length)
        * future_to_present_value(discount_rate, years_after_base)
}

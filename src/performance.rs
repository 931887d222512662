use chrono::{Days, NaiveDate};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::utils::round_cents;

pub const DEFAULT_DAYS: usize = 10;

/// Largest simulated deviation from the current value, in basis points (5%).
const MAX_VARIATION_BPS: i64 = 500;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub value: Decimal,
}

/// Synthetic daily values ending at `today`, converging on `current_value`.
///
/// The point `i` days back deviates by at most `5% * i / (days - 1)`; today's point is
/// the current value.
pub fn simulate_history<R: Rng>(
    current_value: Decimal,
    days: usize,
    today: NaiveDate,
    rng: &mut R,
) -> Vec<PerformancePoint> {
    if days == 0 {
        return vec![];
    }
    let span = Decimal::from(days.saturating_sub(1).max(1));

    (0..days)
        .rev()
        .filter_map(|days_back| {
            let date = today.checked_sub_days(Days::new(days_back as u64))?;
            let variation = Decimal::new(
                rng.random_range(-MAX_VARIATION_BPS..MAX_VARIATION_BPS),
                4,
            );
            let weight = Decimal::from(days_back) / span;
            Some(PerformancePoint {
                date,
                value: round_cents(current_value * (dec!(1) + variation * weight)),
            })
        })
        .collect()
}

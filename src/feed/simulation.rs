use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::FeedConfig;
use crate::quote::{PriceMap, PriceQuote};

/// Fixed scale of the random step, in decimal places of a percent.
const STEP_SCALE: u32 = 5;

/// Bounded random walk used while no live connection is up.
#[derive(Debug)]
pub struct RandomWalk {
    rng: StdRng,
    /// Step bound in units of 10^-STEP_SCALE percent.
    max_step: i64,
}

impl RandomWalk {
    pub fn new(max_step_percent: Decimal, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let max_step = (max_step_percent.abs() * Decimal::from(10_i64.pow(STEP_SCALE)))
            .trunc()
            .to_i64()
            .unwrap_or(0);
        Self { rng, max_step }
    }

    /// Next price, within `max_step_percent` of `current`.
    pub fn step(&mut self, current: Decimal) -> Decimal {
        if self.max_step == 0 {
            return current;
        }
        let step = Decimal::new(self.rng.random_range(-self.max_step..self.max_step), STEP_SCALE);
        current * (dec!(1) + step / dec!(100))
    }

    /// One simulated tick: a new quote for every ticker, anchored on its base price.
    pub fn tick(
        &mut self,
        config: &FeedConfig,
        tickers: &[String],
        prices: &PriceMap,
        now: DateTime<Utc>,
    ) -> Vec<PriceQuote> {
        tickers
            .iter()
            .map(|ticker| {
                let base = config
                    .base_price(ticker)
                    .unwrap_or(config.default_base_price);
                let current = prices
                    .get(ticker)
                    .map(|quote| quote.price)
                    .filter(|price| !price.is_zero())
                    .unwrap_or(base);
                PriceQuote::against_base(ticker, self.step(current), base, now)
            })
            .collect()
    }
}

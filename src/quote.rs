use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::utils::{percent_of, round_cents};

/// Latest known price of one ticker.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub ticker: String,
    pub price: Decimal,
    /// Absolute change against the base price.
    pub change: Decimal,
    pub change_percent: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    /// Builds a quote for `price`, measuring change against `base`.
    pub fn against_base(ticker: &str, price: Decimal, base: Decimal, timestamp: DateTime<Utc>) -> Self {
        let price = round_cents(price);
        let change = price - base;
        Self {
            ticker: ticker.to_string(),
            price,
            change: round_cents(change),
            change_percent: round_cents(percent_of(change, base)),
            timestamp,
        }
    }

    /// Price before today's change.
    pub fn previous_price(&self) -> Decimal {
        self.price - self.change
    }
}

pub type PriceMap = HashMap<String, PriceQuote>;

/// Largest price taken from outside. Portfolio sums stay well inside `Decimal` range below it.
pub const MAX_PRICE: Decimal = dec!(1000000000);

/// A price that can be valued: positive and at most [`MAX_PRICE`].
pub fn is_valid_price(price: Decimal) -> bool {
    price > Decimal::ZERO && price <= MAX_PRICE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_against_base() {
        let quote = PriceQuote::against_base("AAPL", dec!(178.011), dec!(175.5), Utc::now());
        assert_eq!(quote.price, dec!(178.01));
        assert_eq!(quote.change, dec!(2.51));
        assert_eq!(quote.change_percent, dec!(1.43));
        assert_eq!(quote.previous_price(), dec!(175.50));
    }

    #[test]
    fn test_against_zero_base() {
        let quote = PriceQuote::against_base("X", dec!(12), dec!(0), Utc::now());
        assert_eq!(quote.change, dec!(12));
        assert_eq!(quote.change_percent, dec!(0));
    }

    #[test]
    fn test_is_valid_price() {
        assert!(is_valid_price(dec!(0.01)));
        assert!(is_valid_price(MAX_PRICE));
        assert!(!is_valid_price(dec!(0)));
        assert!(!is_valid_price(dec!(-1)));
        assert!(!is_valid_price(MAX_PRICE + dec!(0.01)));
    }

    #[test]
    fn test_quote_json() {
        let timestamp = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let quote = PriceQuote::against_base("AAPL", dec!(180), dec!(175.5), timestamp);

        let json = serde_json::to_string(&quote).unwrap();
        assert!(json.contains(r#""changePercent":"#));
        assert!(json.contains(r#""timestamp":"2024-06-01T12:00:00Z""#));
        assert_eq!(serde_json::from_str::<PriceQuote>(&json).unwrap(), quote);
    }
}

//! Values derived from holdings and the current price map.
//!
//! A holding without a quote is valued at its average buy price, so it contributes
//! nothing to P/L or today's change. The same rule applies to the summary, the rows
//! and the sort keys.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::holding::Holding;
use crate::quote::{PriceMap, PriceQuote};
use crate::utils::percent_of;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Positive,
    Negative,
    Neutral,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
    pub today_change: Decimal,
    pub today_change_percent: Decimal,
}

impl Summary {
    pub fn profit_loss_trend(&self) -> Trend {
        if self.profit_loss.is_sign_negative() && !self.profit_loss.is_zero() {
            Trend::Negative
        } else {
            Trend::Positive
        }
    }

    pub fn today_trend(&self) -> Trend {
        if self.today_change.is_zero() {
            Trend::Neutral
        } else if self.today_change.is_sign_negative() {
            Trend::Negative
        } else {
            Trend::Positive
        }
    }
}

/// One holding valued at the current price.
#[derive(Clone, Debug, PartialEq)]
pub struct HoldingRow {
    pub holding: Holding,
    pub quote: Option<PriceQuote>,
    pub current_price: Decimal,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
}

impl HoldingRow {
    pub fn new(holding: &Holding, prices: &PriceMap) -> Self {
        let quote = prices.get(&holding.ticker).cloned();
        let current_price = current_price(holding, prices);
        let per_share = current_price - holding.avg_buy_price;
        Self {
            holding: holding.clone(),
            quote,
            current_price,
            profit_loss: per_share * Decimal::from(holding.quantity),
            profit_loss_percent: percent_of(per_share, holding.avg_buy_price),
        }
    }

    pub fn current_value(&self) -> Decimal {
        self.current_price * Decimal::from(self.holding.quantity)
    }
}

pub fn current_price(holding: &Holding, prices: &PriceMap) -> Decimal {
    prices
        .get(&holding.ticker)
        .map(|quote| quote.price)
        .unwrap_or(holding.avg_buy_price)
}

pub fn rows(holdings: &[Holding], prices: &PriceMap) -> Vec<HoldingRow> {
    holdings
        .iter()
        .map(|holding| HoldingRow::new(holding, prices))
        .collect()
}

pub fn summarize(holdings: &[Holding], prices: &PriceMap) -> Summary {
    let mut total_invested = Decimal::ZERO;
    let mut current_value = Decimal::ZERO;
    let mut previous_value = Decimal::ZERO;

    for holding in holdings {
        let quantity = Decimal::from(holding.quantity);
        let (price, previous) = match prices.get(&holding.ticker) {
            Some(quote) => (quote.price, quote.previous_price()),
            None => (holding.avg_buy_price, holding.avg_buy_price),
        };
        total_invested += holding.invested();
        current_value += quantity * price;
        previous_value += quantity * previous;
    }

    let profit_loss = current_value - total_invested;
    let today_change = current_value - previous_value;
    Summary {
        total_invested,
        current_value,
        profit_loss,
        profit_loss_percent: percent_of(profit_loss, total_invested),
        today_change,
        today_change_percent: percent_of(today_change, previous_value),
    }
}

/// Portfolio value at current prices.
pub fn portfolio_value(holdings: &[Holding], prices: &PriceMap) -> Decimal {
    holdings
        .iter()
        .map(|holding| Decimal::from(holding.quantity) * current_price(holding, prices))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holding::sample_holdings;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(ticker: &str, price: Decimal, change: Decimal) -> PriceQuote {
        PriceQuote {
            ticker: ticker.to_string(),
            price,
            change,
            change_percent: dec!(0),
            timestamp: Utc::now(),
        }
    }

    fn prices(quotes: Vec<PriceQuote>) -> PriceMap {
        quotes
            .into_iter()
            .map(|quote| (quote.ticker.clone(), quote))
            .collect()
    }

    #[test]
    fn test_single_holding_scenario() {
        let holdings = vec![Holding::new(1, "Apple Inc.", "AAPL", 10, dec!(150))];
        let prices = prices(vec![quote("AAPL", dec!(175.50), dec!(2.50))]);

        let summary = summarize(&holdings, &prices);
        assert_eq!(summary.current_value, dec!(1755.00));
        assert_eq!(summary.total_invested, dec!(1500.00));
        assert_eq!(summary.profit_loss, dec!(255.00));
        assert_eq!(summary.profit_loss_percent, dec!(17.00));
        assert_eq!(summary.today_change, dec!(25.00));
        assert_eq!(summary.profit_loss_trend(), Trend::Positive);
        assert_eq!(summary.today_trend(), Trend::Positive);
    }

    #[test]
    fn test_empty_price_map() {
        let holdings = sample_holdings();
        let summary = summarize(&holdings, &PriceMap::new());
        let invested: Decimal = holdings.iter().map(Holding::invested).sum();

        assert_eq!(summary.total_invested, invested);
        assert_eq!(summary.current_value, invested);
        assert_eq!(summary.profit_loss, dec!(0));
        assert_eq!(summary.profit_loss_percent, dec!(0));
        assert_eq!(summary.today_change, dec!(0));
        assert_eq!(summary.today_trend(), Trend::Neutral);
    }

    #[test]
    fn test_zero_invested() {
        let holdings = vec![
            Holding::new(1, "Free shares", "FREE", 10, dec!(0)),
            Holding::new(2, "Nothing", "NONE", 0, dec!(12)),
        ];
        let summary = summarize(&holdings, &PriceMap::new());
        assert_eq!(summary, Summary::default());

        let prices = prices(vec![quote("FREE", dec!(3), dec!(3))]);
        let summary = summarize(&holdings, &prices);
        assert_eq!(summary.profit_loss, dec!(30));
        assert_eq!(summary.profit_loss_percent, dec!(0));
        assert_eq!(summary.today_change, dec!(30));
        assert_eq!(summary.today_change_percent, dec!(0));
    }

    #[test]
    fn test_profit_loss_identity() {
        let holdings = sample_holdings();
        let quotes = vec![
            quote("AAPL", dec!(171.23), dec!(-4.27)),
            quote("MSFT", dec!(391.07), dec!(11.07)),
            quote("TSLA", dec!(180.5), dec!(-69.5)),
            quote("META", dec!(0), dec!(-320)),
        ];
        for n in 0..=quotes.len() {
            let prices = prices(quotes[..n].to_vec());
            let summary = summarize(&holdings, &prices);
            assert_eq!(
                summary.profit_loss,
                summary.current_value - summary.total_invested
            );
            assert_eq!(summary.current_value, portfolio_value(&holdings, &prices));
        }
    }

    #[test]
    fn test_loss_trends() {
        let holdings = vec![Holding::new(1, "Tesla Inc.", "TSLA", 2, dec!(200))];
        let prices = prices(vec![quote("TSLA", dec!(190), dec!(-10))]);
        let summary = summarize(&holdings, &prices);
        assert_eq!(summary.profit_loss, dec!(-20));
        assert_eq!(summary.profit_loss_percent, dec!(-5));
        assert_eq!(summary.today_change, dec!(-20));
        assert_eq!(summary.today_change_percent, dec!(-5));
        assert_eq!(summary.profit_loss_trend(), Trend::Negative);
        assert_eq!(summary.today_trend(), Trend::Negative);
    }

    #[test]
    fn test_rows() {
        let holdings = vec![
            Holding::new(1, "Apple Inc.", "AAPL", 10, dec!(150)),
            Holding::new(2, "Google LLC", "GOOGL", 8, dec!(140)),
            Holding::new(3, "Gift", "GIFT", 3, dec!(0)),
        ];
        let prices = prices(vec![
            quote("AAPL", dec!(175.5), dec!(0)),
            quote("GIFT", dec!(5), dec!(0)),
        ]);
        let rows = rows(&holdings, &prices);

        assert_eq!(rows[0].current_price, dec!(175.5));
        assert_eq!(rows[0].profit_loss, dec!(255));
        assert_eq!(rows[0].profit_loss_percent, dec!(17));
        assert_eq!(rows[0].current_value(), dec!(1755));
        assert!(rows[0].quote.is_some());

        assert_eq!(rows[1].current_price, dec!(140));
        assert_eq!(rows[1].profit_loss, dec!(0));
        assert!(rows[1].quote.is_none());

        assert_eq!(rows[2].profit_loss, dec!(15));
        assert_eq!(rows[2].profit_loss_percent, dec!(0));
    }
}

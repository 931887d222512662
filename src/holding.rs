use std::path::Path;

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::quote::MAX_PRICE;

/// Largest share count accepted from a holdings file.
pub const MAX_QUANTITY: u64 = 1_000_000_000;

/// A position in the portfolio. Loaded once, never mutated.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: u64,
    pub company: String,
    pub ticker: String,
    pub quantity: u64,
    pub avg_buy_price: Decimal,
}

impl Holding {
    pub fn new(id: u64, company: &str, ticker: &str, quantity: u64, avg_buy_price: Decimal) -> Self {
        Self {
            id,
            company: company.to_string(),
            ticker: ticker.to_string(),
            quantity,
            avg_buy_price,
        }
    }

    pub fn invested(&self) -> Decimal {
        Decimal::from(self.quantity) * self.avg_buy_price
    }
}

/// The portfolio shown when no holdings file is given.
pub fn sample_holdings() -> Vec<Holding> {
    vec![
        Holding::new(1, "Apple Inc.", "AAPL", 10, dec!(150.00)),
        Holding::new(2, "Microsoft Corporation", "MSFT", 15, dec!(300.00)),
        Holding::new(3, "Amazon.com Inc.", "AMZN", 5, dec!(120.00)),
        Holding::new(4, "Google LLC", "GOOGL", 8, dec!(140.00)),
        Holding::new(5, "Tesla Inc.", "TSLA", 12, dec!(200.00)),
        Holding::new(6, "Meta Platforms Inc.", "META", 7, dec!(250.00)),
    ]
}

/// Parses a JSON array of holdings and validates every entry.
pub fn parse_holdings(json: &str) -> Result<Vec<Holding>> {
    let holdings: Vec<Holding> =
        serde_json::from_str(json).context("Invalid holdings json")?;

    for holding in &holdings {
        if holding.ticker.trim().is_empty() {
            bail!("Holding {} has an empty ticker", holding.id);
        }
        if holding.avg_buy_price.is_sign_negative() && !holding.avg_buy_price.is_zero() {
            bail!(
                "Holding {} ({}) has a negative average buy price",
                holding.id,
                holding.ticker
            );
        }
        if holding.avg_buy_price > MAX_PRICE || holding.quantity > MAX_QUANTITY {
            bail!(
                "Holding {} ({}) is out of range: {} @ {}",
                holding.id,
                holding.ticker,
                holding.quantity,
                holding.avg_buy_price
            );
        }
    }

    if let Some(id) = holdings.iter().map(|h| h.id).duplicates().next() {
        bail!("Duplicate holding id {id}");
    }

    Ok(holdings)
}

pub async fn load_holdings(path: &Path) -> Result<Vec<Holding>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read holdings from {}", path.display()))?;
    parse_holdings(&content)
}

/// Distinct tickers in holding order.
pub fn tickers(holdings: &[Holding]) -> Vec<String> {
    holdings.iter().map(|h| h.ticker.clone()).unique().collect()
}

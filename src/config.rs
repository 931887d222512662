use std::{collections::HashMap, time::Duration};

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::quote::is_valid_price;

pub const FINNHUB_ENDPOINT: &str = "wss://ws.finnhub.io";

/// Everything the price feed needs, supplied at construction.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Finnhub access token. Without it the feed only simulates prices.
    pub token: Option<String>,
    pub endpoint: String,
    pub reconnect_delay: Duration,
    pub fallback_interval: Duration,
    /// A connection silent for this long is treated as closed. Also bounds the handshake.
    pub idle_timeout: Duration,
    /// Reference prices used for change and as the random walk anchor.
    pub base_prices: HashMap<String, Decimal>,
    /// Simulation anchor for tickers missing from `base_prices`.
    pub default_base_price: Decimal,
    /// Largest simulated move per tick, in percent.
    pub max_step_percent: Decimal,
    pub seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: FINNHUB_ENDPOINT.to_string(),
            reconnect_delay: Duration::from_millis(3000),
            fallback_interval: Duration::from_millis(2000),
            idle_timeout: Duration::from_secs(60),
            base_prices: default_base_prices(),
            default_base_price: dec!(100),
            max_step_percent: dec!(2),
            seed: None,
        }
    }
}

impl FeedConfig {
    /// Stream url, or `None` when no usable token is configured.
    pub fn stream_url(&self) -> Option<String> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| format!("{}?token={}", self.endpoint, token))
    }

    pub fn base_price(&self, ticker: &str) -> Option<Decimal> {
        self.base_prices.get(ticker).copied()
    }
}

pub fn default_base_prices() -> HashMap<String, Decimal> {
    HashMap::from([
        ("AAPL".to_string(), dec!(175.5)),
        ("MSFT".to_string(), dec!(380)),
        ("AMZN".to_string(), dec!(145)),
        ("GOOGL".to_string(), dec!(140)),
        ("TSLA".to_string(), dec!(250)),
        ("META".to_string(), dec!(320)),
    ])
}

/// Parses a `SYM=PRICE` pair, as given on the command line.
pub fn parse_base_price(value: &str) -> Result<(String, Decimal)> {
    let (ticker, price) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected SYMBOL=PRICE, got {value}"))?;
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(anyhow!("Missing symbol in {value}"));
    }
    let price: Decimal = price
        .trim()
        .parse()
        .with_context(|| format!("Invalid price in {value}"))?;
    if !is_valid_price(price) {
        return Err(anyhow!("Price out of range in {value}"));
    }
    Ok((ticker.to_uppercase(), price))
}

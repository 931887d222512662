use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::FeedConfig;
use crate::quote::{is_valid_price, PriceQuote};
use crate::utils::round_cents;

use super::Connector;

#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Subscribe,
    Unsubscribe,
}

#[derive(Serialize, Clone, Debug)]
pub struct Subscription<'a> {
    #[serde(rename = "type")]
    pub kind: SubscriptionKind,
    pub symbol: &'a str,
}

impl<'a> Subscription<'a> {
    pub fn subscribe(symbol: &'a str) -> Self {
        Self {
            kind: SubscriptionKind::Subscribe,
            symbol,
        }
    }

    pub fn unsubscribe(symbol: &'a str) -> Self {
        Self {
            kind: SubscriptionKind::Unsubscribe,
            symbol,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundMessage {
    Trade { data: Vec<TradeStream> },
    Ping,
    Error {
        #[serde(default)]
        msg: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TradeStream {
    #[serde(rename = "s")]
    pub symbol: String,

    #[serde(rename = "p")]
    pub price: Decimal,
}

/// Parses one text frame. `Ok(vec![])` means a valid message without trades.
pub fn parse_trades(text: &str) -> Result<Vec<TradeStream>> {
    match serde_json::de::from_str::<InboundMessage>(text)? {
        InboundMessage::Trade { data } => Ok(data),
        InboundMessage::Ping => {
            debug!("Received feed ping");
            Ok(vec![])
        }
        InboundMessage::Error { msg } => {
            warn!("Feed reported an error: {msg}");
            Ok(vec![])
        }
        InboundMessage::Other => {
            debug!("Ignoring message {text}");
            Ok(vec![])
        }
    }
}

/// Converts trades to quotes. A later trade for the same symbol replaces an earlier one.
///
/// Trades with a price that cannot be valued are dropped.
pub fn quotes_from_trades(
    trades: Vec<TradeStream>,
    config: &FeedConfig,
    now: DateTime<Utc>,
) -> Vec<PriceQuote> {
    let mut quotes: Vec<PriceQuote> = Vec::with_capacity(trades.len());
    for trade in trades {
        if !is_valid_price(trade.price) {
            warn!("Discarding {} trade at {}", trade.symbol, trade.price);
            continue;
        }
        let base = config.base_price(&trade.symbol).unwrap_or_else(|| round_cents(trade.price));
        let quote = PriceQuote::against_base(&trade.symbol, trade.price, base, now);
        match quotes.iter_mut().find(|q| q.ticker == quote.ticker) {
            Some(existing) => *existing = quote,
            None => quotes.push(quote),
        }
    }
    quotes
}

/// Connects to the real Finnhub stream.
#[derive(Clone, Debug, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Connection>> + Send {
        let url = url.to_string();
        async move {
            let (ws_stream, response) = connect_async(url).await?;
            info!("Connected to market data stream ({})", response.status());
            for (header, _value) in response.headers() {
                debug!("\t{header}");
            }
            Ok(ws_stream)
        }
    }
}

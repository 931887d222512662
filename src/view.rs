use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;
use rust_decimal::Decimal;
use strum_macros::{Display, EnumIter, EnumString};

use crate::holding::Holding;
use crate::metrics::HoldingRow;
use crate::quote::{PriceMap, PriceQuote};
use crate::utils::compare_text;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum SortField {
    #[default]
    Company,
    Ticker,
    Quantity,
    AvgBuyPrice,
    CurrentPrice,
    #[strum(serialize = "pl")]
    ProfitLoss,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Same field flips the direction, a new field starts ascending.
    pub fn toggle(&mut self, field: SortField) {
        if self.field == field {
            self.direction = self.direction.flip();
        } else {
            self.field = field;
            self.direction = SortDirection::Asc;
        }
    }

    pub fn compare(&self, a: &HoldingRow, b: &HoldingRow) -> Ordering {
        let ordering = match self.field {
            SortField::Company => compare_text(&a.holding.company, &b.holding.company),
            SortField::Ticker => compare_text(&a.holding.ticker, &b.holding.ticker),
            SortField::Quantity => a.holding.quantity.cmp(&b.holding.quantity),
            SortField::AvgBuyPrice => a.holding.avg_buy_price.cmp(&b.holding.avg_buy_price),
            SortField::CurrentPrice => a.current_price.cmp(&b.current_price),
            SortField::ProfitLoss => a.profit_loss.cmp(&b.profit_loss),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Case-insensitive match on company or ticker. Empty query matches everything.
pub fn matches_query(holding: &Holding, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    query.is_empty()
        || holding.company.to_lowercase().contains(&query)
        || holding.ticker.to_lowercase().contains(&query)
}

/// Filters then stably sorts the rows. Equal keys keep their input order.
pub fn filter_and_sort(rows: Vec<HoldingRow>, query: &str, sort: &SortState) -> Vec<HoldingRow> {
    rows.into_iter()
        .filter(|row| matches_query(&row.holding, query))
        .sorted_by(|a, b| sort.compare(a, b))
        .collect()
}

/// All quotes ordered by ticker.
pub fn ticker_strip(prices: &PriceMap) -> Vec<PriceQuote> {
    prices
        .values()
        .sorted_by(|a, b| compare_text(&a.ticker, &b.ticker))
        .cloned()
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PriceMovement {
    Up,
    Down,
}

/// Remembers the last seen price per ticker to flag moves between snapshots.
#[derive(Clone, Debug, Default)]
pub struct MovementTracker {
    last_prices: HashMap<String, Decimal>,
}

impl MovementTracker {
    pub fn observe(&mut self, prices: &PriceMap) -> HashMap<String, PriceMovement> {
        let mut movements = HashMap::new();
        for (ticker, quote) in prices {
            if let Some(previous) = self.last_prices.insert(ticker.clone(), quote.price) {
                if !previous.is_zero() && previous != quote.price {
                    let movement = if quote.price > previous {
                        PriceMovement::Up
                    } else {
                        PriceMovement::Down
                    };
                    movements.insert(ticker.clone(), movement);
                }
            }
        }
        movements
    }
}

use std::{collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    feed::ConnectionStatus,
    holding::{self, Holding},
    metrics::{self, HoldingRow, Summary},
    performance::{self, PerformancePoint},
    quote::{PriceMap, PriceQuote},
    view::{self, MovementTracker, PriceMovement, SortField, SortState},
};

/// What a consumer displays: holdings, the latest snapshot and the view settings.
///
/// Derived values are recomputed only when a different snapshot is applied.
#[derive(Clone, Debug)]
pub struct Dashboard {
    holdings: Arc<[Holding]>,
    prices: Arc<PriceMap>,
    summary: Summary,
    rows: Vec<HoldingRow>,
    movements: HashMap<String, PriceMovement>,
    tracker: MovementTracker,
    sort: SortState,
    query: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum DashboardEvent {
    Status(ConnectionStatus),
    Summary(Summary),
    Quotes(Vec<PriceQuote>),
}

impl Dashboard {
    pub fn new(holdings: Vec<Holding>) -> Self {
        let holdings: Arc<[Holding]> = holdings.into();
        let prices = Arc::new(PriceMap::new());
        Self {
            summary: metrics::summarize(&holdings, &prices),
            rows: metrics::rows(&holdings, &prices),
            holdings,
            prices,
            movements: HashMap::new(),
            tracker: MovementTracker::default(),
            sort: SortState::default(),
            query: String::new(),
        }
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn tickers(&self) -> Vec<String> {
        holding::tickers(&self.holdings)
    }

    /// Applies a price snapshot. Returns `false` when it is the one already applied.
    pub fn apply_prices(&mut self, prices: Arc<PriceMap>) -> bool {
        if Arc::ptr_eq(&self.prices, &prices) {
            return false;
        }
        self.summary = metrics::summarize(&self.holdings, &prices);
        self.rows = metrics::rows(&self.holdings, &prices);
        self.movements = self.tracker.observe(&prices);
        self.prices = prices;
        true
    }

    pub fn prices(&self) -> &Arc<PriceMap> {
        &self.prices
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Rows after the current query and sort.
    pub fn visible_rows(&self) -> Vec<HoldingRow> {
        view::filter_and_sort(self.rows.clone(), &self.query, &self.sort)
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortState) {
        self.sort = sort;
    }

    pub fn toggle_sort(&mut self, field: SortField) {
        self.sort.toggle(field);
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    /// Tickers whose price moved in the last applied snapshot.
    pub fn movements(&self) -> &HashMap<String, PriceMovement> {
        &self.movements
    }

    pub fn ticker_strip(&self) -> Vec<PriceQuote> {
        view::ticker_strip(&self.prices)
    }

    pub fn performance<R: Rng>(&self, days: usize, today: NaiveDate, rng: &mut R) -> Vec<PerformancePoint> {
        let value = metrics::portfolio_value(&self.holdings, &self.prices);
        performance::simulate_history(value, days, today, rng)
    }

    pub fn events(&self) -> Vec<DashboardEvent> {
        vec![
            DashboardEvent::Summary(self.summary.clone()),
            DashboardEvent::Quotes(self.ticker_strip()),
        ]
    }
}

pub mod config;
pub mod dashboard;
pub mod feed;
pub mod holding;
pub mod metrics;
pub mod performance;
pub mod quote;
pub mod utils;
pub mod view;

pub use config::FeedConfig;
pub use dashboard::Dashboard;
pub use feed::{ConnectionStatus, PriceFeed};
pub use holding::Holding;
pub use quote::{PriceMap, PriceQuote};

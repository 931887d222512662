use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use colored::{ColoredString, Colorize};
use rand::{rngs::StdRng, SeedableRng};
use rust_decimal::Decimal;
use tokio::select;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portfolio_tracker::config::{parse_base_price, FINNHUB_ENDPOINT};
use portfolio_tracker::dashboard::DashboardEvent;
use portfolio_tracker::holding::{load_holdings, sample_holdings};
use portfolio_tracker::metrics::Trend;
use portfolio_tracker::performance::{PerformancePoint, DEFAULT_DAYS};
use portfolio_tracker::utils::{format_currency, format_percent};
use portfolio_tracker::view::{PriceMovement, SortDirection, SortField, SortState};
use portfolio_tracker::*;

#[derive(Parser, Debug)]
struct Args {
    /// Finnhub api key; without it prices are simulated.
    #[arg(long, env = "FINNHUB_API_KEY", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, default_value = FINNHUB_ENDPOINT)]
    endpoint: String,
    /// JSON array of holdings, defaults to the sample portfolio.
    #[arg(long)]
    holdings: Option<PathBuf>,
    /// Reference price as SYMBOL=PRICE, may be repeated.
    #[arg(long = "base-price", value_parser = parse_base_price)]
    base_prices: Vec<(String, Decimal)>,
    #[arg(long, default_value = "")]
    query: String,
    #[arg(long, default_value = "company")]
    sort: SortField,
    #[arg(long)]
    desc: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_DAYS)]
    days: usize,
    /// Print snapshots as json lines instead of logging them.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{}=debug,portfolio_tracker=debug", env!("CARGO_CRATE_NAME")).into()
        }))
        .with(fmt::layer())
        .init();

    let args = Args::parse();

    let holdings = match &args.holdings {
        Some(path) => load_holdings(path).await?,
        None => sample_holdings(),
    };

    let mut dashboard = Dashboard::new(holdings);
    dashboard.set_sort(SortState::new(
        args.sort,
        if args.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        },
    ));
    dashboard.set_query(&args.query);

    let mut config = FeedConfig {
        token: args.token.clone(),
        endpoint: args.endpoint.clone(),
        seed: args.seed,
        ..Default::default()
    };
    config.base_prices.extend(args.base_prices.iter().cloned());

    run(dashboard, config, &args).await
}

async fn run(mut dashboard: Dashboard, config: FeedConfig, args: &Args) -> Result<()> {
    let feed = PriceFeed::start(config, dashboard.tickers());
    let mut rx_prices = feed.subscribe();
    let mut rx_status = feed.subscribe_status();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut performance_interval = tokio::time::interval(Duration::from_secs(5));

    info!(
        "{} tracking {} holdings",
        "STARTING DASHBOARD".green(),
        dashboard.holdings().len()
    );
    if feed.status() == ConnectionStatus::Error {
        warn!("No live feed available, showing simulated prices");
    }

    loop {
        select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            changed = rx_prices.changed() => {
                if changed.is_err() {
                    error!("Price feed stopped");
                    break;
                }
                let prices = rx_prices.borrow_and_update().clone();
                if dashboard.apply_prices(prices) {
                    print_overview(&dashboard, args.json);
                }
            }
            changed = rx_status.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *rx_status.borrow_and_update();
                if args.json {
                    print_event(&DashboardEvent::Status(status));
                } else {
                    info!("Feed {}", status_label(status));
                }
            }
            _ = performance_interval.tick() => {
                let points = dashboard.performance(args.days, Local::now().date_naive(), &mut rng);
                print_performance(&points, args.json);
            }
        }
    }

    feed.shutdown().await
}

fn status_label(status: ConnectionStatus) -> ColoredString {
    match status {
        ConnectionStatus::Connected => status.to_string().green(),
        ConnectionStatus::Disconnected => status.to_string().yellow(),
        ConnectionStatus::Error => status.to_string().red(),
    }
}

fn trend_colored(text: String, trend: Trend) -> ColoredString {
    match trend {
        Trend::Positive => text.green(),
        Trend::Negative => text.red(),
        Trend::Neutral => text.normal(),
    }
}

fn signed_colored(text: String, value: Decimal) -> ColoredString {
    if value.is_sign_negative() && !value.is_zero() {
        text.red()
    } else {
        text.green()
    }
}

fn print_overview(dashboard: &Dashboard, json: bool) {
    if json {
        for event in dashboard.events() {
            print_event(&event);
        }
        return;
    }

    let strip = dashboard
        .ticker_strip()
        .iter()
        .map(|quote| {
            format!(
                "{} {} {}",
                quote.ticker,
                format_currency(quote.price),
                signed_colored(format_percent(quote.change_percent), quote.change_percent)
            )
        })
        .collect::<Vec<String>>()
        .join(" | ");
    info!("{strip}");

    let summary = dashboard.summary();
    info!(
        "invested {} / value {} / P&L {} ({}) / today {} ({})",
        format_currency(summary.total_invested),
        format_currency(summary.current_value).yellow(),
        trend_colored(format_currency(summary.profit_loss), summary.profit_loss_trend()),
        trend_colored(format_percent(summary.profit_loss_percent), summary.profit_loss_trend()),
        trend_colored(format_currency(summary.today_change), summary.today_trend()),
        trend_colored(format_percent(summary.today_change_percent), summary.today_trend()),
    );

    let rows = dashboard.visible_rows();
    if rows.is_empty() {
        info!("No holdings match {:?}", dashboard.query());
        return;
    }
    for row in rows {
        let movement = match dashboard.movements().get(&row.holding.ticker) {
            Some(PriceMovement::Up) => "▲".green(),
            Some(PriceMovement::Down) => "▼".red(),
            None => " ".normal(),
        };
        info!(
            "---- {:<24} {:<6} {:>6} @ {:>10} -> {:>10} {} {:>12} ({})",
            row.holding.company,
            row.holding.ticker.purple(),
            row.holding.quantity,
            format_currency(row.holding.avg_buy_price),
            format_currency(row.current_price),
            movement,
            signed_colored(format_currency(row.profit_loss), row.profit_loss),
            signed_colored(format_percent(row.profit_loss_percent), row.profit_loss_percent),
        );
    }
}

fn print_event(event: &DashboardEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(err) => error!("Failed to serialize event : {err}"),
    }
}

fn print_performance(points: &[PerformancePoint], json: bool) {
    if json {
        match serde_json::to_string(points) {
            Ok(line) => println!("{line}"),
            Err(err) => error!("Failed to serialize performance : {err}"),
        }
        return;
    }
    let series = points
        .iter()
        .map(|point| format!("{} {}", point.date.format("%b %-d"), format_currency(point.value)))
        .collect::<Vec<String>>()
        .join(", ");
    info!("performance ({} days): {series}", points.len());
}

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono::Utc;
use futures::future::BoxFuture;
use futures::{FutureExt, Sink, SinkExt, Stream};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tracing::{debug, error, info, warn};
use tungstenite::{Error as WsError, Message};

use crate::config::FeedConfig;
use crate::quote::{PriceMap, PriceQuote};

use finnhub::{parse_trades, quotes_from_trades, Subscription, WebSocketConnector};
use simulation::RandomWalk;

pub mod finnhub;
pub mod simulation;


#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Opens streaming connections. The seam between the feed and the network.
pub trait Connector: Clone + Send + Sync + 'static {
    type Connection: Stream<Item = Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Unpin
        + Send
        + 'static;

    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// Handle on a running price feed.
///
/// The feed task owns the price map; this handle only reads published snapshots.
/// Dropping the handle tears the feed down, `shutdown` does the same and waits for it.
#[derive(Debug)]
pub struct PriceFeed {
    prices: watch::Receiver<Arc<PriceMap>>,
    status: watch::Receiver<ConnectionStatus>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PriceFeed {
    /// Starts a feed against the Finnhub websocket.
    pub fn start(config: FeedConfig, tickers: Vec<String>) -> Self {
        Self::start_with(config, tickers, WebSocketConnector)
    }

    pub fn start_with<C: Connector>(config: FeedConfig, tickers: Vec<String>, connector: C) -> Self {
        let url = config.stream_url();
        let initial_status = if url.is_some() {
            ConnectionStatus::Disconnected
        } else {
            ConnectionStatus::Error
        };

        let (tx_prices, prices) = watch::channel(Arc::new(PriceMap::new()));
        let (tx_status, status) = watch::channel(initial_status);
        let (shutdown, rx_shutdown) = oneshot::channel();

        let worker = FeedWorker {
            walk: RandomWalk::new(config.max_step_percent, config.seed),
            config,
            tickers,
            url,
            connector,
            prices: PriceMap::new(),
            tx_prices,
            tx_status,
        };
        let task = tokio::task::spawn(worker.run(rx_shutdown));

        Self {
            prices,
            status,
            shutdown: Some(shutdown),
            task: Some(task),
        }
    }

    /// Latest published snapshot.
    pub fn prices(&self) -> Arc<PriceMap> {
        self.prices.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<PriceMap>> {
        self.prices.clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Unsubscribes, closes the connection, cancels both timers and waits for the task.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }
}

impl Drop for PriceFeed {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

enum Frame {
    Message(Message),
    Failed(WsError),
    Closed,
    Idle,
}

struct FeedWorker<C: Connector> {
    config: FeedConfig,
    tickers: Vec<String>,
    url: Option<String>,
    connector: C,
    walk: RandomWalk,
    prices: PriceMap,
    tx_prices: watch::Sender<Arc<PriceMap>>,
    tx_status: watch::Sender<ConnectionStatus>,
}

impl<C: Connector> FeedWorker<C> {
    async fn run(mut self, mut rx_shutdown: oneshot::Receiver<()>) {
        let mut connection: Option<C::Connection> = None;
        let mut connecting: Option<BoxFuture<'static, Result<C::Connection>>> = None;
        let mut reconnect: Option<Pin<Box<Sleep>>> = None;
        let mut fallback: Option<Interval> = Some(self.fallback_timer());

        match &self.url {
            Some(_) => connecting = self.connect(),
            None => warn!("No feed token configured, prices are simulated"),
        }

        loop {
            tokio::select! {
                _ = &mut rx_shutdown => {
                    break;
                }
                result = wait_connect(connecting.as_mut()) => {
                    connecting = None;
                    match result {
                        Ok(conn) => match self.on_open(conn).await {
                            Ok(conn) => {
                                connection = Some(conn);
                                fallback = None;
                            }
                            Err(err) => {
                                error!("Failed to subscribe: {err}");
                                self.set_status(ConnectionStatus::Error);
                                reconnect = Some(self.reconnect_timer());
                            }
                        },
                        Err(err) => {
                            error!("Failed to connect to stream: {err}");
                            self.set_status(ConnectionStatus::Error);
                            reconnect = Some(self.reconnect_timer());
                        }
                    }
                }
                frame = next_frame(connection.as_mut(), self.config.idle_timeout) => {
                    let status = match frame {
                        Frame::Message(message) => {
                            match self.on_message(message, connection.as_mut()).await {
                                Ok(()) => None,
                                Err(err) => {
                                    error!("Stream error: {err}");
                                    Some(ConnectionStatus::Error)
                                }
                            }
                        }
                        Frame::Failed(err) => {
                            error!("Stream error: {err}");
                            Some(ConnectionStatus::Error)
                        }
                        Frame::Closed => {
                            warn!("Stream closed, retrying");
                            Some(ConnectionStatus::Disconnected)
                        }
                        Frame::Idle => {
                            warn!("Stream idle for {:?}, retrying", self.config.idle_timeout);
                            Some(ConnectionStatus::Disconnected)
                        }
                    };
                    if let Some(status) = status {
                        connection = None;
                        self.set_status(status);
                        reconnect = Some(self.reconnect_timer());
                        fallback = Some(self.fallback_timer());
                    }
                }
                _ = wait_sleep(reconnect.as_mut()) => {
                    reconnect = None;
                    info!("Attempting to reconnect");
                    connecting = self.connect();
                }
                _ = wait_tick(fallback.as_mut()) => {
                    self.simulate();
                }
            }
        }

        drop(connecting);
        drop(reconnect);
        drop(fallback);
        if let Some(conn) = connection {
            self.close(conn).await;
        }
        debug!("Price feed stopped");
    }

    fn connect(&self) -> Option<BoxFuture<'static, Result<C::Connection>>> {
        let url = self.url.clone()?;
        let connector = self.connector.clone();
        let timeout = self.config.idle_timeout;
        Some(
            async move {
                tokio::time::timeout(timeout, connector.connect(&url))
                    .await
                    .map_err(|_| anyhow!("Handshake timed out after {timeout:?}"))?
            }
            .boxed(),
        )
    }

    async fn on_open(&mut self, mut conn: C::Connection) -> Result<C::Connection> {
        info!("Feed connected, subscribing to {} tickers", self.tickers.len());
        for ticker in &self.tickers {
            let subscribe = Subscription::subscribe(ticker).to_json()?;
            conn.send(Message::Text(subscribe.into())).await?;
        }
        self.set_status(ConnectionStatus::Connected);
        Ok(conn)
    }

    async fn on_message(&mut self, message: Message, conn: Option<&mut C::Connection>) -> Result<()> {
        match message {
            Message::Text(text) => match parse_trades(text.as_str()) {
                Ok(trades) => {
                    let quotes = quotes_from_trades(trades, &self.config, Utc::now());
                    self.publish(quotes);
                }
                Err(err) => {
                    error!("Invalid feed message: {err}");
                }
            },
            Message::Ping(data) => {
                debug!("Received ping: {:?}", data);
                if let Some(conn) = conn {
                    conn.send(Message::Pong(data)).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn close(&mut self, mut conn: C::Connection) {
        for ticker in &self.tickers {
            if let Err(err) = Self::unsubscribe(&mut conn, ticker).await {
                debug!("Failed to unsubscribe {ticker}: {err}");
                break;
            }
        }
        if let Err(err) = conn.close().await {
            debug!("Failed to close stream: {err}");
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn unsubscribe(conn: &mut C::Connection, ticker: &str) -> Result<()> {
        let unsubscribe = Subscription::unsubscribe(ticker).to_json()?;
        conn.send(Message::Text(unsubscribe.into())).await?;
        Ok(())
    }

    fn simulate(&mut self) {
        let quotes = self
            .walk
            .tick(&self.config, &self.tickers, &self.prices, Utc::now());
        debug!("Simulated {} prices", quotes.len());
        self.publish(quotes);
    }

    fn publish(&mut self, quotes: Vec<PriceQuote>) {
        if quotes.is_empty() {
            return;
        }
        for quote in quotes {
            self.prices.insert(quote.ticker.clone(), quote);
        }
        self.tx_prices.send_replace(Arc::new(self.prices.clone()));
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.tx_status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            debug!("Feed status {current} -> {status}");
            *current = status;
            true
        });
    }

    fn fallback_timer(&self) -> Interval {
        let period = self.config.fallback_interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    fn reconnect_timer(&self) -> Pin<Box<Sleep>> {
        Box::pin(tokio::time::sleep(self.config.reconnect_delay))
    }
}

async fn wait_connect<T>(connecting: Option<&mut BoxFuture<'static, Result<T>>>) -> Result<T> {
    match connecting {
        Some(connecting) => connecting.await,
        None => std::future::pending().await,
    }
}

async fn wait_sleep(sleep: Option<&mut Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

async fn wait_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_frame<S>(conn: Option<&mut S>, idle_timeout: Duration) -> Frame
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let Some(conn) = conn else {
        return std::future::pending().await;
    };
    match tokio::time::timeout(idle_timeout, conn.next()).await {
        Ok(Some(Ok(Message::Close(frame)))) => {
            debug!("Close frame: {:?}", frame);
            Frame::Closed
        }
        Ok(Some(Ok(message))) => Frame::Message(message),
        Ok(Some(Err(err))) => Frame::Failed(err),
        Ok(None) => Frame::Closed,
        Err(_) => Frame::Idle,
    }
}

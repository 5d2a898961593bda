//! Stock data orchestration
//!
//! [`StockService`] keeps the symbol and timeframe being viewed and the data
//! shown for them. A symbol or timeframe change fetches quote, price
//! history, fundamentals, and news as one joined batch. Every fetch carries a
//! ticket; only the most recently issued ticket, still matching the current
//! selection, may write its result, so a slow response for an old selection
//! can never overwrite a newer one.

use crate::auth::AuthHandle;
use crate::config::{DashboardConfig, TimeframeRefresh};
use crate::error::{Error, Result};
use crate::timeframe::{self, Timeframe};
use crate::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use dash_api::{
    Financials, HistoricalRequest, NewsApi, NewsArticle, PricePoint, Quote, StockApi, SymbolInfo,
};
use dash_core::{KeyValueStore, NoticeSink, keys};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const FETCH_FAILED: &str = "Failed to fetch stock data. Please try again.";
pub const LOGIN_REQUIRED: &str = "Please log in to manage watchlist";

const POPULAR_QUOTE_LIMIT: usize = 10;

/// Symbols offered when the backend cannot list popular ones
pub fn popular_fallback() -> Vec<SymbolInfo> {
    [
        ("AAPL", "Apple Inc."),
        ("MSFT", "Microsoft Corporation"),
        ("GOOGL", "Alphabet Inc."),
        ("AMZN", "Amazon.com, Inc."),
        ("TSLA", "Tesla, Inc."),
        ("META", "Meta Platforms, Inc."),
        ("NVDA", "NVIDIA Corporation"),
        ("NFLX", "Netflix, Inc."),
        ("JPM", "JPMorgan Chase & Co."),
        ("IBM", "International Business Machines"),
    ]
    .into_iter()
    .map(|(symbol, name)| SymbolInfo::new(symbol, name))
    .collect()
}

/// Everything shown for one symbol, fetched together
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub quote: Quote,
    pub historical: Vec<PricePoint>,
    pub financials: Financials,
    pub news: Vec<NewsArticle>,
    pub fetched_at: DateTime<Utc>,
}

/// Published dashboard state
#[derive(Debug, Clone, PartialEq)]
pub struct StockState {
    pub selected_symbol: String,
    pub timeframe: Timeframe,
    /// Last applied snapshot; kept while a newer one is loading
    pub snapshot: Option<StockSnapshot>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub watchlist: BTreeSet<String>,
    /// Watchlist symbols whose add or remove the backend has not confirmed
    pub pending_watchlist: BTreeSet<String>,
    pub available_symbols: Vec<SymbolInfo>,
    pub trending_news: Vec<NewsArticle>,
    pub dark_mode: bool,
    /// Latest in-flight watchlist operation per symbol
    watchlist_ops: BTreeMap<String, u64>,
}

impl StockState {
    fn new(symbol: String, dark_mode: bool) -> Self {
        Self {
            selected_symbol: symbol,
            timeframe: Timeframe::default(),
            snapshot: None,
            loading: false,
            error: None,
            last_updated: None,
            watchlist: BTreeSet::new(),
            pending_watchlist: BTreeSet::new(),
            available_symbols: Vec::new(),
            trending_news: Vec::new(),
            dark_mode,
            watchlist_ops: BTreeMap::new(),
        }
    }
}

/// What became of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result is now the current snapshot
    Applied,
    /// A newer fetch was issued first; the result was dropped
    Superseded,
    /// The selection did not change, nothing was fetched
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FetchTicket {
    symbol: String,
    timeframe: Timeframe,
    generation: u64,
}

impl FetchTicket {
    fn matches(&self, state: &StockState) -> bool {
        self.symbol == state.selected_symbol && self.timeframe == state.timeframe
    }
}

enum Payload {
    Bundle(StockSnapshot),
    Series(Vec<PricePoint>),
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn symbol_required() -> Error {
    let mut errors = ValidationErrors::default();
    errors.add("symbol", "Symbol is required");
    Error::Validation(errors)
}

/// Stock data orchestrator
pub struct StockService {
    stocks: Arc<dyn StockApi>,
    news: Arc<dyn NewsApi>,
    auth: AuthHandle,
    store: Arc<dyn KeyValueStore>,
    notices: Arc<dyn NoticeSink>,
    config: DashboardConfig,
    state: watch::Sender<StockState>,
    generation: AtomicU64,
    watchlist_seq: AtomicU64,
}

impl StockService {
    pub fn new(
        stocks: Arc<dyn StockApi>,
        news: Arc<dyn NewsApi>,
        auth: AuthHandle,
        store: Arc<dyn KeyValueStore>,
        notices: Arc<dyn NoticeSink>,
        config: DashboardConfig,
    ) -> Self {
        let dark_mode = store.get_bool(keys::DARK_MODE).unwrap_or(false);
        let (state, _) = watch::channel(StockState::new(config.default_symbol.clone(), dark_mode));
        Self {
            stocks,
            news,
            auth,
            store,
            notices,
            config,
            state,
            generation: AtomicU64::new(0),
            watchlist_seq: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> StockState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StockState> {
        self.state.subscribe()
    }

    pub fn selected_symbol(&self) -> String {
        self.state.borrow().selected_symbol.clone()
    }

    /// Load everything the dashboard shows on first render
    pub async fn initialize(&self) -> Result<FetchOutcome> {
        futures::join!(
            self.load_popular_symbols(),
            self.load_trending_news(),
            self.load_watchlist(),
        );
        self.fetch_all().await
    }

    /// Select another symbol and fetch its data
    pub async fn change_symbol(&self, symbol: &str) -> Result<FetchOutcome> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Ok(FetchOutcome::Unchanged);
        }

        let changed = self.state.send_if_modified(|state| {
            if state.selected_symbol == symbol {
                false
            } else {
                state.selected_symbol.clone_from(&symbol);
                true
            }
        });
        if !changed {
            return Ok(FetchOutcome::Unchanged);
        }

        info!(symbol = %symbol, "Symbol selected");
        self.fetch_all().await
    }

    /// Select another timeframe and refresh according to the configured policy
    pub async fn set_timeframe(&self, timeframe: Timeframe) -> Result<FetchOutcome> {
        let changed = self.state.send_if_modified(|state| {
            if state.timeframe == timeframe {
                false
            } else {
                state.timeframe = timeframe;
                true
            }
        });
        if !changed {
            return Ok(FetchOutcome::Unchanged);
        }

        info!(timeframe = %timeframe, "Timeframe selected");
        match self.config.timeframe_refresh {
            TimeframeRefresh::FullBundle => self.fetch_all().await,
            TimeframeRefresh::HistoricalOnly => self.refresh_historical().await,
        }
    }

    /// Fetch quote, history, fundamentals, and news for the current selection
    ///
    /// The four requests run concurrently and succeed or fail together; on
    /// failure the previous snapshot stays in place.
    pub async fn fetch_all(&self) -> Result<FetchOutcome> {
        let ticket = self.issue_ticket();
        debug!(symbol = %ticket.symbol, generation = ticket.generation, "Fetching stock data");
        let result = self.fetch_bundle(&ticket).await.map(Payload::Bundle);
        self.apply(&ticket, result)
    }

    /// Re-fetch the current selection
    pub async fn refresh(&self) -> Result<FetchOutcome> {
        self.fetch_all().await
    }

    async fn refresh_historical(&self) -> Result<FetchOutcome> {
        let has_snapshot = {
            let state = self.state.borrow();
            state
                .snapshot
                .as_ref()
                .is_some_and(|snapshot| snapshot.symbol == state.selected_symbol)
        };
        if !has_snapshot {
            return self.fetch_all().await;
        }

        let ticket = self.issue_ticket();
        let request = HistoricalRequest::new(ticket.symbol.clone(), ticket.timeframe.interval());
        let result = self.stocks.historical(&request).await.map(Payload::Series);
        self.apply(&ticket, result)
    }

    fn issue_ticket(&self) -> FetchTicket {
        let mut ticket = FetchTicket::default();
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            ticket = FetchTicket {
                symbol: state.selected_symbol.clone(),
                timeframe: state.timeframe,
                generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            };
        });
        ticket
    }

    async fn fetch_bundle(&self, ticket: &FetchTicket) -> dash_api::Result<StockSnapshot> {
        let request = HistoricalRequest::new(ticket.symbol.clone(), ticket.timeframe.interval());
        let (quote, historical, financials, news) = futures::try_join!(
            self.stocks.quote(&ticket.symbol),
            self.stocks.historical(&request),
            self.stocks.financials(&ticket.symbol),
            self.news.by_symbol(&ticket.symbol, self.config.symbol_news_limit),
        )?;

        Ok(StockSnapshot {
            symbol: ticket.symbol.clone(),
            timeframe: ticket.timeframe,
            quote,
            historical,
            financials,
            news,
            fetched_at: Utc::now(),
        })
    }

    fn apply(&self, ticket: &FetchTicket, result: dash_api::Result<Payload>) -> Result<FetchOutcome> {
        let mut applied = false;
        let mut failure = None;

        self.state.send_if_modified(|state| {
            let latest = self.generation.load(Ordering::SeqCst);
            if ticket.generation != latest || !ticket.matches(state) {
                return false;
            }

            applied = true;
            state.loading = false;
            match result {
                Ok(Payload::Bundle(snapshot)) => {
                    state.last_updated = Some(snapshot.fetched_at);
                    state.snapshot = Some(snapshot);
                }
                Ok(Payload::Series(series)) => {
                    if let Some(snapshot) = state.snapshot.as_mut() {
                        snapshot.historical = series;
                        snapshot.timeframe = ticket.timeframe;
                        snapshot.fetched_at = Utc::now();
                        state.last_updated = Some(snapshot.fetched_at);
                    }
                }
                Err(e) => {
                    state.error = Some(FETCH_FAILED.to_string());
                    failure = Some(e);
                }
            }
            true
        });

        if !applied {
            debug!(
                symbol = %ticket.symbol,
                generation = ticket.generation,
                "Discarding superseded stock data"
            );
            return Ok(FetchOutcome::Superseded);
        }

        match failure {
            Some(e) => {
                error!(symbol = %ticket.symbol, "Stock data fetch failed: {}", e);
                Err(Error::request(FETCH_FAILED, e))
            }
            None => {
                info!(symbol = %ticket.symbol, timeframe = %ticket.timeframe, "Stock data updated");
                Ok(FetchOutcome::Applied)
            }
        }
    }

    /// Price points for the chart, windowed by the selected timeframe
    pub fn chart_series(&self) -> Vec<PricePoint> {
        let state = self.state.borrow();
        state
            .snapshot
            .as_ref()
            .map(|snapshot| timeframe::chart_window(&snapshot.historical, state.timeframe, Utc::now()))
            .unwrap_or_default()
    }

    /// Look up symbols; failures yield no results
    pub async fn search_stocks(&self, query: &str) -> Vec<SymbolInfo> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.stocks.search(query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query, "Symbol search failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Load the popular symbol list, falling back to a fixed one
    pub async fn load_popular_symbols(&self) -> Vec<SymbolInfo> {
        let symbols = match self.stocks.popular().await {
            Ok(symbols) if !symbols.is_empty() => symbols,
            Ok(_) => popular_fallback(),
            Err(e) => {
                warn!("Failed to load popular symbols, using defaults: {}", e);
                popular_fallback()
            }
        };

        self.state.send_modify(|state| state.available_symbols.clone_from(&symbols));
        symbols
    }

    /// Load trending news; failures yield no articles
    pub async fn load_trending_news(&self) -> Vec<NewsArticle> {
        let articles = self.news.trending().await.unwrap_or_else(|e| {
            warn!("Failed to load trending news: {}", e);
            Vec::new()
        });

        self.state.send_modify(|state| state.trending_news.clone_from(&articles));
        articles
    }

    /// Replace the local watchlist with the server's
    pub async fn load_watchlist(&self) -> BTreeSet<String> {
        if !self.auth.is_authenticated() {
            return self.state.borrow().watchlist.clone();
        }

        match self.stocks.watchlist().await {
            Ok(symbols) => {
                let watchlist: BTreeSet<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();
                debug!(count = watchlist.len(), "Watchlist loaded");
                self.state.send_modify(|state| state.watchlist.clone_from(&watchlist));
                watchlist
            }
            Err(e) => {
                warn!("Failed to load watchlist: {}", e);
                self.state.borrow().watchlist.clone()
            }
        }
    }

    /// Quotes for every watchlist symbol; failures yield none
    pub async fn watchlist_quotes(&self) -> Vec<Quote> {
        let symbols: Vec<String> = self.state.borrow().watchlist.iter().cloned().collect();
        if symbols.is_empty() {
            return Vec::new();
        }

        self.stocks.batch_quotes(&symbols).await.unwrap_or_else(|e| {
            warn!("Failed to load watchlist quotes: {}", e);
            Vec::new()
        })
    }

    /// Quotes for the leading popular symbols, largest market cap first
    pub async fn popular_quotes(&self) -> Vec<Quote> {
        let mut symbols: Vec<String> = self
            .state
            .borrow()
            .available_symbols
            .iter()
            .take(POPULAR_QUOTE_LIMIT)
            .map(|info| info.symbol.clone())
            .collect();
        if symbols.is_empty() {
            symbols = self
                .load_popular_symbols()
                .await
                .into_iter()
                .take(POPULAR_QUOTE_LIMIT)
                .map(|info| info.symbol)
                .collect();
        }

        let mut quotes = self.stocks.batch_quotes(&symbols).await.unwrap_or_else(|e| {
            warn!("Failed to load popular quotes: {}", e);
            Vec::new()
        });
        quotes.sort_by(|a, b| {
            b.market_cap
                .unwrap_or(0.0)
                .total_cmp(&a.market_cap.unwrap_or(0.0))
        });
        quotes
    }

    pub fn is_in_watchlist(&self, symbol: &str) -> bool {
        self.state.borrow().watchlist.contains(&normalize_symbol(symbol))
    }

    /// Add a symbol to the watchlist
    ///
    /// The symbol shows up immediately and stays pending until the backend
    /// confirms; a rejected add is taken back out.
    pub async fn add_to_watchlist(&self, symbol: &str) -> Result<()> {
        self.require_auth()?;
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(symbol_required());
        }

        let op = self.begin_watchlist_op(&symbol);
        let mut already_present = false;
        self.state.send_modify(|state| {
            already_present = !state.watchlist.insert(symbol.clone());
        });

        let result = self.stocks.add_to_watchlist(&symbol).await;
        self.finish_watchlist_op(&symbol, op, |state| {
            if result.is_err() && !already_present {
                state.watchlist.remove(&symbol);
            }
        });

        match result {
            Ok(()) => {
                info!(symbol = %symbol, "Added to watchlist");
                self.notices.success(&format!("Added {symbol} to watchlist"));
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to add {symbol} to watchlist");
                warn!("{}: {}", message, e);
                self.notices.error(&message);
                Err(Error::request(message, e))
            }
        }
    }

    /// Remove a symbol from the watchlist; a rejected removal is restored
    pub async fn remove_from_watchlist(&self, symbol: &str) -> Result<()> {
        self.require_auth()?;
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(symbol_required());
        }

        let op = self.begin_watchlist_op(&symbol);
        let mut was_present = false;
        self.state.send_modify(|state| {
            was_present = state.watchlist.remove(&symbol);
        });

        let result = self.stocks.remove_from_watchlist(&symbol).await;
        self.finish_watchlist_op(&symbol, op, |state| {
            if result.is_err() && was_present {
                state.watchlist.insert(symbol.clone());
            }
        });

        match result {
            Ok(()) => {
                info!(symbol = %symbol, "Removed from watchlist");
                self.notices.success(&format!("Removed {symbol} from watchlist"));
                Ok(())
            }
            Err(e) => {
                let message = format!("Failed to remove {symbol} from watchlist");
                warn!("{}: {}", message, e);
                self.notices.error(&message);
                Err(Error::request(message, e))
            }
        }
    }

    /// Flip the dark-mode preference and persist it
    pub fn toggle_dark_mode(&self) -> Result<bool> {
        let enabled = !self.state.borrow().dark_mode;
        self.store.set_bool(keys::DARK_MODE, enabled)?;
        self.state.send_modify(|state| state.dark_mode = enabled);
        Ok(enabled)
    }

    fn begin_watchlist_op(&self, symbol: &str) -> u64 {
        let op = self.watchlist_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.watchlist_ops.insert(symbol.to_string(), op);
            state.pending_watchlist.insert(symbol.to_string());
        });
        op
    }

    /// Settle `op`; only the newest operation on a symbol may touch it
    fn finish_watchlist_op(&self, symbol: &str, op: u64, settle: impl FnOnce(&mut StockState)) {
        self.state.send_if_modified(|state| {
            if state.watchlist_ops.get(symbol) != Some(&op) {
                debug!(symbol, op, "Watchlist change superseded");
                return false;
            }
            state.watchlist_ops.remove(symbol);
            state.pending_watchlist.remove(symbol);
            settle(state);
            true
        });
    }

    fn require_auth(&self) -> Result<()> {
        if self.auth.is_authenticated() {
            Ok(())
        } else {
            self.notices.warning(LOGIN_REQUIRED);
            Err(Error::AuthRequired(LOGIN_REQUIRED.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMarket, auth_handle, services_env};
    use dash_api::{MockNewsApi, MockStockApi};
    use dash_core::MemoryStore;

    #[tokio::test]
    async fn test_fetch_all_applies_bundle() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        let outcome = service.fetch_all().await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied);

        let state = service.state();
        let snapshot = state.snapshot.unwrap();
        assert_eq!(snapshot.symbol, "IBM");
        assert_eq!(snapshot.quote.symbol, "IBM");
        assert_eq!(snapshot.financials.company_name, "IBM Corp");
        assert_eq!(snapshot.news.len(), 1);
        assert!(!state.loading);
        assert_eq!(state.last_updated, Some(snapshot.fetched_at));

        let calls = market.calls();
        assert!(calls.contains(&"historical:IBM:1d".to_string()));
        assert!(calls.contains(&"news:IBM:10".to_string()));
    }

    #[tokio::test]
    async fn test_slow_response_for_old_symbol_is_discarded() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        market.gate("MSFT");
        market.gate("GOOG");
        let (_auth, handle) = auth_handle(false);
        let service = Arc::new(env.market(&market, handle));

        let first = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.change_symbol("MSFT").await }
        });
        market.wait_for_call("quote:MSFT").await;

        let second = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.change_symbol("GOOG").await }
        });
        market.wait_for_call("quote:GOOG").await;

        market.release("GOOG");
        assert_eq!(second.await.unwrap().unwrap(), FetchOutcome::Applied);

        market.release("MSFT");
        assert_eq!(first.await.unwrap().unwrap(), FetchOutcome::Superseded);

        let state = service.state();
        assert_eq!(state.selected_symbol, "GOOG");
        assert_eq!(state.snapshot.unwrap().symbol, "GOOG");
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_latest_selection_wins_in_any_completion_order() {
        let symbols = ["AAA", "BBB", "CCC", "DDD"];
        let orders: [[usize; 4]; 3] = [[3, 2, 1, 0], [0, 1, 2, 3], [2, 0, 3, 1]];

        for order in orders {
            let env = services_env(MemoryStore::new());
            let market = FakeMarket::new();
            let (_auth, handle) = auth_handle(false);
            let service = Arc::new(env.market(&market, handle));

            let mut tasks = Vec::new();
            for symbol in symbols {
                market.gate(symbol);
                let service_ref = Arc::clone(&service);
                tasks.push(tokio::spawn(async move { service_ref.change_symbol(symbol).await }));
                market.wait_for_call(&format!("quote:{symbol}")).await;
            }

            for index in order {
                market.release(symbols[index]);
            }

            let mut outcomes = Vec::new();
            for task in tasks {
                outcomes.push(task.await.unwrap().unwrap());
            }

            assert_eq!(
                outcomes,
                vec![
                    FetchOutcome::Superseded,
                    FetchOutcome::Superseded,
                    FetchOutcome::Superseded,
                    FetchOutcome::Applied,
                ],
                "completion order {order:?}"
            );
            assert_eq!(service.state().snapshot.unwrap().symbol, "DDD");
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        market.fail_financials("BAD");
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        service.fetch_all().await.unwrap();
        let before = service.state().snapshot.unwrap();

        let err = service.change_symbol("BAD").await.unwrap_err();
        assert_eq!(err.to_string(), FETCH_FAILED);

        let state = service.state();
        assert_eq!(state.selected_symbol, "BAD");
        assert_eq!(state.snapshot, Some(before));
        assert_eq!(state.error.as_deref(), Some(FETCH_FAILED));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_change_symbol_same_or_blank_is_noop() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        assert_eq!(service.change_symbol(" ibm ").await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(service.change_symbol("   ").await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(market.count("quote:"), 0);
    }

    #[tokio::test]
    async fn test_timeframe_change_refetches_bundle() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        let outcome = service.set_timeframe(Timeframe::OneWeek).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Applied);
        assert!(market.calls().contains(&"historical:IBM:1wk".to_string()));
        assert_eq!(market.count("quote:"), 1);

        let outcome = service.set_timeframe(Timeframe::OneWeek).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Unchanged);
        assert_eq!(market.count("quote:"), 1);
    }

    #[tokio::test]
    async fn test_timeframe_change_historical_only() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let config = DashboardConfig::builder()
            .timeframe_refresh(TimeframeRefresh::HistoricalOnly)
            .build()
            .unwrap();
        let service = env.stocks(market.clone(), market.clone(), handle, config);

        service.fetch_all().await.unwrap();
        let outcome = service.set_timeframe(Timeframe::OneYear).await.unwrap();

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(market.count("quote:"), 1);
        assert_eq!(market.count("financials:"), 1);
        assert!(market.calls().contains(&"historical:IBM:1mo".to_string()));

        let snapshot = service.state().snapshot.unwrap();
        assert_eq!(snapshot.timeframe, Timeframe::OneYear);
        assert_eq!(snapshot.symbol, "IBM");
    }

    #[tokio::test]
    async fn test_unauthenticated_watchlist_add_makes_no_call() {
        let env = services_env(MemoryStore::new());
        let mut stocks = MockStockApi::new();
        stocks.expect_add_to_watchlist().never();
        let (_auth, handle) = auth_handle(false);
        let service = env.stocks(
            Arc::new(stocks),
            Arc::new(MockNewsApi::new()),
            handle,
            DashboardConfig::default(),
        );

        let err = service.add_to_watchlist("TSLA").await.unwrap_err();

        assert!(matches!(err, Error::AuthRequired(_)));
        assert!(env.notices.contains(LOGIN_REQUIRED));
        assert!(!service.is_in_watchlist("TSLA"));
    }

    #[tokio::test]
    async fn test_watchlist_add_and_remove() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(true);
        let service = env.market(&market, handle);

        service.add_to_watchlist("tsla").await.unwrap();
        assert!(service.is_in_watchlist("TSLA"));
        assert!(market.server_watchlist().contains("TSLA"));
        assert!(service.state().pending_watchlist.is_empty());
        assert!(env.notices.contains("Added TSLA to watchlist"));

        service.remove_from_watchlist("TSLA").await.unwrap();
        assert!(!service.is_in_watchlist("TSLA"));
        assert!(market.server_watchlist().is_empty());
        assert!(env.notices.contains("Removed TSLA from watchlist"));
    }

    #[tokio::test]
    async fn test_rejected_watchlist_changes_are_rolled_back() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        market.seed_watchlist(&["AAPL"]);
        let (_auth, handle) = auth_handle(true);
        let service = env.market(&market, handle);

        service.load_watchlist().await;
        market.reject_watchlist_changes();

        assert!(service.add_to_watchlist("NVDA").await.is_err());
        assert!(!service.is_in_watchlist("NVDA"));
        assert!(env.notices.contains("Failed to add NVDA to watchlist"));

        assert!(service.remove_from_watchlist("AAPL").await.is_err());
        assert!(service.is_in_watchlist("AAPL"));
        assert!(env.notices.contains("Failed to remove AAPL from watchlist"));
        assert!(service.state().pending_watchlist.is_empty());
    }

    #[tokio::test]
    async fn test_older_failed_add_does_not_undo_newer_success() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(true);
        let service = Arc::new(env.market(&market, handle));

        market.gate("watch:NVDA");
        market.reject_watchlist_changes();
        let first = tokio::spawn({
            let service = service.clone();
            async move { service.add_to_watchlist("NVDA").await }
        });
        market.wait_for_call("watch:NVDA").await;
        assert!(service.state().pending_watchlist.contains("NVDA"));

        let held = market.take_gate("watch:NVDA");
        market.accept_watchlist_changes();
        service.add_to_watchlist("NVDA").await.unwrap();
        assert!(service.state().pending_watchlist.is_empty());

        held.add_permits(1);
        assert!(first.await.unwrap().is_err());

        assert!(service.is_in_watchlist("NVDA"));
        assert!(market.server_watchlist().contains("NVDA"));
        assert!(service.state().pending_watchlist.is_empty());
    }

    #[tokio::test]
    async fn test_newer_failed_remove_restores_symbol() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(true);
        let service = Arc::new(env.market(&market, handle));

        market.gate("watch:AMD");
        let add = tokio::spawn({
            let service = service.clone();
            async move { service.add_to_watchlist("AMD").await }
        });
        market.wait_for_call("watch:AMD").await;

        market.reject_watchlist_changes();
        assert!(service.remove_from_watchlist("AMD").await.is_err());
        assert!(service.is_in_watchlist("AMD"));

        market.release("watch:AMD");
        assert!(add.await.unwrap().is_ok());
        assert!(service.is_in_watchlist("AMD"));
        assert!(service.state().pending_watchlist.is_empty());
    }

    #[tokio::test]
    async fn test_popular_quotes_sorted_by_market_cap() {
        let env = services_env(MemoryStore::new());
        let mut stocks = MockStockApi::new();
        stocks
            .expect_popular()
            .times(1)
            .returning(|| Ok(vec![SymbolInfo::new("AAPL", "Apple"), SymbolInfo::new("NVDA", "NVIDIA")]));
        stocks
            .expect_batch_quotes()
            .withf(|symbols: &[String]| symbols == ["AAPL", "NVDA"])
            .times(1)
            .returning(|symbols| {
                Ok(symbols
                    .iter()
                    .map(|s| {
                        let mut quote = crate::testing::quote_for(s);
                        quote.market_cap = Some(if s == "NVDA" { 3.0e12 } else { 2.5e12 });
                        quote
                    })
                    .collect())
            });
        let (_auth, handle) = auth_handle(false);
        let service = env.stocks(
            Arc::new(stocks),
            Arc::new(MockNewsApi::new()),
            handle,
            DashboardConfig::default(),
        );

        let quotes = service.popular_quotes().await;
        let symbols: Vec<&str> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NVDA", "AAPL"]);
        assert_eq!(service.state().available_symbols.len(), 2);
    }

    #[tokio::test]
    async fn test_popular_quotes_use_first_ten_known_symbols() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        service.load_popular_symbols().await;
        assert_eq!(service.popular_quotes().await.len(), 10);
        assert_eq!(market.count("popular"), 1);
        assert_eq!(market.count("batch:AAPL,MSFT"), 1);
    }

    #[tokio::test]
    async fn test_initialize_loads_everything() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        market.seed_watchlist(&["AAPL", "MSFT"]);
        let (_auth, handle) = auth_handle(true);
        let service = env.market(&market, handle);

        assert_eq!(service.initialize().await.unwrap(), FetchOutcome::Applied);

        let state = service.state();
        assert_eq!(state.available_symbols, popular_fallback());
        assert_eq!(state.available_symbols[0].symbol, "AAPL");
        assert!(state.trending_news.is_empty());
        assert_eq!(state.watchlist.len(), 2);
        assert_eq!(state.snapshot.unwrap().symbol, "IBM");

        let quotes = service.watchlist_quotes().await;
        assert_eq!(quotes.len(), 2);
    }

    #[tokio::test]
    async fn test_loaded_watchlist_marks_shown_symbol() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        market.seed_watchlist(&["IBM"]);
        let (_auth, handle) = auth_handle(true);
        let service = env.market(&market, handle);

        service.fetch_all().await.unwrap();
        assert!(!service.is_in_watchlist("IBM"));

        service.load_watchlist().await;
        let snapshot = service.state().snapshot.unwrap();
        assert!(service.is_in_watchlist(&snapshot.symbol));
    }

    #[tokio::test]
    async fn test_watchlist_not_loaded_when_logged_out() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        market.seed_watchlist(&["AAPL"]);
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        assert!(service.load_watchlist().await.is_empty());
        assert_eq!(market.count("watchlist"), 0);
    }

    #[tokio::test]
    async fn test_search_ignores_blank_query() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        assert!(service.search_stocks("  ").await.is_empty());
        assert_eq!(market.count("search:"), 0);

        let results = service.search_stocks("app").await;
        assert_eq!(results[0].symbol, "APP");
    }

    #[tokio::test]
    async fn test_dark_mode_is_persisted() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle.clone());

        assert!(!service.state().dark_mode);
        assert!(service.toggle_dark_mode().unwrap());
        assert_eq!(env.store.get_bool(keys::DARK_MODE), Some(true));

        let reopened = env.market(&market, handle);
        assert!(reopened.state().dark_mode);
    }

    #[tokio::test]
    async fn test_chart_series_uses_snapshot_history() {
        let env = services_env(MemoryStore::new());
        let market = FakeMarket::new();
        let (_auth, handle) = auth_handle(false);
        let service = env.market(&market, handle);

        assert!(service.chart_series().is_empty());
        service.fetch_all().await.unwrap();
        assert_eq!(service.chart_series().len(), 1);
    }
}

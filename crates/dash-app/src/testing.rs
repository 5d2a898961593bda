//! Shared fixtures for service tests

use crate::auth::{AuthHandle, AuthService, AuthState, AuthStatus};
use crate::chat::ChatService;
use crate::config::DashboardConfig;
use crate::stock::StockService;
use async_trait::async_trait;
use dash_api::{
    ApiError, AuthApi, ChatApi, Financials, HistoricalRequest, NewsApi, NewsArticle, PricePoint,
    Quote, Result, StockApi, SymbolInfo, User,
};
use dash_core::{MemoryStore, NoticeLog, Route, RouteTracker};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};

pub(crate) fn sample_user() -> User {
    User {
        id: "u1".to_string(),
        email: "a@b.co".to_string(),
        username: "alice".to_string(),
        first_name: None,
        last_name: None,
    }
}

/// Auth state that tests flip directly
pub(crate) fn auth_handle(authenticated: bool) -> (watch::Sender<AuthState>, AuthHandle) {
    let status = if authenticated {
        AuthStatus::Authenticated(sample_user())
    } else {
        AuthStatus::Unauthenticated
    };
    let (tx, rx) = watch::channel(AuthState {
        status,
        ..AuthState::default()
    });
    (tx, AuthHandle::new(rx))
}

pub(crate) struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RouteTracker>,
    pub notices: Arc<NoticeLog>,
}

pub(crate) fn services_env(store: MemoryStore) -> TestEnv {
    TestEnv {
        store: Arc::new(store),
        navigator: Arc::new(RouteTracker::new(Route::Profile)),
        notices: Arc::new(NoticeLog::new()),
    }
}

impl TestEnv {
    pub fn auth(&self, api: impl AuthApi + 'static) -> AuthService {
        AuthService::new(
            Arc::new(api),
            self.store.clone(),
            self.navigator.clone(),
            self.notices.clone(),
        )
    }

    pub fn stocks(
        &self,
        stocks: Arc<dyn StockApi>,
        news: Arc<dyn NewsApi>,
        auth: AuthHandle,
        config: DashboardConfig,
    ) -> StockService {
        StockService::new(stocks, news, auth, self.store.clone(), self.notices.clone(), config)
    }

    pub fn market(&self, market: &Arc<FakeMarket>, auth: AuthHandle) -> StockService {
        self.stocks(market.clone(), market.clone(), auth, DashboardConfig::default())
    }

    pub fn chat(&self, api: impl ChatApi + 'static, auth: AuthHandle) -> ChatService {
        ChatService::new(Arc::new(api), auth)
    }
}

pub(crate) fn quote_for(symbol: &str) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price: symbol.len() as f64 * 10.0,
        change: 1.5,
        change_percent: 0.75,
        volume: Some(1_000_000),
        market_cap: None,
        pe_ratio: None,
        timestamp: None,
    }
}

pub(crate) fn financials_for(symbol: &str) -> Financials {
    Financials {
        symbol: symbol.to_string(),
        company_name: format!("{symbol} Corp"),
        sector: None,
        industry: None,
        market_cap: None,
        pe_ratio: Some(21.0),
        eps: None,
        dividend_yield: None,
        revenue: None,
        revenue_growth: None,
        profit_margin: None,
        debt_to_equity: None,
        price_to_book: None,
        rsi: None,
        beta: None,
        fifty_day_ma: None,
        two_hundred_day_ma: None,
    }
}

pub(crate) fn article_for(symbol: &str) -> NewsArticle {
    NewsArticle {
        id: Some(format!("{symbol}-1")),
        headline: format!("{symbol} beats estimates"),
        summary: None,
        source: "Wire".to_string(),
        url: None,
        image: None,
        symbol: Some(symbol.to_string()),
        date: None,
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        detail: None,
    }
}

/// In-memory market backend whose calls can be held open
///
/// Quotes are gated by symbol, watchlist changes by their call name
/// (`watch:SYM`, `unwatch:SYM`).
#[derive(Default)]
pub(crate) struct FakeMarket {
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    failing_financials: Mutex<HashSet<String>>,
    reject_watchlist: Mutex<bool>,
    watchlist: Mutex<BTreeSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeMarket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold calls under `key` until [`release`](Self::release)
    pub fn gate(&self, key: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(key) {
            gate.add_permits(1);
        }
    }

    /// Stop gating new calls under `key`; calls already held stay on the returned gate
    pub fn take_gate(&self, key: &str) -> Arc<Semaphore> {
        self.gates.lock().unwrap().remove(key).expect("no gate for key")
    }

    pub fn fail_financials(&self, symbol: &str) {
        self.failing_financials.lock().unwrap().insert(symbol.to_string());
    }

    pub fn reject_watchlist_changes(&self) {
        *self.reject_watchlist.lock().unwrap() = true;
    }

    pub fn accept_watchlist_changes(&self) {
        *self.reject_watchlist.lock().unwrap() = false;
    }

    pub fn server_watchlist(&self) -> BTreeSet<String> {
        self.watchlist.lock().unwrap().clone()
    }

    pub fn seed_watchlist(&self, symbols: &[&str]) {
        let mut watchlist = self.watchlist.lock().unwrap();
        watchlist.extend(symbols.iter().map(ToString::to_string));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Yield until `call` has been recorded
    pub async fn wait_for_call(&self, call: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.calls().iter().any(|c| c == call) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("expected call was never made");
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn watchlist_rejected(&self) -> bool {
        *self.reject_watchlist.lock().unwrap()
    }

    async fn pass_gate(&self, key: &str) {
        let gate = self.gates.lock().unwrap().get(key).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }
    }
}

#[async_trait]
impl StockApi for FakeMarket {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.record(format!("quote:{symbol}"));
        self.pass_gate(symbol).await;
        Ok(quote_for(symbol))
    }

    async fn batch_quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        self.record(format!("batch:{}", symbols.join(",")));
        Ok(symbols.iter().map(|s| quote_for(s)).collect())
    }

    async fn historical(&self, request: &HistoricalRequest) -> Result<Vec<PricePoint>> {
        self.record(format!("historical:{}:{}", request.symbol, request.interval));
        Ok(vec![PricePoint {
            date: "2024-06-28".to_string(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10,
        }])
    }

    async fn financials(&self, symbol: &str) -> Result<Financials> {
        self.record(format!("financials:{symbol}"));
        if self.failing_financials.lock().unwrap().contains(symbol) {
            return Err(server_error());
        }
        Ok(financials_for(symbol))
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolInfo>> {
        self.record(format!("search:{query}"));
        Ok(vec![SymbolInfo::new(query.to_uppercase(), "Search Result Inc.")])
    }

    async fn popular(&self) -> Result<Vec<SymbolInfo>> {
        self.record("popular".to_string());
        Err(server_error())
    }

    async fn watchlist(&self) -> Result<Vec<String>> {
        self.record("watchlist".to_string());
        Ok(self.server_watchlist().into_iter().collect())
    }

    async fn replace_watchlist(&self, symbols: &[String]) -> Result<Vec<String>> {
        *self.watchlist.lock().unwrap() = symbols.iter().cloned().collect();
        Ok(symbols.to_vec())
    }

    async fn add_to_watchlist(&self, symbol: &str) -> Result<()> {
        let call = format!("watch:{symbol}");
        self.record(call.clone());
        let rejected = self.watchlist_rejected();
        self.pass_gate(&call).await;
        if rejected {
            return Err(server_error());
        }
        self.watchlist.lock().unwrap().insert(symbol.to_string());
        Ok(())
    }

    async fn remove_from_watchlist(&self, symbol: &str) -> Result<()> {
        let call = format!("unwatch:{symbol}");
        self.record(call.clone());
        let rejected = self.watchlist_rejected();
        self.pass_gate(&call).await;
        if rejected {
            return Err(server_error());
        }
        self.watchlist.lock().unwrap().remove(symbol);
        Ok(())
    }
}

#[async_trait]
impl NewsApi for FakeMarket {
    async fn latest(&self, _limit: u32, _offset: u32) -> Result<Vec<NewsArticle>> {
        Ok(Vec::new())
    }

    async fn by_symbol(&self, symbol: &str, limit: u32) -> Result<Vec<NewsArticle>> {
        self.record(format!("news:{symbol}:{limit}"));
        Ok(vec![article_for(symbol)])
    }

    async fn by_symbols(&self, symbols: &[String], _limit: u32) -> Result<Vec<NewsArticle>> {
        Ok(symbols.iter().map(|s| article_for(s)).collect())
    }

    async fn search(&self, _query: &str, _limit: u32) -> Result<Vec<NewsArticle>> {
        Ok(Vec::new())
    }

    async fn trending(&self) -> Result<Vec<NewsArticle>> {
        self.record("trending".to_string());
        Err(server_error())
    }

    async fn article(&self, id: &str) -> Result<NewsArticle> {
        Err(ApiError::Status {
            status: 404,
            detail: Some(format!("Article {id} not found")),
        })
    }
}

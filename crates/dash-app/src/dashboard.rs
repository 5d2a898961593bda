//! Service container for the dashboard
//!
//! [`Dashboard`] builds the API client once and hands it to every service,
//! registering the 401 handlers on the client after the auth service exists.

use crate::auth::{AuthService, AuthStatus};
use crate::chat::ChatService;
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::stock::StockService;
use dash_api::{ApiClient, ApiConfig, LoginRedirect};
use dash_core::{KeyValueStore, MemoryStore, Navigator, NoticeSink, RouteTracker, TracingNotices};
use std::sync::Arc;
use tracing::{info, warn};

/// The wired-up dashboard: one client, three services
///
/// # Example
///
/// ```no_run
/// use dash_app::{Dashboard, DashboardConfig};
/// use dash_api::ApiConfig;
///
/// # async fn example() -> dash_app::Result<()> {
/// let dashboard = Dashboard::builder()
///     .api_config(ApiConfig::builder().base_url("https://dash.example.com/api").build()?)
///     .config(DashboardConfig::builder().default_symbol("AAPL").build()?)
///     .build()?;
///
/// dashboard.start().await;
/// # Ok(())
/// # }
/// ```
pub struct Dashboard {
    client: ApiClient,
    store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    notices: Arc<dyn NoticeSink>,
    config: DashboardConfig,
    auth: Arc<AuthService>,
    stocks: Arc<StockService>,
    chat: Arc<ChatService>,
}

impl Dashboard {
    /// Create a new dashboard builder
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::new()
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn notices(&self) -> &Arc<dyn NoticeSink> {
        &self.notices
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn stocks(&self) -> &Arc<StockService> {
        &self.stocks
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    /// Resolve the session, then load the dashboard and the chat sessions
    ///
    /// A failed stock fetch is left in the stock state; it does not abort
    /// startup.
    pub async fn start(&self) -> AuthStatus {
        let status = self.auth.check_auth().await;
        info!(authenticated = matches!(status, AuthStatus::Authenticated(_)), "Session checked");

        let (stocks, _) = futures::join!(self.stocks.initialize(), self.chat.list_sessions());
        if let Err(e) = stocks {
            warn!("Initial stock data load failed: {}", e);
        }

        status
    }
}

/// Builder for Dashboard
///
/// Anything left unset falls back to: configuration from the environment, an
/// in-memory store, a navigator that only tracks the route, and notices
/// written to the log.
#[derive(Default)]
pub struct DashboardBuilder {
    api_config: Option<ApiConfig>,
    config: Option<DashboardConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    notices: Option<Arc<dyn NoticeSink>>,
}

impl DashboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API client configuration
    pub fn api_config(mut self, config: ApiConfig) -> Self {
        self.api_config = Some(config);
        self
    }

    /// Set the dashboard configuration
    pub fn config(mut self, config: DashboardConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set where the token and preferences are kept
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn notices(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Build the client and services
    pub fn build(self) -> Result<Dashboard> {
        let api_config = match self.api_config {
            Some(config) => config,
            None => ApiConfig::from_env()?,
        };
        let config = match self.config {
            Some(config) => config,
            None => DashboardConfig::from_env()?,
        };
        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let navigator: Arc<dyn Navigator> = match self.navigator {
            Some(navigator) => navigator,
            None => Arc::new(RouteTracker::default()),
        };
        let notices: Arc<dyn NoticeSink> = match self.notices {
            Some(notices) => notices,
            None => Arc::new(TracingNotices),
        };

        let client = ApiClient::new(api_config, Arc::clone(&store))?;
        let api = Arc::new(client.clone());

        let auth = Arc::new(AuthService::new(
            api.clone(),
            Arc::clone(&store),
            Arc::clone(&navigator),
            Arc::clone(&notices),
        ));
        client.on_unauthorized(auth.expiry_handler());
        client.on_unauthorized(Arc::new(LoginRedirect::new(Arc::clone(&navigator))));

        let stocks = Arc::new(StockService::new(
            api.clone(),
            api.clone(),
            auth.handle(),
            Arc::clone(&store),
            Arc::clone(&notices),
            config.clone(),
        ));
        let chat = Arc::new(ChatService::new(api, auth.handle()));

        info!(base_url = %client.base_url(), "Dashboard ready");

        Ok(Dashboard {
            client,
            store,
            navigator,
            notices,
            config,
            auth,
            stocks,
            chat,
        })
    }
}

//! HTTP client adapter
//!
//! Every backend call goes through [`ApiClient::execute`], which is the single
//! place where the bearer token is attached and where 401 responses are
//! intercepted: the stored token is removed and every registered
//! [`UnauthorizedHandler`] is told the session is gone.

use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use dash_core::{KeyValueStore, Navigator, Route, keys};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};
use url::Url;

/// Reaction to a 401 from any endpoint
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self);
}

/// Sends the user to the login view unless they are already there
pub struct LoginRedirect {
    navigator: Arc<dyn Navigator>,
}

impl LoginRedirect {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self { navigator }
    }
}

impl UnauthorizedHandler for LoginRedirect {
    fn on_unauthorized(&self) {
        if self.navigator.current() != Route::Login {
            self.navigator.navigate(Route::Login);
        }
    }
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    store: Arc<dyn KeyValueStore>,
    handlers: RwLock<Vec<Arc<dyn UnauthorizedHandler>>>,
}

/// Client for the dashboard backend
///
/// Cheap to clone; clones share the connection pool, the token store, and
/// the registered 401 handlers.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client reading its bearer token from `store`
    pub fn new(config: ApiConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                store,
                handlers: RwLock::new(Vec::new()),
            }),
        })
    }

    /// Base URL all endpoints hang off
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Store the bearer token is read from
    pub fn token_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    /// Register a handler to run whenever the backend answers 401
    pub fn on_unauthorized(&self, handler: Arc<dyn UnauthorizedHandler>) {
        if let Ok(mut handlers) = self.inner.handlers.write() {
            handlers.push(handler);
        }
    }

    /// Build the URL for an endpoint from its path segments
    ///
    /// Segments are percent-encoded, so symbols like `BRK/B` stay one segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                ApiError::Config(format!(
                    "base_url '{}' cannot be used as a base",
                    self.inner.base_url
                ))
            })?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!("{} {}", method, url);

        let mut builder = self.inner.http.request(method, url);
        if let Some(token) = self.inner.store.get(keys::TOKEN) {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    /// Send a request, running the 401 interceptor and status mapping
    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized();
            return Err(ApiError::Unauthorized { detail });
        }

        debug!("Backend answered {}: {:?}", status, detail);
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    fn handle_unauthorized(&self) {
        warn!("Backend rejected credentials, clearing stored token");
        if let Err(e) = self.inner.store.remove(keys::TOKEN) {
            warn!("Failed to clear stored token: {}", e);
        }

        let handlers = self
            .inner
            .handlers
            .read()
            .map(|handlers| handlers.clone())
            .unwrap_or_default();
        for handler in handlers {
            handler.on_unauthorized();
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let response = self.execute(self.request(Method::GET, segments)?).await?;
        Self::decode(response).await
    }

    pub(crate) async fn get_with_query<T, Q>(&self, segments: &[&str], query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let builder = self.request(Method::GET, segments)?.query(query);
        let response = self.execute(builder).await?;
        Self::decode(response).await
    }

    pub(crate) async fn send_json<B, T>(&self, method: Method, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, segments)?.json(body);
        let response = self.execute(builder).await?;
        Self::decode(response).await
    }

    /// Send a bodiless request whose response body is irrelevant
    pub(crate) async fn send_empty(&self, method: Method, segments: &[&str]) -> Result<()> {
        self.execute(self.request(method, segments)?).await?;
        Ok(())
    }

    /// Send a JSON body, ignoring the response body
    pub(crate) async fn send_json_discard<B>(&self, method: Method, segments: &[&str], body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(self.request(method, segments)?.json(body)).await?;
        Ok(())
    }
}

/// Pull the human-readable `detail` out of an error body
///
/// The backend uses `{"detail": "..."}` for handled errors and
/// `{"detail": [{"msg": "...", ...}]}` for request validation failures.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(str::to_string),
        _ => None,
    }
}

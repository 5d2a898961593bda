//! Navigation between dashboard views
//!
//! Routing is owned by the host shell. Services only need to ask where the
//! user currently is and to send them somewhere else (e.g. back to the login
//! view after the session expires).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use tracing::debug;

/// Views the services may navigate to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Register,
    ForgotPassword,
    Dashboard,
    News,
    Chatbot,
    Profile,
}

impl Route {
    /// Path the view is served under
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::ForgotPassword => "/forgot-password",
            Self::Dashboard => "/dashboard",
            Self::News => "/news",
            Self::Chatbot => "/chatbot",
            Self::Profile => "/profile",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Host-provided navigation
pub trait Navigator: Send + Sync {
    /// The view currently shown
    fn current(&self) -> Route;

    /// Switch to another view
    fn navigate(&self, route: Route);
}

/// Navigator that only records where the user is
///
/// Used by headless shells (the CLI) and tests.
#[derive(Debug)]
pub struct RouteTracker {
    state: RwLock<(Route, Vec<Route>)>,
}

impl RouteTracker {
    pub fn new(initial: Route) -> Self {
        Self {
            state: RwLock::new((initial, Vec::new())),
        }
    }

    /// Every route navigated to, oldest first
    pub fn history(&self) -> Vec<Route> {
        self.state
            .read()
            .map(|state| state.1.clone())
            .unwrap_or_default()
    }
}

impl Default for RouteTracker {
    fn default() -> Self {
        Self::new(Route::Dashboard)
    }
}

impl Navigator for RouteTracker {
    fn current(&self) -> Route {
        self.state
            .read()
            .map(|state| state.0)
            .unwrap_or(Route::Dashboard)
    }

    fn navigate(&self, route: Route) {
        debug!("Navigating to {}", route);
        if let Ok(mut state) = self.state.write() {
            state.0 = route;
            state.1.push(route);
        }
    }
}

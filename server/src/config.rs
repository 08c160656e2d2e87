//! Server configuration

use axum::http::{header, HeaderValue, Method};
use shared::{DEFAULT_GRID_SIZE, DEFAULT_PORT};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};

/// Cross-origin policy for HTTP requests and WebSocket upgrades
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigin {
    /// Any origin may connect
    Any,
    /// Only this exact origin, e.g. `https://grid.example.com`
    Exact(HeaderValue),
}

impl CorsOrigin {
    /// Parses a configured origin. `*` (or an empty value) means unrestricted.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.is_empty() || value == "*" {
            return Ok(Self::Any);
        }
        HeaderValue::from_str(value)
            .map(Self::Exact)
            .map_err(|e| format!("invalid origin {value:?}: {e}"))
    }

    /// Whether a WebSocket upgrade carrying this `Origin` header is allowed.
    ///
    /// Requests without an `Origin` header come from non-browser clients and
    /// are always allowed.
    pub fn allows(&self, origin: Option<&HeaderValue>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (_, None) => true,
            (Self::Exact(allowed), Some(origin)) => allowed == origin,
        }
    }

    pub fn layer(&self) -> CorsLayer {
        let layer = CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);

        match self {
            Self::Any => layer.allow_origin(Any),
            Self::Exact(origin) => layer.allow_origin(origin.clone()),
        }
    }
}

impl Default for CorsOrigin {
    fn default() -> Self {
        Self::Any
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind to
    pub host: String,
    pub port: u16,
    /// Grid side length; the grid has `grid_size²` cells
    pub grid_size: usize,
    pub cors_origin: CorsOrigin,
    /// Snapshot file holding the persisted grid
    pub state_path: PathBuf,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            grid_size: DEFAULT_GRID_SIZE,
            cors_origin: CorsOrigin::Any,
            state_path: PathBuf::from("grid_state.json"),
        }
    }
}

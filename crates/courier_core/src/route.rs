//! Route resolution against an external directions provider.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{Route, RouteRequest},
    error::DeliveryError,
    protocol::DirectionsResponse,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_DIRECTIONS_BASE_URL: &str = "https://api.mapbox.com";
pub const DEFAULT_DIRECTIONS_PROFILE: &str = "driving";
pub const DEFAULT_DIRECTIONS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DirectionsError {
    #[error("invalid directions endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("directions request failed: {0}")]
    Transport(String),
    #[error("directions request timed out")]
    Timeout,
    #[error("directions provider returned HTTP {0}")]
    Status(u16),
    #[error("malformed directions response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Unavailable(String),
}

impl DirectionsError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            // Strip the URL: it carries the access token.
            Self::Transport(err.without_url().to_string())
        }
    }
}

impl From<DirectionsError> for DeliveryError {
    fn from(value: DirectionsError) -> Self {
        DeliveryError::RouteUnavailable(value.to_string())
    }
}

#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn fetch_directions(
        &self,
        request: RouteRequest,
    ) -> Result<DirectionsResponse, DirectionsError>;
}

pub struct MissingDirectionsProvider;

#[async_trait]
impl DirectionsProvider for MissingDirectionsProvider {
    async fn fetch_directions(
        &self,
        _request: RouteRequest,
    ) -> Result<DirectionsResponse, DirectionsError> {
        Err(DirectionsError::Unavailable(
            "directions provider is unavailable".to_string(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub base_url: String,
    pub profile: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DIRECTIONS_BASE_URL.to_string(),
            profile: DEFAULT_DIRECTIONS_PROFILE.to_string(),
            access_token: None,
            timeout: DEFAULT_DIRECTIONS_TIMEOUT,
        }
    }
}

/// Mapbox Directions v5 client (also works against compatible servers).
pub struct MapboxDirections {
    http: Client,
    config: DirectionsConfig,
}

impl MapboxDirections {
    pub fn new(config: DirectionsConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build directions http client")?;
        Ok(Self { http, config })
    }

    pub fn directions_url(&self, request: &RouteRequest) -> Result<Url, DirectionsError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| DirectionsError::InvalidEndpoint(e.to_string()))?;
        let coordinates = format!("{};{}", request.origin, request.destination);
        url.path_segments_mut()
            .map_err(|_| {
                DirectionsError::InvalidEndpoint(format!(
                    "'{}' cannot be used as a base url",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend([
                "directions",
                "v5",
                "mapbox",
                self.config.profile.as_str(),
                coordinates.as_str(),
            ]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("alternatives", "false")
                .append_pair("geometries", "geojson")
                .append_pair("overview", "full")
                .append_pair("steps", "false");
            if let Some(token) = &self.config.access_token {
                query.append_pair("access_token", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl DirectionsProvider for MapboxDirections {
    async fn fetch_directions(
        &self,
        request: RouteRequest,
    ) -> Result<DirectionsResponse, DirectionsError> {
        let url = self.directions_url(&request)?;
        debug!(
            origin = %request.origin,
            destination = %request.destination,
            profile = %self.config.profile,
            "requesting directions"
        );
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(DirectionsError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DirectionsError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(DirectionsError::from_transport)?;
        serde_json::from_str(&body).map_err(|e| DirectionsError::Malformed(e.to_string()))
    }
}

#[derive(Default)]
struct RouteCache {
    generation: u64,
    entry: Option<(RouteRequest, Route)>,
}

/// Resolves legs into routes and caches the one for the active leg.
///
/// The resolver never retries. Failures surface as
/// [`DeliveryError::RouteUnavailable`]; a degenerate request is rejected with
/// [`DeliveryError::InvalidRequest`] before the provider is contacted.
pub struct RouteResolver {
    provider: Arc<dyn DirectionsProvider>,
    cache: Mutex<RouteCache>,
}

impl RouteResolver {
    pub fn new(provider: Arc<dyn DirectionsProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(RouteCache::default()),
        }
    }

    pub async fn resolve_route(&self, request: RouteRequest) -> Result<Route, DeliveryError> {
        if request.is_degenerate() {
            return Err(DeliveryError::InvalidRequest);
        }

        let generation = {
            let cache = self.cache.lock().await;
            if let Some((key, route)) = &cache.entry {
                if *key == request {
                    debug!(origin = %request.origin, destination = %request.destination, "route cache hit");
                    return Ok(route.clone());
                }
            }
            cache.generation
        };

        let response = self
            .provider
            .fetch_directions(request)
            .await
            .inspect_err(|err| warn!(%err, "directions provider failed"))?;

        let DirectionsResponse {
            code,
            message,
            routes,
        } = response;
        let Some(first) = routes.into_iter().next() else {
            let detail = match (code, message) {
                (Some(code), Some(message)) => format!(" ({code}: {message})"),
                (Some(code), None) => format!(" ({code})"),
                (None, Some(message)) => format!(" ({message})"),
                (None, None) => String::new(),
            };
            return Err(DeliveryError::RouteUnavailable(format!(
                "provider returned no routes{detail}"
            )));
        };
        let route = first.into_route()?;

        let mut cache = self.cache.lock().await;
        if cache.generation == generation {
            cache.entry = Some((request, route.clone()));
        } else {
            debug!("route cache invalidated during resolution; not caching result");
        }
        Ok(route)
    }

    /// Drops the cached route. Resolutions already in flight will not
    /// repopulate the cache.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.lock().await;
        cache.generation += 1;
        cache.entry = None;
    }

    pub async fn cached_route(&self) -> Option<(RouteRequest, Route)> {
        self.cache.lock().await.entry.clone()
    }
}

#[cfg(test)]
#[path = "tests/route_tests.rs"]
mod tests;

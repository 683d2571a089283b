use async_trait::async_trait;
use shared::domain::GeoPoint;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("geolocation is not supported on this device")]
    Unsupported,
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("position unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError>;
}

/// Reports a configured position, used where no real GPS feed exists.
pub struct FixedGeolocation {
    position: GeoPoint,
}

impl FixedGeolocation {
    pub fn new(position: GeoPoint) -> Self {
        Self { position }
    }
}

#[async_trait]
impl GeolocationProvider for FixedGeolocation {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        Ok(self.position)
    }
}

pub struct MissingGeolocation;

#[async_trait]
impl GeolocationProvider for MissingGeolocation {
    async fn current_position(&self) -> Result<GeoPoint, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

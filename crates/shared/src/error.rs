use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{OrderId, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidCoordinate,
    InvalidCargoSize,
    OrderNotFound,
    NoActiveOrder,
    InvalidRequest,
    RouteUnavailable,
    NoDriverLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn no_driver_location() -> Self {
        Self::new(
            ErrorCode::NoDriverLocation,
            "driver position unavailable; route deferred until a location is known",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    #[error("invalid coordinate: longitude {longitude}, latitude {latitude}")]
    InvalidCoordinate { longitude: f64, latitude: f64 },
    #[error("invalid cargo size {0}: must be a positive number")]
    InvalidCargoSize(f64),
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("no active order for this transition (current phase: {phase:?})")]
    NoActiveOrder { phase: Phase },
    #[error("degenerate route request: origin equals destination")]
    InvalidRequest,
    #[error("route unavailable: {0}")]
    RouteUnavailable(String),
}

impl DeliveryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            Self::InvalidCargoSize(_) => ErrorCode::InvalidCargoSize,
            Self::OrderNotFound(_) => ErrorCode::OrderNotFound,
            Self::NoActiveOrder { .. } => ErrorCode::NoActiveOrder,
            Self::InvalidRequest => ErrorCode::InvalidRequest,
            Self::RouteUnavailable(_) => ErrorCode::RouteUnavailable,
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(value: DeliveryError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DeliveryError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(OrderId);
id_newtype!(WarehouseId);

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawGeoPoint {
    longitude: f64,
    latitude: f64,
}

/// A validated longitude/latitude pair.
///
/// Longitude is always in `[-180, 180]` and latitude in `[-90, 90]`; the
/// only way to obtain a value is through [`GeoPoint::new`] (or
/// deserialization, which goes through the same check).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, DeliveryError> {
        let longitude_ok = longitude.is_finite() && (-180.0..=180.0).contains(&longitude);
        let latitude_ok = latitude.is_finite() && (-90.0..=90.0).contains(&latitude);
        if !longitude_ok || !latitude_ok {
            return Err(DeliveryError::InvalidCoordinate {
                longitude,
                latitude,
            });
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = DeliveryError;

    fn try_from(value: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(value.longitude, value.latitude)
    }
}

/// Formats as `lon,lat`, the order directions services expect.
impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.longitude, self.latitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CargoSize(f64);

impl CargoSize {
    pub fn new(value: f64) -> Result<Self, DeliveryError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DeliveryError::InvalidCargoSize(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for CargoSize {
    type Error = DeliveryError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CargoSize> for f64 {
    fn from(value: CargoSize) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(alias = "pickupLocation")]
    pub pickup_location: GeoPoint,
    #[serde(alias = "deliveryLocation")]
    pub delivery_location: GeoPoint,
    #[serde(alias = "size")]
    pub cargo_size: CargoSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: GeoPoint,
}

/// The document an order source hands to the repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderManifest {
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub warehouses: Vec<Warehouse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Pickup,
    Delivery,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pickup => "pickup",
            Self::Delivery => "delivery",
            Self::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardView {
    #[default]
    List,
    PickupDetail,
    DeliveryDetail,
}

impl From<Phase> for DashboardView {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Pickup => Self::PickupDetail,
            Phase::Delivery => Self::DeliveryDetail,
            Phase::Idle | Phase::Completed => Self::List,
        }
    }
}

/// One directed leg of travel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
}

impl RouteRequest {
    pub fn new(origin: GeoPoint, destination: GeoPoint) -> Self {
        Self {
            origin,
            destination,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.origin == self.destination
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl Route {
    pub fn is_valid(&self) -> bool {
        self.path.len() >= 2
    }

    pub fn start(&self) -> Option<GeoPoint> {
        self.path.first().copied()
    }

    pub fn end(&self) -> Option<GeoPoint> {
        self.path.last().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CargoUnit {
    #[default]
    Kg,
    Crate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub location: GeoPoint,
    pub size: u32,
    pub unit: CargoUnit,
    pub created_at: DateTime<Utc>,
}

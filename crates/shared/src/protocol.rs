use serde::{Deserialize, Serialize};

use crate::{
    domain::{DashboardView, GeoPoint, Order, Phase, Route},
    error::{ApiError, DeliveryError},
};

/// Body returned by a Mapbox-compatible directions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsRoute {
    pub geometry: LineStringGeometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineStringGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<[f64; 2]>,
}

impl DirectionsRoute {
    /// Converts the GeoJSON geometry into a validated [`Route`].
    pub fn into_route(self) -> Result<Route, DeliveryError> {
        if self.geometry.kind != "LineString" {
            return Err(DeliveryError::RouteUnavailable(format!(
                "unexpected geometry type '{}'",
                self.geometry.kind
            )));
        }
        let path = self
            .geometry
            .coordinates
            .into_iter()
            .map(|[lon, lat]| GeoPoint::new(lon, lat))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DeliveryError::RouteUnavailable(format!("malformed geometry: {err}")))?;

        let route = Route {
            path,
            distance_meters: self.distance,
            duration_seconds: self.duration,
        };
        if !route.is_valid() {
            return Err(DeliveryError::RouteUnavailable(
                "route geometry has fewer than two points".to_string(),
            ));
        }
        Ok(route)
    }
}

/// Immutable view of the delivery workflow handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub sequence: u64,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver_position: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    pub route_pending: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl WorkflowSnapshot {
    pub fn view(&self) -> DashboardView {
        DashboardView::from(self.phase)
    }
}

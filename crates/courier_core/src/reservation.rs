//! Customer-side reservation flow: pick a location, choose a cargo size,
//! confirm.

use chrono::Utc;
use shared::domain::{CargoUnit, GeoPoint, Reservation};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::geolocation::{GeolocationError, GeolocationProvider};

pub const MIN_RESERVATION_SIZE: u32 = 1;
pub const MAX_RESERVATION_SIZE: u32 = 100;
pub const DEFAULT_RESERVATION_SIZE: u32 = 50;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReservationError {
    #[error("select a location before continuing")]
    LocationRequired,
    #[error(
        "size {0} is outside {min}..={max}",
        min = MIN_RESERVATION_SIZE,
        max = MAX_RESERVATION_SIZE
    )]
    SizeOutOfRange(u32),
    #[error("'{action}' is not available while {step}")]
    InvalidStep {
        action: &'static str,
        step: &'static str,
    },
    #[error("could not determine current location: {0}")]
    Location(#[from] GeolocationError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReservationStep {
    SelectLocation { selected: Option<GeoPoint> },
    SelectSize { location: GeoPoint },
    Confirm { location: GeoPoint },
    Submitted(Reservation),
}

impl ReservationStep {
    fn describe(&self) -> &'static str {
        match self {
            Self::SelectLocation { .. } => "selecting a location",
            Self::SelectSize { .. } => "selecting a size",
            Self::Confirm { .. } => "confirming",
            Self::Submitted(_) => "submitted",
        }
    }
}

/// Size and unit outlive a start-over, the chosen location does not outlive
/// a submission.
#[derive(Debug, Clone)]
pub struct ReservationFlow {
    step: ReservationStep,
    size: u32,
    unit: CargoUnit,
}

impl Default for ReservationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationFlow {
    pub fn new() -> Self {
        Self {
            step: ReservationStep::SelectLocation { selected: None },
            size: DEFAULT_RESERVATION_SIZE,
            unit: CargoUnit::default(),
        }
    }

    pub fn step(&self) -> &ReservationStep {
        &self.step
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn unit(&self) -> CargoUnit {
        self.unit
    }

    pub fn selected_location(&self) -> Option<GeoPoint> {
        match &self.step {
            ReservationStep::SelectLocation { selected } => *selected,
            ReservationStep::SelectSize { location } | ReservationStep::Confirm { location } => {
                Some(*location)
            }
            ReservationStep::Submitted(_) => None,
        }
    }

    pub fn set_location(&mut self, point: GeoPoint) -> Result<(), ReservationError> {
        match &mut self.step {
            ReservationStep::SelectLocation { selected } => {
                *selected = Some(point);
                Ok(())
            }
            other => Err(ReservationError::InvalidStep {
                action: "set location",
                step: other.describe(),
            }),
        }
    }

    /// Fills the location from the device. On failure the current selection
    /// is kept.
    pub async fn use_current_location(
        &mut self,
        provider: &dyn GeolocationProvider,
    ) -> Result<GeoPoint, ReservationError> {
        if !matches!(self.step, ReservationStep::SelectLocation { .. }) {
            return Err(ReservationError::InvalidStep {
                action: "use current location",
                step: self.step.describe(),
            });
        }
        let point = provider
            .current_position()
            .await
            .inspect_err(|err| warn!(%err, "current location lookup failed"))?;
        self.set_location(point)?;
        Ok(point)
    }

    pub fn confirm_location(&mut self) -> Result<(), ReservationError> {
        match &self.step {
            ReservationStep::SelectLocation {
                selected: Some(location),
            } => {
                self.step = ReservationStep::SelectSize {
                    location: *location,
                };
                Ok(())
            }
            ReservationStep::SelectLocation { selected: None } => {
                Err(ReservationError::LocationRequired)
            }
            other => Err(ReservationError::InvalidStep {
                action: "confirm location",
                step: other.describe(),
            }),
        }
    }

    pub fn set_size(&mut self, size: u32) -> Result<(), ReservationError> {
        self.require_size_step("set size")?;
        if !(MIN_RESERVATION_SIZE..=MAX_RESERVATION_SIZE).contains(&size) {
            return Err(ReservationError::SizeOutOfRange(size));
        }
        self.size = size;
        Ok(())
    }

    pub fn set_unit(&mut self, unit: CargoUnit) -> Result<(), ReservationError> {
        self.require_size_step("set unit")?;
        self.unit = unit;
        Ok(())
    }

    pub fn confirm_size(&mut self) -> Result<(), ReservationError> {
        let location = self.require_size_step("confirm size")?;
        self.step = ReservationStep::Confirm { location };
        Ok(())
    }

    pub fn submit(&mut self) -> Result<Reservation, ReservationError> {
        let ReservationStep::Confirm { location } = self.step else {
            return Err(ReservationError::InvalidStep {
                action: "submit",
                step: self.step.describe(),
            });
        };
        let reservation = Reservation {
            id: Uuid::new_v4(),
            location,
            size: self.size,
            unit: self.unit,
            created_at: Utc::now(),
        };
        info!(
            reservation_id = %reservation.id,
            location = %reservation.location,
            size = reservation.size,
            "reservation submitted"
        );
        self.step = ReservationStep::Submitted(reservation.clone());
        Ok(reservation)
    }

    /// Returns to location selection, keeping a location chosen during an
    /// abandoned flow.
    pub fn start_over(&mut self) {
        let selected = self.selected_location();
        self.step = ReservationStep::SelectLocation { selected };
    }

    fn require_size_step(&self, action: &'static str) -> Result<GeoPoint, ReservationError> {
        match &self.step {
            ReservationStep::SelectSize { location } => Ok(*location),
            other => Err(ReservationError::InvalidStep {
                action,
                step: other.describe(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "tests/reservation_tests.rs"]
mod tests;

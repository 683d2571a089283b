//! Per-order progress through pickup and delivery.
//!
//! The machine is pure: it owns the active order and its phase, and derives
//! the leg to route for it. Route invalidation and snapshot publication are
//! performed by [`crate::DeliveryWorkflow`] around each transition.

use shared::{
    domain::{GeoPoint, Order, Phase, RouteRequest},
    error::DeliveryError,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum PhaseState {
    #[default]
    Idle,
    Pickup(Order),
    Delivery(Order),
    Completed(Order),
}

/// What the current phase needs from the route resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LegRequest {
    None,
    /// The pickup leg starts at the driver, whose position is unknown.
    AwaitingLocation,
    Ready(RouteRequest),
}

#[derive(Debug, Default)]
pub struct PhaseMachine {
    state: PhaseState,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        phase_of(&self.state)
    }

    pub fn active_order(&self) -> Option<&Order> {
        match &self.state {
            PhaseState::Idle => None,
            PhaseState::Pickup(order)
            | PhaseState::Delivery(order)
            | PhaseState::Completed(order) => Some(order),
        }
    }

    /// Starts the pickup leg for `order`, whatever the previous state was.
    pub fn select_order(&mut self, order: Order) {
        self.state = PhaseState::Pickup(order);
    }

    pub fn confirm_pickup(&mut self) -> Result<(), DeliveryError> {
        match std::mem::take(&mut self.state) {
            PhaseState::Pickup(order) => {
                self.state = PhaseState::Delivery(order);
                Ok(())
            }
            other => {
                let phase = phase_of(&other);
                self.state = other;
                Err(DeliveryError::NoActiveOrder { phase })
            }
        }
    }

    /// Moves a delivery leg into the transient `Completed` state and returns
    /// the delivered order.
    pub fn complete_delivery(&mut self) -> Result<Order, DeliveryError> {
        match std::mem::take(&mut self.state) {
            PhaseState::Delivery(order) => {
                self.state = PhaseState::Completed(order.clone());
                Ok(order)
            }
            other => {
                let phase = phase_of(&other);
                self.state = other;
                Err(DeliveryError::NoActiveOrder { phase })
            }
        }
    }

    /// Folds `Completed` into `Idle`. Other states are left alone.
    pub fn settle(&mut self) -> Option<Order> {
        match std::mem::take(&mut self.state) {
            PhaseState::Completed(order) => Some(order),
            other => {
                self.state = other;
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = PhaseState::Idle;
    }

    pub fn route_request(&self, driver_position: Option<GeoPoint>) -> LegRequest {
        match &self.state {
            PhaseState::Pickup(order) => match driver_position {
                Some(origin) => LegRequest::Ready(RouteRequest::new(origin, order.pickup_location)),
                None => LegRequest::AwaitingLocation,
            },
            PhaseState::Delivery(order) => LegRequest::Ready(RouteRequest::new(
                order.pickup_location,
                order.delivery_location,
            )),
            PhaseState::Idle | PhaseState::Completed(_) => LegRequest::None,
        }
    }
}

fn phase_of(state: &PhaseState) -> Phase {
    match state {
        PhaseState::Idle => Phase::Idle,
        PhaseState::Pickup(_) => Phase::Pickup,
        PhaseState::Delivery(_) => Phase::Delivery,
        PhaseState::Completed(_) => Phase::Completed,
    }
}

#[cfg(test)]
#[path = "tests/phase_tests.rs"]
mod tests;

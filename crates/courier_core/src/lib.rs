use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{GeoPoint, Order, OrderId, OrderManifest, Route, RouteRequest, Warehouse},
    error::{ApiError, DeliveryError},
    protocol::WorkflowSnapshot,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod geolocation;
pub mod orders;
pub mod phase;
pub mod reservation;
pub mod route;

use geolocation::{GeolocationProvider, MissingGeolocation};
use orders::{OrderRepository, OrderSource};
use phase::{LegRequest, PhaseMachine};
use route::{DirectionsProvider, RouteResolver};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    SnapshotPublished(Arc<WorkflowSnapshot>),
    /// Emitted once per delivered order, alongside the `Completed` snapshot.
    DeliveryCompleted(Order),
    /// A route resolution finished after a newer transition superseded it.
    RouteDiscarded {
        sequence: u64,
        current: u64,
    },
    Error(String),
}

/// Commands and state the presentation layer is allowed to touch.
#[async_trait]
pub trait DeliveryCommands: Send + Sync {
    async fn select_order(&self, order_id: &OrderId)
        -> Result<Arc<WorkflowSnapshot>, DeliveryError>;
    async fn confirm_pickup(&self) -> Result<Arc<WorkflowSnapshot>, DeliveryError>;
    async fn complete_delivery(&self) -> Result<Order, DeliveryError>;
    async fn reset(&self) -> Arc<WorkflowSnapshot>;
    async fn retry_route(&self) -> Result<Arc<WorkflowSnapshot>, DeliveryError>;
    async fn snapshot(&self) -> Arc<WorkflowSnapshot>;
    fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent>;
}

struct WorkflowState {
    repository: OrderRepository,
    machine: PhaseMachine,
    driver_position: Option<GeoPoint>,
    sequence: u64,
    snapshot: Arc<WorkflowSnapshot>,
}

/// Drives the selected order through pickup and delivery.
///
/// All mutation goes through `inner`, so commands are applied in the order
/// they are issued. Each transition bumps `sequence`; a route resolution is
/// tagged with the sequence it was started for and is dropped on arrival if
/// the workflow has moved on.
pub struct DeliveryWorkflow {
    resolver: RouteResolver,
    geolocation: Arc<dyn GeolocationProvider>,
    inner: Mutex<WorkflowState>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl DeliveryWorkflow {
    pub fn new(directions: Arc<dyn DirectionsProvider>) -> Arc<Self> {
        Self::new_with_dependencies(directions, Arc::new(MissingGeolocation))
    }

    pub fn new_with_dependencies(
        directions: Arc<dyn DirectionsProvider>,
        geolocation: Arc<dyn GeolocationProvider>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            resolver: RouteResolver::new(directions),
            geolocation,
            inner: Mutex::new(WorkflowState {
                repository: OrderRepository::new(),
                machine: PhaseMachine::new(),
                driver_position: None,
                sequence: 0,
                snapshot: Arc::new(WorkflowSnapshot::default()),
            }),
            events,
        })
    }

    /// Replaces the known orders. Any order in progress is abandoned.
    pub async fn load_orders(self: &Arc<Self>, manifest: OrderManifest) -> usize {
        let mut state = self.inner.lock().await;
        let count = state.repository.load_manifest(manifest).len();
        state.machine.reset();
        self.advance(&mut state, true).await;
        count
    }

    pub async fn load_from(self: &Arc<Self>, source: &dyn OrderSource) -> Result<usize> {
        let manifest = source.load().await?;
        Ok(self.load_orders(manifest).await)
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.inner.lock().await.repository.orders().to_vec()
    }

    pub async fn warehouses(&self) -> Vec<Warehouse> {
        self.inner.lock().await.repository.warehouses().to_vec()
    }

    pub async fn current_order(&self) -> Option<Order> {
        self.inner.lock().await.repository.current().cloned()
    }

    pub async fn select_order(
        self: &Arc<Self>,
        order_id: &OrderId,
    ) -> Result<Arc<WorkflowSnapshot>, DeliveryError> {
        let mut state = self.inner.lock().await;
        let order = state.repository.select(order_id)?;
        info!(order_id = %order.id, "order selected");
        state.machine.select_order(order);
        Ok(self.advance(&mut state, true).await)
    }

    pub async fn confirm_pickup(self: &Arc<Self>) -> Result<Arc<WorkflowSnapshot>, DeliveryError> {
        let mut state = self.inner.lock().await;
        state.machine.confirm_pickup()?;
        info!(order_id = ?state.machine.active_order().map(|o| &o.id), "pickup confirmed");
        Ok(self.advance(&mut state, true).await)
    }

    /// Finishes the delivery leg. Observers see one `Completed` snapshot and
    /// a [`WorkflowEvent::DeliveryCompleted`] before the workflow returns to
    /// `Idle`; the delivered order leaves the repository.
    pub async fn complete_delivery(self: &Arc<Self>) -> Result<Order, DeliveryError> {
        let mut state = self.inner.lock().await;
        let order = state.machine.complete_delivery()?;
        info!(order_id = %order.id, "delivery completed");
        self.advance(&mut state, true).await;
        let _ = self
            .events
            .send(WorkflowEvent::DeliveryCompleted(order.clone()));

        state.machine.settle();
        state.repository.remove(&order.id);
        self.advance(&mut state, true).await;
        Ok(order)
    }

    pub async fn reset(self: &Arc<Self>) -> Arc<WorkflowSnapshot> {
        let mut state = self.inner.lock().await;
        state.machine.reset();
        state.repository.clear_selection();
        debug!("workflow reset");
        self.advance(&mut state, true).await
    }

    /// Re-requests the route for the current leg, superseding any request
    /// still in flight.
    pub async fn retry_route(self: &Arc<Self>) -> Result<Arc<WorkflowSnapshot>, DeliveryError> {
        let mut state = self.inner.lock().await;
        if state.machine.active_order().is_none() {
            return Err(DeliveryError::NoActiveOrder {
                phase: state.machine.phase(),
            });
        }
        Ok(self.advance(&mut state, false).await)
    }

    /// Records the driver's position. During pickup a new position means a
    /// new leg; otherwise only the snapshot is refreshed.
    pub async fn set_driver_position(
        self: &Arc<Self>,
        position: Option<GeoPoint>,
    ) -> Arc<WorkflowSnapshot> {
        let mut state = self.inner.lock().await;
        if state.driver_position == position {
            return Arc::clone(&state.snapshot);
        }
        let before = state.machine.route_request(state.driver_position);
        state.driver_position = position;
        let after = state.machine.route_request(state.driver_position);

        if before != after {
            return self.advance(&mut state, true).await;
        }
        let mut snapshot = (*state.snapshot).clone();
        snapshot.driver_position = position;
        self.publish(&mut state, snapshot)
    }

    /// Asks the geolocation provider for a fix. A failure clears the known
    /// position instead of surfacing an error.
    pub async fn refresh_driver_position(self: &Arc<Self>) -> Option<GeoPoint> {
        let position = match self.geolocation.current_position().await {
            Ok(point) => Some(point),
            Err(err) => {
                warn!(%err, "driver position unavailable");
                let _ = self
                    .events
                    .send(WorkflowEvent::Error(format!("driver position unavailable: {err}")));
                None
            }
        };
        self.set_driver_position(position).await;
        position
    }

    pub async fn snapshot(&self) -> Arc<WorkflowSnapshot> {
        Arc::clone(&self.inner.lock().await.snapshot)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    async fn advance(
        self: &Arc<Self>,
        state: &mut WorkflowState,
        invalidate_route: bool,
    ) -> Arc<WorkflowSnapshot> {
        state.sequence += 1;
        let sequence = state.sequence;
        if invalidate_route {
            self.resolver.invalidate().await;
        }

        let (route_pending, error) = match state.machine.route_request(state.driver_position) {
            LegRequest::Ready(request) if request.is_degenerate() => {
                debug!(sequence, at = %request.origin, "leg has zero length; skipping route resolution");
                (false, None)
            }
            LegRequest::Ready(request) => {
                self.spawn_resolution(sequence, request);
                (true, None)
            }
            LegRequest::AwaitingLocation => {
                debug!(sequence, "pickup leg deferred until driver position is known");
                (false, Some(ApiError::no_driver_location()))
            }
            LegRequest::None => (false, None),
        };

        let snapshot = WorkflowSnapshot {
            sequence,
            phase: state.machine.phase(),
            order: state.machine.active_order().cloned(),
            driver_position: state.driver_position,
            route: None,
            route_pending,
            error,
        };
        self.publish(state, snapshot)
    }

    fn spawn_resolution(self: &Arc<Self>, sequence: u64, request: RouteRequest) {
        let workflow = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = workflow.resolver.resolve_route(request).await;
            workflow.apply_resolution(sequence, outcome).await;
        });
    }

    async fn apply_resolution(&self, sequence: u64, outcome: Result<Route, DeliveryError>) {
        let mut state = self.inner.lock().await;
        if state.sequence != sequence {
            debug!(
                sequence,
                current = state.sequence,
                "discarding superseded route resolution"
            );
            let _ = self.events.send(WorkflowEvent::RouteDiscarded {
                sequence,
                current: state.sequence,
            });
            return;
        }

        let mut snapshot = (*state.snapshot).clone();
        snapshot.route_pending = false;
        match outcome {
            Ok(route) => {
                info!(
                    sequence,
                    points = route.path.len(),
                    distance_meters = ?route.distance_meters,
                    "route resolved"
                );
                snapshot.route = Some(route);
                snapshot.error = None;
            }
            Err(err) => {
                warn!(sequence, %err, "route resolution failed");
                let _ = self.events.send(WorkflowEvent::Error(err.to_string()));
                snapshot.route = None;
                snapshot.error = Some(err.into());
            }
        }
        self.publish(&mut state, snapshot);
    }

    fn publish(
        &self,
        state: &mut WorkflowState,
        snapshot: WorkflowSnapshot,
    ) -> Arc<WorkflowSnapshot> {
        let snapshot = Arc::new(snapshot);
        state.snapshot = Arc::clone(&snapshot);
        let _ = self
            .events
            .send(WorkflowEvent::SnapshotPublished(Arc::clone(&snapshot)));
        snapshot
    }
}

#[async_trait]
impl DeliveryCommands for Arc<DeliveryWorkflow> {
    async fn select_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Arc<WorkflowSnapshot>, DeliveryError> {
        DeliveryWorkflow::select_order(self, order_id).await
    }

    async fn confirm_pickup(&self) -> Result<Arc<WorkflowSnapshot>, DeliveryError> {
        DeliveryWorkflow::confirm_pickup(self).await
    }

    async fn complete_delivery(&self) -> Result<Order, DeliveryError> {
        DeliveryWorkflow::complete_delivery(self).await
    }

    async fn reset(&self) -> Arc<WorkflowSnapshot> {
        DeliveryWorkflow::reset(self).await
    }

    async fn retry_route(&self) -> Result<Arc<WorkflowSnapshot>, DeliveryError> {
        DeliveryWorkflow::retry_route(self).await
    }

    async fn snapshot(&self) -> Arc<WorkflowSnapshot> {
        DeliveryWorkflow::snapshot(self).await
    }

    fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        DeliveryWorkflow::subscribe_events(self)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

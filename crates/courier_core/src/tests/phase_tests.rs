use super::*;
use shared::domain::{CargoSize, OrderId};

fn point(longitude: f64, latitude: f64) -> GeoPoint {
    GeoPoint::new(longitude, latitude).expect("valid point")
}

fn order1() -> Order {
    Order {
        id: OrderId::new("order1"),
        pickup_location: point(38.760257, 9.06843),
        delivery_location: point(38.7443, 9.062257),
        cargo_size: CargoSize::new(50.0).expect("size"),
    }
}

fn driver() -> GeoPoint {
    point(38.74776, 9.047)
}

#[test]
fn starts_idle_without_leg() {
    let machine = PhaseMachine::new();
    assert_eq!(machine.phase(), Phase::Idle);
    assert!(machine.active_order().is_none());
    assert_eq!(machine.route_request(Some(driver())), LegRequest::None);
}

#[test]
fn pickup_leg_runs_from_driver_to_pickup() {
    let mut machine = PhaseMachine::new();
    machine.select_order(order1());
    assert_eq!(machine.phase(), Phase::Pickup);
    assert_eq!(
        machine.route_request(Some(driver())),
        LegRequest::Ready(RouteRequest::new(driver(), order1().pickup_location))
    );
    assert_eq!(machine.route_request(None), LegRequest::AwaitingLocation);
}

#[test]
fn delivery_leg_ignores_driver_position() {
    let mut machine = PhaseMachine::new();
    machine.select_order(order1());
    machine.confirm_pickup().expect("confirm");
    let expected = LegRequest::Ready(RouteRequest::new(
        order1().pickup_location,
        order1().delivery_location,
    ));
    assert_eq!(machine.route_request(Some(driver())), expected);
    assert_eq!(machine.route_request(None), expected);
}

#[test]
fn transitions_only_move_forward() {
    let mut machine = PhaseMachine::new();

    assert_eq!(
        machine.confirm_pickup(),
        Err(DeliveryError::NoActiveOrder { phase: Phase::Idle })
    );
    assert_eq!(
        machine.complete_delivery(),
        Err(DeliveryError::NoActiveOrder { phase: Phase::Idle })
    );

    machine.select_order(order1());
    assert_eq!(
        machine.complete_delivery(),
        Err(DeliveryError::NoActiveOrder { phase: Phase::Pickup })
    );
    assert_eq!(machine.state(), &PhaseState::Pickup(order1()));

    machine.confirm_pickup().expect("confirm");
    assert_eq!(
        machine.confirm_pickup(),
        Err(DeliveryError::NoActiveOrder {
            phase: Phase::Delivery
        })
    );
    assert_eq!(machine.state(), &PhaseState::Delivery(order1()));

    assert_eq!(machine.complete_delivery(), Ok(order1()));
    assert_eq!(machine.phase(), Phase::Completed);
    assert_eq!(machine.route_request(Some(driver())), LegRequest::None);
    assert_eq!(
        machine.confirm_pickup(),
        Err(DeliveryError::NoActiveOrder {
            phase: Phase::Completed
        })
    );
}

#[test]
fn settle_folds_completed_into_idle_only() {
    let mut machine = PhaseMachine::new();
    machine.select_order(order1());
    assert_eq!(machine.settle(), None);
    assert_eq!(machine.phase(), Phase::Pickup);

    machine.confirm_pickup().expect("confirm");
    machine.complete_delivery().expect("complete");
    assert_eq!(machine.settle(), Some(order1()));
    assert_eq!(machine.phase(), Phase::Idle);
    assert!(machine.active_order().is_none());
}

#[test]
fn select_restarts_pickup_from_any_state() {
    let mut machine = PhaseMachine::new();
    machine.select_order(order1());
    machine.confirm_pickup().expect("confirm");

    let mut other = order1();
    other.id = OrderId::new("order2");
    machine.select_order(other.clone());
    assert_eq!(machine.state(), &PhaseState::Pickup(other));
}

#[test]
fn reset_is_idempotent() {
    let mut machine = PhaseMachine::new();
    machine.select_order(order1());
    machine.confirm_pickup().expect("confirm");
    for _ in 0..3 {
        machine.reset();
        assert_eq!(machine.state(), &PhaseState::Idle);
    }
}

use super::*;
use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

use shared::domain::{CargoSize, GeoPoint, WarehouseId};

fn point(longitude: f64, latitude: f64) -> GeoPoint {
    GeoPoint::new(longitude, latitude).expect("valid point")
}

fn order(id: &str, size: f64) -> Order {
    Order {
        id: OrderId::new(id),
        pickup_location: point(38.760257, 9.06843),
        delivery_location: point(38.7443, 9.062257),
        cargo_size: CargoSize::new(size).expect("size"),
    }
}

#[test]
fn empty_source_yields_valid_empty_repository() {
    let mut repository = OrderRepository::new();
    assert!(repository.load_orders(Vec::new()).is_empty());
    assert!(repository.is_empty());
    assert!(repository.current().is_none());
}

#[test]
fn select_marks_current_order() {
    let mut repository = OrderRepository::new();
    repository.load_orders(vec![order("order1", 50.0), order("order2", 20.0)]);

    let selected = repository
        .select(&OrderId::new("order2"))
        .expect("select");
    assert_eq!(selected.id, OrderId::new("order2"));
    assert_eq!(repository.current(), Some(&order("order2", 20.0)));
}

#[test]
fn select_unknown_id_keeps_previous_selection() {
    let mut repository = OrderRepository::new();
    repository.load_orders(vec![order("order1", 50.0)]);
    repository.select(&OrderId::new("order1")).expect("select");

    let err = repository
        .select(&OrderId::new("nope"))
        .expect_err("unknown id");
    assert_eq!(err, DeliveryError::OrderNotFound(OrderId::new("nope")));
    assert_eq!(
        repository.current().map(|o| o.id.clone()),
        Some(OrderId::new("order1"))
    );
}

#[test]
fn duplicate_ids_keep_last_record_in_first_position() {
    let mut repository = OrderRepository::new();
    let loaded = repository.load_orders(vec![
        order("order1", 10.0),
        order("order2", 20.0),
        order("order1", 30.0),
    ]);
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], order("order1", 30.0));
    assert_eq!(loaded[1].id, OrderId::new("order2"));
}

#[test]
fn reload_drops_selection() {
    let mut repository = OrderRepository::new();
    repository.load_orders(vec![order("order1", 50.0)]);
    repository.select(&OrderId::new("order1")).expect("select");
    repository.load_orders(vec![order("order1", 50.0)]);
    assert!(repository.current().is_none());
}

#[test]
fn remove_clears_matching_selection() {
    let mut repository = OrderRepository::new();
    repository.load_orders(vec![order("order1", 50.0), order("order2", 20.0)]);
    repository.select(&OrderId::new("order1")).expect("select");

    assert!(repository.remove(&OrderId::new("order2")).is_some());
    assert!(repository.current().is_some());
    assert!(repository.remove(&OrderId::new("order1")).is_some());
    assert!(repository.current().is_none());
    assert!(repository.remove(&OrderId::new("order1")).is_none());
    assert!(repository.is_empty());
}

#[tokio::test]
async fn json_file_source_reads_manifest_with_warehouses() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("courier_orders_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("orders.json");
    fs::write(
        &path,
        r#"{
            "orders": [
                {
                    "id": "order1",
                    "pickupLocation": {"latitude": 9.06843, "longitude": 38.760257},
                    "deliveryLocation": {"latitude": 9.062257, "longitude": 38.7443},
                    "size": 50
                }
            ],
            "warehouses": [
                {"id": "warehouse2", "name": "Warehouse 2", "location": {"longitude": 38.7643, "latitude": 9.050257}}
            ]
        }"#,
    )
    .expect("write manifest");

    let manifest = JsonFileOrderSource::new(path.clone()).load().await.expect("load");
    let mut repository = OrderRepository::new();
    repository.load_manifest(manifest);
    assert_eq!(repository.len(), 1);
    assert_eq!(repository.warehouses()[0].id, WarehouseId::new("warehouse2"));

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn json_file_source_reports_missing_file() {
    let err = JsonFileOrderSource::new("/definitely/not/here/orders.json")
        .load()
        .await
        .expect_err("missing file");
    assert!(err.to_string().contains("failed to read order manifest"));
}

#[tokio::test]
async fn static_source_round_trips_manifest() {
    let manifest = OrderManifest {
        orders: vec![order("order1", 50.0)],
        warehouses: Vec::new(),
    };
    let loaded = StaticOrderSource::new(manifest.clone())
        .load()
        .await
        .expect("load");
    assert_eq!(loaded, manifest);
}

use std::{
    env, fs,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::{extract::Path, routing::get, Json, Router};
use courier_core::{
    geolocation::FixedGeolocation,
    orders::JsonFileOrderSource,
    route::{DirectionsConfig, MapboxDirections},
    DeliveryWorkflow, WorkflowEvent,
};
use serde_json::json;
use shared::domain::{DashboardView, GeoPoint, OrderId, Phase};
use shared::protocol::WorkflowSnapshot;
use tokio::{net::TcpListener, sync::broadcast};

/// Echoes the requested pair back as a straight two-point line.
async fn straight_line(Path((_profile, coordinates)): Path<(String, String)>) -> Json<serde_json::Value> {
    let points: Vec<[f64; 2]> = coordinates
        .split(';')
        .filter_map(|pair| {
            let (lon, lat) = pair.split_once(',')?;
            Some([lon.parse().ok()?, lat.parse().ok()?])
        })
        .collect();
    Json(json!({
        "code": "Ok",
        "routes": [{
            "geometry": {"type": "LineString", "coordinates": points},
            "distance": 1800.0,
            "duration": 240.0
        }]
    }))
}

async fn spawn_mapbox_stub() -> String {
    env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route(
        "/directions/v5/mapbox/:profile/:coordinates",
        get(straight_line),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

async fn settled(
    events: &mut broadcast::Receiver<WorkflowEvent>,
    sequence: u64,
) -> Arc<WorkflowSnapshot> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(WorkflowEvent::SnapshotPublished(snapshot))
                    if snapshot.sequence == sequence && !snapshot.route_pending =>
                {
                    return snapshot
                }
                Ok(_) => continue,
                Err(err) => panic!("event stream closed: {err}"),
            }
        }
    })
    .await
    .expect("settled snapshot")
}

fn point(longitude: f64, latitude: f64) -> GeoPoint {
    GeoPoint::new(longitude, latitude).expect("valid point")
}

#[tokio::test]
async fn driver_delivers_order_from_manifest_acceptance() {
    let base_url = spawn_mapbox_stub().await;

    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("courier_acceptance_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let manifest_path = temp_root.join("orders.json");
    fs::write(
        &manifest_path,
        json!({
            "orders": [
                {
                    "id": "order1",
                    "pickupLocation": {"latitude": 9.06843, "longitude": 38.760257},
                    "deliveryLocation": {"latitude": 9.062257, "longitude": 38.7443},
                    "size": 50
                },
                {
                    "id": "order2",
                    "pickupLocation": {"latitude": 9.040257, "longitude": 38.7443},
                    "deliveryLocation": {"latitude": 9.050257, "longitude": 38.7643},
                    "size": 20
                }
            ],
            "warehouses": [
                {"id": "warehouse1", "name": "Warehouse 1", "location": {"longitude": 38.7443, "latitude": 9.040257}}
            ]
        })
        .to_string(),
    )
    .expect("write manifest");

    let directions = MapboxDirections::new(DirectionsConfig {
        base_url,
        access_token: Some("pk.acceptance".to_string()),
        timeout: Duration::from_secs(2),
        ..DirectionsConfig::default()
    })
    .expect("directions client");
    let driver = point(38.74776, 9.047);
    let workflow = DeliveryWorkflow::new_with_dependencies(
        Arc::new(directions),
        Arc::new(FixedGeolocation::new(driver)),
    );
    let mut events = workflow.subscribe_events();

    let loaded = workflow
        .load_from(&JsonFileOrderSource::new(manifest_path.clone()))
        .await
        .expect("load manifest");
    assert_eq!(loaded, 2);
    assert_eq!(workflow.warehouses().await.len(), 1);
    assert_eq!(workflow.refresh_driver_position().await, Some(driver));

    let order_id = OrderId::new("order1");
    let selected = workflow.select_order(&order_id).await.expect("select");
    assert_eq!(selected.phase, Phase::Pickup);
    assert!(selected.route_pending);
    let pickup = settled(&mut events, selected.sequence).await;
    assert!(pickup.error.is_none());
    let route = pickup.route.as_ref().expect("pickup route");
    assert_eq!(route.start(), Some(driver));
    assert_eq!(route.end(), Some(point(38.760257, 9.06843)));
    assert_eq!(pickup.view(), DashboardView::PickupDetail);

    let confirmed = workflow.confirm_pickup().await.expect("confirm");
    assert_eq!(confirmed.phase, Phase::Delivery);
    assert!(confirmed.route.is_none());
    let delivery = settled(&mut events, confirmed.sequence).await;
    let route = delivery.route.as_ref().expect("delivery route");
    assert_eq!(route.start(), Some(point(38.760257, 9.06843)));
    assert_eq!(route.end(), Some(point(38.7443, 9.062257)));
    assert_eq!(route.distance_meters, Some(1800.0));
    assert_eq!(delivery.view(), DashboardView::DeliveryDetail);

    let delivered = workflow.complete_delivery().await.expect("complete");
    assert_eq!(delivered.id, order_id);
    let idle = workflow.snapshot().await;
    assert_eq!(idle.phase, Phase::Idle);
    assert_eq!(idle.view(), DashboardView::List);
    assert!(idle.route.is_none());
    assert_eq!(
        workflow
            .orders()
            .await
            .into_iter()
            .map(|order| order.id)
            .collect::<Vec<_>>(),
        vec![OrderId::new("order2")]
    );

    fs::remove_dir_all(temp_root).expect("cleanup");
}

use super::*;

#[test]
fn parses_units_case_insensitively() {
    assert_eq!(parse_unit("kg").expect("kg"), CargoUnit::Kg);
    assert_eq!(parse_unit("Crate").expect("crate"), CargoUnit::Crate);
    assert!(parse_unit("ton").is_err());
}

#[test]
fn cli_flags_override_settings() {
    let cli = Cli::try_parse_from([
        "driver",
        "--orders",
        "fixtures/orders.json",
        "--base-url",
        "http://127.0.0.1:9000",
        "--position",
        "38.7443,9.040257",
        "run",
        "--order",
        "order1",
    ])
    .expect("parse");
    let mut settings = Settings::default();
    cli.apply_overrides(&mut settings);

    assert_eq!(settings.orders_path, "fixtures/orders.json");
    assert_eq!(settings.directions_base_url, "http://127.0.0.1:9000");
    assert_eq!(settings.driver_position, "38.7443,9.040257");
    assert!(settings.mapbox_access_token.is_none());
    assert!(matches!(cli.command, Command::Run { ref order } if order == "order1"));
}

#[test]
fn reserve_requires_both_coordinates() {
    assert!(Cli::try_parse_from(["driver", "reserve", "--lon", "38.7"]).is_err());

    let cli = Cli::try_parse_from(["driver", "reserve", "--unit", "crate"]).expect("parse");
    match cli.command {
        Command::Reserve {
            lon,
            lat,
            size,
            unit,
        } => {
            assert_eq!(lon.zip(lat), None);
            assert_eq!(size, DEFAULT_RESERVATION_SIZE);
            assert_eq!(unit, "crate");
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[tokio::test]
async fn reports_current_workflow_snapshot() {
    let workflow = build_workflow(&Settings::default()).expect("workflow");
    let finished = workflow.snapshot().await;
    report(&finished, false).expect("text report");
    report(&finished, true).expect("json report");
}

#[test]
fn bundled_manifest_parses() {
    let raw = include_str!("../../data/orders.json");
    let manifest: shared::domain::OrderManifest = serde_json::from_str(raw).expect("manifest");
    assert_eq!(manifest.orders.len(), 2);
    assert_eq!(manifest.warehouses.len(), 3);
}

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use courier_core::{
    geolocation::FixedGeolocation,
    orders::JsonFileOrderSource,
    reservation::{ReservationFlow, DEFAULT_RESERVATION_SIZE},
    route::{MapboxDirections, RouteResolver},
    DeliveryWorkflow, WorkflowEvent,
};
use shared::{
    domain::{CargoUnit, GeoPoint, OrderId, Route, RouteRequest},
    protocol::WorkflowSnapshot,
};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::{info, warn};

mod config;

use config::{load_settings, parse_position, Settings};

#[derive(Parser, Debug)]
#[command(name = "driver", about = "Courier pickup and delivery console")]
struct Cli {
    /// Order manifest (JSON); overrides `orders_path`.
    #[arg(long)]
    orders: Option<PathBuf>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    access_token: Option<String>,
    /// Driver position as `lon,lat`.
    #[arg(long)]
    position: Option<String>,
    /// Print snapshots as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List orders and warehouses from the manifest.
    Orders,
    /// Resolve a single route between two `lon,lat` points.
    Route {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Walk one order through pickup and delivery.
    Run {
        #[arg(long)]
        order: String,
    },
    /// Submit a reservation; uses the driver position when no location is given.
    Reserve {
        #[arg(long, requires = "lat")]
        lon: Option<f64>,
        #[arg(long, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, default_value_t = DEFAULT_RESERVATION_SIZE)]
        size: u32,
        #[arg(long, default_value = "kg")]
        unit: String,
    },
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(path) = &self.orders {
            settings.orders_path = path.display().to_string();
        }
        if let Some(url) = &self.base_url {
            settings.directions_base_url = url.clone();
        }
        if let Some(token) = &self.access_token {
            settings.mapbox_access_token = Some(token.clone());
        }
        if let Some(position) = &self.position {
            settings.driver_position = position.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let mut settings = load_settings();
    cli.apply_overrides(&mut settings);

    match &cli.command {
        Command::Orders => list_orders(&settings).await,
        Command::Route { from, to } => resolve_single_route(&settings, from, to).await,
        Command::Run { order } => run_order(&settings, &OrderId::new(order.as_str()), cli.json).await,
        Command::Reserve {
            lon,
            lat,
            size,
            unit,
        } => reserve(&settings, lon.zip(*lat), *size, unit).await,
    }
}

fn build_workflow(settings: &Settings) -> Result<Arc<DeliveryWorkflow>> {
    let directions = MapboxDirections::new(settings.directions_config())?;
    let driver = settings.driver_position()?;
    Ok(DeliveryWorkflow::new_with_dependencies(
        Arc::new(directions),
        Arc::new(FixedGeolocation::new(driver)),
    ))
}

async fn list_orders(settings: &Settings) -> Result<()> {
    let workflow = build_workflow(settings)?;
    workflow
        .load_from(&JsonFileOrderSource::new(&settings.orders_path))
        .await?;
    for order in workflow.orders().await {
        println!(
            "{}\tpickup={}\tdelivery={}\tsize={}",
            order.id,
            order.pickup_location,
            order.delivery_location,
            order.cargo_size.value()
        );
    }
    for warehouse in workflow.warehouses().await {
        println!("{}\t{}\t{}", warehouse.id, warehouse.name, warehouse.location);
    }
    Ok(())
}

async fn resolve_single_route(settings: &Settings, from: &str, to: &str) -> Result<()> {
    let origin = parse_position(from).context("invalid --from")?;
    let destination = parse_position(to).context("invalid --to")?;
    let resolver = RouteResolver::new(Arc::new(MapboxDirections::new(
        settings.directions_config(),
    )?));
    let route = resolver
        .resolve_route(RouteRequest::new(origin, destination))
        .await?;
    print_route(&route);
    Ok(())
}

async fn run_order(settings: &Settings, order_id: &OrderId, json: bool) -> Result<()> {
    let workflow = build_workflow(settings)?;
    let mut events = BroadcastStream::new(workflow.subscribe_events());
    let settle_timeout = settings.directions_config().timeout + Duration::from_secs(1);

    workflow
        .load_from(&JsonFileOrderSource::new(&settings.orders_path))
        .await?;
    let position = workflow
        .refresh_driver_position()
        .await
        .ok_or_else(|| anyhow!("driver position unavailable"))?;
    info!(%position, "driver position known");

    let selected = workflow.select_order(order_id).await?;
    let pickup = wait_for_route(&mut events, selected.sequence, settle_timeout).await?;
    report(&pickup, json)?;

    let confirmed = workflow.confirm_pickup().await?;
    let delivery = wait_for_route(&mut events, confirmed.sequence, settle_timeout).await?;
    report(&delivery, json)?;

    let delivered = workflow.complete_delivery().await?;
    let finished = workflow.snapshot().await;
    report(&finished, json)?;
    println!("delivered {}", delivered.id);
    Ok(())
}

/// Waits for the snapshot of `sequence` to stop waiting on its route.
async fn wait_for_route(
    events: &mut BroadcastStream<WorkflowEvent>,
    sequence: u64,
    limit: Duration,
) -> Result<Arc<WorkflowSnapshot>> {
    let wait = async {
        while let Some(event) = events.next().await {
            match event {
                Ok(WorkflowEvent::SnapshotPublished(snapshot))
                    if snapshot.sequence == sequence && !snapshot.route_pending =>
                {
                    return Ok(snapshot);
                }
                Ok(WorkflowEvent::RouteDiscarded { sequence, current }) => {
                    warn!(sequence, current, "route superseded");
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "missed workflow events"),
            }
        }
        bail!("workflow event stream closed")
    };
    tokio::time::timeout(limit, wait)
        .await
        .with_context(|| format!("route for transition {sequence} did not settle"))?
}

fn report(snapshot: &WorkflowSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(());
    }
    let order = snapshot
        .order
        .as_ref()
        .map(|order| order.id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[{}] phase={} order={} view={:?}",
        snapshot.sequence,
        snapshot.phase.as_str(),
        order,
        snapshot.view()
    );
    if let Some(route) = &snapshot.route {
        print_route(route);
    }
    if let Some(error) = &snapshot.error {
        println!("  error: {}", error.message);
    }
    Ok(())
}

fn print_route(route: &Route) {
    let (Some(start), Some(end)) = (route.start(), route.end()) else {
        return;
    };
    let distance = route
        .distance_meters
        .map(|m| format!("{:.0} m", m))
        .unwrap_or_else(|| "? m".to_string());
    let duration = route
        .duration_seconds
        .map(|s| format!("{:.0} s", s))
        .unwrap_or_else(|| "? s".to_string());
    println!(
        "  route {start} -> {end}: {} points, {distance}, {duration}",
        route.path.len()
    );
}

fn parse_unit(raw: &str) -> Result<CargoUnit> {
    if raw.eq_ignore_ascii_case("kg") {
        Ok(CargoUnit::Kg)
    } else if raw.eq_ignore_ascii_case("crate") {
        Ok(CargoUnit::Crate)
    } else {
        bail!("unknown unit '{raw}' (expected kg or crate)")
    }
}

async fn reserve(
    settings: &Settings,
    location: Option<(f64, f64)>,
    size: u32,
    unit: &str,
) -> Result<()> {
    let mut flow = ReservationFlow::new();
    match location {
        Some((lon, lat)) => flow.set_location(GeoPoint::new(lon, lat)?)?,
        None => {
            let gps = FixedGeolocation::new(settings.driver_position()?);
            flow.use_current_location(&gps).await?;
        }
    }
    flow.confirm_location()?;
    flow.set_size(size)?;
    flow.set_unit(parse_unit(unit)?)?;
    flow.confirm_size()?;
    let reservation = flow.submit()?;
    println!("{}", serde_json::to_string_pretty(&reservation)?);
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;

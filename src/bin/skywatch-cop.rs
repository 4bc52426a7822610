//! COP server binary: HTTP ingest, REST views, and the WebSocket push stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use skywatch::api::create_router;
use skywatch::cop::aging::spawn_aging_supervisor;
use skywatch::{CopConfig, CopService, ZoneCircle};

#[derive(Parser, Debug)]
#[command(name = "skywatch-cop", about = "Skywatch common-operational-picture server")]
struct Args {
    /// Listen address for the REST API and WebSocket stream
    #[arg(long, default_value = "0.0.0.0:8000")]
    listen: SocketAddr,

    /// RF-to-track association gate in degrees
    #[arg(long, default_value = "12.0")]
    bearing_gate_deg: f64,

    /// Range gate in meters (carried for deployments that range-gate)
    #[arg(long, default_value = "250.0")]
    range_gate_m: f64,

    /// Track age in seconds before STALE
    #[arg(long, default_value = "5.0")]
    stale_ttl_s: f64,

    /// Track age in seconds before DEAD and removal
    #[arg(long, default_value = "15.0")]
    dead_ttl_s: f64,

    /// Aging tick interval in milliseconds
    #[arg(long, default_value = "1000")]
    tick_ms: u64,

    /// Debug tail capacity
    #[arg(long, default_value = "1000")]
    events_tail_max: usize,

    /// Pause buffer capacity
    #[arg(long, default_value = "1000")]
    pause_buffer_max: usize,

    /// Protected-zone center latitude (requires --zone-lon and --zone-radius-m)
    #[arg(long)]
    zone_lat: Option<f64>,

    /// Protected-zone center longitude
    #[arg(long)]
    zone_lon: Option<f64>,

    /// Protected-zone radius in meters
    #[arg(long)]
    zone_radius_m: Option<f64>,

    /// Speed normalization ceiling (m/s) for zone threat scoring
    #[arg(long, default_value = "25.0")]
    speed_max_mps: f64,
}

impl Args {
    fn zone(&self) -> Option<ZoneCircle> {
        match (self.zone_lat, self.zone_lon, self.zone_radius_m) {
            (Some(lat), Some(lon), Some(radius_m)) => Some(ZoneCircle {
                lat,
                lon,
                radius_m,
            }),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut builder = CopConfig::builder()
        .bearing_gate_deg(args.bearing_gate_deg)
        .range_gate_m(args.range_gate_m)
        .stale_ttl_s(args.stale_ttl_s)
        .dead_ttl_s(args.dead_ttl_s)
        .aging_tick(Duration::from_millis(args.tick_ms))
        .events_tail_max(args.events_tail_max)
        .pause_buffer_max(args.pause_buffer_max)
        .speed_max_mps(args.speed_max_mps);
    if let Some(zone) = args.zone() {
        builder = builder.zone(zone);
    }
    let config = builder.build();

    info!(
        bearing_gate_deg = config.bearing_gate_deg,
        range_gate_m = config.range_gate_m,
        stale_ttl_s = config.stale_ttl_s,
        dead_ttl_s = config.dead_ttl_s,
        zone = config.zone.is_some(),
        "starting COP server"
    );

    let service = Arc::new(CopService::new(config));
    spawn_aging_supervisor(Arc::clone(&service));

    let app = create_router(service);
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "serving");
    axum::serve(listener, app)
        .await
        .context("server terminated")?;
    Ok(())
}

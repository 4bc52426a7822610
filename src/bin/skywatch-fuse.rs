//! Standalone fusion filter: JSONL envelopes on stdin, emitted
//! `track.update` / `threat.assessment` envelopes on stdout.
//!
//! Useful for replaying recorded sensor captures without a server:
//!
//! ```text
//! skywatch-fuse < capture.jsonl > fused.jsonl
//! ```

use std::io::{BufRead, Write};

use clap::Parser;
use tracing::{debug, info};

use skywatch::{EventEnvelope, FusionConfig, TrackAssociator};

#[derive(Parser, Debug)]
#[command(name = "skywatch-fuse", about = "Skywatch offline fusion filter")]
struct Args {
    /// RF-to-track association gate in degrees
    #[arg(long, default_value = "12.0")]
    bearing_gate_deg: f64,

    /// Range gate in meters (carried for deployments that range-gate)
    #[arg(long, default_value = "250.0")]
    range_gate_m: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut associator = TrackAssociator::new(FusionConfig {
        bearing_gate_deg: args.bearing_gate_deg,
        range_gate_m: args.range_gate_m,
        ..FusionConfig::default()
    });

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut seen = 0usize;
    let mut emitted = 0usize;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope: EventEnvelope = match serde_json::from_str(&line) {
            Ok(env) => env,
            Err(err) => {
                debug!(error = %err, "skipping malformed line");
                continue;
            }
        };
        seen += 1;
        for event in associator.observe(&envelope) {
            serde_json::to_writer(&mut out, &event)?;
            out.write_all(b"\n")?;
            emitted += 1;
        }
    }
    out.flush()?;

    info!(seen, emitted, tracks = associator.track_count(), "done");
    Ok(())
}

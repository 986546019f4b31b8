use std::{sync::Arc, time::Duration};

use anyhow::Result;
use capture::TestPatternSource;
use clap::Parser;
use client_core::{CheckinClient, CheckinEvent, CheckinStatus, CHECKIN_INTERVAL};
use tracing::{info, warn};

/// Headless check-in runner: drives the capture loop against a station with
/// the synthetic frame source and logs every status transition.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: String,
    #[arg(long)]
    station: String,
    #[arg(long, default_value_t = CHECKIN_INTERVAL.as_millis() as u64)]
    interval_ms: u64,
    /// Perform a single check and exit; non-zero exit code on deny or error.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let client = CheckinClient::new_with_interval(
        &args.server_url,
        Duration::from_millis(args.interval_ms),
    );
    client.set_station(Some(args.station.clone())).await;
    let source = Arc::new(TestPatternSource::default());

    if args.once {
        client.perform_check(source.as_ref()).await;
        return match client.status().await {
            CheckinStatus::Pass { message } => {
                println!("PASS: {message}");
                Ok(())
            }
            CheckinStatus::Deny { message } => {
                println!("DENY: {message}");
                std::process::exit(1);
            }
            CheckinStatus::Error { message, .. } => {
                eprintln!("ERROR: {message}");
                std::process::exit(2);
            }
            other => {
                eprintln!("UNEXPECTED: {other:?}");
                std::process::exit(2);
            }
        };
    }

    let mut events = client.subscribe_events();
    let _loop_task = client.run_capture_loop(source);
    while let Ok(event) = events.recv().await {
        match event {
            CheckinEvent::StatusChanged(CheckinStatus::Checking) => {
                info!(station = %args.station, "scanning");
            }
            CheckinEvent::StatusChanged(CheckinStatus::Pass { message }) => {
                info!(station = %args.station, "pass: {message}");
            }
            CheckinEvent::StatusChanged(CheckinStatus::Deny { message }) => {
                info!(station = %args.station, "deny: {message}");
            }
            CheckinEvent::StatusChanged(CheckinStatus::Error { kind, message }) => {
                warn!(station = %args.station, ?kind, "error: {message}");
            }
            CheckinEvent::StatusChanged(CheckinStatus::Idle) => {}
            CheckinEvent::FrameCaptured(_) => {}
        }
    }

    Ok(())
}

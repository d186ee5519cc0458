//! Command-line interface for field-reporter.
//!
//! Offline helpers for operators: preview what the scheduler would do at a
//! given time and inspect or clear the retained hour marker. Reads the same
//! `FIELD_REPORTER_*` environment as the daemon.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, Time};

use field_reporter::clock::{LocalTimeReading, SimulatedClock};
use field_reporter::config::ReporterConfig;
use field_reporter::duty_cycle::{Collaborators, DutyCycleDriver, SleepPlan, Step};
use field_reporter::marker::{FileMarkerStore, HourMarker, InMemoryMarkerStore, MarkerStore};
use field_reporter::network::AlwaysReady;
use field_reporter::power::SimulatedPowerDown;
use field_reporter::telemetry::{RandomGpsPayload, SendError, TelemetryRecord, TelemetrySender};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: field-reporter-cli <command>");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  plan [HH:MM[:SS]]   Show what the scheduler would do now or at a time today");
        eprintln!("  marker              Show the retained hour marker");
        eprintln!("  marker clear        Reset the retained hour marker");
        eprintln!();
        eprintln!("Environment:");
        eprintln!("  FIELD_REPORTER_*    Same settings as field-reporterd");
        std::process::exit(1);
    }

    let config = ReporterConfig::from_env().context("invalid configuration")?;
    let command = &args[1];

    match (command.as_str(), args.get(2).map(String::as_str)) {
        ("plan", at) => cmd_plan(&config, at).await?,
        ("marker", None) => cmd_marker(&config),
        ("marker", Some("clear")) => cmd_marker_clear(&config)?,
        _ => {
            eprintln!("Unknown command: {}", args[1..].join(" "));
            eprintln!("Run without arguments to see usage.");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Captures the record instead of uploading it.
#[derive(Clone, Default)]
struct DryRunSender {
    captured: Arc<Mutex<Option<TelemetryRecord>>>,
}

#[async_trait]
impl TelemetrySender for DryRunSender {
    async fn send(&self, record: &TelemetryRecord) -> Result<(), SendError> {
        *self.captured.lock() = Some(record.clone());
        Ok(())
    }
}

/// Run one scheduler iteration against a copy of the marker and report it.
async fn cmd_plan(config: &ReporterConfig, at: Option<&str>) -> Result<()> {
    let now = local_time(config, at)?;
    let marker = FileMarkerStore::open(config.marker_path.clone()).read();
    let window = &config.duty_cycle.window;

    let sender = DryRunSender::default();
    let mut driver = DutyCycleDriver::new(
        config.device_id.clone(),
        config.duty_cycle.clone(),
        Collaborators {
            clock: Box::new(SimulatedClock::starting_at(now.datetime())),
            network: Box::new(AlwaysReady),
            marker: Box::new(InMemoryMarkerStore::new(marker)),
            payload: Box::new(RandomGpsPayload::new()),
            sender: Box::new(sender.clone()),
            power: Box::new(SimulatedPowerDown),
        },
    );
    let step = driver.step().await;

    println!("Local time: {now}");
    println!(
        "Window:     {:02}:00 to {:02}:59, wake {} min early",
        window.start_hour(),
        window.end_hour(),
        config.duty_cycle.lead_time_minutes
    );
    println!("Zone:       {:?}", window.classify(now.hour()));
    println!("Marker:     {marker}");
    match sender.captured.lock().take() {
        Some(record) => println!("Upload:     yes ({})", record.payload),
        None => println!("Upload:     no"),
    }
    match step {
        Step::Reevaluate => println!("Then:       re-evaluate immediately"),
        Step::Sleep(SleepPlan::ShortWait(d)) => println!("Then:       wait {} s", d.as_secs()),
        Step::Sleep(SleepPlan::PowerDown(d)) => {
            println!("Then:       power down for {} s", d.as_secs())
        }
    }

    Ok(())
}

/// The configured local time now, or at `at` (HH:MM or HH:MM:SS) today.
fn local_time(config: &ReporterConfig, at: Option<&str>) -> Result<LocalTimeReading> {
    let today = OffsetDateTime::now_utc().to_offset(config.utc_offset);
    let time = match at {
        None => today.time(),
        Some(text) => Time::parse(text, format_description!("[hour]:[minute]:[second]"))
            .or_else(|_| Time::parse(text, format_description!("[hour]:[minute]")))
            .with_context(|| format!("expected HH:MM or HH:MM:SS, got {text:?}"))?,
    };

    match LocalTimeReading::new(PrimitiveDateTime::new(today.date(), time)) {
        Some(reading) => Ok(reading),
        None => bail!("system clock is not set"),
    }
}

fn cmd_marker(config: &ReporterConfig) {
    let store = FileMarkerStore::open(config.marker_path.clone());
    match store.read().hour() {
        Some(hour) => println!("Last upload hour: {hour:02}"),
        None => println!("Last upload hour: none ({})", HourMarker::NONE),
    }
    println!("Stored in:        {}", store.path().display());
}

fn cmd_marker_clear(config: &ReporterConfig) -> Result<()> {
    let mut store = FileMarkerStore::open(config.marker_path.clone());
    let previous = store.read();
    store.write(HourMarker::NONE)?;
    println!("Cleared hour marker (was {previous})");
    Ok(())
}

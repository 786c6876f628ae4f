//! Command-line submitter for beacon
//!
//! Reads newline-delimited JSON events from stdin, submits each one, and
//! waits for every batch to settle before printing how many were delivered.

use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::Context;
use beacon::{Client, Config, Event, EventHandler, HandlerResult, RecordingTransport};
use clap::Parser;

/// Submit analytics events read from stdin
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Batch and deliver newline-delimited JSON events", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write key, overriding the configuration file
    #[arg(short, long)]
    write_key: Option<String>,

    /// Collector base URL, overriding the configuration file
    #[arg(long)]
    host: Option<String>,

    /// Record requests in memory instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Default)]
struct Tally {
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

impl EventHandler for Tally {
    fn on_success(&self, _event: &Event) -> HandlerResult {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn on_failure(&self, event: &Event, reason: &str) -> HandlerResult {
        self.failed.fetch_add(1, Ordering::Relaxed);
        beacon::tracing::warn!(
            target: "beacon",
            "Failed to deliver {} event: {}",
            event.kind(),
            reason
        );
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    beacon::logging::init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(write_key) = cli.write_key {
        config.write_key = write_key;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }

    let tally = Arc::new(Tally::default());
    let mut builder = Client::builder(config).handler(tally.clone());

    let recorder = cli.dry_run.then(|| Arc::new(RecordingTransport::ok()));
    if let Some(recorder) = &recorder {
        builder = builder.transport(recorder.clone());
    }
    let client = builder.build().context("Unable to start client")?;

    let mut submitted = 0usize;
    for (number, line) in io::stdin().lock().lines().enumerate() {
        let line = line.context("Unable to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let value = serde_json::from_str(&line)
            .with_context(|| format!("Line {} is not valid JSON", number + 1))?;
        let event = Event::from_value(value)
            .with_context(|| format!("Line {} is not an event", number + 1))?;

        client.enqueue(event);
        submitted += 1;
    }

    client.shutdown();

    println!(
        "submitted={submitted} delivered={} failed={}",
        tally.delivered.load(Ordering::Relaxed),
        tally.failed.load(Ordering::Relaxed)
    );
    if let Some(recorder) = recorder {
        println!("requests={}", recorder.attempts());
    }

    Ok(())
}

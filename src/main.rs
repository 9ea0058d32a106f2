// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use config::AppConfig;
use flightmap_client::{Client, PipelineError, RenderedScene};
use log::{debug, error, info, warn};
use tokio::time::MissedTickBehavior;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "flightmap")]
#[command(about = "Render the latest flight snapshot as a GeoJSON flight path layer", long_about = None)]
struct Args {
    /// URL or directory of the published snapshot tree
    #[arg(long)]
    source: Option<String>,

    /// Write the GeoJSON export to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Re-render every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    refresh: Option<u64>,

    /// Maximum flight fetches in flight at once
    #[arg(long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Name of the flight layer
    #[arg(long)]
    layer_name: Option<String>,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,

    /// Store the effective configuration, including overrides, and exit
    #[arg(long)]
    save_config: bool,

    /// Print the configuration file location and exit
    #[arg(long)]
    print_config_path: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            config.source.clone_from(source);
        }
        if let Some(output) = &self.output {
            config.output_path = Some(output.clone());
        }
        if let Some(refresh) = self.refresh {
            config.refresh_interval_secs = Some(refresh);
        }
        if let Some(limit) = self.max_concurrent {
            config.max_concurrent_fetches = Some(limit);
        }
        if let Some(name) = &self.layer_name {
            config.layer_name.clone_from(name);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if args.print_config_path {
        println!("{}", AppConfig::get_config_path()?.display());
        return Ok(());
    }

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    args.apply(&mut config);

    if args.save_config {
        config.save()?;
        info!("Configuration saved to {}", AppConfig::get_config_path()?.display());
        return Ok(());
    }

    let client = Arc::new(Client::new(config.client_config())?);
    info!("Reading snapshots from {}", client.location());

    match config.refresh_interval() {
        None => render_and_export(&client, config.output_path.as_deref()).await,
        Some(period) => {
            refresh_loop(client, period, config.output_path).await;
            Ok(())
        }
    }
}

/// Start a render every `period` until interrupted.
///
/// Each render runs as its own task, so a slow run is superseded by the next
/// tick rather than delaying it.
async fn refresh_loop(client: Arc<Client>, period: std::time::Duration, output: Option<PathBuf>) {
    info!("Refreshing every {}s, press Ctrl-C to stop", period.as_secs());

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                client.cancel();
                break;
            }
            _ = ticker.tick() => {
                let client = Arc::clone(&client);
                let output = output.clone();
                tokio::spawn(async move {
                    if let Err(e) = render_and_export(&client, output.as_deref()).await {
                        error!("Render failed: {e}");
                    }
                });
            }
        }
    }
}

async fn render_and_export(client: &Client, output: Option<&Path>) -> Result<(), BoxError> {
    let rendered = match client.render().await {
        Ok(rendered) => rendered,
        Err(PipelineError::Superseded(run_id)) => {
            debug!("Run {run_id} superseded before completion");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    log_report(&rendered);

    let mut export = rendered.scene.to_geojson();
    export["snapshot"] = rendered.run.report.snapshot.as_str().into();

    match output {
        Some(path) => {
            write_atomically(path, &export)?;
            info!("Wrote {} flight paths to {}", rendered.run.layer.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &export)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn log_report(rendered: &RenderedScene) {
    let report = &rendered.run.report;
    let published = report
        .snapshot
        .published_at()
        .map(|at| format!(" (published {})", at.to_rfc3339()))
        .unwrap_or_default();
    info!(
        "Snapshot {}{published}: rendered {} of {} aircraft in {} ms",
        report.snapshot,
        report.rendered.len(),
        report.enumerated,
        report.elapsed().num_milliseconds()
    );
    for aircraft in &report.rendered {
        debug!(
            "{}: status {:?}, score {:?}, last seen {:?}",
            aircraft.icao, aircraft.status, aircraft.surveillance_score, aircraft.last_seen
        );
    }
    if !report.failures.is_empty() {
        warn!(
            "{} aircraft could not be fetched: {}",
            report.failures.len(),
            report.failed_icaos().join(", ")
        );
    }
}

/// Replace `path` so readers never see a partially written export.
fn write_atomically(path: &Path, export: &serde_json::Value) -> Result<(), BoxError> {
    let staging = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer_pretty(&mut writer, export)?;
        writer.flush()?;
    }
    std::fs::rename(&staging, path)?;
    Ok(())
}

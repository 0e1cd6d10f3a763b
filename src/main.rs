// The MIT License (MIT)
//
// Copyright (c) 2024 Ricardo Cernic
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to
// deal in the Software without restriction, including without limitation the
// rights to use, copy, modify, merge, publish, distribute, sublicense, and/or
// sell copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS
// IN THE SOFTWARE.

use std::fs;
use std::sync::mpsc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use towerlight::application::api;
use towerlight::application::registry::ServiceRegistry;
use towerlight::config::AppConfig;
use towerlight::models::SitePayload;

#[derive(Parser)]
#[command(name = "towerlight", version, about = "Diamond and pearl alignment planner")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(short, long, default_value = "towerlight.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the service: worker pool and, when enabled, the scheduler.
    Serve,
    /// Compute one site's events for one day and print them as JSON.
    Calc {
        #[arg(long)]
        site: i64,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
    },
    /// Import sites from a JSON export file.
    Import {
        #[arg(long)]
        file: String,
    },
    /// Export every site as JSON.
    Export {
        #[arg(long)]
        file: String,
    },
}

fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("initializing logger")?;

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let registry = ServiceRegistry::build(config).context("wiring services")?;

    match cli.command {
        Command::Serve => {
            registry.start().context("starting services")?;
            log::info!(
                "towerlight up; queue {}, port {} reserved for the transport adapter",
                if registry.queue.enabled() { "enabled" } else { "disabled" },
                registry.config.port
            );

            let (shutdown_tx, shutdown_rx) = mpsc::channel();
            ctrlc::set_handler(move || {
                let _ = shutdown_tx.send(());
            })
            .context("installing signal handler")?;

            let _ = shutdown_rx.recv();
            log::info!("shutdown signal received");
            registry.shutdown();
        }
        Command::Calc { site, date } => {
            let parsed = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("bad date {date}, expected YYYY-MM-DD"))?;
            registry
                .event_service
                .generate_location_day_cache(site, parsed)
                .context("calculating")?;
            let events: Vec<_> = registry
                .event_repo
                .by_date(parsed)?
                .into_iter()
                .filter(|event| event.site_id == site)
                .collect();
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
        Command::Import { file } => {
            let raw = fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
            let payloads: Vec<SitePayload> =
                serde_json::from_str(&raw).with_context(|| format!("parsing {file}"))?;
            let response = api::import_locations(&registry, payloads)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Export { file } => {
            let payloads = api::export_locations(&registry)?;
            fs::write(&file, serde_json::to_string_pretty(&payloads)?)
                .with_context(|| format!("writing {file}"))?;
            log::info!("exported {} sites to {file}", payloads.len());
        }
    }
    Ok(())
}

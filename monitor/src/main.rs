//! Labwatch - Entry Point
//!
//! Command-line consumer for the exam-lab deployment monitor: launches a
//! cluster provisioning job and renders its progress until it settles or
//! the user cancels.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::{ColoredString, Colorize};
use tokio::sync::mpsc;
use tracing::{error, info};

use labwatch::config::Settings;
use labwatch::http::client::HttpClient;
use labwatch::logs::{init_logging, LogOptions};
use labwatch::models::log::Severity;
use labwatch::monitor::events::MonitorEvent;
use labwatch::monitor::orchestrator::{DeploymentMonitor, LaunchParams, MonitorHandle};
use labwatch::utils::version_info;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        let version = version_info();
        println!("{}", serde_json::to_string_pretty(&version).unwrap());
        return;
    }

    // Retrieve the settings file
    let settings = match cli_args.get("config") {
        Some(path) => match Settings::load(Path::new(path)).await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file: {e}");
                return;
            }
        },
        None => Settings::default(),
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let Some(launch_path) = cli_args.get("launch") else {
        eprintln!("Usage: labwatch --launch=<params.json> [--config=<settings.json>]");
        return;
    };

    let params = match load_params(Path::new(launch_path)).await {
        Ok(params) => params,
        Err(e) => {
            error!("Unable to read launch parameters: {e:#}");
            return;
        }
    };

    let api = match HttpClient::new(&settings.backend.base_url) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            return;
        }
    };

    info!(
        "Launching deployment for question set {}",
        params.question_set_id
    );
    let (handle, mut events) =
        match DeploymentMonitor::launch(api, params, settings.monitor_options()).await {
            Ok(launched) => launched,
            Err(e) => {
                error!("Launch failed: {e}");
                std::process::exit(1);
            }
        };

    let code = consume(&handle, &mut events).await;
    std::process::exit(code);
}

async fn load_params(path: &Path) -> anyhow::Result<LaunchParams> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading launch parameters from {}", path.display()))?;
    let params = serde_json::from_str(&raw).context("parsing launch parameters")?;
    Ok(params)
}

/// Drain monitor events until the job settles or the user hits Ctrl+C
async fn consume(handle: &MonitorHandle, events: &mut mpsc::UnboundedReceiver<MonitorEvent>) -> i32 {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, cancelling deployment monitor...");
                handle.cancel();
                return 130;
            }
            event = events.recv() => match event {
                Some(MonitorEvent::Log(entry)) => {
                    println!("{} {}", severity_tag(entry.severity), entry.message);
                }
                Some(MonitorEvent::Status(report)) => {
                    info!("Job phase: {}", report.phase);
                }
                Some(MonitorEvent::Connected) => {
                    info!("Log stream connected");
                }
                Some(MonitorEvent::Disconnected { .. }) => {
                    info!("Log stream disconnected, reconnecting...");
                }
                Some(MonitorEvent::Error { message }) => {
                    error!("{}", message);
                }
                Some(MonitorEvent::Completed(job)) => {
                    println!(
                        "{}",
                        format!(
                            "Deployment completed (exit code {})",
                            job.exit_code.unwrap_or(0)
                        )
                        .green()
                        .bold()
                    );
                    return 0;
                }
                Some(MonitorEvent::Failed { message, .. }) => {
                    println!("{}", format!("Deployment failed: {}", message).red().bold());
                    return 1;
                }
                None => return 0,
            }
        }
    }
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warning => " WARN".yellow(),
        Severity::Success => "   OK".green(),
        Severity::Info => " INFO".dimmed(),
    }
}

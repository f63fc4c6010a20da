//! Standalone host for the proxy manager.
//!
//! Reads one JSON message per line on stdin and writes one JSON response per line
//! on stdout. Status and notification events are written to stdout as they occur,
//! wrapped as `{"event": ...}`.
//!
//! Usage:
//! ```
//! cargo run --bin proxymanager_host -- --storage-path ./proxymanager_data
//! ```

use std::sync::Arc;

use rust_lib_proxymanager::api::proxy_api::{build_manager, subscribe_events, ManagerConfig};
use rust_lib_proxymanager::manager::ManagerHandle;
use serde_json::{json, Value};
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = match parse_args_from(std::env::args().skip(1)) {
        HostArgs::Run(config) => config,
        HostArgs::Version => {
            println!("proxymanager_host {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        HostArgs::Help => {
            print_help();
            return Ok(());
        }
    };

    tracing::info!(
        "Starting proxy manager host (storage: {})",
        config.storage_path
    );
    let mut events = subscribe_events();
    let manager = build_manager(&config)?;
    let (handle, task) = ManagerHandle::spawn(manager);

    let out = Arc::new(Mutex::new(stdout()));
    let event_out = Arc::clone(&out);
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let line = json!({ "event": event });
                    if write_line(&event_out, &line).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Dropped {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Value>(line) {
            Ok(raw) => handle.dispatch_json(&raw).await,
            Err(e) => json!({ "success": false, "error": format!("Invalid message: {}", e) }),
        };
        write_line(&out, &response).await?;
    }

    tracing::info!("stdin closed, shutting down");
    handle.shutdown().await;
    drop(handle);
    let _ = task.await;
    forwarder.abort();
    Ok(())
}

async fn write_line(out: &Mutex<tokio::io::Stdout>, value: &Value) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut out = out.lock().await;
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr) // stdout carries messages
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[derive(Debug)]
enum HostArgs {
    Run(ManagerConfig),
    Version,
    Help,
}

fn parse_args_from(args: impl IntoIterator<Item = String>) -> HostArgs {
    let mut args = args.into_iter();
    let mut config = ManagerConfig {
        storage_path: "./proxymanager_data".to_string(),
        ..ManagerConfig::default()
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--storage-path" => {
                if let Some(path) = args.next() {
                    config.storage_path = path;
                }
            }
            "--language" => {
                if let Some(code) = args.next() {
                    config.default_language = code;
                }
            }
            "--version" | "-V" => return HostArgs::Version,
            "--help" | "-h" => return HostArgs::Help,
            _ => {
                eprintln!("Unknown argument: {arg}");
            }
        }
    }

    HostArgs::Run(config)
}

fn print_help() {
    eprintln!("Proxy Manager host");
    eprintln!();
    eprintln!("Usage: proxymanager_host [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --storage-path <PATH>   Settings directory (default: ./proxymanager_data)");
    eprintln!("  --language <CODE>       Default UI language: en or ru (default: en)");
    eprintln!("  --version, -V           Print version");
    eprintln!("  --help, -h              Show this help");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn storage_path_and_language_are_read() {
        let HostArgs::Run(config) =
            parse_args_from(args(&["--storage-path", "/tmp/pm", "--language", "ru"]))
        else {
            panic!("expected run");
        };
        assert_eq!(config.storage_path, "/tmp/pm");
        assert_eq!(config.default_language, "ru");
    }

    #[test]
    fn defaults_and_flags() {
        let HostArgs::Run(config) = parse_args_from(args(&["--bogus"])) else {
            panic!("expected run");
        };
        assert_eq!(config.storage_path, "./proxymanager_data");
        assert!(matches!(parse_args_from(args(&["-V"])), HostArgs::Version));
        assert!(matches!(
            parse_args_from(args(&["--storage-path", "x", "--help"])),
            HostArgs::Help
        ));
    }
}

//! HTTPC Client Binary
//!
//! Usage: httpc-client [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE> [PAYLOAD]  Send one request
//!   -r, --repeat <N>               Send the request N times
//!   -h, --help                     Print help information

use std::env;
use std::sync::Arc;

use httpc::certs::{CertificateStore, DirectorySource};
use httpc::client::{ClientConfig, HttpcClient, Outcome};

const DEFAULT_PAYLOAD: &str = "GET / HTTP/1.1\r\nHost:x\r\n\r\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let mut config_path = None;
    let mut payload = None;
    let mut repeat = 1usize;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-c" | "--config" => {
                i += 1;
                let Some(path) = args.get(i) else {
                    eprintln!("Error: --config requires a file path");
                    return Ok(());
                };
                config_path = Some(path.clone());
            }
            "-r" | "--repeat" => {
                i += 1;
                let Some(count) = args.get(i) else {
                    eprintln!("Error: --repeat requires a count");
                    return Ok(());
                };
                repeat = count.parse()?;
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                return Ok(());
            }
            other => {
                payload = Some(other.to_string());
            }
        }
        i += 1;
    }

    let Some(config_path) = config_path else {
        eprintln!("Error: --config is required");
        return Ok(());
    };

    let payload = payload.unwrap_or_else(|| DEFAULT_PAYLOAD.to_string());
    run_client(&config_path, payload.as_bytes(), repeat).await
}

fn print_usage() {
    println!(
        r#"HTTPC Client - opportunistic secure channel in front of plain HTTP

USAGE:
    httpc-client --config <FILE> [OPTIONS] [PAYLOAD]

OPTIONS:
    -c, --config <FILE>  Path to configuration file
    -r, --repeat <N>     Send the request N times
    -h, --help           Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "server_addr": "127.0.0.1",
        "secure_port": 228,
        "http_port": 80,
        "cert_dir": "./keys"
    }}

EXAMPLES:
    Send the default request ten times:
        httpc-client --config client.json --repeat 10
"#
    );
}

async fn run_client(config_path: &str, payload: &[u8], repeat: usize) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let store = Arc::new(CertificateStore::new());
    match store.refresh_from(&DirectorySource::new(&config.cert_dir)) {
        Ok(count) => tracing::info!("Loaded {} certificates", count),
        Err(e) => tracing::warn!("No certificates loaded: {}", e),
    }

    tracing::info!("Sending to {}:{}", config.server_addr, config.secure_port);
    let client = HttpcClient::new(config, store)?;

    for _ in 0..repeat {
        match client.request_with_outcome(payload).await? {
            Outcome::Secure(response) => {
                tracing::info!("Secure response: {} bytes", response.len());
                println!("{}", String::from_utf8_lossy(&response));
            }
            Outcome::Fallback { reason, response } => {
                tracing::info!("Plain HTTP response ({})", reason);
                println!("{}", String::from_utf8_lossy(&response));
            }
        }
    }

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<ClientConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ClientConfig = serde_json::from_str(&content)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}

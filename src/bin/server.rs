//! HTTPC Server Binary
//!
//! Usage: httpc-server [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -g, --generate       Print a default configuration
//!   -h, --help           Print help information

use std::env;
use std::sync::Arc;

use httpc::certs::CertificateStore;
use httpc::server::config::ServerConfigFile;
use httpc::server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level (e.g. RUST_LOG=debug)
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

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-g" | "--generate" => {
            generate_config()?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_server(&args[2]).await?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"HTTPC Server - opportunistic secure channel in front of plain HTTP

USAGE:
    httpc-server [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file
    -g, --generate          Print a default configuration
    -h, --help              Print help information

CERTIFICATES:
    Every <name>.cat file in cert_dir holds one certificate:
        {{"id": "A", "seed": "..."}}
    The directory is re-read every refresh_interval_secs.

EXAMPLES:
    Generate a configuration:
        httpc-server --generate > server.toml

    Run the server:
        httpc-server --config server.toml
"#
    );
}

fn generate_config() -> anyhow::Result<()> {
    let config = ServerConfig::new("0.0.0.0", "./cert");
    let config_file = ServerConfigFile::from_config(&config);

    println!("# HTTPC Server Configuration");
    println!("# Generated: {}", chrono::Utc::now());
    println!();
    println!("{}", toml::to_string_pretty(&config_file)?);
    println!("# Uncomment to evict sessions idle longer than this:");
    println!("# idle_timeout_secs = 600");

    Ok(())
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    let config_content = std::fs::read_to_string(config_path)?;
    let config_file: ServerConfigFile = toml::from_str(&config_content)?;
    let config = config_file.to_config().map_err(|e: String| anyhow::anyhow!(e))?;

    tracing::info!(
        "Starting HTTPC server on {} (secure {}, http {})",
        config.listen_addr,
        config.secure_port,
        config.http_port
    );
    tracing::info!("Certificate directory: {}", config.cert_dir.display());
    tracing::info!("Temp key budget: {} requests", config.max_uses);

    let server = Server::new(config, Arc::new(CertificateStore::new()))?;
    server.run().await?;

    Ok(())
}

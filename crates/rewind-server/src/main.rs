use anyhow::Context;
use clap::Parser;
use rewind_server::admin_api::AdminApiServer;
use rewind_server::ca::LocalCa;
use rewind_server::config::{ConfigOverrides, ReplayConfig};
use rewind_server::listener::ReplayListeners;
use rewind_server::{CaptureIndex, ReplayState};
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Replay a recorded HTTP traffic capture as live servers
#[derive(Parser, Debug)]
#[command(name = "rewind", author, version, about)]
struct Args {
    /// Capture file to replay (`-` or omitted reads stdin)
    #[arg(env = "REWIND_CAPTURE")]
    capture: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long, env = "REWIND_CONFIG")]
    config: Option<PathBuf>,

    /// Admin API port
    #[arg(long, env = "REWIND_ADMIN_PORT")]
    admin_port: Option<u16>,

    /// Admin API host
    #[arg(long, env = "REWIND_ADMIN_HOST")]
    admin_host: Option<IpAddr>,

    /// Bind every replay listener to this address instead of the recorded one
    #[arg(long, env = "REWIND_BIND_ADDRESS")]
    bind_address: Option<IpAddr>,

    /// Directory for the local certificate authority
    #[arg(long, env = "REWIND_CERT_DIR")]
    cert_dir: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            admin_host: self.admin_host,
            admin_port: self.admin_port,
            bind_address: self.bind_address,
            cert_dir: self.cert_dir.clone(),
        }
    }
}

fn load_capture(path: Option<&PathBuf>) -> anyhow::Result<CaptureIndex> {
    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open capture {}", path.display()))?;
            CaptureIndex::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to index capture {}", path.display()))
        }
        _ => {
            info!("Reading capture from stdin");
            CaptureIndex::from_reader(std::io::stdin().lock())
                .context("Failed to index capture from stdin")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match &args.config {
        Some(path) => ReplayConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ReplayConfig::default(),
    }
    .with_overrides(args.overrides())?;

    let index = load_capture(args.capture.as_ref())?;
    let state = Arc::new(ReplayState::new(index));

    let ca = LocalCa::open(&config.tls.cert_dir)
        .await
        .context("Failed to open local certificate authority")?;

    let listeners =
        ReplayListeners::new(Arc::clone(&state), Arc::new(ca), config.listen.bind_address);
    let bound = listeners.start().await?;
    info!("{} replay listeners running", bound.len());

    let admin_addr = SocketAddr::new(config.admin.host, config.admin.port);
    let admin_listener = TcpListener::bind(admin_addr)
        .await
        .with_context(|| format!("Failed to bind admin API on {admin_addr}"))?;
    let admin = AdminApiServer::new(Arc::clone(&state));
    let admin_task = tokio::spawn(async move {
        if let Err(e) = admin.serve(admin_listener).await {
            error!("Admin API stopped: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    listeners.shutdown();
    admin_task.abort();

    Ok(())
}

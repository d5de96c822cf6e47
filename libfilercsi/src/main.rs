use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use libfilercsi::filer::LocalFiler;
use libfilercsi::transport::{CsiServer, tls};
use libfilercsi::{DriverConfig, FilerBackend};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filercsi")]
#[command(about = "CSI volume controller backed by a filer namespace", long_about = None)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "FILERCSI_CONFIG")]
    config: Option<PathBuf>,

    /// QUIC listen address.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Local mount point of the filer namespace.
    #[arg(long)]
    filer_mount: Option<PathBuf>,

    /// PEM certificate chain presented to clients.
    #[arg(long)]
    tls_cert: Option<PathBuf>,

    /// PEM private key for `--tls-cert`.
    #[arg(long)]
    tls_key: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config =
        DriverConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(mount) = cli.filer_mount {
        config.filer_mount = mount;
    }
    if cli.tls_cert.is_some() {
        config.tls_cert = cli.tls_cert;
    }
    if cli.tls_key.is_some() {
        config.tls_key = cli.tls_key;
    }

    let (Some(cert), Some(key)) = (config.tls_cert.as_deref(), config.tls_key.as_deref()) else {
        bail!("a TLS certificate and key are required (--tls-cert/--tls-key)");
    };
    let tls_config = tls::server_config_from_pem(cert, key)?;

    let filer = Arc::new(LocalFiler::new(&config.filer_mount));
    let backend = Arc::new(FilerBackend::from_config(&config, filer));

    info!(
        driver = %config.driver_name,
        version = %config.vendor_version,
        bucket_root = %config.bucket_root,
        filer_mount = %config.filer_mount.display(),
        "starting CSI controller",
    );

    let server = CsiServer::new(config.listen_addr, tls_config, backend)?;
    server.serve().await?;
    Ok(())
}

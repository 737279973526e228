use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dlnaconfig::UpnpConfig;
use dlnamediaserver::{MediaServerExt, MemoryCatalog};
use dlnaupnp::UpnpServer;
use dlnaupnp::logging::init_logging;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dlnad")]
#[command(about = "UPnP/DLNA media server publishing a YAML catalog")]
struct Cli {
    /// Directory holding config.yaml (otherwise $DLNA_CONFIG, then .dlna/)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// YAML catalog (containers and items) to serve
    #[arg(long, env = "DLNA_CATALOG")]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(UpnpConfig::load(cli.config_dir.as_deref())?);
    init_logging(&config.logger);

    let catalog = match &cli.catalog {
        Some(path) => MemoryCatalog::load(path)
            .with_context(|| format!("cannot load catalog {}", path.display()))?,
        None => {
            info!("No catalog given, serving an empty library");
            MemoryCatalog::new(&config.device.friendly_name)
        }
    };

    let server = UpnpServer::new(config.clone());
    let media_server = server.register_media_server(Arc::new(catalog))?;
    let addr = server.start().await?;

    info!(
        "✅ {} ready at {}/device/{}/desc.xml (listening on {})",
        config.device.friendly_name,
        config.base_url(),
        media_server.udn(),
        addr
    );

    tokio::signal::ctrl_c().await?;
    info!("👋 Shutting down...");
    server.shutdown().await;
    Ok(())
}

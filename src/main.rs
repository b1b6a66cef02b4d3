use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shrike::api;
use shrike::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shrike=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings()?;

    // Socket server listen address setup
    let listen_address: IpAddr = settings
        .listen_address
        .parse::<IpAddr>()
        .expect("Invalid ip address");
    let socket_address = SocketAddr::from((listen_address, settings.listen_port));

    // Limiter, registry, and proxy wired from settings
    let state = api::GatewayState::from_settings(&settings)?;

    // Build Axum Router
    let api = api::api(state);

    // Start server
    info!("Starting Shrike on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(api.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

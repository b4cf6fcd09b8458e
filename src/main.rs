use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orangeslice_server::catalog::mirror::CatalogMirror;
use orangeslice_server::gateway::{Gateway, HttpGateway, MemoryGateway};
use orangeslice_server::server::{config::ServerConfig, sync_service};
use orangeslice_server::web::models::push_models::WsMessage;
use orangeslice_server::web::{create_axum_router, AppState};
use orangeslice_server::VERSION;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address override, e.g. 127.0.0.1:8080
    #[arg(short, long)]
    listen: Option<String>,
}

fn init_logging() {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily("logs", "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    init_logging();
    info!("Starting OrangeSlice server, version: {}", VERSION);
    dotenv().ok();

    let mut config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load server configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    let config = Arc::new(config);

    let gateway: Arc<dyn Gateway> = match (&config.gateway_url, &config.gateway_ws_url) {
        (Some(url), Some(ws_url)) => {
            info!(url = %url, "Using hosted data gateway.");
            Arc::new(HttpGateway::connect(url, ws_url))
        }
        _ => {
            warn!("No data gateway configured; using the in-memory gateway (development mode).");
            Arc::new(MemoryGateway::new())
        }
    };

    let mirror = Arc::new(CatalogMirror::new());
    let (catalog_broadcaster_tx, _) = broadcast::channel::<WsMessage>(16);

    tokio::spawn(sync_service::run(
        gateway.clone(),
        mirror.clone(),
        catalog_broadcaster_tx.clone(),
    ));

    let app_state = Arc::new(AppState {
        gateway,
        mirror,
        catalog_broadcaster_tx,
        config: config.clone(),
    });
    let router = create_axum_router(app_state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Web server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        error!("Failed to listen for the shutdown signal.");
        return;
    }
    info!("Shutdown signal received, stopping server.");
}

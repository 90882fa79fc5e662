use anyhow::Context;
use research_relay::{api, config, logging, service::AssistantService};
use std::sync::Arc;
use tokio::net::TcpListener;

const PORT_RANGE: std::ops::RangeInclusive<u16> = 8000..=8099;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_tracing();
    let config = config::load_config().context("Failed to load config from environment")?;

    let service =
        AssistantService::from_config(&config).context("Failed to build provider clients")?;
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let (listener, port) = bind_listener(config.server_port)
        .await
        .context("Failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("Server terminated")?;
    Ok(())
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        format!(
            "No available port found in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ),
    ))
}

//! Z-axis demo: authenticate, connect, then move Z up and down forever

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use farmbot::app::run_until;
use farmbot::{Config, Farmbot, TokenClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Fails before any network I/O when credentials are missing
    let config = Config::from_env()?;

    let issuer = TokenClient::new(&config.server)?;

    let mqtt_port = config.mqtt_port;
    let rpc_timeout = config.rpc_timeout;

    // A failed startup is logged and leaves the process idle until terminated
    run_until(
        &config.credentials,
        &issuer,
        |token| {
            Farmbot::new(token)
                .with_mqtt_port(mqtt_port)
                .with_timeout(rpc_timeout)
        },
        config.interval,
        config.failure_policy,
        shutdown_signal(),
    )
    .await;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupted, shutting down"),
        Err(err) => {
            // Without a handler only an external kill stops the process
            error!(error = ?err, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

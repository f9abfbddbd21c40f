use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agency_client::bet_source::CsvFileSource;
use agency_client::config::Config;
use agency_client::events::TracingSink;
use agency_client::retry_strategy::TokioSleeper;
use agency_client::shutdown::ShutdownFlag;
use agency_client::transport::{TcpConnector, Transport};
use agency_client::SubmissionClient;

// One thread of control: every request is awaited before the next starts.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load()?;

    let level = &config.logging.level;
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("agency_client={level},shared={level}").into());

    if config.logging.json {
        // JSON structured logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        // Human-readable logging for development
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        service = "agency-client",
        version = env!("CARGO_PKG_VERSION"),
        agency = %config.client.agency_id,
        server_address = %config.client.server_address,
        max_batch = config.client.max_batch,
        "Configuration loaded"
    );

    let shutdown = ShutdownFlag::install()?;
    // let the listener register before the one-time check
    tokio::task::yield_now().await;

    let events = Arc::new(TracingSink::new(config.client.agency_id.clone()));
    let transport = Transport::new(
        TcpConnector,
        config.client.server_address.clone(),
        config.retry.policy(),
        Arc::new(TokioSleeper),
        events,
    );

    let client = SubmissionClient::new(
        config.client.agency_id.clone(),
        config.client.max_batch,
        transport,
        config.query.policy(),
        Arc::new(CsvFileSource::new(config.client.data_path.clone())),
        Arc::new(shutdown),
    );

    match client.run().await {
        Ok(outcome) => {
            tracing::debug!(outcome = ?outcome, "Client stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                action = "exit",
                result = "fail",
                category = e.category().as_str(),
                error = %e,
                "Client aborted"
            );
            Err(e.into())
        }
    }
}

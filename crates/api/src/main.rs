use anyhow::Context;

use stockledger_api::app::{self, services};
use stockledger_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load().context("failed to load configuration")?;

    stockledger_observability::init(&config.log);
    tracing::info!(environment = %config.environment, "starting stock ledger api");

    let store = services::build_store(&config.database).await?;
    let app = app::build_app(app::AppServices::new(store));

    let address = config.server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

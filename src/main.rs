//! Derator customer portal server.

use anyhow::Result;

use derator_portal::config::otlp_endpoint;
use derator_portal::utils::otel;
use derator_portal::{run_server, AppState, PortalConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let _telemetry = match otlp_endpoint() {
        Some(endpoint) => otel::init_telemetry("derator-portal", &endpoint)?,
        None => otel::init_logging(),
    };

    println!("\n{}", "═".repeat(60));
    println!("🐀 Derator customer portal v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", "═".repeat(60));

    // after the subscriber, so missing settings are logged
    let config = PortalConfig::from_env();
    println!("API: {}", config.api_base_url);
    println!("Session TTL: {}s", config.session_ttl.as_secs());
    println!(
        "Invoices: {}",
        if config.invoice_credentials.is_some() { "enabled" } else { "disabled" }
    );
    println!("{}\n", "═".repeat(60));

    let state = AppState::from_config(config)?;
    run_server(state).await
}

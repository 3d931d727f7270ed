// diagnostics-service-rs/src/main.rs
// Binary entry point for the diagnostics service.

use diagnostics_service::{app, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Get bind address from standard configuration
    let addr = config_rs::get_bind_address("DIAGNOSTICS", 8089);

    let state = AppState::from_env();

    log::info!("Diagnostics service starting on {}", addr);
    println!("Diagnostics service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

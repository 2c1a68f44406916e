use design_hub::{routes::create_app, AppState, Config};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use std::panic;

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration before tracing so `log_level` can shape the filter
    let loaded = Config::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.default_log_filter().into()))
        .init();

    info!("Starting {}...", config.cloud_service_name);
    if let Err(e) = &loaded {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
    }
    if config.cloud_auth_jwt_secret.is_none() && !config.is_development() {
        warn!("No JWT secret in {} environment: editors are identified by the user query parameter", config.environment);
    }
    let address = config.server_address();

    let state = match AppState::build(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    let app = create_app(state);

    // Start the HTTP/API server
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", address, e);
            std::process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", address);
    info!("📡 Design editing at ws://{}/api/v1/designs/{{design_id}}/ws", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}

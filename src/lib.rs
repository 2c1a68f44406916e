pub mod config;
pub mod docs;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod processors;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod ws;

pub use config::Config;
pub use state::AppState;

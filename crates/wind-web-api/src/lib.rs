//! HTTP transport for the wind dispatcher.
//!
//! Every request to `/` or `/{*path}` becomes one [`wind_core::Dispatcher`]
//! run on the blocking pool, sharing a single program cache.
pub mod config;
pub mod handlers;
pub mod problem;
pub mod routes;
pub mod server;

pub use config::Config;
pub use handlers::AppState;
pub use routes::create_router;

//! Token Guard HTTP API
//! Analysis, stats and denylist management over the shared risk engine

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod types;

pub use handlers::AppState;
pub use middleware::start_cleanup_task;
pub use routes::create_router;
pub use types::*;

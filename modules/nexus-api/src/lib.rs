pub mod routes;
pub mod server;

pub use routes::{create_app, HealthResponse};
pub use server::serve;

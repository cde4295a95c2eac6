pub mod envelope;
pub mod routes;

pub use routes::{build_router, AppState};

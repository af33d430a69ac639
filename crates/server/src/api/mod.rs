pub mod artifacts;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod submit;

pub use error::ApiError;
pub use routes::create_router;

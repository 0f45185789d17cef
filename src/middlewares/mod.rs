pub mod auth;
pub mod cors;

pub use auth::ApiKeyMiddleware;
pub use cors::create_cors;

pub mod auth;
pub mod config;
pub mod mongo;
pub mod routes;
pub mod server;

pub use auth::{AuthError, AuthUser, TokenVerifier};
pub use config::{Config, ConfigError};
pub use mongo::*;
pub use server::build;

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod crypto;
pub mod models;

pub use api::{create_router, ApiState};
pub use auth::{Credentials, Session, SessionAuthenticator};
pub use client::{OtterClient, OtterSession};
pub use config::OtterConnectorConfig;
pub use crypto::{PasswordSealer, SealError};

//! Titanic MCP
//!
//! The tool-server side of the survival service: an OAuth2 client-credentials
//! [`TokenManager`] and the [`SurvivalClient`] that calls the inference API
//! with its tokens.

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{ClientCredentials, OAuthConfig, TokenManager};
pub use client::{ApiConfig, Passenger, Pclass, Sex, Survival, SurvivalClient};
pub use error::{AuthError, AuthResult, InferenceError};

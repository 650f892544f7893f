//! Error types for the token manager and the inference client.

use thiserror::Error;

pub type AuthResult<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Domain, client id or client secret is missing.
    #[error("OAuth2 client credentials are not configured")]
    NotConfigured,

    #[error("token endpoint returned {status}: {body}")]
    CredentialExchange { status: u16, body: String },

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("access token has expired")]
    AuthExpired,

    #[error("access token rejected: {0}")]
    AuthInvalid(String),

    #[error("insufficient scope: {0}")]
    AuthInsufficientScope(String),

    #[error("inference API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not obtain an access token: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

//! Client for the survival inference API, authenticated through the shared
//! [`TokenManager`].

use crate::auth::TokenManager;
use crate::error::InferenceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// `[api]` section of `titanic.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { url: DEFAULT_API_URL.to_string(), timeout_secs: 30 }
    }
}

impl ApiConfig {
    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(url) = env("TITANIC_API_URL").filter(|v| !v.trim().is_empty()) {
            self.url = url;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Pclass {
    First,
    Second,
    Third,
}

impl TryFrom<u8> for Pclass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            3 => Ok(Self::Third),
            other => Err(format!("pclass must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Pclass> for u8 {
    fn from(value: Pclass) -> Self {
        match value {
            Pclass::First => 1,
            Pclass::Second => 2,
            Pclass::Third => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(format!("sex must be male or female, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub pclass: Pclass,
    pub sex: Sex,
    pub sibsp: u32,
    pub parch: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Survival {
    Survived,
    Died,
}

impl fmt::Display for Survival {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Survived => f.write_str("survived"),
            Self::Died => f.write_str("died"),
        }
    }
}

pub struct SurvivalClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
}

impl SurvivalClient {
    pub fn new(config: &ApiConfig, tokens: Arc<TokenManager>) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder().timeout(std::time::Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { base_url: config.url.trim_end_matches('/').to_string(), http, tokens })
    }

    /// POST the passenger to `/infer`. Sends a bearer token when the token
    /// manager is configured.
    pub async fn predict_survival(&self, passenger: &Passenger) -> Result<Survival, InferenceError> {
        let url = format!("{}/infer", self.base_url);
        let mut request = self.http.post(&url).json(passenger);
        if let Some(token) = self.tokens.get_token().await? {
            request = request.bearer_auth(token);
        }
        debug!(%url, ?passenger, "calling inference API");

        let response = request.send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify(status, body);
            if matches!(err, InferenceError::AuthExpired | InferenceError::AuthInvalid(_)) {
                self.tokens.invalidate().await;
            }
            warn!(status, error = %err, "inference request failed");
            return Err(err);
        }

        let labels: Vec<i64> = response.json().await?;
        match labels.first() {
            Some(1) => Ok(Survival::Survived),
            Some(0) => Ok(Survival::Died),
            other => Err(InferenceError::Api { status, message: format!("unexpected prediction {other:?}") }),
        }
    }

    /// Human-readable tool output. Errors are rendered, never raised.
    pub async fn describe_survival(&self, passenger: &Passenger) -> String {
        render(passenger, self.predict_survival(passenger).await)
    }
}

fn classify(status: u16, body: String) -> InferenceError {
    match status {
        401 if body.to_ascii_lowercase().contains("expired") => InferenceError::AuthExpired,
        401 => InferenceError::AuthInvalid(body),
        403 => InferenceError::AuthInsufficientScope(body),
        _ => InferenceError::Api { status, message: body },
    }
}

fn render(passenger: &Passenger, outcome: Result<Survival, InferenceError>) -> String {
    let who = format!(
        "a {} passenger in class {} with {} sibling(s)/spouse(s) and {} parent(s)/child(ren) aboard",
        match passenger.sex {
            Sex::Male => "male",
            Sex::Female => "female",
        },
        u8::from(passenger.pclass),
        passenger.sibsp,
        passenger.parch
    );
    match outcome {
        Ok(Survival::Survived) => format!("Good news! The model predicts that {who} SURVIVED."),
        Ok(Survival::Died) => format!("Unfortunately, the model predicts that {who} would NOT have survived."),
        Err(InferenceError::AuthExpired) => "Error: the access token has expired, please retry.".to_string(),
        Err(InferenceError::AuthInsufficientScope(detail)) => {
            format!("Error: the client is not allowed to call the prediction API ({detail}).")
        }
        Err(e) => format!("Error calling the Titanic API: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passenger() -> Passenger {
        Passenger { pclass: Pclass::First, sex: Sex::Female, sibsp: 0, parch: 0 }
    }

    #[test]
    fn test_passenger_wire_format() {
        let json = serde_json::to_value(passenger()).unwrap();
        assert_eq!(json, serde_json::json!({"pclass": 1, "sex": "female", "sibsp": 0, "parch": 0}));

        let bad = serde_json::from_str::<Passenger>(r#"{"pclass": 4, "sex": "male", "sibsp": 0, "parch": 0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_sex_parses_case_insensitively() {
        assert_eq!("Female".parse::<Sex>().unwrap(), Sex::Female);
        assert!("other".parse::<Sex>().is_err());
    }

    #[test]
    fn test_classify_statuses() {
        assert!(matches!(classify(401, "Token has expired".to_string()), InferenceError::AuthExpired));
        assert!(matches!(classify(401, "Invalid token".to_string()), InferenceError::AuthInvalid(_)));
        assert!(matches!(classify(403, "scope".to_string()), InferenceError::AuthInsufficientScope(_)));
        assert!(matches!(classify(500, "boom".to_string()), InferenceError::Api { status: 500, .. }));
    }

    #[test]
    fn test_render_messages() {
        let p = passenger();
        let yes = render(&p, Ok(Survival::Survived));
        assert!(yes.contains("SURVIVED") && yes.contains("Good news"));

        let no = render(&p, Ok(Survival::Died));
        assert!(no.contains("NOT have survived") && no.contains("Unfortunately"));

        let err = render(&p, Err(InferenceError::Api { status: 503, message: "Connection timeout".to_string() }));
        assert!(err.to_lowercase().contains("error"));
        assert!(err.contains("Connection timeout"));
    }
}

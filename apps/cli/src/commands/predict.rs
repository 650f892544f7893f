//! Token and inference commands.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use titanic_mcp::auth::mask;
use titanic_mcp::{Passenger, Pclass, Sex, SurvivalClient, TokenManager};

fn token_manager(config: &CliConfig) -> Result<TokenManager> {
    TokenManager::new(&config.oauth, Duration::from_secs(config.api.timeout_secs))
        .context("Failed to build the token manager")
}

pub async fn token(json: bool, config: &CliConfig) -> Result<()> {
    let manager = token_manager(config)?;
    let token = manager.get_token().await.context("Token exchange failed")?;
    let masked = token.as_deref().map(mask);

    if json {
        println!("{}", json!({ "configured": manager.is_configured(), "token": masked }));
        return Ok(());
    }
    match masked {
        Some(masked) => println!("{} {}", "Access token:".bold().green(), masked),
        None => {
            println!("{}", "OAuth2 is not configured; requests are sent without a token.".yellow());
            println!("  {}", "Set OAUTH2_DOMAIN, OAUTH2_CLIENT_ID and OAUTH2_CLIENT_SECRET.".dimmed());
        }
    }
    Ok(())
}

pub async fn predict(pclass: u8, sex: &str, sibsp: u32, parch: u32, json: bool, config: &CliConfig) -> Result<()> {
    let passenger = Passenger {
        pclass: Pclass::try_from(pclass).map_err(anyhow::Error::msg)?,
        sex: sex.parse::<Sex>().map_err(anyhow::Error::msg)?,
        sibsp,
        parch,
    };
    let client = SurvivalClient::new(&config.api, Arc::new(token_manager(config)?))?;

    if json {
        let survival = client.predict_survival(&passenger).await.context("Prediction failed")?;
        println!("{}", json!({ "passenger": passenger, "prediction": survival }));
    } else {
        println!("{}", client.describe_survival(&passenger).await);
    }
    Ok(())
}

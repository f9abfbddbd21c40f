use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use shared::{
    AgencyId, DEFAULT_MAX_BATCH, MAX_QUERY_RETRIES, MAX_RETRIES, QUERY_WAIT_TIME, WAIT_TIME,
};

use crate::retry_strategy::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    pub retry: RetryConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub agency_id: AgencyId,
    pub server_address: String,
    pub max_batch: usize,
    pub data_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub wait_time_ms: u64,
    pub backoff: BackoffMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub max_retries: u32,
    pub wait_time_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl RetryConfig {
    /// Policy shared by dials, line reads and batch sends
    pub fn policy(&self) -> RetryPolicy {
        let wait = Duration::from_millis(self.wait_time_ms);
        match self.backoff {
            BackoffMode::Fixed => RetryPolicy::fixed(self.max_retries, wait),
            BackoffMode::Exponential => {
                RetryPolicy::exponential(self.max_retries, wait, wait.saturating_mul(30))
            }
        }
    }
}

impl QueryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_retries, Duration::from_millis(self.wait_time_ms))
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let agency_id = lookup("CLI_ID").context("CLI_ID must be set")?;
        let agency_id = AgencyId::try_from(agency_id).context("CLI_ID is not a valid agency id")?;

        let backoff = match lookup("CLI_RETRY_BACKOFF")
            .unwrap_or_else(|| "fixed".to_string())
            .to_lowercase()
            .as_str()
        {
            "fixed" => BackoffMode::Fixed,
            "exponential" => BackoffMode::Exponential,
            other => bail!("CLI_RETRY_BACKOFF must be 'fixed' or 'exponential', got {other:?}"),
        };

        let config = Config {
            client: ClientConfig {
                agency_id,
                server_address: lookup("CLI_SERVER_ADDRESS")
                    .unwrap_or_else(|| "server:12345".to_string()),
                max_batch: parse_or(&lookup, "CLI_BATCH_MAX_AMOUNT", DEFAULT_MAX_BATCH)?,
                data_path: lookup("CLI_DATA_PATH")
                    .unwrap_or_else(|| "/data/agency-{id}.csv".to_string()),
            },
            retry: RetryConfig {
                max_retries: parse_or(&lookup, "CLI_MAX_RETRIES", MAX_RETRIES)?,
                wait_time_ms: parse_or(
                    &lookup,
                    "CLI_RETRY_WAIT_MS",
                    WAIT_TIME.as_millis() as u64,
                )?,
                backoff,
            },
            query: QueryConfig {
                max_retries: parse_or(&lookup, "CLI_QUERY_MAX_RETRIES", MAX_QUERY_RETRIES)?,
                wait_time_ms: parse_or(
                    &lookup,
                    "CLI_QUERY_WAIT_MS",
                    QUERY_WAIT_TIME.as_millis() as u64,
                )?,
            },
            logging: LoggingConfig {
                level: lookup("CLI_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
                json: lookup("LOG_FORMAT")
                    .map(|f| f.eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.client.max_batch == 0 {
            bail!("CLI_BATCH_MAX_AMOUNT must be greater than zero");
        }
        if self.retry.max_retries == 0 {
            bail!("CLI_MAX_RETRIES must be greater than zero");
        }
        if self.query.max_retries == 0 {
            bail!("CLI_QUERY_MAX_RETRIES must be greater than zero");
        }
        if self.client.server_address.trim().is_empty() {
            bail!("CLI_SERVER_ADDRESS must not be empty");
        }
        Ok(())
    }
}

use crate::round::DEFAULT_ROUND_SECONDS;
use chrono::Duration;
use std::env;
use std::time::Duration as StdDuration;
use thiserror::Error;

// Local development chain's first account.
const DEFAULT_OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const DEFAULT_TICK_MS: u64 = 1000;
const MAX_ROUND_SECONDS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_PINATA_POST_URL: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";
const DEFAULT_PINATA_POST_JSON_URL: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";
const DEFAULT_PINATA_HASH_URL: &str = "https://gateway.pinata.cloud/ipfs/";
const DEFAULT_CANDIDATE_IMAGE: &str = "/candidate.png";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinataSettings {
    pub api_key: String,
    pub secret_key: String,
    pub post_url: String,
    pub post_json_url: String,
    pub hash_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub contract_owner: String,
    pub round_duration: Duration,
    pub tick_interval: StdDuration,
    /// Absent when no API credentials are set.
    pub pinata: Option<PinataSettings>,
    pub vote_api_url: Option<String>,
    pub default_candidate_image: String,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let round_seconds = match get("VOTING_DURATION_SECS") {
            Some(raw) => parse_positive("VOTING_DURATION_SECS", &raw)?,
            None => DEFAULT_ROUND_SECONDS as u64,
        };
        let tick_ms = match get("TICK_INTERVAL_MS") {
            Some(raw) => parse_positive("TICK_INTERVAL_MS", &raw)?,
            None => DEFAULT_TICK_MS,
        };

        let round_duration = Some(round_seconds)
            .filter(|secs| *secs <= MAX_ROUND_SECONDS)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
            .ok_or(ConfigError::Invalid {
                key: "VOTING_DURATION_SECS",
                value: round_seconds.to_string(),
            })?;

        let pinata = match (get("PINATA_API_KEY"), get("PINATA_SECRET_KEY")) {
            (Some(api_key), Some(secret_key)) => Some(PinataSettings {
                api_key,
                secret_key,
                post_url: get("PINATA_POST_URL").unwrap_or_else(|| DEFAULT_PINATA_POST_URL.to_string()),
                post_json_url: get("PINATA_POST_JSON_URL")
                    .unwrap_or_else(|| DEFAULT_PINATA_POST_JSON_URL.to_string()),
                hash_url: get("PINATA_HASH_URL").unwrap_or_else(|| DEFAULT_PINATA_HASH_URL.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            contract_owner: get("CONTRACT_OWNER").unwrap_or_else(|| DEFAULT_OWNER.to_string()),
            round_duration,
            tick_interval: StdDuration::from_millis(tick_ms),
            pinata,
            vote_api_url: get("VOTE_API_URL"),
            default_candidate_image: get("DEFAULT_CANDIDATE_IMAGE")
                .unwrap_or_else(|| DEFAULT_CANDIDATE_IMAGE.to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract_owner: DEFAULT_OWNER.to_string(),
            round_duration: Duration::seconds(DEFAULT_ROUND_SECONDS),
            tick_interval: StdDuration::from_millis(DEFAULT_TICK_MS),
            pinata: None,
            vote_api_url: None,
            default_candidate_image: DEFAULT_CANDIDATE_IMAGE.to_string(),
        }
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

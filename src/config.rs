use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::farcaster::client::DEFAULT_NEYNAR_API_URL;
use crate::farcaster::hubs::DEFAULT_HUB_URL;
use crate::farcaster::message::FarcasterNetwork;

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
pub struct Config {
    pub db_path: String,
    /// Neynar API key, used for feed reads and (by default) hub submissions.
    pub neynar_api_key: String,
    pub neynar_api_url: String,
    /// Hub base URLs in fallback order.
    pub hub_urls: Vec<String>,
    /// Sent as `api_key` to hubs. Falls back to the Neynar key.
    pub hub_api_key: Option<String>,
    pub network: FarcasterNetwork,
    pub fetch_timeout: Duration,
    /// Upper bound on a single hub attempt.
    pub hub_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the Neynar API key, which is only
    /// required for `run`.
    pub fn load() -> Result<Self> {
        let neynar_api_key = env::var("NEYNAR_API_KEY").unwrap_or_default();

        let hub_urls = match env::var("HUB_URLS") {
            Ok(raw) => parse_hub_urls(&raw),
            Err(_) => vec![DEFAULT_HUB_URL.to_string()],
        };

        let hub_api_key = env::var("HUB_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| Some(neynar_api_key.clone()).filter(|k| !k.is_empty()));

        let network = match env::var("FARCASTER_NETWORK") {
            Ok(name) => FarcasterNetwork::parse(&name)
                .with_context(|| format!("Unknown FARCASTER_NETWORK: {name}"))?,
            Err(_) => FarcasterNetwork::Mainnet,
        };

        Ok(Self {
            db_path: env::var("AUTOREACT_DB_PATH").unwrap_or_else(|_| "./autoreact.db".to_string()),
            neynar_api_key,
            neynar_api_url: env::var("NEYNAR_API_URL")
                .unwrap_or_else(|_| DEFAULT_NEYNAR_API_URL.to_string()),
            hub_urls,
            hub_api_key,
            network,
            fetch_timeout: secs_from_env("AUTOREACT_FETCH_TIMEOUT_SECS", 15)?,
            hub_timeout: secs_from_env("AUTOREACT_HUB_TIMEOUT_SECS", 10)?,
        })
    }

    /// Check that the Neynar API key is configured.
    /// Call this before any operation that reads feeds.
    pub fn require_neynar(&self) -> Result<()> {
        if self.neynar_api_key.is_empty() {
            anyhow::bail!(
                "NEYNAR_API_KEY not set. Add it to your .env file.\n\
                 It is needed to read casts from tracked accounts."
            );
        }
        Ok(())
    }

    /// Check that at least one hub is configured.
    pub fn require_hubs(&self) -> Result<()> {
        if self.hub_urls.is_empty() {
            anyhow::bail!(
                "HUB_URLS is set but empty. List hub base URLs separated by commas,\n\
                 or unset it to use {DEFAULT_HUB_URL}."
            );
        }
        Ok(())
    }
}

/// Split a comma-separated hub list, keeping order and dropping blanks.
pub fn parse_hub_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

fn secs_from_env(name: &str, default: u64) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a whole number of seconds, got {raw:?}"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

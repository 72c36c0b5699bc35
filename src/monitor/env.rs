use std::{path::PathBuf, time::Duration};

use lettre::{address::AddressError, message::Mailbox, Address};
use reqwest::Url;
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr};
use thiserror::Error;
use tracing::error;

use crate::env::{deserialize_duration_seconds, deserialize_wallets, Cluster};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} env variable must be set")]
    Empty(&'static str),
    #[error("invalid wallet address {0:?}, expected ascii alphanumeric characters only")]
    InvalidWallet(String),
    #[error("invalid email address {address:?}: {source}")]
    InvalidEmail {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("invalid smtp relay: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[serde_as]
#[derive(Deserialize)]
pub struct AppConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub solana_rpc: Url,
    #[serde(default)]
    pub solana_cluster: Cluster,
    /// Wallets in the order they were configured.
    #[serde(deserialize_with = "deserialize_wallets")]
    pub wallet_address: Vec<String>,
    pub smtp_user: String,
    pub smtp_pass: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub email_to: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration_seconds"
    )]
    pub poll_interval_seconds: Duration,
    /// Serve a health route on this port when set.
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("/opt/solana-notifier")
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_iter(std::env::vars())
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, AppConfig>(vars)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet_address.is_empty() {
            return Err(ConfigError::Empty("WALLET_ADDRESS"));
        }

        if let Some(wallet) = self
            .wallet_address
            .iter()
            .find(|wallet| !wallet.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(ConfigError::InvalidWallet(wallet.clone()));
        }

        for (name, value) in [
            ("SMTP_USER", &self.smtp_user),
            ("SMTP_PASS", &self.smtp_pass),
            ("EMAIL_TO", &self.email_to),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Empty(name));
            }
        }

        self.sender()?;
        self.recipient()?;

        Ok(())
    }

    pub fn sender(&self) -> Result<Mailbox, ConfigError> {
        self.smtp_user
            .trim()
            .parse::<Address>()
            .map(|address| Mailbox::new(Some("Solana Notifier".to_string()), address))
            .map_err(|source| ConfigError::InvalidEmail {
                address: self.smtp_user.clone(),
                source,
            })
    }

    pub fn recipient(&self) -> Result<Mailbox, ConfigError> {
        self.email_to
            .trim()
            .parse::<Mailbox>()
            .map_err(|source| ConfigError::InvalidEmail {
                address: self.email_to.clone(),
                source,
            })
    }
}

pub fn get_app_config() -> AppConfig {
    match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to parse config: {}", err);
            std::process::exit(1);
        }
    }
}

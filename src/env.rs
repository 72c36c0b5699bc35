use std::{fmt, time::Duration};

use itertools::Itertools;
use serde::{de::Error, Deserialize, Deserializer};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Cluster {
    #[default]
    Mainnet,
    Devnet,
    Testnet,
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let str = match &self {
            Cluster::Mainnet => "mainnet",
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
        };
        write!(f, "{}", str)
    }
}

impl<'de> Deserialize<'de> for Cluster {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        match s.trim() {
            "mainnet" => Ok(Cluster::Mainnet),
            "mainnet-beta" => Ok(Cluster::Mainnet),
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            _ => Err(Error::custom(
                "cluster present but not mainnet, mainnet-beta, devnet or testnet",
            )),
        }
    }
}

pub trait ToTxExplorerUrl {
    fn to_tx_explorer_url(&self, signature: &str) -> String;
}

impl ToTxExplorerUrl for Cluster {
    fn to_tx_explorer_url(&self, signature: &str) -> String {
        match *self {
            Cluster::Mainnet => format!("https://solscan.io/tx/{}", signature),
            Cluster::Devnet => format!("https://solscan.io/tx/{}?cluster=devnet", signature),
            Cluster::Testnet => format!("https://solscan.io/tx/{}?cluster=testnet", signature),
        }
    }
}

/// Deserialize an ordered list from a comma separated string. Entries are trimmed, empty
/// entries are dropped and only the first occurrence of a duplicate is kept.
pub fn deserialize_wallets<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(s.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unique()
        .map(|s| s.to_string())
        .collect())
}

pub fn deserialize_duration_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    let seconds = s.trim().parse::<u64>().map_err(Error::custom)?;
    if seconds == 0 {
        return Err(Error::custom("duration must be at least one second"));
    }
    Ok(Duration::from_secs(seconds))
}

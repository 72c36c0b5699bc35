use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("solana rpc request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("solana rpc returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("solana rpc response contained neither result nor error")]
    MissingResult,
}

/// One entry of a `getSignaturesForAddress` response.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FetchedTransaction {
    pub signature: String,
    pub slot: u64,
    /// Solana reports failures as an object, e.g. `{"InstructionError": [0, ...]}`.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

impl FetchedTransaction {
    pub fn failed_on_chain(&self) -> bool {
        self.err.as_ref().map_or(false, |err| !err.is_null())
    }
}

#[async_trait]
pub trait TransactionFetcher {
    /// Most recent transaction of the wallet, `None` if the node knows of no history.
    async fn fetch_latest(&self, wallet: &str) -> Result<Option<FetchedTransaction>, FetchError>;
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct RpcResponse<T> {
    id: Option<u32>,
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Clone)]
pub struct SolanaRpc {
    url: Url,
    client: reqwest::Client,
}

impl SolanaRpc {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TransactionFetcher for SolanaRpc {
    async fn fetch_latest(&self, wallet: &str) -> Result<Option<FetchedTransaction>, FetchError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getSignaturesForAddress",
            "params": [wallet, { "limit": 1 }]
        });

        debug!(wallet, "requesting latest signature");

        let response: RpcResponse<Vec<FetchedTransaction>> = self
            .client
            .post(self.url.clone())
            .timeout(RPC_TIMEOUT)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response {
            RpcResponse {
                error: Some(RpcErrorObject { code, message }),
                ..
            } => Err(FetchError::Rpc { code, message }),
            // Only the newest entry matters, anything else the node returns is ignored.
            RpcResponse {
                result: Some(txs), ..
            } => Ok(txs.into_iter().next()),
            RpcResponse { result: None, .. } => Err(FetchError::MissingResult),
        }
    }
}

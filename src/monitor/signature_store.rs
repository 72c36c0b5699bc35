use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error checking file {}: {source}", .path.display())]
    Check {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Durable last-seen signature per wallet.
#[async_trait]
pub trait SignatureStore {
    /// Makes sure every wallet has a record, creating empty ones where missing. Existing records
    /// are left untouched.
    async fn initialize(&self, wallets: &[String]) -> Result<(), StoreError>;
    /// Returns `None` when no signature was recorded or the record can't be read.
    async fn load(&self, wallet: &str) -> Option<String>;
    async fn save(&self, wallet: &str, signature: &str) -> Result<(), StoreError>;
}

/// Keeps one `last_tx_<wallet>.sig` file per wallet in a single directory.
pub struct FileSignatureStore {
    dir: PathBuf,
}

impl FileSignatureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, wallet: &str) -> PathBuf {
        self.dir.join(format!("last_tx_{}.sig", wallet))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[async_trait]
impl SignatureStore for FileSignatureStore {
    async fn initialize(&self, wallets: &[String]) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        info!(dir = %self.dir.display(), "state directory ready");

        for wallet in wallets {
            let path = self.path_for(wallet);
            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|source| StoreError::Check {
                    path: path.clone(),
                    source,
                })?;

            if exists {
                info!(wallet, path = %path.display(), "existing tracking file found");
            } else {
                tokio::fs::write(&path, "")
                    .await
                    .map_err(|source| StoreError::Write {
                        path: path.clone(),
                        source,
                    })?;
                info!(wallet, path = %path.display(), "created new tracking file");
            }
        }

        Ok(())
    }

    async fn load(&self, wallet: &str) -> Option<String> {
        let path = self.path_for(wallet);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let signature = contents.trim();
                if signature.is_empty() {
                    None
                } else {
                    Some(signature.to_string())
                }
            }
            Err(err) => {
                error!(wallet, path = %path.display(), %err, "error reading last tx file");
                None
            }
        }
    }

    async fn save(&self, wallet: &str, signature: &str) -> Result<(), StoreError> {
        let path = self.path_for(wallet);
        let tmp = tmp_path(&path);

        tokio::fs::write(&tmp, signature)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(wallet, signature, "saved last tx");
        Ok(())
    }
}

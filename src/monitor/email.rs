use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use indoc::formatdoc;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::debug;

use crate::env::{Cluster, ToTxExplorerUrl};

use super::{
    env::{AppConfig, ConfigError},
    solana_rpc::FetchedTransaction,
};

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

pub const NOTIFICATION_SUBJECT: &str = "📥 New Solana Transaction!";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build notification email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("failed to deliver notification email: {0}")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait Notifier {
    async fn notify(&self, wallet: &str, tx: &FetchedTransaction) -> Result<(), NotifyError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(cluster: Cluster, wallet: &str, tx: &FetchedTransaction) -> Self {
        let url = cluster.to_tx_explorer_url(&tx.signature);
        let slot = tx.slot;
        let mut body = formatdoc!(
            "
            New transaction on wallet {wallet}

            Details: {url}

            Slot: {slot}
            "
        );

        if let Some(block_time) = tx.block_time.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
            body.push_str(&format!("Block time: {}\n", block_time.to_rfc3339()));
        }
        if let Some(memo) = &tx.memo {
            body.push_str(&format!("Memo: {}\n", memo));
        }
        if tx.failed_on_chain() {
            body.push_str("Status: failed on-chain\n");
        }

        Self {
            subject: NOTIFICATION_SUBJECT.to_string(),
            body,
        }
    }
}

/// Sends notifications over an authenticated STARTTLS SMTP relay.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    cluster: Cluster,
}

impl EmailNotifier {
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let credentials = Credentials::new(config.smtp_user.clone(), config.smtp_pass.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self {
            transport,
            from: config.sender()?,
            to: config.recipient()?,
            cluster: config.solana_cluster,
        })
    }

    fn build_message(&self, notification: Notification) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body)
            .map_err(Into::into)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, wallet: &str, tx: &FetchedTransaction) -> Result<(), NotifyError> {
        let notification = Notification::new(self.cluster, wallet, tx);
        let message = self.build_message(notification)?;

        self.transport
            .send(message)
            .await
            .map_err(|err| NotifyError::Delivery(Box::new(err)))?;

        debug!(wallet, signature = tx.signature.as_str(), "sent notification email");
        Ok(())
    }
}

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::auth::Account;
use crate::core::error::{DownloadFailure, DownloadFailureReason, InstallError, InstallResult};

/// Where artifact bytes come from.
///
/// Implementations add every received byte count to `received` as the body
/// streams in, so a batch can report progress while transfers are in flight.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, url: &str, received: &AtomicU64)
        -> Result<Vec<u8>, DownloadFailureReason>;
}

/// HTTP source backed by a shared `reqwest` client.
pub struct HttpSource {
    client: Client,
    account: Option<Account>,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            account: None,
        }
    }

    pub fn with_account(mut self, account: Option<Account>) -> Self {
        self.account = account;
        self
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    async fn fetch(
        &self,
        url: &str,
        received: &AtomicU64,
    ) -> Result<Vec<u8>, DownloadFailureReason> {
        let mut request = self.client.get(url);
        if let Some(account) = self.account.as_ref().filter(|a| a.authorizes(url)) {
            request = request.bearer_auth(&account.access_token);
        }

        let response = request.send().await.map_err(transport_reason)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadFailureReason::Status(status.as_u16()));
        }

        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport_reason)?;
            received.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

fn transport_reason(err: reqwest::Error) -> DownloadFailureReason {
    if err.is_timeout() {
        DownloadFailureReason::Transport(format!("timed out: {}", err))
    } else {
        DownloadFailureReason::Transport(err.to_string())
    }
}

/// Fetch a small document straight into memory.
pub async fn fetch_bytes(source: &dyn ArtifactSource, url: &str) -> InstallResult<Vec<u8>> {
    let received = AtomicU64::new(0);
    source
        .fetch(url, &received)
        .await
        .map_err(|reason| InstallError::Download {
            failures: vec![DownloadFailure {
                url: url.to_string(),
                dest: PathBuf::new(),
                reason,
            }],
        })
}

/// Fetch and parse a JSON document.
pub async fn fetch_json<T: DeserializeOwned>(
    source: &dyn ArtifactSource,
    url: &str,
) -> InstallResult<T> {
    let bytes = fetch_bytes(source, url).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

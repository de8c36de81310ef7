// Action submitter — signs a reaction and walks the hub fallback chain.
//
// Hubs are tried strictly in configured order. The first one to accept the
// message ends the walk. A hub that times out, refuses the connection, or
// rejects the message is recorded and the next one is tried. There is no
// retry beyond one pass over the chain: an action that fails everywhere has
// no ledger row, so the next batch run will consider it again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::feed::CandidatePost;
use super::message::{self, FarcasterNetwork, MessageError, SignedAction};
use crate::db::models::ActionKind;
use crate::keys::SignerKey;

/// Default hub used when HUB_URLS is not set.
pub const DEFAULT_HUB_URL: &str = "https://snapchain-api.neynar.com";

/// A network endpoint that accepts encoded Farcaster messages.
#[async_trait]
pub trait RelayEndpoint: Send + Sync {
    /// Human-readable name for logs and failure reports.
    fn name(&self) -> &str;

    /// Submit an encoded `Message`. Ok means the hub accepted it.
    async fn submit_message(&self, encoded: &[u8]) -> Result<()>;
}

/// One hub's failure during a submission walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub reason: String,
}

impl std::fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("could not build {kind} message: {source}")]
    Build {
        kind: ActionKind,
        #[source]
        source: MessageError,
    },
    #[error("no relay endpoints configured")]
    NoEndpoints,
    /// Every hub failed. `failures` is in attempt order; `last` is the final one.
    #[error("all relay endpoints failed, last was {last}")]
    Exhausted {
        last: EndpointFailure,
        failures: Vec<EndpointFailure>,
    },
}

/// Which hub accepted a submission.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub endpoint: String,
    pub message_hash: String,
    /// Hubs that failed before the accepting one.
    pub failed_before: Vec<EndpointFailure>,
}

/// Builds signed reactions and delivers them over an ordered hub chain.
pub struct ActionSubmitter {
    endpoints: Vec<Arc<dyn RelayEndpoint>>,
    network: FarcasterNetwork,
    attempt_timeout: Duration,
}

impl ActionSubmitter {
    pub fn new(
        endpoints: Vec<Arc<dyn RelayEndpoint>>,
        network: FarcasterNetwork,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            endpoints,
            network,
            attempt_timeout,
        }
    }

    pub fn endpoint_names(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name().to_string()).collect()
    }

    /// Sign `kind` against `target` as `signer` and deliver it.
    pub async fn submit(
        &self,
        kind: ActionKind,
        signer: &SignerKey,
        target: &CandidatePost,
    ) -> std::result::Result<SubmissionReceipt, SubmissionError> {
        let signed = self
            .sign(kind, signer, target)
            .map_err(|source| SubmissionError::Build { kind, source })?;
        self.deliver(&signed).await
    }

    fn sign(
        &self,
        kind: ActionKind,
        signer: &SignerKey,
        target: &CandidatePost,
    ) -> std::result::Result<SignedAction, MessageError> {
        let signing_key = message::parse_signing_key(&signer.private_key)?;
        message::build_reaction(
            kind,
            &signer.fid,
            &signing_key,
            &target.author_fid,
            &target.hash,
            self.network,
            Utc::now(),
        )
    }

    /// Walk the fallback chain once with an already-signed action.
    pub async fn deliver(
        &self,
        signed: &SignedAction,
    ) -> std::result::Result<SubmissionReceipt, SubmissionError> {
        let mut failures: Vec<EndpointFailure> = Vec::new();

        for endpoint in &self.endpoints {
            debug!(
                endpoint = endpoint.name(),
                kind = %signed.kind,
                post = signed.target_hash,
                "Submitting reaction"
            );

            let attempt =
                tokio::time::timeout(self.attempt_timeout, endpoint.submit_message(&signed.encoded))
                    .await;

            let reason = match attempt {
                Ok(Ok(())) => {
                    info!(
                        endpoint = endpoint.name(),
                        kind = %signed.kind,
                        post = signed.target_hash,
                        message = signed.message_hash_hex(),
                        "Hub accepted reaction"
                    );
                    return Ok(SubmissionReceipt {
                        endpoint: endpoint.name().to_string(),
                        message_hash: signed.message_hash_hex(),
                        failed_before: failures,
                    });
                }
                Ok(Err(e)) => format!("{e:#}"),
                Err(_) => format!("timed out after {:?}", self.attempt_timeout),
            };

            warn!(
                endpoint = endpoint.name(),
                kind = %signed.kind,
                post = signed.target_hash,
                reason = %reason,
                "Hub did not accept reaction, trying next"
            );
            failures.push(EndpointFailure {
                endpoint: endpoint.name().to_string(),
                reason,
            });
        }

        match failures.last() {
            Some(last) => Err(SubmissionError::Exhausted {
                last: last.clone(),
                failures,
            }),
            None => Err(SubmissionError::NoEndpoints),
        }
    }
}

/// A hub reached over its HTTP API (`POST /v1/submitMessage`).
pub struct HttpHub {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpHub {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("autoreact/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl RelayEndpoint for HttpHub {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn submit_message(&self, encoded: &[u8]) -> Result<()> {
        let url = format!("{}/v1/submitMessage", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(encoded.to_vec());
        if let Some(ref key) = self.api_key {
            request = request.header("api_key", key);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("submitMessage request to {} failed", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("hub returned {status}: {body}");
        }

        Ok(())
    }
}

/// Build the HTTP hub chain from configured URLs, in order.
pub fn http_chain(
    urls: &[String],
    api_key: Option<String>,
    timeout: Duration,
) -> Result<Vec<Arc<dyn RelayEndpoint>>> {
    urls.iter()
        .map(|url| {
            let hub = HttpHub::new(url, api_key.clone(), timeout)?;
            Ok(Arc::new(hub) as Arc<dyn RelayEndpoint>)
        })
        .collect()
}

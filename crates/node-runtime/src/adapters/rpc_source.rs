//! JSON-RPC chain source.
//!
//! Polls `eth_blockNumber` and announces each increase on a broadcast
//! channel; headers are fetched with `eth_getBlockByNumber(height, false)`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use header_tracker::{ChainSource, SourceError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared_types::{format_quantity, parse_quantity, BlockHeader, Height};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Buffered height notifications per listener.
const HEIGHT_CHANNEL_CAPACITY: usize = 64;

/// Errors from the underlying JSON-RPC client.
#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl From<RpcClientError> for SourceError {
    fn from(err: RpcClientError) -> Self {
        match err {
            RpcClientError::Http(e) => SourceError::Transport(e.to_string()),
            RpcClientError::Connection(msg) => SourceError::Transport(msg),
            RpcClientError::Rpc { code, message } => SourceError::Rpc { code, message },
            RpcClientError::Parse(msg) => SourceError::InvalidResponse(msg),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<R> {
    result: Option<R>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl<R> JsonRpcResponse<R> {
    /// Unwrap the envelope. A missing or `null` result is `Ok(None)`.
    fn into_result(self) -> Result<Option<R>, RpcClientError> {
        if let Some(error) = self.error {
            return Err(RpcClientError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(self.result)
    }
}

/// Chain source backed by an Ethereum-style JSON-RPC endpoint.
pub struct JsonRpcChainSource {
    client: Client,
    url: String,
    request_id: AtomicU64,
    heights: broadcast::Sender<Height>,
}

impl JsonRpcChainSource {
    pub fn new(url: impl Into<String>) -> Result<Self, RpcClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(2))
            .build()?;
        let (heights, _) = broadcast::channel(HEIGHT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
            heights,
        })
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<Option<R>, RpcClientError>
    where
        P: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    RpcClientError::Connection(format!("Cannot connect to {}", self.url))
                } else {
                    RpcClientError::Http(e)
                }
            })?;

        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| RpcClientError::Parse(e.to_string()))?;
        body.into_result()
    }

    /// Current upstream height.
    pub async fn block_number(&self) -> Result<Height, RpcClientError> {
        let raw: String = self
            .call("eth_blockNumber", [(); 0])
            .await?
            .ok_or_else(|| RpcClientError::Parse("Missing result in response".to_string()))?;
        parse_quantity(&raw).map_err(|e| RpcClientError::Parse(e.to_string()))
    }

    /// Poll `eth_blockNumber` every `interval`, announcing each increase.
    ///
    /// The first successful poll is always announced. Failed polls are
    /// logged and skipped.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let source = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last = None;
            loop {
                ticker.tick().await;
                match source.block_number().await {
                    Ok(height) => {
                        if advance(&mut last, height) {
                            debug!(height, "Chain source advanced");
                            // No listeners yet is not an error.
                            let _ = source.heights.send(height);
                        }
                    }
                    Err(e) => warn!(url = %source.url, error = %e, "Block number poll failed"),
                }
            }
        })
    }
}

/// Record `height` and report whether it is higher than anything seen.
fn advance(last: &mut Option<Height>, height: Height) -> bool {
    match *last {
        Some(seen) if height <= seen => false,
        _ => {
            *last = Some(height);
            true
        }
    }
}

#[async_trait]
impl ChainSource for JsonRpcChainSource {
    fn latest_heights(&self) -> broadcast::Receiver<Height> {
        self.heights.subscribe()
    }

    async fn header_by_height(&self, height: Height) -> Result<Option<BlockHeader>, SourceError> {
        let header = self
            .call::<_, BlockHeader>("eth_getBlockByNumber", (format_quantity(height), false))
            .await?;
        Ok(header)
    }
}

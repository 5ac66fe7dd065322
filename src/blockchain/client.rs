//! Solana JSON-RPC client with timeout and error classification.
//!
//! # Responsibilities
//! - Speak JSON-RPC 2.0 to a single endpoint
//! - Query chain state (block height, blockhash, signature status, balance)
//! - Classify every failure once into an `RpcError` kind
//!
//! Nothing above this module inspects HTTP status codes or error strings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::blockchain::types::{
    AccountData, Blockhash, BlockchainError, Commitment, RpcError, RpcResult, SignatureStatus,
};
use crate::blockchain::wallet::SignedTransaction;

/// The chain RPC surface the pipeline needs from one endpoint.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Endpoint this client talks to.
    fn url(&self) -> &Url;

    /// Cheap liveness check.
    async fn get_health(&self) -> RpcResult<()>;

    async fn get_block_height(&self, commitment: Commitment) -> RpcResult<u64>;

    async fn get_latest_blockhash(&self, commitment: Commitment) -> RpcResult<Blockhash>;

    /// Dispatch a signed transaction; returns its signature.
    async fn send_transaction(&self, tx: &SignedTransaction) -> RpcResult<String>;

    /// Status of one signature. With `search_history` the node also looks
    /// beyond its recent status cache.
    async fn get_signature_status(
        &self,
        signature: &str,
        search_history: bool,
    ) -> RpcResult<Option<SignatureStatus>>;

    async fn get_balance(&self, address: &str, commitment: Commitment) -> RpcResult<u64>;

    /// Account contents, or `None` when the account does not exist.
    async fn get_account_info(&self, address: &str, commitment: Commitment) -> RpcResult<Option<AccountData>>;
}

/// Builds RPC clients for endpoint URLs.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, url: &Url) -> Arc<dyn RpcClient>;
}

/// JSON-RPC over HTTP.
#[derive(Clone)]
pub struct HttpRpcClient {
    url: Url,
    http: reqwest::Client,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

/// `getAccountInfo` value with `base64` encoding; `data` is `[payload, "base64"]`.
#[derive(Debug, Deserialize)]
struct EncodedAccount {
    owner: String,
    lamports: u64,
    data: (String, String),
}

impl EncodedAccount {
    fn decode(self) -> RpcResult<AccountData> {
        if self.data.1 != "base64" {
            return Err(RpcError::Malformed(format!("unexpected account encoding '{}'", self.data.1)));
        }
        let data = base64::decode(&self.data.0)
            .map_err(|e| RpcError::Malformed(format!("account data is not base64: {}", e)))?;
        Ok(AccountData {
            owner: self.owner,
            lamports: self.lamports,
            data,
        })
    }
}

impl HttpRpcClient {
    /// Create a client with its own connection pool.
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, BlockchainError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BlockchainError::InvalidEndpoint {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_http(url, http, request_timeout))
    }

    /// Create a client sharing an existing connection pool.
    pub fn with_http(url: Url, http: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            url,
            http,
            request_timeout,
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> RpcResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(self.url.clone())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimited(format!("HTTP 429 from {}", self.url)));
        }
        if status.is_server_error() {
            return Err(RpcError::Unhealthy(format!("HTTP {} from {}", status.as_u16(), self.url)));
        }
        if !status.is_success() {
            return Err(RpcError::Rejected {
                code: status.as_u16() as i64,
                message: format!("HTTP {} from {}", status.as_u16(), self.url),
            });
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if let Some(error) = envelope.error {
            tracing::debug!(method, endpoint = %self.url, code = error.code, message = %error.message, "RPC error response");
            return Err(classify_rpc_error(error.code, error.message));
        }

        envelope
            .result
            .ok_or_else(|| RpcError::Malformed(format!("{} response has no result", method)))
    }

    fn classify_transport(&self, e: reqwest::Error) -> RpcError {
        if e.is_timeout() {
            RpcError::Timeout(self.request_timeout)
        } else if e.is_decode() {
            RpcError::Malformed(e.to_string())
        } else {
            RpcError::Transient(e.to_string())
        }
    }
}

/// Map a JSON-RPC error object to an error kind.
pub fn classify_rpc_error(code: i64, message: String) -> RpcError {
    match code {
        429 | -32429 => RpcError::RateLimited(message),
        // Internal error, block not available, node unhealthy/behind,
        // minimum context slot not reached.
        -32603 | -32004 | -32005 | -32014 | -32016 => RpcError::Unhealthy(message),
        _ if message.to_ascii_lowercase().contains("rate limit")
            || message.to_ascii_lowercase().contains("too many requests") =>
        {
            RpcError::RateLimited(message)
        }
        _ => RpcError::Rejected { code, message },
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    fn url(&self) -> &Url {
        &self.url
    }

    async fn get_health(&self) -> RpcResult<()> {
        let status: String = self.call("getHealth", json!([])).await?;
        if status == "ok" {
            Ok(())
        } else {
            Err(RpcError::Unhealthy(format!("node reports health '{}'", status)))
        }
    }

    async fn get_block_height(&self, commitment: Commitment) -> RpcResult<u64> {
        self.call("getBlockHeight", json!([{ "commitment": commitment }])).await
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> RpcResult<Blockhash> {
        let response: WithContext<Blockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment }]))
            .await?;
        Ok(response.value)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> RpcResult<String> {
        let encoded = bs58::encode(&tx.wire_bytes).into_string();
        self.call(
            "sendTransaction",
            json!([encoded, { "encoding": "base58", "skipPreflight": false, "maxRetries": 0 }]),
        )
        .await
    }

    async fn get_signature_status(
        &self,
        signature: &str,
        search_history: bool,
    ) -> RpcResult<Option<SignatureStatus>> {
        let response: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": search_history }]),
            )
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }

    async fn get_balance(&self, address: &str, commitment: Commitment) -> RpcResult<u64> {
        let response: WithContext<u64> = self
            .call("getBalance", json!([address, { "commitment": commitment }]))
            .await?;
        Ok(response.value)
    }

    async fn get_account_info(&self, address: &str, commitment: Commitment) -> RpcResult<Option<AccountData>> {
        let response: WithContext<Option<EncodedAccount>> = self
            .call(
                "getAccountInfo",
                json!([address, { "encoding": "base64", "commitment": commitment }]),
            )
            .await?;
        response.value.map(EncodedAccount::decode).transpose()
    }
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("url", &self.url.as_str())
            .field("timeout", &self.request_timeout)
            .finish()
    }
}

/// Connector producing `HttpRpcClient`s over one shared connection pool.
#[derive(Clone)]
pub struct HttpConnector {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(request_timeout: Duration) -> Result<Self, BlockchainError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BlockchainError::InvalidEndpoint {
                url: "*".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_http(http, request_timeout))
    }

    pub fn with_http(http: reqwest::Client, request_timeout: Duration) -> Self {
        Self { http, request_timeout }
    }
}

impl RpcConnector for HttpConnector {
    fn connect(&self, url: &Url) -> Arc<dyn RpcClient> {
        Arc::new(HttpRpcClient::with_http(url.clone(), self.http.clone(), self.request_timeout))
    }
}

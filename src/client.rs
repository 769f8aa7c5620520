use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use crate::error::Error;
use crate::models::{Block, Transaction};

/// Default endpoint for Ethereum mainnet.
pub const ENDPOINT: &str = "https://eth.getblock.io/mainnet/";

const AUTH_HEADER: &str = "x-api-key";

/// Attempt budget for transient failures. 4xx responses and JSON-RPC error
/// objects are never retried.
const MAX_ATTEMPTS: u32 = 5;

/// The two-operation contract the pipeline consumes. Retry policy lives behind
/// this boundary; callers never re-retry a failed fetch.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Height of the most recently produced block.
    async fn head_number(&self) -> Result<u64, Error>;

    /// Block at `number`, transactions included.
    async fn block_by_number(&self, number: u64) -> Result<Block, Error>;
}

/// JSON-RPC client for https://eth.getblock.io/mainnet/, authenticating with
/// an API key header.
pub struct RpcClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    request_id: AtomicU64,
}

impl RpcClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_endpoint(ENDPOINT, token)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Sends one JSON-RPC request, retrying transport failures and 5xx
    /// responses up to `MAX_ATTEMPTS` times.
    async fn call(&self, method: &str, params: Value) -> Result<Value, Error> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut last_err = Error::Transport("retry budget exhausted".into());
        for attempt in 1..=MAX_ATTEMPTS {
            let sent = self
                .http
                .post(&self.endpoint)
                .header(AUTH_HEADER, &self.token)
                .json(&request)
                .send()
                .await;

            let response = match sent {
                Ok(r) => r,
                Err(e) => {
                    warn!(method, attempt, "transport error: {e}");
                    last_err = Error::Transport(e.to_string());
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                warn!(method, attempt, %status, "server error");
                last_err = Error::Transport(format!("{method}: server returned {status}"));
                continue;
            }
            if !status.is_success() {
                return Err(Error::Client(format!("{method}: server returned {status}")));
            }

            let body: RpcResponse = response
                .json()
                .await
                .map_err(|e| Error::Decode(e.to_string()))?;
            if let Some(e) = body.error {
                return Err(Error::Client(format!("{method}: rpc error {}: {}", e.code, e.message)));
            }
            return body
                .result
                .ok_or_else(|| Error::Decode(format!("{method}: response has no result")));
        }

        Err(last_err)
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn head_number(&self) -> Result<u64, Error> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let quantity: String =
            serde_json::from_value(result).map_err(|e| Error::Decode(e.to_string()))?;
        parse_quantity_u64(&quantity)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, Error> {
        let result = self
            .call("eth_getBlockByNumber", json!([format!("{number:#x}"), true]))
            .await?;
        let raw: RawBlock =
            serde_json::from_value(result).map_err(|e| Error::Decode(e.to_string()))?;
        decode_block(raw)
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RawBlock {
    number: String,
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

#[derive(Deserialize)]
struct RawTransaction {
    from: String,
    to: Option<String>,
    value: String,
}

fn decode_block(raw: RawBlock) -> Result<Block, Error> {
    Ok(Block {
        number: parse_quantity_u64(&raw.number)?,
        transactions: raw
            .transactions
            .into_iter()
            .map(decode_transaction)
            .collect::<Result<_, _>>()?,
    })
}

fn decode_transaction(raw: RawTransaction) -> Result<Transaction, Error> {
    Ok(Transaction {
        from: raw.from,
        to: raw.to.unwrap_or_default(),
        value: parse_quantity(&raw.value)?,
    })
}

/// Decodes a `0x`-prefixed hex quantity. The empty string decodes to zero;
/// anything else malformed is a decode failure, not a crash.
fn parse_quantity(s: &str) -> Result<BigUint, Error> {
    if s.is_empty() {
        return Ok(BigUint::default());
    }
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::Decode(format!("not a hex quantity: {s:?}")))
}

fn parse_quantity_u64(s: &str) -> Result<u64, Error> {
    if s.is_empty() {
        return Ok(0);
    }
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|_| Error::Decode(format!("not a hex block number: {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn quantities_decode() {
        assert_eq!(parse_quantity("0x0").unwrap(), BigUint::from(0u8));
        assert_eq!(parse_quantity("0x1b4").unwrap(), BigUint::from(436u32));
        assert_eq!(parse_quantity("").unwrap(), BigUint::from(0u8));
        assert_eq!(
            parse_quantity("0xde0b6b3a7640000").unwrap(),
            "1000000000000000000".parse().unwrap()
        );
        assert!(matches!(parse_quantity("0xzz"), Err(Error::Decode(_))));
        assert!(matches!(parse_quantity("0x"), Err(Error::Decode(_))));

        assert_eq!(parse_quantity_u64("0x10").unwrap(), 16);
        assert!(matches!(parse_quantity_u64("nope"), Err(Error::Decode(_))));
    }

    #[test]
    fn block_decodes_with_null_recipient() {
        let raw: RawBlock = serde_json::from_value(json!({
            "number": "0x64",
            "transactions": [
                {"from": "0xaa", "to": "0xbb", "value": "0x5"},
                {"from": "0xaa", "to": null, "value": "0x1"},
            ],
        }))
        .unwrap();

        let block = decode_block(raw).unwrap();
        assert_eq!(block.number, 100);
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1].to, "");
    }

    #[test]
    fn malformed_value_is_a_decode_error() {
        let raw: RawBlock = serde_json::from_value(json!({
            "number": "0x64",
            "transactions": [{"from": "0xaa", "to": "0xbb", "value": "bogus"}],
        }))
        .unwrap();
        assert!(matches!(decode_block(raw), Err(Error::Decode(_))));
    }

    /// Serves a JSON-RPC endpoint that fails the first `failures` requests with
    /// the given status, then answers `eth_blockNumber` with 0x64.
    async fn mock_endpoint(failures: usize, status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let app = Router::new().route(
            "/",
            post(move || {
                let seen = Arc::clone(&seen);
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < failures {
                        (status, String::new())
                    } else {
                        (
                            StatusCode::OK,
                            r#"{"jsonrpc":"2.0","id":1,"result":"0x64"}"#.to_string(),
                        )
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/"), hits)
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let (endpoint, hits) = mock_endpoint(2, StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = RpcClient::with_endpoint(endpoint, "test-token");

        assert_eq!(client.head_number().await.unwrap(), 100);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let (endpoint, hits) = mock_endpoint(usize::MAX, StatusCode::BAD_GATEWAY).await;
        let client = RpcClient::with_endpoint(endpoint, "test-token");

        assert!(matches!(client.head_number().await, Err(Error::Transport(_))));
        assert_eq!(hits.load(Ordering::SeqCst), MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (endpoint, hits) = mock_endpoint(usize::MAX, StatusCode::UNAUTHORIZED).await;
        let client = RpcClient::with_endpoint(endpoint, "bad-token");

        assert!(matches!(client.head_number().await, Err(Error::Client(_))));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rpc_error_objects_surface_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let app = Router::new().route(
            "/",
            post(move || {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"bad params"}}"#
                        .to_string()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = RpcClient::with_endpoint(format!("http://{addr}/"), "test-token");
        let err = client.head_number().await.unwrap_err();
        assert!(matches!(err, Error::Client(_)));
        assert!(err.to_string().contains("bad params"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

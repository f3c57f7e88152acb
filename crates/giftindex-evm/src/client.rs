//! Chain client: the two JSON-RPC calls the poller needs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use giftindex_core::types::{parse_hex_u64, to_hex_quantity};
use giftindex_core::{IndexerError, RawLog};
use giftindex_rpc::{RpcTransport, TransportError};

/// Read access to the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The node's current head block number.
    async fn latest_block(&self) -> Result<u64, IndexerError>;

    /// All logs emitted by `address` in the inclusive range `[from, to]`.
    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, IndexerError>;
}

#[async_trait]
impl<C: ChainClient + ?Sized> ChainClient for Arc<C> {
    async fn latest_block(&self) -> Result<u64, IndexerError> {
        (**self).latest_block().await
    }

    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, IndexerError> {
        (**self).get_logs(address, from, to).await
    }
}

/// [`ChainClient`] over any JSON-RPC transport.
pub struct RpcChainClient<T> {
    transport: T,
}

impl<T: RpcTransport> RpcChainClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn transport_err(method: &str, e: TransportError) -> IndexerError {
    tracing::debug!(method, retryable = e.is_retryable(), error = %e, "rpc call failed");
    IndexerError::Transport(format!("{method}: {e}"))
}

#[async_trait]
impl<T: RpcTransport> ChainClient for RpcChainClient<T> {
    async fn latest_block(&self) -> Result<u64, IndexerError> {
        let hex: String = self
            .transport
            .call("eth_blockNumber", vec![])
            .await
            .map_err(|e| transport_err("eth_blockNumber", e))?;
        parse_hex_u64(&hex).ok_or_else(|| {
            IndexerError::Transport(format!("eth_blockNumber: invalid quantity {hex:?}"))
        })
    }

    async fn get_logs(
        &self,
        address: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, IndexerError> {
        let filter = json!({
            "address": address,
            "fromBlock": to_hex_quantity(from),
            "toBlock": to_hex_quantity(to),
        });
        let logs: Vec<RawLog> = self
            .transport
            .call("eth_getLogs", vec![filter])
            .await
            .map_err(|e| transport_err("eth_getLogs", e))?;
        tracing::debug!(from, to, count = logs.len(), url = %self.transport.url(), "eth_getLogs");
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use giftindex_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
    use serde_json::Value;

    /// Replies with a canned result and remembers every request.
    struct ScriptedTransport {
        reply: Result<Value, JsonRpcError>,
        seen: Mutex<Vec<JsonRpcRequest>>,
    }

    impl ScriptedTransport {
        fn ok(result: Value) -> Self {
            Self {
                reply: Ok(result),
                seen: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            let id = req.id.clone();
            self.seen.lock().unwrap().push(req);
            let (result, error) = match &self.reply {
                Ok(v) => (Some(v.clone()), None),
                Err(e) => (None, Some(e.clone())),
            };
            Ok(JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id,
                result,
                error,
            })
        }

        fn url(&self) -> &str {
            "mock://"
        }
    }

    #[tokio::test]
    async fn latest_block_parses_hex() {
        let client = RpcChainClient::new(ScriptedTransport::ok(json!("0x1b4")));
        assert_eq!(client.latest_block().await.unwrap(), 436);
        let seen = client.transport().seen.lock().unwrap();
        assert_eq!(seen[0].method, "eth_blockNumber");
        assert!(seen[0].params.is_empty());
    }

    #[tokio::test]
    async fn latest_block_rejects_garbage() {
        let client = RpcChainClient::new(ScriptedTransport::ok(json!("pending")));
        let err = client.latest_block().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn get_logs_sends_hex_range_filter() {
        let client = RpcChainClient::new(ScriptedTransport::ok(json!([{
            "address": "0x3a8de1e232d9674626a49e0127dfd8cc3ad9cb68",
            "topics": ["0x01"],
            "data": "0x",
            "blockNumber": "0x6a",
            "blockHash": "0xaa",
            "transactionHash": "0xBB",
            "logIndex": "0x0",
            "removed": false
        }])));

        let logs = client
            .get_logs("0x3a8de1e232d9674626a49e0127dfd8cc3ad9cb68", 106, 110)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number_u64(), Some(106));

        let seen = client.transport().seen.lock().unwrap();
        assert_eq!(seen[0].method, "eth_getLogs");
        assert_eq!(seen[0].params[0]["fromBlock"], "0x6a");
        assert_eq!(seen[0].params[0]["toBlock"], "0x6e");
    }

    #[tokio::test]
    async fn node_error_is_transport_error() {
        let client = RpcChainClient::new(ScriptedTransport {
            reply: Err(JsonRpcError {
                code: -32005,
                message: "query returned more than 10000 results".into(),
                data: None,
            }),
            seen: Mutex::new(vec![]),
        });
        let err = client.get_logs("0x00", 1, 2).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("-32005"));
    }
}

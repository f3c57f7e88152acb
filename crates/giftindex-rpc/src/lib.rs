//! giftindex-rpc: JSON-RPC plumbing for the indexer's chain client.
//!
//! - [`RpcTransport`]: async trait every transport implements
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`]: structured error type
//! - [`HttpRpcClient`]: `reqwest`-backed transport
//!
//! No retries here: a failed call aborts the poll
//! cycle and the poller tries again on its next tick.

pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::RpcTransport;

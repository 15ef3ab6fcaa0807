//! The `RpcTransport` trait, the boundary to the network client.
//!
//! HTTP / WebSocket clients live outside this crate; anything that can move
//! a JSON-RPC request to a node and back implements this trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// # Thread Safety
/// Implementations must be `Send + Sync`; one transport is shared by every
/// concurrent read, write and subscription task.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    ///
    /// Node-side errors are returned inside the response, not as `Err`;
    /// `Err` is reserved for failures to complete the round trip.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Send a batch of requests. Sequential by default.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let mut responses = Vec::with_capacity(reqs.len());
        for req in reqs {
            responses.push(self.send(req).await?);
        }
        Ok(responses)
    }

    /// Endpoint identifier, used in logs.
    fn url(&self) -> &str;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        (**self).send(req).await
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        (**self).send_batch(reqs).await
    }

    fn url(&self) -> &str {
        (**self).url()
    }
}

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};

use crate::state::NodeState;

pub const JSONRPC_VERSION: &str = "2.0";
pub const STATIC_ID: &str = "documentation";
pub const GET_NODE_STATE: &str = "getnodestate";

/// Failure modes of a single `getnodestate` round trip
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("error getting response from {url}: {source}")]
    Transport { url: String, source: reqwest::Error },
    #[error("error reading response: {0}")]
    Body(#[source] reqwest::Error),
    #[error("unable to decode node state: {0}")]
    Decode(#[from] serde_json::Error),
}

/// JSON-RPC request envelope. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStateRequest {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'static str,
    pub params: Vec<serde_json::Value>,
}

impl Default for NodeStateRequest {
    fn default() -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: STATIC_ID,
            method: GET_NODE_STATE,
            params: Vec::new(),
        }
    }
}

/// `result` member of a `getnodestate` response
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct NodeStateResult {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub latest_block_height: u64,
}

/// Node State Response
///
/// Missing or `null` members decode to their defaults, so an error envelope
/// with `"result": null` yields an empty status and height 0.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NodeStateResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub result: NodeStateResult,
    pub error: Option<serde_json::Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<NodeStateResult> for NodeState {
    fn from(result: NodeStateResult) -> Self {
        Self {
            status: result.status,
            block_height: result.latest_block_height,
        }
    }
}

impl NodeStateResponse {
    /// Decodes a raw response body
    pub fn from_slice(body: &[u8]) -> Result<Self, RpcError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// Client for the upstream node's `getnodestate` endpoint
#[derive(Debug, Clone)]
pub struct NodeStateClient {
    /// Upstream request url
    pub url: String,
    /// HTTP Client
    client: Client,
}

impl NodeStateClient {
    /// Creates a client without a request timeout
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: Client::new(),
        }
    }

    /// Creates a client whose requests give up after `timeout`
    pub fn with_timeout(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    /// Requests the current node state.
    ///
    /// The upstream HTTP status is not inspected; only the body is decoded.
    pub async fn node_state(&self) -> Result<NodeState, RpcError> {
        tracing::debug!("Sending {} request to url: {}", GET_NODE_STATE, self.url);

        let res = self
            .client
            .post(&self.url)
            .json(&NodeStateRequest::default())
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let body = res.bytes().await.map_err(RpcError::Body)?;
        let response = NodeStateResponse::from_slice(&body)?;

        if let Some(err) = &response.error {
            tracing::warn!("upstream returned a json-rpc error: {}", err);
        }

        Ok(response.result.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_wire_format() {
        let body = serde_json::to_string(&NodeStateRequest::default()).unwrap();
        assert_eq!(
            body,
            r#"{"jsonrpc":"2.0","id":"documentation","method":"getnodestate","params":[]}"#
        );
    }

    #[test]
    fn decodes_result_envelope() {
        let body = br#"{"jsonrpc":"2.0","id":"documentation","result":{"status":"Mining","latest_block_height":12345,"peers":8}}"#;
        let response = NodeStateResponse::from_slice(body).unwrap();
        let state = NodeState::from(response.result);

        assert_eq!(state.status, "Mining");
        assert_eq!(state.block_height, 12345);
        assert!(response.error.is_none());
    }

    #[test]
    fn missing_members_default() {
        let response = NodeStateResponse::from_slice(b"{}").unwrap();
        assert_eq!(response.result, NodeStateResult::default());

        let response =
            NodeStateResponse::from_slice(br#"{"error":{"code":-32601,"message":"nope"}}"#)
                .unwrap();
        assert_eq!(response.result.latest_block_height, 0);
        assert!(response.error.is_some());
    }

    #[test]
    fn null_members_default() {
        let body = br#"{"jsonrpc":"2.0","id":"documentation","result":null,"error":{"code":-32000,"message":"node not ready"}}"#;
        let response = NodeStateResponse::from_slice(body).unwrap();
        assert_eq!(response.result, NodeStateResult::default());
        assert!(response.error.is_some());

        let body = br#"{"result":{"status":null,"latest_block_height":5}}"#;
        let state = NodeState::from(NodeStateResponse::from_slice(body).unwrap().result);
        assert_eq!(state.status, "");
        assert_eq!(state.block_height, 5);
        assert_eq!(state.status_code(), 0);

        let body = br#"{"result":{"status":"Ready","latest_block_height":null}}"#;
        let state = NodeState::from(NodeStateResponse::from_slice(body).unwrap().result);
        assert_eq!(state.status_code(), 3);
        assert_eq!(state.block_height, 0);
    }

    #[test]
    fn rejects_non_json_body() {
        let err = NodeStateResponse::from_slice(b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }

    #[test]
    fn rejects_mistyped_height() {
        let body = br#"{"result":{"status":"Ready","latest_block_height":"12"}}"#;
        assert!(NodeStateResponse::from_slice(body).is_err());

        let body = br#"{"result":{"status":"Ready","latest_block_height":-1}}"#;
        assert!(NodeStateResponse::from_slice(body).is_err());
    }
}

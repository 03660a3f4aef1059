//! Node pool gateway
//!
//! Tries each configured node strictly in order and returns the first response
//! that both arrives and reports `"status": "success"`. No concurrency and no
//! per-node retries, so a logical call costs at most `nodes × timeout`.

use super::{LedgerRpc, RpcError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Why a single node attempt was rejected
#[derive(Debug)]
enum NodeError {
    Transport(reqwest::Error),
    Http(reqwest::StatusCode),
    MissingResult,
    Status(String),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::Transport(e) => write!(f, "transport error: {}", e),
            NodeError::Http(status) => write!(f, "HTTP {}", status),
            NodeError::MissingResult => write!(f, "response has no result object"),
            NodeError::Status(status) => write!(f, "node reported {}", status),
        }
    }
}

impl From<reqwest::Error> for NodeError {
    fn from(err: reqwest::Error) -> Self {
        NodeError::Transport(err)
    }
}

pub struct RpcGateway {
    client: reqwest::Client,
    nodes: Vec<String>,
}

impl RpcGateway {
    /// Build a gateway over `nodes` with a per-call `timeout`
    pub fn new(nodes: Vec<String>, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("burnflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, nodes })
    }

    async fn call_node(&self, node: &str, body: &Value) -> Result<Value, NodeError> {
        let response = self.client.post(node).json(body).send().await?;

        if !response.status().is_success() {
            return Err(NodeError::Http(response.status()));
        }

        let body: Value = response.json().await?;
        extract_result(body)
    }
}

#[async_trait]
impl LedgerRpc for RpcGateway {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({ "method": method, "params": [params] });

        for node in &self.nodes {
            match self.call_node(node, &body).await {
                Ok(result) => {
                    log::debug!("{} answered by {}", method, node);
                    return Ok(result);
                }
                Err(e) => {
                    log::warn!("⚠️  {} failed on {}: {}", method, node, e);
                }
            }
        }

        Err(RpcError::AllNodesFailed {
            method: method.to_string(),
            nodes: self.nodes.len(),
        })
    }
}

/// Pull the `result` object out of a JSON-RPC body, rejecting non-success statuses
fn extract_result(mut body: Value) -> Result<Value, NodeError> {
    let result = match body.get_mut("result") {
        Some(result) if result.is_object() => result.take(),
        _ => return Err(NodeError::MissingResult),
    };

    match result.get("status").and_then(Value::as_str) {
        Some("success") => Ok(result),
        Some(other) => {
            let detail = result
                .get("error")
                .and_then(Value::as_str)
                .map(|e| format!("{} ({})", other, e))
                .unwrap_or_else(|| other.to_string());
            Err(NodeError::Status(detail))
        }
        None => Err(NodeError::Status("no status".to_string())),
    }
}

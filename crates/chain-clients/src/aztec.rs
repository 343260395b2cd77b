//! Client for the Aztec privacy rollup.
//!
//! The primary path goes through an auxiliary verification service that builds and proves the
//! private transaction. When that service is down, the node's JSON-RPC can accept the
//! attestation directly.

use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use relayer_primitives::{chain::ChainId, outcome::TxId, route::DestinationContext};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    client::{ChainClient, SubmissionPath},
    config::AztecClientConfig,
    errors::{ClientInitError, SubmitError},
};

/// JSON-RPC method used on the secondary path.
pub const VERIFY_METHOD: &str = "aztec_verifyVaa";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    contract_address: &'a str,
    vaa_bytes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    success: bool,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Submits attestations to Aztec.
#[derive(Debug)]
pub struct AztecClient {
    chain_id: ChainId,
    http: reqwest::Client,
    verify_url: String,
    node: Option<HttpClient>,
}

impl AztecClient {
    /// Builds a client from configuration. Does not touch the network.
    pub fn new(config: &AztecClientConfig) -> Result<Self, ClientInitError> {
        let verify_url = format!("{}/verify", config.service_url.trim_end_matches('/'));
        reqwest::Url::parse(&verify_url).map_err(|e| ClientInitError::InvalidUrl {
            url: config.service_url.clone(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientInitError::Transport(e.to_string()))?;

        let node = config
            .node_url
            .as_deref()
            .map(|url| {
                HttpClientBuilder::default()
                    .request_timeout(config.request_timeout)
                    .build(url)
                    .map_err(|e| ClientInitError::InvalidUrl {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        info!(chain = %config.chain_id, service = %verify_url, secondary = %node.is_some(), "aztec client ready");

        Ok(Self {
            chain_id: config.chain_id,
            http,
            verify_url,
            node,
        })
    }

    async fn submit_via_service(
        &self,
        target: &DestinationContext,
        payload: &[u8],
    ) -> Result<TxId, SubmitError> {
        let request = VerifyRequest {
            contract_address: target.as_str(),
            vaa_bytes: hex::encode(payload),
        };

        debug!(url = %self.verify_url, %target, "posting attestation to verification service");
        let response = self
            .http
            .post(&self.verify_url)
            .json(&request)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| SubmitError::Transient(format!("malformed service response: {e}")))?;

        match body {
            VerifyResponse {
                success: true,
                tx_hash: Some(tx_hash),
                ..
            } => Ok(TxId::new(tx_hash)),
            VerifyResponse { success: true, .. } => Err(SubmitError::Transient(
                "service reported success without a transaction hash".to_string(),
            )),
            VerifyResponse { error, .. } => Err(SubmitError::Permanent(
                error.unwrap_or_else(|| "verification rejected".to_string()),
            )),
        }
    }

    async fn submit_via_node(
        &self,
        node: &HttpClient,
        target: &DestinationContext,
        payload: &[u8],
    ) -> Result<TxId, SubmitError> {
        debug!(%target, "submitting attestation to node");
        let tx_hash: String = node
            .request(
                VERIFY_METHOD,
                rpc_params![target.as_str(), format!("0x{}", hex::encode(payload))],
            )
            .await
            .map_err(|e| match e {
                ClientError::Call(err) => SubmitError::Permanent(err.to_string()),
                other => SubmitError::Transient(other.to_string()),
            })?;

        Ok(TxId::new(tx_hash))
    }
}

fn classify_request_error(err: reqwest::Error) -> SubmitError {
    if err.is_connect() {
        SubmitError::ServiceUnavailable(err.to_string())
    } else {
        SubmitError::Transient(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> SubmitError {
    let message = format!("{status}: {body}");
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            SubmitError::ServiceUnavailable(message)
        }
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            SubmitError::Transient(message)
        }
        s if s.is_server_error() => SubmitError::Transient(message),
        _ => SubmitError::Permanent(message),
    }
}

#[async_trait]
impl ChainClient for AztecClient {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn has_secondary_path(&self) -> bool {
        self.node.is_some()
    }

    async fn submit_verification(
        &self,
        target: &DestinationContext,
        payload: &[u8],
        path: SubmissionPath,
    ) -> Result<TxId, SubmitError> {
        match (path, &self.node) {
            (SubmissionPath::Primary, _) => self.submit_via_service(target, payload).await,
            (SubmissionPath::Secondary, Some(node)) => {
                self.submit_via_node(node, target, payload).await
            }
            (SubmissionPath::Secondary, None) => Err(SubmitError::Permanent(
                "no node configured for the secondary path".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use super::*;

    /// Serves exactly one HTTP request and returns its JSON body.
    ///
    /// `respond` maps the request body to a status line and a response body.
    async fn serve_once<F>(respond: F) -> (String, JoinHandle<Value>)
    where
        F: FnOnce(&Value) -> (&'static str, String) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);

                let text = String::from_utf8_lossy(&buf).to_string();
                let Some(header_end) = text.find("\r\n\r\n") else {
                    continue;
                };
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break buf[header_end + 4..header_end + 4 + content_length].to_vec();
                }
            };

            let request: Value = serde_json::from_slice(&body).unwrap();
            let (status, response) = respond(&request);
            let raw = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{response}",
                response.len()
            );
            socket.write_all(raw.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            request
        });

        (url, handle)
    }

    fn config(service_url: &str, node_url: Option<&str>) -> AztecClientConfig {
        AztecClientConfig {
            chain_id: ChainId::AZTEC,
            service_url: service_url.to_string(),
            node_url: node_url.map(str::to_string),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn target() -> DestinationContext {
        DestinationContext::new("0x2b0b")
    }

    #[tokio::test]
    async fn service_success_returns_tx_hash() {
        let (url, server) = serve_once(|_| {
            (
                "200 OK",
                json!({ "success": true, "txHash": "0xabc" }).to_string(),
            )
        })
        .await;
        let client = AztecClient::new(&config(&url, None)).unwrap();

        let tx = client
            .submit_verification(&target(), &[0xde, 0xad], SubmissionPath::Primary)
            .await
            .unwrap();
        assert_eq!(tx, TxId::new("0xabc"));

        let request = server.await.unwrap();
        assert_eq!(request["contractAddress"], "0x2b0b");
        assert_eq!(request["vaaBytes"], "dead");
    }

    #[tokio::test]
    async fn service_rejection_is_permanent() {
        let (url, _server) = serve_once(|_| {
            (
                "200 OK",
                json!({ "success": false, "error": "bad guardian set" }).to_string(),
            )
        })
        .await;
        let client = AztecClient::new(&config(&url, None)).unwrap();

        let err = client
            .submit_verification(&target(), b"x", SubmissionPath::Primary)
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::Permanent("bad guardian set".to_string()));
    }

    #[tokio::test]
    async fn gateway_errors_mean_service_unavailable() {
        let (url, _server) = serve_once(|_| ("503 Service Unavailable", String::new())).await;
        let client = AztecClient::new(&config(&url, None)).unwrap();

        let err = client
            .submit_verification(&target(), b"x", SubmissionPath::Primary)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn refused_connection_means_service_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = AztecClient::new(&config(&url, None)).unwrap();
        let err = client
            .submit_verification(&target(), b"x", SubmissionPath::Primary)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::ServiceUnavailable(_)));
    }

    #[test]
    fn status_codes_are_classified() {
        let kind = |code: u16| {
            classify_status(StatusCode::from_u16(code).unwrap(), String::new()).kind()
        };
        assert_eq!(kind(502), "service_unavailable");
        assert_eq!(kind(504), "service_unavailable");
        assert_eq!(kind(500), "transient");
        assert_eq!(kind(429), "transient");
        assert_eq!(kind(400), "permanent");
        assert_eq!(kind(404), "permanent");
    }

    #[tokio::test]
    async fn secondary_path_uses_node_rpc() {
        let (node_url, server) = serve_once(|request| {
            (
                "200 OK",
                json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": "0x77" })
                    .to_string(),
            )
        })
        .await;
        let client =
            AztecClient::new(&config("http://127.0.0.1:1", Some(&node_url))).unwrap();
        assert!(client.has_secondary_path());

        let tx = client
            .submit_verification(&target(), &[0x01, 0x02], SubmissionPath::Secondary)
            .await
            .unwrap();
        assert_eq!(tx, TxId::new("0x77"));

        let request = server.await.unwrap();
        assert_eq!(request["method"], VERIFY_METHOD);
        assert_eq!(request["params"], json!(["0x2b0b", "0x0102"]));
    }

    #[tokio::test]
    async fn secondary_path_without_node_is_rejected() {
        let client = AztecClient::new(&config("http://127.0.0.1:1", None)).unwrap();
        assert!(!client.has_secondary_path());

        let err = client
            .submit_verification(&target(), b"x", SubmissionPath::Secondary)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Permanent(_)));
    }
}

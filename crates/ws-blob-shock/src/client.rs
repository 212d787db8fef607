use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Uri, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};
use thiserror::Error;

type HttpClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Errors raised while talking to the blob store.
#[derive(Debug, Error)]
pub enum ShockError {
    /// The node/ACL/download URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUri(String),
    /// The underlying HTTP request failed (connect, TLS, I/O).
    #[error("request failed: {0}")]
    Request(String),
    /// The blob store responded with a non-success status.
    #[error("blob store returned status {0}: {1}")]
    Status(u16, String),
    /// The response body was not the JSON shape expected.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}

/// A client for the external blob store ("Shock") that holds large object
/// bodies outside the metadata repository. Talks over plain HTTP or TLS
/// depending on the node/server URL's scheme.
#[derive(Clone)]
pub struct ShockClient {
    http: HttpClient,
    default_server: String,
}

impl ShockClient {
    /// Builds a client whose `create_node` calls target `default_server`.
    pub fn new(default_server: String) -> ShockClient {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("native root certificates")
            .https_or_http()
            .enable_http1()
            .build();
        ShockClient {
            http: Client::builder(TokioExecutor::new()).build(https),
            default_server,
        }
    }

    /// Grants `username` read access to the node at `node_url`, using `token` as the caller's credential.
    pub async fn add_acl_user(&self, node_url: &str, token: &str, username: &str) -> Result<(), ShockError> {
        let encoded = utf8_percent_encode(username, NON_ALPHANUMERIC).collect::<String>();
        let uri = format!("{}/acl/all?users={}", node_url.trim_end_matches('/'), encoded);
        self.request(Method::PUT, &uri, token, None).await?;
        Ok(())
    }

    /// Fetches a node's JSON document (the `data` object of the response envelope).
    pub async fn get_node(&self, token: &str, node_url: &str) -> Result<Value, ShockError> {
        let body = self.request(Method::GET, node_url, token, None).await?;
        body.get("data")
            .cloned()
            .ok_or_else(|| ShockError::UnexpectedShape("missing `data` field".to_string()))
    }

    /// Creates a new node tagged with `ws_id`, returning its node id.
    pub async fn create_node(&self, token: &str, ws_id: &str) -> Result<String, ShockError> {
        let uri = format!("{}/node", self.default_server.trim_end_matches('/'));
        let payload = json!({ "ws_id": [ws_id] }).to_string();
        let body = self.request(Method::POST, &uri, token, Some(payload)).await?;
        body.get("data")
            .and_then(|d| d.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ShockError::UnexpectedShape("missing `data.id` field".to_string()))
    }

    async fn request(&self, method: Method, uri: &str, token: &str, body: Option<String>) -> Result<Value, ShockError> {
        let uri: Uri = uri.parse().map_err(|_| ShockError::InvalidUri(uri.to_string()))?;
        let body_bytes = body.map(Bytes::from).unwrap_or_default();
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("OAuth {token}"));
        if !body_bytes.is_empty() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let req = builder
            .body(Full::new(body_bytes))
            .map_err(|e| ShockError::Request(e.to_string()))?;

        let resp = self.http.request(req).await.map_err(|e| ShockError::Request(e.to_string()))?;
        let status = resp.status();
        let collected = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ShockError::Request(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            let detail = String::from_utf8_lossy(&collected).to_string();
            tracing::debug!(status = status.as_u16(), body = %detail, "blob store request failed");
            return Err(ShockError::Status(status.as_u16(), detail));
        }
        if collected.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&collected).map_err(|e| ShockError::UnexpectedShape(e.to_string()))
    }

    /// Opens a GET request against the node's data endpoint and returns the
    /// response so the caller can stream the body, keeping bytes read during
    /// header parsing available via the returned body reader.
    pub async fn start_download(&self, node_url: &str, token: &str) -> Result<hyper::body::Incoming, ShockError> {
        let uri: Uri = format!("{}?download", node_url.trim_end_matches('/'))
            .parse()
            .map_err(|_| ShockError::InvalidUri(node_url.to_string()))?;
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("OAuth {token}"))
            .body(Full::new(Bytes::new()))
            .map_err(|e| ShockError::Request(e.to_string()))?;
        let resp = self.http.request(req).await.map_err(|e| ShockError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ShockError::Status(resp.status().as_u16(), String::new()));
        }
        Ok(resp.into_body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_does_not_panic() {
        let _client = ShockClient::new("http://shock.example:7078".to_string());
    }
}

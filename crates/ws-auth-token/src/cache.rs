use crate::token::AuthToken;
use bytes::Bytes;
use dashmap::DashMap;
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use thiserror::Error;

/// Verifies a signature over a token's canonical text using a fetched
/// signing key. The signing authority itself (what scheme it uses, how keys
/// are encoded) is outside this crate's concern: callers supply the
/// implementation that matches their deployment's signer.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true if `signature` is a valid signature over `message` under `key`.
    fn verify(&self, key: &[u8], message: &[u8], signature: &[u8]) -> bool;
}

/// Errors raised while fetching a signer's public key document.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The signer URL could not be parsed into a valid HTTP request.
    #[error("invalid signer url: {0}")]
    InvalidUri(String),
    /// The HTTP request to the signer failed.
    #[error("signer request failed: {0}")]
    Request(String),
    /// The signer responded with a non-success status.
    #[error("signer returned status {0}")]
    Status(u16),
}

/// Fetches and indefinitely caches signing-certificate bytes, keyed by signer
/// URL, so that repeated validations of tokens from the same issuer avoid a
/// network round trip. Matches the original service's "fetch once, never
/// refresh" behavior (see design notes on staleness).
pub struct SigningCertCache {
    client: Client<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>, Empty<Bytes>>,
    certs: DashMap<String, Arc<Vec<u8>>>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl SigningCertCache {
    /// Builds a cache that verifies signatures using `verifier`.
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> SigningCertCache {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .expect("native root certificates")
            .https_or_http()
            .enable_http1()
            .build();
        SigningCertCache {
            client: Client::builder(TokioExecutor::new()).build(https),
            certs: DashMap::new(),
            verifier,
        }
    }

    async fn fetch_cert(&self, signer_url: &str) -> Result<Arc<Vec<u8>>, CacheError> {
        if let Some(cert) = self.certs.get(signer_url) {
            return Ok(cert.clone());
        }
        let uri: hyper::Uri = signer_url.parse().map_err(|_| CacheError::InvalidUri(signer_url.to_string()))?;
        let resp = self
            .client
            .get(uri)
            .await
            .map_err(|e| CacheError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CacheError::Status(resp.status().as_u16()));
        }
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| CacheError::Request(e.to_string()))?
            .to_bytes();
        let cert = Arc::new(body.to_vec());
        self.certs.entry(signer_url.to_string()).or_insert_with(|| cert.clone());
        Ok(cert)
    }

    /// Validates `token`: checks expiry, fetches (or reuses) the signer's
    /// cached public key, and verifies the signature over the token's
    /// canonical text. Returns `false` for any failure along the way rather
    /// than propagating an error, matching the dispatcher's "invalidate on
    /// any failure" policy.
    pub async fn validate(&self, token: &AuthToken, now: i64) -> bool {
        if !token.valid() || token.is_expired(now) {
            return false;
        }
        let Some(signer) = token.signing_subject() else {
            return false;
        };
        let cert = match self.fetch_cert(signer).await {
            Ok(cert) => cert,
            Err(err) => {
                tracing::warn!(%signer, error = %err, "failed to fetch signing certificate");
                return false;
            }
        };
        self.verifier.verify(&cert, token.text().as_bytes(), token.binary_signature())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysTrue;
    impl SignatureVerifier for AlwaysTrue {
        fn verify(&self, _key: &[u8], _message: &[u8], _signature: &[u8]) -> bool {
            true
        }
    }

    #[test]
    fn expired_token_never_validates_even_conceptually() {
        let tok = AuthToken::parse("un=alice|SigningSubject=https://x|expiry=1|sig=ab");
        assert!(tok.is_expired(1000));
    }

    #[test]
    fn cache_construction_does_not_panic() {
        let _cache = SigningCertCache::new(Arc::new(AlwaysTrue));
    }
}

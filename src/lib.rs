#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! A hierarchical workspace object store served over JSON-RPC/HTTP.
//!
//! Objects live under `/<owner>/<workspace>/<path...>`, grouped into
//! workspaces that carry a global and a per-user permission, stored either
//! inline in the metadata repository or out-of-band in an external blob
//! store. A single HTTP endpoint accepts JSON-RPC 2.0 requests; a second
//! route serves ticketed downloads.
//!
//! # Quick start
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = std::sync::Arc::new(ws_service::config::ServiceConfig::from_env()?);
//!     ws_service::run(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod dispatch;
pub mod http;
pub mod lanes;
pub(crate) mod metrics;
pub mod reconciler;
pub mod service;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use ws_auth_token::SigningCertCache;

/// Formats a Unix timestamp as the `YYYY-MM-DDTHH:MM:SSZ` creation-time
/// string every object and workspace record stores.
pub fn iso8601(unix_secs: i64) -> String {
    use chrono::DateTime;
    DateTime::from_timestamp(unix_secs, 0).unwrap_or_default().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

struct NoopVerifier;

impl ws_auth_token::SignatureVerifier for NoopVerifier {
    fn verify(&self, _key: &[u8], _message: &[u8], _signature: &[u8]) -> bool {
        false
    }
}

/// Assembles every component from `config` and runs the HTTP front end,
/// never returning under normal operation.
///
/// The signature verifier here is a stand-in that rejects every token;
/// deployments embed their own [`ws_auth_token::SignatureVerifier`] (e.g.
/// RSA-SHA over the issuer's published certificate) and build the service
/// components directly rather than calling this convenience entry point.
pub async fn run(config: Arc<config::ServiceConfig>) -> std::io::Result<()> {
    let client_options = mongodb::options::ClientOptions::parse(format!("mongodb://{}", config.mongodb_host())).await.map_err(to_io_error)?;
    let client = mongodb::Client::with_options(client_options).map_err(to_io_error)?;
    let database = client.database(config.mongodb_database());
    let fs = ws_sbe_fs::FsBodyStore::new(PathBuf::from(config.db_path()))?;
    let repo = db::Repository::new(&database, fs);

    let shock = config.shock_server().map(|server| ws_blob_shock::ShockClient::new(server.to_string()));
    let cert_cache = Arc::new(SigningCertCache::new(Arc::new(NoopVerifier)));

    let general = lanes::GeneralLane::new(config.mongodb_client_threads());
    let serialization = lanes::SerializationLane::spawn();
    let pending = reconciler::PendingUploads::new();

    if let Some(shock) = shock.clone() {
        let _reconciler = reconciler::spawn(pending.clone(), repo.clone(), shock, serialization.clone());
    }

    let service = Arc::new(service::Service::new(config.clone(), repo.clone(), general, serialization, shock.clone(), pending, cert_cache));

    info!("starting workspace service");
    http::serve(config, service, repo, shock).await
}

fn to_io_error(err: impl std::error::Error + Send + Sync + 'static) -> std::io::Error {
    std::io::Error::other(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn iso8601_formats_epoch() {
        assert_eq!(iso8601(0), "1970-01-01T00:00:00Z");
    }
}

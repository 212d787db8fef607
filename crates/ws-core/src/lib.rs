//! Shared types for the workspace object store: path parsing, the permission
//! algebra, and the record shapes persisted by the metadata repository.
//!
//! This crate has no knowledge of HTTP, JSON-RPC, or the backing document
//! store. It exists so that the path parser and permission ranking logic can
//! be unit tested in isolation and reused by both the server crate and any
//! future client tooling.

mod error;
pub use error::{Error, ErrorKind};

mod path;
pub use path::{ParsedPath, WSPath, WSPathParser, has_valid_name};

mod permission;
pub use permission::Permission;

mod model;
pub use model::{DownloadTicket, ObjectMeta, ObjectRecord, PendingUpload, WorkspaceRecord};

/// Result type used throughout the workspace store's component crates.
pub type Result<T> = std::result::Result<T, Error>;

use derive_more::Display;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type shared by every workspace-store component. Component-level
/// code should pick an [`ErrorKind`] carefully since it determines how the
/// surrounding service method reports the failure (a whole-request JSON-RPC
/// error versus a per-object error entry).
#[derive(Debug, Error)]
#[error("workspace error: {kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new error of the given kind, wrapping an underlying cause.
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            source: Some(error.into()),
        }
    }

    /// The kind of failure this error represents.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }
}

/// Failure categories a workspace-store component can report.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ErrorKind {
    /// The path string did not parse, or named a field that fails a validity predicate
    /// (e.g. an empty workspace or object name).
    #[display("invalid path")]
    InvalidPath,
    /// The referenced workspace or object does not exist.
    #[display("not found")]
    NotFound,
    /// The caller's effective permission is below what the operation requires.
    #[display("permission denied")]
    PermissionDenied,
    /// An object exists at the target location and the caller did not request an overwrite,
    /// or the existing object's kind (folder vs. non-folder) conflicts with the request.
    #[display("conflict")]
    Conflict,
    /// A folder removal was requested without `deleteDirectories`, or a non-recursive folder
    /// removal was attempted on a folder that still has children.
    #[display("folder not empty")]
    FolderNotEmpty,
    /// The requested object `type` is not on the configured whitelist.
    #[display("unknown object type")]
    UnknownType,
    /// The underlying document store or filesystem returned an error.
    #[display("backing store error")]
    BackingStore,
    /// The blob store (Shock) returned an error or an unexpected response shape.
    #[display("blob store error")]
    BlobStore,
    /// The presented token failed to parse or its signature did not verify.
    #[display("invalid token")]
    InvalidToken,
    /// A lane worker was unreachable (e.g. the channel closed during shutdown).
    #[display("internal dispatch error")]
    Internal,
}

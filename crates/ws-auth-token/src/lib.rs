//! Bearer token parsing and a signing-certificate cache, used by the
//! workspace store's request dispatcher to authenticate callers.

mod token;
pub use token::AuthToken;

mod cache;
pub use cache::{CacheError, SignatureVerifier, SigningCertCache};

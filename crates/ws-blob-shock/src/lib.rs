//! HTTP client for the external blob store ("Shock") that holds large
//! workspace object bodies outside the metadata repository.

mod client;
pub use client::{ShockClient, ShockError};

//! An authenticating reverse proxy for third-party APIs.
//!
//! Sandboxed code calls these routes instead of the external APIs
//! directly. The caller presents an opaque `X-Proxy-ID` handle; the
//! proxy resolves it to a short-lived bearer credential in the KV store
//! and injects the `Authorization` header on the way out, so the
//! sandbox never touches a secret.

mod forward;
mod store;

pub use forward::{routes, ProxyConfig};
pub use store::{CredentialStore, RedisStore};

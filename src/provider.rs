//! OAuth provider metadata (data) and token-error classification (behavior).
//!
//! `endpoints` exposes validated [`OAuthEndpoints`] covering the authorization and token URLs
//! plus the identity-token issuers a provider may sign as. `classify` defines
//! [`TokenErrorClassifier`], the hook that turns token-endpoint error payloads into the
//! dispatcher's refresh-error taxonomy.

pub mod classify;
pub mod endpoints;

pub use classify::*;
pub use endpoints::*;

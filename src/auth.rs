//! Credential value objects, scope sets, and identity-token claims.

pub mod creds;
pub mod id_token;
pub mod scope;
pub mod secret;

pub use creds::*;
pub use id_token::*;
pub use scope::*;
pub use secret::*;

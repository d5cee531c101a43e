//! Token-endpoint error classification.
//!
//! Implementations map OAuth error payloads into the dispatcher taxonomy without tying the
//! strategies to any particular HTTP client.

// self
use crate::_prelude::*;

/// OAuth 2.0 grants the dispatcher performs against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant.
	AuthorizationCode,
	/// Refresh Token grant.
	RefreshToken,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Hook that classifies token-endpoint failures.
///
/// Implementors must be `Send + Sync`; the context only carries primitive data so
/// classifiers never depend on reqwest-specific structures.
pub trait TokenErrorClassifier: Send + Sync {
	/// Maps an OAuth error payload into a [`TokenErrorKind`].
	fn classify(&self, ctx: &TokenErrorContext) -> TokenErrorKind;
}

/// Canonical token-endpoint error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenErrorKind {
	/// Provider rejected the grant (bad code or refresh token, revoked consent).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the grant covers.
	InsufficientScope,
	/// Failure is temporary or unrecognized.
	Transient,
}

/// Context passed to classifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenErrorContext {
	/// Grant type associated with the failing request.
	pub grant_type: GrantType,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Indicates whether the failure originated from the network layer.
	pub network_error: bool,
}
impl TokenErrorContext {
	/// Creates a new context scoped to the provided grant type.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			network_error: false,
		}
	}

	/// Convenience constructor for network failures.
	pub fn network_failure(grant_type: GrantType) -> Self {
		let mut ctx = Self::new(grant_type);

		ctx.network_error = true;

		ctx
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}
}

/// Default classifier that applies RFC 6749 section 5.2 heuristics.
///
/// Structured `error` codes win, then hints inside `error_description`, then the HTTP status.
/// Network failures are always transient.
#[derive(Debug, Default)]
pub struct DefaultTokenErrorClassifier;
impl TokenErrorClassifier for DefaultTokenErrorClassifier {
	fn classify(&self, ctx: &TokenErrorContext) -> TokenErrorKind {
		if ctx.network_error {
			return TokenErrorKind::Transient;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(match_error_code)
			.or_else(|| ctx.error_description.as_deref().and_then(match_description))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn match_error_code(value: &str) -> Option<TokenErrorKind> {
	match value.to_ascii_lowercase().as_str() {
		"invalid_grant" | "access_denied" => Some(TokenErrorKind::InvalidGrant),
		"invalid_client" | "unauthorized_client" => Some(TokenErrorKind::InvalidClient),
		"invalid_scope" | "insufficient_scope" => Some(TokenErrorKind::InsufficientScope),
		"temporarily_unavailable" | "server_error" => Some(TokenErrorKind::Transient),
		_ => None,
	}
}

fn match_description(description: &str) -> Option<TokenErrorKind> {
	let lowered = description.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("invalid_grant")
			|| text.contains("expired or revoked")
			|| text.contains("bad request") =>
			Some(TokenErrorKind::InvalidGrant),
		text if text.contains("invalid_client") || text.contains("unauthorized") =>
			Some(TokenErrorKind::InvalidClient),
		text if text.contains("scope") => Some(TokenErrorKind::InsufficientScope),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> TokenErrorKind {
	match status {
		Some(400 | 404 | 410) => TokenErrorKind::InvalidGrant,
		Some(401) => TokenErrorKind::InvalidClient,
		Some(403) => TokenErrorKind::InsufficientScope,
		_ => TokenErrorKind::Transient,
	}
}

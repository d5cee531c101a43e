//! Dispatcher-level error types shared across strategies, sessions, and discovery calls.

// self
use crate::_prelude::*;

/// Dispatcher-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical dispatcher error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts, undecodable bodies).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Non-success HTTP response surfaced by the session.
	#[error(transparent)]
	Http(#[from] HttpError),
	/// Session lifecycle misuse.
	#[error(transparent)]
	Session(#[from] SessionError),
	/// OpenID Connect identity token could not be decoded or validated.
	#[error(transparent)]
	IdToken(#[from] IdTokenError),

	/// The credential required by the selected strategy is not configured.
	#[error("Dispatch requires {credential} but none is configured.")]
	MissingCredentials {
		/// Which credential was missing.
		credential: CredentialKind,
	},
	/// Refreshing the user credential failed; the caller must re-authenticate.
	#[error("User credential refresh failed.")]
	AuthRefresh(#[source] TokenEndpointError),
	/// Exchanging an authorization code failed.
	#[error("Authorization code exchange failed.")]
	CodeExchange(#[source] TokenEndpointError),
	/// The `state` returned by the authorization redirect does not match the pending session.
	#[error("Authorization state does not match the pending session.")]
	StateMismatch,
	/// Automatic discovery version resolution found no match.
	#[error("No preferred discovery document matches the API `{api}`.")]
	Resolution {
		/// API name that failed to resolve.
		api: String,
	},
	/// A request could not be stamped with credential material.
	#[error("Request could not be authorized: {reason}.")]
	Authorization {
		/// Description of the malformed request.
		reason: String,
	},
}

/// Credential categories referenced by [`Error::MissingCredentials`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
	/// API key used by the API-key strategy.
	ApiKey,
	/// OAuth 2.0 user credential used by the user strategy.
	UserCreds,
	/// OAuth 2.0 client credential needed to refresh or exchange user credentials.
	ClientCreds,
}
impl CredentialKind {
	/// Returns a stable label suitable for messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::ApiKey => "an API key",
			CredentialKind::UserCreds => "user credentials",
			CredentialKind::ClientCreds => "client credentials",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the dispatcher.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed.
	#[error("Configured URL is invalid.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// OAuth endpoint configuration failed validation.
	#[error(transparent)]
	InvalidEndpoints(#[from] crate::provider::EndpointsError),
	/// Configuration JSON could not be parsed.
	#[error("Configuration could not be parsed.")]
	Parse {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Scopes cannot be normalized.
	#[error("Scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// User credential builder validation failed.
	#[error("Unable to build user credentials.")]
	CredsBuild(#[from] crate::auth::UserCredsBuilderError),
	/// A timeout value is negative or out of range.
	#[error("Timeout must be a non-negative duration.")]
	InvalidTimeout,
	/// The authorization-code flow needs a redirect URI on the client credentials.
	#[error("Client credentials do not carry a redirect URI.")]
	MissingRedirectUri,
	/// A component was not supplied and no default transport is compiled in.
	#[error("No {component} is configured and no default transport is available.")]
	MissingTransport {
		/// Component that has no default.
		component: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token-endpoint failures raised while refreshing or exchanging user credentials.
#[derive(Debug, ThisError)]
pub enum TokenEndpointError {
	/// Provider rejected the grant (revoked or unknown refresh token, reused code).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or dispatcher-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or client credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or dispatcher-supplied reason string.
		reason: String,
	},
	/// Requested scopes exceed what was granted.
	#[error("Grant lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or dispatcher-supplied reason string.
		reason: String,
	},
	/// Provider returned an unexpected or temporary failure.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Provider- or dispatcher-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned a well-formed but unusable payload.
	#[error("Token endpoint response is unusable: {reason}.")]
	InvalidResponse {
		/// Which part of the payload was rejected.
		reason: &'static str,
	},
	/// Stored user credential has no refresh token.
	#[error("User credential is missing a refresh token.")]
	MissingRefreshToken,
	/// The identity token returned alongside the new access token failed validation.
	#[error("Token endpoint returned an invalid identity token.")]
	InvalidIdToken(#[source] IdTokenError),
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during the token call.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
	/// Token request could not be constructed.
	#[error(transparent)]
	Request(#[from] oauth2::http::Error),
}
impl TokenEndpointError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TokenEndpointError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Transport-level failures (network, IO, decoding).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending a request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The send exceeded the per-call timeout.
	#[error("Request timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending a request.")]
	Io(#[from] std::io::Error),
	/// The session returned a different number of responses than requests.
	#[error("Session returned {received} responses for {sent} requests.")]
	ResponseCount {
		/// Number of requests forwarded to the session.
		sent: usize,
		/// Number of responses the session produced.
		received: usize,
	},
	/// A response body could not be decoded into the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Non-success HTTP response returned by the remote API.
#[derive(Debug, ThisError)]
#[error("Remote API responded with HTTP {status} for {url}.")]
pub struct HttpError {
	/// HTTP status code.
	pub status: u16,
	/// URL of the failing request.
	pub url: Url,
	/// Raw response body, kept for diagnostics.
	pub body: Vec<u8>,
}
impl HttpError {
	/// Returns the body decoded as UTF-8 (lossy).
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Session lifecycle misuse.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum SessionError {
	/// `enter` was called while a session is already active.
	#[error("A session is already active on this dispatcher.")]
	AlreadyActive,
	/// A released session handle was used again.
	#[error("Session has already been released.")]
	Closed,
}

/// OpenID Connect identity-token failures.
#[derive(Debug, ThisError)]
pub enum IdTokenError {
	/// The user credential carries no identity token.
	#[error("User credential carries no identity token.")]
	Missing,
	/// The token is not a three-segment compact JWS.
	#[error("Identity token is not a compact JWT.")]
	Malformed,
	/// The payload segment is not valid base64url.
	#[error("Identity token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// The payload is not a valid claim set.
	#[error("Identity token claims could not be parsed.")]
	Claims {
		/// Path-aware parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The `iss` claim is not an accepted issuer.
	#[error("Identity token issuer `{issuer}` is not accepted.")]
	Issuer {
		/// Issuer found in the token.
		issuer: String,
	},
	/// The `aud` claim does not contain the client identifier.
	#[error("Identity token audience does not include this client.")]
	Audience,
	/// The token `exp` has passed.
	#[error("Identity token has expired.")]
	Expired,
	/// The `nonce` claim does not match the authorization request.
	#[error("Identity token nonce does not match the authorization request.")]
	Nonce,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn missing_credentials_message_names_the_credential() {
		let err = Error::MissingCredentials { credential: CredentialKind::ClientCreds };

		assert_eq!(err.to_string(), "Dispatch requires client credentials but none is configured.");
	}

	#[test]
	fn http_error_exposes_lossy_body() {
		let err = HttpError {
			status: 404,
			url: Url::parse("https://example.com/missing").expect("Fixture URL should parse."),
			body: b"not found".to_vec(),
		};

		assert_eq!(err.body_text(), "not found");
		assert!(err.to_string().contains("404"));
	}
}

//! OAuth endpoint set and its builder.

// self
use crate::_prelude::*;

/// Google authorization endpoint.
pub const GOOGLE_AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Issuers Google signs identity tokens as.
pub const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Errors raised while constructing or validating endpoints.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum EndpointsError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A built-in endpoint constant failed to parse.
	#[error("Built-in endpoint `{url}` is invalid.")]
	InvalidBuiltin {
		/// Offending constant.
		url: &'static str,
	},
}

/// Endpoints used by the OAuth 2.0 and OpenID Connect strategies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthEndpoints {
	/// Authorization endpoint users are redirected to.
	pub authorization: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Accepted `iss` values for identity tokens.
	#[serde(default)]
	pub issuers: Vec<String>,
}
impl OAuthEndpoints {
	/// Creates a new builder.
	pub fn builder() -> OAuthEndpointsBuilder {
		OAuthEndpointsBuilder::default()
	}

	/// Returns Google's production endpoints.
	pub fn google() -> Result<Self, EndpointsError> {
		let parse = |url: &'static str| {
			Url::parse(url).map_err(|_| EndpointsError::InvalidBuiltin { url })
		};

		Self::builder()
			.authorization_endpoint(parse(GOOGLE_AUTHORIZATION_URL)?)
			.token_endpoint(parse(GOOGLE_TOKEN_URL)?)
			.issuers(GOOGLE_ISSUERS)
			.build()
	}

	/// Validates invariants for the endpoint set.
	pub fn validate(&self) -> Result<(), EndpointsError> {
		validate_endpoint("authorization", &self.authorization)?;
		validate_endpoint("token", &self.token)?;

		Ok(())
	}
}

/// Builder for [`OAuthEndpoints`].
#[derive(Debug, Default)]
pub struct OAuthEndpointsBuilder {
	authorization: Option<Url>,
	token: Option<Url>,
	issuers: Vec<String>,
}
impl OAuthEndpointsBuilder {
	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token = Some(url);

		self
	}

	/// Adds accepted identity-token issuers.
	pub fn issuers<I, S>(mut self, issuers: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.issuers.extend(issuers.into_iter().map(Into::into));

		self
	}

	/// Consumes the builder and validates the resulting endpoint set.
	pub fn build(self) -> Result<OAuthEndpoints, EndpointsError> {
		let endpoints = OAuthEndpoints {
			authorization: self
				.authorization
				.ok_or(EndpointsError::MissingAuthorizationEndpoint)?,
			token: self.token.ok_or(EndpointsError::MissingTokenEndpoint)?,
			issuers: self.issuers,
		};

		endpoints.validate()?;

		Ok(endpoints)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), EndpointsError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(EndpointsError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain == "localhost",
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Endpoint fixture should parse.")
	}

	#[test]
	fn google_defaults_are_valid() {
		let endpoints = OAuthEndpoints::google().expect("Google endpoints should build.");

		assert_eq!(endpoints.token.as_str(), GOOGLE_TOKEN_URL);
		assert!(endpoints.issuers.iter().any(|issuer| issuer == "accounts.google.com"));
	}

	#[test]
	fn builder_rejects_plain_http_except_loopback() {
		let err = OAuthEndpoints::builder()
			.authorization_endpoint(url("http://example.com/auth"))
			.token_endpoint(url("https://example.com/token"))
			.build()
			.expect_err("Plain HTTP must be rejected for remote hosts.");

		assert!(matches!(err, EndpointsError::InsecureEndpoint { endpoint: "authorization", .. }));

		OAuthEndpoints::builder()
			.authorization_endpoint(url("http://127.0.0.1:8080/auth"))
			.token_endpoint(url("http://localhost:8080/token"))
			.build()
			.expect("Loopback endpoints are allowed for local testing.");
	}

	#[test]
	fn builder_requires_both_endpoints() {
		let err = OAuthEndpoints::builder()
			.authorization_endpoint(url("https://example.com/auth"))
			.build()
			.expect_err("Token endpoint is mandatory.");

		assert_eq!(err, EndpointsError::MissingTokenEndpoint);
	}
}

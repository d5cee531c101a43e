//! Authorization Code + PKCE handshake state.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ClientCreds, ScopeSet},
	error::ConfigError,
};

const STATE_LEN: usize = 32;
const NONCE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Supported PKCE challenge methods surfaced via [`AuthorizationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Google `access_type` parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
	/// No refresh token is issued.
	Online,
	/// A refresh token is issued on first consent.
	#[default]
	Offline,
}
impl AccessType {
	/// Returns the query-parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			AccessType::Online => "online",
			AccessType::Offline => "offline",
		}
	}
}

/// Knobs for the authorization URL.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationOptions {
	/// Redirect URI; falls back to [`ClientCreds::redirect_uri`].
	pub redirect_uri: Option<Url>,
	/// Requested scopes; falls back to [`ClientCreds::scopes`].
	pub scopes: Option<ScopeSet>,
	/// `access_type` parameter.
	pub access_type: AccessType,
	/// Sends `include_granted_scopes=true` for incremental authorization.
	pub include_granted_scopes: bool,
	/// `login_hint` parameter.
	pub login_hint: Option<String>,
	/// `prompt` parameter (for example `consent` or `select_account`).
	pub prompt: Option<String>,
}
impl AuthorizationOptions {
	/// Overrides the redirect URI.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// Overrides the requested scopes.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}

	/// Sets `access_type`.
	pub fn with_access_type(mut self, access_type: AccessType) -> Self {
		self.access_type = access_type;

		self
	}

	/// Enables incremental authorization.
	pub fn include_granted_scopes(mut self) -> Self {
		self.include_granted_scopes = true;

		self
	}

	/// Sets `login_hint`.
	pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
		self.login_hint = Some(hint.into());

		self
	}

	/// Sets `prompt`.
	pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
		self.prompt = Some(prompt.into());

		self
	}
}

/// Pending authorization returned by
/// [`Dispatcher::start_authorization`](crate::dispatch::Dispatcher::start_authorization).
#[derive(Clone)]
pub struct AuthorizationSession {
	/// Requested scope set.
	pub scopes: ScopeSet,
	/// Opaque state value that must round-trip via the redirect handler.
	pub state: String,
	/// Redirect URI supplied when constructing the authorization URL.
	pub redirect_uri: Url,
	/// Fully-formed authorization URL that users should be sent to.
	pub authorize_url: Url,
	nonce: Option<String>,
	pkce: PkcePair,
}
impl AuthorizationSession {
	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.pkce.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.pkce.method
	}

	/// OpenID Connect nonce, when the session was started by an OpenID Connect strategy.
	pub fn nonce(&self) -> Option<&str> {
		self.nonce.as_deref()
	}

	/// Validates the returned `state` parameter after the authorization redirect.
	pub fn validate_state(&self, returned_state: &str) -> Result<()> {
		if returned_state == self.state { Ok(()) } else { Err(Error::StateMismatch) }
	}

	pub(crate) fn pkce_verifier(&self) -> &str {
		&self.pkce.verifier
	}
}
impl Debug for AuthorizationSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationSession")
			.field("scopes", &self.scopes)
			.field("state", &self.state)
			.field("redirect_uri", &self.redirect_uri)
			.field("authorize_url", &self.authorize_url)
			.field("nonce", &self.nonce)
			.field("code_challenge", &self.pkce.challenge)
			.field("code_challenge_method", &self.pkce.method)
			.finish()
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

pub(crate) fn build_session(
	authorization_endpoint: &Url,
	client: &ClientCreds,
	options: AuthorizationOptions,
	with_nonce: bool,
) -> Result<AuthorizationSession> {
	let redirect_uri = options
		.redirect_uri
		.clone()
		.or_else(|| client.redirect_uri.clone())
		.ok_or(ConfigError::MissingRedirectUri)?;
	let scopes = options.scopes.clone().unwrap_or_else(|| client.scopes.clone());
	let state = random_string(STATE_LEN);
	let nonce = with_nonce.then(|| random_string(NONCE_LEN));
	let pkce = PkcePair::generate();
	let mut authorize_url = authorization_endpoint.clone();
	let mut pairs = authorize_url.query_pairs_mut();

	pairs.append_pair("response_type", "code");
	pairs.append_pair("client_id", &client.client_id);
	pairs.append_pair("redirect_uri", redirect_uri.as_str());

	if !scopes.is_empty() {
		pairs.append_pair("scope", &scopes.normalized());
	}

	pairs.append_pair("state", &state);
	pairs.append_pair("code_challenge", &pkce.challenge);
	pairs.append_pair("code_challenge_method", pkce.method.as_str());
	pairs.append_pair("access_type", options.access_type.as_str());

	if options.include_granted_scopes {
		pairs.append_pair("include_granted_scopes", "true");
	}
	if let Some(hint) = &options.login_hint {
		pairs.append_pair("login_hint", hint);
	}
	if let Some(prompt) = &options.prompt {
		pairs.append_pair("prompt", prompt);
	}
	if let Some(nonce) = &nonce {
		pairs.append_pair("nonce", nonce);
	}

	drop(pairs);

	Ok(AuthorizationSession { scopes, state, redirect_uri, authorize_url, nonce, pkce })
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn endpoint() -> Url {
		Url::parse("https://accounts.google.com/o/oauth2/v2/auth").expect("URL should parse.")
	}

	fn client() -> ClientCreds {
		ClientCreds::new("client-id", "client-secret")
			.with_scopes(
				ScopeSet::new(["https://www.googleapis.com/auth/youtube.readonly"])
					.expect("Scope fixture should be valid."),
			)
			.with_redirect_uri(
				Url::parse("http://127.0.0.1:8080/callback").expect("URL should parse."),
			)
	}

	fn query(url: &Url) -> BTreeMap<String, String> {
		url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
	}

	#[test]
	fn authorize_url_carries_pkce_state_and_google_parameters() {
		let session = build_session(
			&endpoint(),
			&client(),
			AuthorizationOptions::default()
				.include_granted_scopes()
				.with_login_hint("user@example.com")
				.with_prompt("consent"),
			false,
		)
		.expect("Session should build.");
		let params = query(&session.authorize_url);

		assert_eq!(params["response_type"], "code");
		assert_eq!(params["client_id"], "client-id");
		assert_eq!(params["redirect_uri"], "http://127.0.0.1:8080/callback");
		assert_eq!(params["scope"], "https://www.googleapis.com/auth/youtube.readonly");
		assert_eq!(params["state"], session.state);
		assert_eq!(params["code_challenge"], session.code_challenge());
		assert_eq!(params["code_challenge_method"], "S256");
		assert_eq!(params["access_type"], "offline");
		assert_eq!(params["include_granted_scopes"], "true");
		assert_eq!(params["login_hint"], "user@example.com");
		assert_eq!(params["prompt"], "consent");
		assert!(!params.contains_key("nonce"));
		assert_eq!(session.state.len(), STATE_LEN);
		assert_eq!(compute_pkce_challenge(session.pkce_verifier()), session.code_challenge());
	}

	#[test]
	fn nonce_is_added_on_request() {
		let session = build_session(&endpoint(), &client(), AuthorizationOptions::default(), true)
			.expect("Session should build.");

		assert_eq!(query(&session.authorize_url).get("nonce").map(String::as_str), session.nonce());
		assert!(session.nonce().is_some());
	}

	#[test]
	fn missing_redirect_uri_is_a_config_error() {
		let err = build_session(
			&endpoint(),
			&ClientCreds::new("client-id", "secret"),
			AuthorizationOptions::default(),
			false,
		)
		.expect_err("A redirect URI is required.");

		assert!(matches!(err, Error::Config(ConfigError::MissingRedirectUri)));
	}

	#[test]
	fn state_validation_errors_on_mismatch() {
		let session = build_session(&endpoint(), &client(), AuthorizationOptions::default(), false)
			.expect("Session should build.");

		assert!(session.validate_state(&session.state.clone()).is_ok());
		assert!(matches!(session.validate_state("other"), Err(Error::StateMismatch)));
	}

	#[test]
	fn pkce_challenge_matches_rfc_7636_vector() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGEm0-9KJ8"
		);
	}
}

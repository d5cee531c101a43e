//! OpenID Connect identity-token claim decoding.
//!
//! Identity tokens reach the dispatcher only as direct responses from the token endpoint over
//! TLS, so the claim set is decoded and checked (issuer, audience, expiry, nonce) without
//! verifying the JWS signature (OpenID Connect Core 1.0, section 3.1.3.7).

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, error::IdTokenError};

/// `aud` claim, which may be a single string or a list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single audience value.
	One(String),
	/// Multiple audience values.
	Many(Vec<String>),
}
impl Audience {
	/// Returns true if `client_id` is among the audiences.
	pub fn contains(&self, client_id: &str) -> bool {
		match self {
			Audience::One(value) => value == client_id,
			Audience::Many(values) => values.iter().any(|value| value == client_id),
		}
	}
}

/// Claims carried by an OpenID Connect identity token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer identifier.
	pub iss: String,
	/// Subject (stable user identifier).
	pub sub: String,
	/// Intended audiences.
	pub aud: Audience,
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	/// Issued-at as seconds since the Unix epoch.
	pub iat: i64,
	/// Authorized party, present when the audience has several entries.
	#[serde(default)]
	pub azp: Option<String>,
	/// Nonce echoed from the authorization request.
	#[serde(default)]
	pub nonce: Option<String>,
	/// Email address of the user.
	#[serde(default)]
	pub email: Option<String>,
	/// Whether the provider verified the email address.
	#[serde(default)]
	pub email_verified: Option<bool>,
	/// Hosted domain for workspace accounts.
	#[serde(default)]
	pub hd: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Profile picture URL.
	#[serde(default)]
	pub picture: Option<String>,
	/// Claims not modeled above.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of a compact JWT.
	pub fn decode(token: &str) -> Result<Self, IdTokenError> {
		let mut segments = token.split('.');
		let (Some(_header), Some(payload), Some(_signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(IdTokenError::Malformed);
		};
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(de).map_err(|source| IdTokenError::Claims { source })
	}

	/// Returns the expiry instant.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}

	/// Checks issuer, audience, expiry, and (when expected) nonce.
	pub fn validate(
		&self,
		validation: &IdTokenValidation<'_>,
		now: OffsetDateTime,
	) -> Result<(), IdTokenError> {
		if !validation.issuers.iter().any(|issuer| issuer == &self.iss) {
			return Err(IdTokenError::Issuer { issuer: self.iss.clone() });
		}
		if !self.aud.contains(validation.client_id) {
			return Err(IdTokenError::Audience);
		}
		// An `exp` at the top of the representable range saturates instead of overflowing.
		if self.expires_at().is_none_or(|expires_at| {
			expires_at.checked_add(validation.leeway).is_some_and(|deadline| deadline <= now)
		}) {
			return Err(IdTokenError::Expired);
		}
		if let Some(expected) = validation.nonce
			&& self.nonce.as_deref() != Some(expected)
		{
			return Err(IdTokenError::Nonce);
		}

		Ok(())
	}
}

/// Inputs for [`IdTokenClaims::validate`].
#[derive(Clone, Debug)]
pub struct IdTokenValidation<'a> {
	/// Accepted `iss` values.
	pub issuers: &'a [String],
	/// Client identifier that must appear in `aud`.
	pub client_id: &'a str,
	/// Nonce sent with the authorization request, if any.
	pub nonce: Option<&'a str>,
	/// Clock skew tolerated on `exp`.
	pub leeway: Duration,
}
impl<'a> IdTokenValidation<'a> {
	const DEFAULT_LEEWAY: Duration = Duration::seconds(30);

	/// Creates validation inputs with the default leeway and no nonce.
	pub fn new(issuers: &'a [String], client_id: &'a str) -> Self {
		Self { issuers, client_id, nonce: None, leeway: Self::DEFAULT_LEEWAY }
	}

	/// Requires the `nonce` claim to equal `nonce`.
	pub fn with_nonce(mut self, nonce: &'a str) -> Self {
		self.nonce = Some(nonce);

		self
	}
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{payload}.c2lnbmF0dXJl")
}

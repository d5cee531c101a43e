//! Credential value objects: API keys, OAuth 2.0 client credentials, and user credentials.
//!
//! All three are plain values. The dispatcher never patches a [`UserCreds`] in place; a refresh
//! yields a brand-new value that replaces the stored one, so references captured elsewhere keep
//! observing the credential they were handed.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, Secret},
};

const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Opaque API key credential with no expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(Secret);
impl ApiKey {
	/// Wraps a raw API key.
	pub fn new(value: impl Into<String>) -> Self {
		Self(Secret::new(value))
	}

	/// Returns the raw key. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}
}

/// OAuth 2.0 client identity used to refresh and mint user credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientCreds {
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: Secret,
	/// Scopes the client requests during authorization.
	#[serde(default)]
	pub scopes: ScopeSet,
	/// Redirect URI registered for the authorization-code flow.
	#[serde(default)]
	pub redirect_uri: Option<Url>,
}
impl ClientCreds {
	/// Creates client credentials without scopes or redirect metadata.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: Secret::new(client_secret),
			scopes: ScopeSet::default(),
			redirect_uri: None,
		}
	}

	/// Sets the scopes requested during authorization.
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the redirect URI used by the authorization-code flow.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}
}
impl Debug for ClientCreds {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCreds")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("scopes", &self.scopes)
			.field("redirect_uri", &self.redirect_uri)
			.finish()
	}
}

/// Validity of a [`UserCreds`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredsStatus {
	/// The access token is usable beyond the safety margin.
	Active,
	/// The access token expires within the safety margin.
	Expiring,
	/// The expiry instant has passed.
	Expired,
}

/// Errors produced by [`UserCredsBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UserCredsBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// The relative expiry lands outside the representable date range.
	#[error("Expiry is out of range.")]
	ExpiryOutOfRange,
}

/// OAuth 2.0 user credential.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserCreds {
	/// Access token sent with every authorized request; callers must avoid logging it.
	pub access_token: Secret,
	/// Refresh token, if the provider issued one.
	pub refresh_token: Option<Secret>,
	/// Authorization scheme paired with the access token.
	pub token_type: String,
	/// Scopes granted to the access token.
	pub scopes: ScopeSet,
	/// Instant the access token was minted.
	pub issued_at: OffsetDateTime,
	/// Instant the access token stops being valid; `None` means no known expiry.
	pub expires_at: Option<OffsetDateTime>,
	/// OpenID Connect identity token, if the grant included `openid`.
	pub id_token: Option<Secret>,
}
impl UserCreds {
	/// Returns a builder seeded with the provided access token.
	pub fn builder(access_token: impl Into<String>) -> UserCredsBuilder {
		UserCredsBuilder::new().access_token(access_token)
	}

	/// Computes the status at `instant`, treating tokens inside `margin` of expiry as expiring.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> CredsStatus {
		let Some(expires_at) = self.expires_at else {
			return CredsStatus::Active;
		};

		if instant >= expires_at {
			CredsStatus::Expired
		} else if expires_at - instant <= margin {
			CredsStatus::Expiring
		} else {
			CredsStatus::Active
		}
	}

	/// Returns true unless the credential stays valid for longer than `margin` after `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		!matches!(self.status_at(instant, margin), CredsStatus::Active)
	}

	/// Returns the time left before expiry, if an expiry is known.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Option<Duration> {
		self.expires_at.map(|expires_at| expires_at - instant)
	}

	/// Returns true when a refresh token is present.
	pub fn can_refresh(&self) -> bool {
		self.refresh_token.as_ref().is_some_and(|secret| !secret.is_empty())
	}
}
impl Debug for UserCreds {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserCreds")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("scopes", &self.scopes)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Builder for [`UserCreds`].
#[derive(Clone, Debug, Default)]
pub struct UserCredsBuilder {
	access_token: Option<Secret>,
	refresh_token: Option<Secret>,
	token_type: Option<String>,
	scopes: ScopeSet,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	id_token: Option<Secret>,
}
impl UserCredsBuilder {
	/// Creates an empty builder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(Secret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(Secret::new(token));

		self
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the granted scopes.
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the OpenID Connect identity token.
	pub fn id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(Secret::new(token));

		self
	}

	/// Consumes the builder and produces a [`UserCreds`].
	pub fn build(self) -> Result<UserCreds, UserCredsBuilderError> {
		let access_token = self.access_token.ok_or(UserCredsBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) => Some(
				issued_at.checked_add(delta).ok_or(UserCredsBuilderError::ExpiryOutOfRange)?,
			),
			(None, None) => None,
		};

		Ok(UserCreds {
			access_token,
			refresh_token: self.refresh_token,
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			scopes: self.scopes,
			issued_at,
			expires_at,
			id_token: self.id_token,
		})
	}
}

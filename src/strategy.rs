//! Authorization strategies.
//!
//! A strategy knows how to stamp a [`Request`] with one kind of credential. Anonymous and API-key
//! strategies are stateless; user strategies ([`OAuth2Strategy`], [`OpenIdConnectStrategy`])
//! additionally decide whether a [`UserCreds`] value is expired and mint a replacement through
//! the token endpoint. Checking validity and attaching credentials are separate operations so a
//! whole batch can be authorized after a single refresh decision.

pub mod authorization;

mod anonymous;
mod api_key;
mod openid;
mod user;

pub use anonymous::*;
pub use api_key::*;
pub use authorization::{AccessType, AuthorizationOptions, AuthorizationSession};
pub use openid::*;
pub use user::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientCreds, IdTokenClaims, UserCreds},
	request::Request,
};

/// Boxed future returned by dyn-compatible strategy operations.
pub type StrategyFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Attaches credential material of type `Credential` to an outbound request.
///
/// Implementations are pure with respect to the credential: they never refresh or mutate it.
/// Validity is the caller's concern.
pub trait RequestAuthorizer<Credential>
where
	Self: Send + Sync,
	Credential: ?Sized,
{
	/// Consumes the request and returns the authorized copy.
	fn authorize(&self, request: Request, credential: &Credential) -> Result<Request>;
}

/// User-credential strategy flavors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
	/// Plain OAuth 2.0 bearer credentials.
	#[default]
	OAuth2,
	/// OAuth 2.0 plus OpenID Connect identity-token handling.
	OpenIdConnect,
}
impl StrategyKind {
	/// Returns a stable label suitable for logs or config files.
	pub const fn as_str(self) -> &'static str {
		match self {
			StrategyKind::OAuth2 => "oauth2",
			StrategyKind::OpenIdConnect => "open_id_connect",
		}
	}
}
impl Display for StrategyKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy used by [`Dispatcher::send_as_user`](crate::dispatch::Dispatcher::send_as_user).
///
/// All implementations share the capability set `{is_expired, refresh, authorize}`, so the
/// dispatcher never needs to know which flavor it was configured with.
pub trait UserAuthStrategy: RequestAuthorizer<UserCreds> {
	/// Strategy flavor.
	fn kind(&self) -> StrategyKind;

	/// Safety margin subtracted from the expiry instant.
	fn margin(&self) -> Duration;

	/// Returns true if `creds` must be refreshed before use at `now`.
	fn is_expired_at(&self, creds: &UserCreds, now: OffsetDateTime) -> bool {
		creds.is_expired_at(now, self.margin())
	}

	/// Returns true if `creds` must be refreshed before use right now.
	fn is_expired(&self, creds: &UserCreds) -> bool {
		self.is_expired_at(creds, OffsetDateTime::now_utc())
	}

	/// Exchanges the refresh token for a brand-new credential.
	///
	/// Failures surface as [`Error::AuthRefresh`] (or [`Error::IdToken`] when a returned
	/// identity token fails validation).
	fn refresh<'a>(
		&'a self,
		creds: &'a UserCreds,
		client: &'a ClientCreds,
	) -> StrategyFuture<'a, UserCreds>;

	/// Builds the authorization URL and the state needed to finish the code flow.
	fn authorization_session(
		&self,
		client: &ClientCreds,
		options: AuthorizationOptions,
	) -> Result<AuthorizationSession>;

	/// Exchanges an authorization code captured from the redirect for a credential.
	fn exchange_code<'a>(
		&'a self,
		client: &'a ClientCreds,
		session: AuthorizationSession,
		code: &'a str,
	) -> StrategyFuture<'a, UserCreds>;

	/// Decodes and validates the identity token carried by `creds`.
	fn decode_id_token(&self, creds: &UserCreds, client: &ClientCreds) -> Result<IdTokenClaims>;
}

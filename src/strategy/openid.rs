// self
use crate::{
	_prelude::*,
	auth::{ClientCreds, IdTokenClaims, ScopeSet, UserCreds},
	error::{ConfigError, IdTokenError, TokenEndpointError},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	request::Request,
	strategy::{
		AuthorizationOptions, AuthorizationSession, OAuth2Strategy, RequestAuthorizer,
		StrategyFuture, StrategyKind, UserAuthStrategy, authorization,
	},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

const OPENID_SCOPE: &str = "openid";

#[cfg(feature = "reqwest")]
/// OpenID Connect strategy over the crate's default reqwest token transport.
pub type ReqwestOpenIdConnectStrategy =
	OpenIdConnectStrategy<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// OAuth 2.0 strategy that also requests, validates, and decodes identity tokens.
///
/// Requests are authorized exactly like [`OAuth2Strategy`]. On top of that the authorization URL
/// always asks for `openid` and carries a nonce, a code exchange must yield a valid identity
/// token, and any identity token returned by a refresh is re-validated.
pub struct OpenIdConnectStrategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	inner: OAuth2Strategy<C, M>,
}
impl<C, M> OpenIdConnectStrategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Wraps an OAuth 2.0 strategy.
	pub fn new(inner: OAuth2Strategy<C, M>) -> Self {
		Self { inner }
	}

	/// Underlying OAuth 2.0 strategy.
	pub fn oauth2(&self) -> &OAuth2Strategy<C, M> {
		&self.inner
	}
}
#[cfg(feature = "reqwest")]
impl OpenIdConnectStrategy<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a strategy for Google's OAuth endpoints over a default reqwest client.
	pub fn google() -> Result<Self> {
		Ok(Self::new(OAuth2Strategy::google()?))
	}
}
impl<C, M> RequestAuthorizer<UserCreds> for OpenIdConnectStrategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn authorize(&self, request: Request, creds: &UserCreds) -> Result<Request> {
		self.inner.authorize(request, creds)
	}
}
impl<C, M> UserAuthStrategy for OpenIdConnectStrategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn kind(&self) -> StrategyKind {
		StrategyKind::OpenIdConnect
	}

	fn margin(&self) -> Duration {
		self.inner.margin()
	}

	fn refresh<'a>(
		&'a self,
		creds: &'a UserCreds,
		client: &'a ClientCreds,
	) -> StrategyFuture<'a, UserCreds> {
		Box::pin(async move {
			let refreshed = self.inner.refresh(creds, client).await?;
			let returned_new_token = match (&refreshed.id_token, &creds.id_token) {
				(Some(new), Some(old)) => new.expose() != old.expose(),
				(Some(_), None) => true,
				_ => false,
			};

			// A carried-over identity token may legitimately be past its own `exp`.
			if returned_new_token && let Some(token) = &refreshed.id_token {
				self.inner
					.validate_id_token(token.expose(), client, None)
					.map_err(|err| Error::AuthRefresh(TokenEndpointError::InvalidIdToken(err)))?;
			}

			Ok(refreshed)
		})
	}

	fn authorization_session(
		&self,
		client: &ClientCreds,
		mut options: AuthorizationOptions,
	) -> Result<AuthorizationSession> {
		let requested = options.scopes.take().unwrap_or_else(|| client.scopes.clone());

		options.scopes = Some(with_openid(&requested)?);

		authorization::build_session(&self.inner.endpoints().authorization, client, options, true)
	}

	fn exchange_code<'a>(
		&'a self,
		client: &'a ClientCreds,
		session: AuthorizationSession,
		code: &'a str,
	) -> StrategyFuture<'a, UserCreds> {
		Box::pin(async move {
			let nonce = session.nonce().map(str::to_owned);
			let creds = self.inner.exchange_code(client, session, code).await?;
			let token = creds.id_token.as_ref().ok_or(IdTokenError::Missing)?;

			self.inner.validate_id_token(token.expose(), client, nonce.as_deref())?;

			Ok(creds)
		})
	}

	fn decode_id_token(&self, creds: &UserCreds, client: &ClientCreds) -> Result<IdTokenClaims> {
		self.inner.decode_id_token(creds, client)
	}
}
impl<C, M> Debug for OpenIdConnectStrategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("OpenIdConnectStrategy").field(&self.inner).finish()
	}
}

fn with_openid(scopes: &ScopeSet) -> Result<ScopeSet> {
	if scopes.contains(OPENID_SCOPE) {
		return Ok(scopes.clone());
	}

	ScopeSet::new(scopes.iter().chain([OPENID_SCOPE]))
		.map_err(|err| ConfigError::from(err).into())
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn authorization_always_requests_openid_with_a_nonce() {
		let strategy = OpenIdConnectStrategy::google().expect("Google strategy should build.");
		let client = ClientCreds::new("C", "S")
			.with_scopes(ScopeSet::new(["email"]).expect("Scope fixture should be valid."))
			.with_redirect_uri(
				Url::parse("http://localhost:8080/callback").expect("URL should parse."),
			);
		let session = strategy
			.authorization_session(&client, AuthorizationOptions::default())
			.expect("Session should build.");
		let scope = session
			.authorize_url
			.query_pairs()
			.find(|(key, _)| key == "scope")
			.map(|(_, value)| value.into_owned());

		assert_eq!(scope.as_deref(), Some("email openid"));
		assert!(session.nonce().is_some());
		assert_eq!(strategy.kind(), StrategyKind::OpenIdConnect);
	}
}

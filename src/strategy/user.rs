// crates.io
use oauth2::http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{ClientCreds, IdTokenClaims, IdTokenValidation, UserCreds},
	error::IdTokenError,
	http::TokenHttpClient,
	oauth::{TokenFacade, TransportErrorMapper},
	provider::{DefaultTokenErrorClassifier, OAuthEndpoints, TokenErrorClassifier},
	request::Request,
	strategy::{
		AuthorizationOptions, AuthorizationSession, RequestAuthorizer, StrategyFuture,
		StrategyKind, UserAuthStrategy, authorization,
	},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

/// Default safety margin: tokens are treated as expired this long before their real expiry.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::seconds(60);

#[cfg(feature = "reqwest")]
/// OAuth 2.0 strategy over the crate's default reqwest token transport.
pub type ReqwestOAuth2Strategy = OAuth2Strategy<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// OAuth 2.0 bearer strategy.
///
/// Holds the token-endpoint transport; the client identity is passed per call so the same
/// strategy can serve any [`ClientCreds`] the dispatcher is configured with.
pub struct OAuth2Strategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	endpoints: OAuthEndpoints,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	classifier: Arc<dyn TokenErrorClassifier>,
	margin: Duration,
}
impl<C, M> OAuth2Strategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a strategy that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		endpoints: OAuthEndpoints,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			endpoints,
			http_client: http_client.into(),
			error_mapper: mapper.into(),
			classifier: Arc::new(DefaultTokenErrorClassifier),
			margin: DEFAULT_REFRESH_MARGIN,
		}
	}

	/// Replaces the token-error classifier.
	pub fn with_classifier(mut self, classifier: Arc<dyn TokenErrorClassifier>) -> Self {
		self.classifier = classifier;

		self
	}

	/// Overrides the expiry safety margin.
	pub fn with_margin(mut self, margin: Duration) -> Self {
		self.margin = margin;

		self
	}

	/// Endpoints the strategy talks to.
	pub fn endpoints(&self) -> &OAuthEndpoints {
		&self.endpoints
	}

	pub(crate) fn facade(
		&self,
		client: &ClientCreds,
		redirect_uri: Option<&Url>,
	) -> TokenFacade<C, M> {
		TokenFacade::new(
			&self.endpoints,
			client,
			redirect_uri,
			self.http_client.clone(),
			self.error_mapper.clone(),
			self.classifier.clone(),
		)
	}

	pub(crate) fn validate_id_token(
		&self,
		token: &str,
		client: &ClientCreds,
		nonce: Option<&str>,
	) -> Result<IdTokenClaims, IdTokenError> {
		let claims = IdTokenClaims::decode(token)?;
		let mut validation = IdTokenValidation::new(&self.endpoints.issuers, &client.client_id);

		if let Some(nonce) = nonce {
			validation = validation.with_nonce(nonce);
		}

		claims.validate(&validation, OffsetDateTime::now_utc())?;

		Ok(claims)
	}
}
#[cfg(feature = "reqwest")]
impl OAuth2Strategy<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a strategy for Google's OAuth endpoints over a default reqwest client.
	pub fn google() -> Result<Self> {
		let endpoints = OAuthEndpoints::google().map_err(crate::error::ConfigError::from)?;

		Ok(Self::new(endpoints, ReqwestHttpClient::default()))
	}

	/// Creates a strategy for `endpoints` over `http_client`.
	pub fn new(endpoints: OAuthEndpoints, http_client: ReqwestHttpClient) -> Self {
		Self::with_http_client(endpoints, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> RequestAuthorizer<UserCreds> for OAuth2Strategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn authorize(&self, request: Request, creds: &UserCreds) -> Result<Request> {
		let header = format!("{} {}", creds.token_type, creds.access_token.expose());
		let mut value = HeaderValue::from_str(&header).map_err(|_| Error::Authorization {
			reason: "access token contains characters not allowed in a header".into(),
		})?;

		value.set_sensitive(true);

		Ok(request.with_header(AUTHORIZATION, value))
	}
}
impl<C, M> UserAuthStrategy for OAuth2Strategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn kind(&self) -> StrategyKind {
		StrategyKind::OAuth2
	}

	fn margin(&self) -> Duration {
		self.margin
	}

	fn refresh<'a>(
		&'a self,
		creds: &'a UserCreds,
		client: &'a ClientCreds,
	) -> StrategyFuture<'a, UserCreds> {
		Box::pin(async move {
			self.facade(client, None).refresh(creds).await.map_err(Error::AuthRefresh)
		})
	}

	fn authorization_session(
		&self,
		client: &ClientCreds,
		options: AuthorizationOptions,
	) -> Result<AuthorizationSession> {
		authorization::build_session(&self.endpoints.authorization, client, options, false)
	}

	fn exchange_code<'a>(
		&'a self,
		client: &'a ClientCreds,
		session: AuthorizationSession,
		code: &'a str,
	) -> StrategyFuture<'a, UserCreds> {
		Box::pin(async move {
			self.facade(client, Some(&session.redirect_uri))
				.exchange_code(code, session.pkce_verifier(), &session.redirect_uri)
				.await
				.map_err(Error::CodeExchange)
		})
	}

	fn decode_id_token(&self, creds: &UserCreds, client: &ClientCreds) -> Result<IdTokenClaims> {
		let token = creds.id_token.as_ref().ok_or(IdTokenError::Missing)?;

		Ok(self.validate_id_token(token.expose(), client, None)?)
	}
}
impl<C, M> Debug for OAuth2Strategy<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Strategy")
			.field("endpoints", &self.endpoints)
			.field("margin", &self.margin)
			.finish()
	}
}

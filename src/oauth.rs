//! Internal facade over the `oauth2` crate for the refresh and authorization-code grants.

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientCreds, ScopeSet, Secret, UserCreds},
	error::TokenEndpointError,
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		GrantType, OAuthEndpoints, TokenErrorClassifier, TokenErrorContext, TokenErrorKind,
	},
};

/// Extra token-response fields Google returns alongside the standard ones.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// OpenID Connect identity token, present when `openid` was granted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

type GoogleTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type ConfiguredClient = oauth2::Client<
	BasicErrorResponse,
	GoogleTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type TokenRequestError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;
type FacadeResult<T> = Result<T, TokenEndpointError>;

/// Maps HTTP transport failures into [`TokenEndpointError`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a token-endpoint error.
	fn map_transport_error(
		&self,
		grant: GrantType,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> TokenEndpointError;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: GrantType,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> TokenEndpointError {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(grant, meta, *inner),
			HttpClientError::Http(inner) => TokenEndpointError::Request(inner),
			HttpClientError::Io(inner) => TokenEndpointError::Io(inner),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_generic_transport_error(meta, "unrecognized client failure"),
		}
	}
}

/// Token-endpoint client assembled per call from endpoints + client credentials.
pub(crate) struct TokenFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	classifier: Arc<dyn TokenErrorClassifier>,
}
impl<C, M> TokenFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Client secrets travel in the request body, which is what Google expects.
	pub(crate) fn new(
		endpoints: &OAuthEndpoints,
		client: &ClientCreds,
		redirect_uri: Option<&Url>,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
		classifier: Arc<dyn TokenErrorClassifier>,
	) -> Self {
		let auth_url = AuthUrl::from_url(endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(endpoints.token.clone());
		let mut oauth_client: ConfiguredClient =
			oauth2::Client::new(ClientId::new(client.client_id.clone()))
				.set_client_secret(ClientSecret::new(client.client_secret.expose().to_owned()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url)
				.set_auth_type(AuthType::RequestBody);

		if let Some(redirect) = redirect_uri {
			oauth_client = oauth_client.set_redirect_uri(RedirectUrl::from_url(redirect.clone()));
		}

		Self { oauth_client, http_client, error_mapper, classifier }
	}

	/// Performs `grant_type=refresh_token` and returns a brand-new credential.
	pub(crate) async fn refresh(&self, current: &UserCreds) -> FacadeResult<UserCreds> {
		let refresh_secret = current
			.refresh_token
			.as_ref()
			.filter(|secret| !secret.is_empty())
			.ok_or(TokenEndpointError::MissingRefreshToken)?;
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_token = RefreshToken::new(refresh_secret.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_token)
			.request_async(&instrumented)
			.await
			.map_err(|err| self.map_request_error(GrantType::RefreshToken, meta.take(), err))?;

		map_token_response(response, Some(current))
	}

	/// Exchanges an authorization code (with its PKCE verifier) for user credentials.
	pub(crate) async fn exchange_code(
		&self,
		code: &str,
		pkce_verifier: &str,
		redirect_uri: &Url,
	) -> FacadeResult<UserCreds> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
			.set_redirect_uri(Cow::Owned(RedirectUrl::from_url(redirect_uri.clone())))
			.request_async(&instrumented)
			.await
			.map_err(|err| {
				self.map_request_error(GrantType::AuthorizationCode, meta.take(), err)
			})?;

		map_token_response(response, None)
	}

	fn map_request_error(
		&self,
		grant: GrantType,
		meta: Option<ResponseMetadata>,
		err: TokenRequestError<C::TransportError>,
	) -> TokenEndpointError {
		let meta = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) =>
				self.map_server_response(grant, &response, meta),
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error(grant, meta, error),
			RequestTokenError::Parse(source, _body) =>
				TokenEndpointError::MalformedResponse { source, status: meta_status(meta) },
			RequestTokenError::Other(message) => TokenEndpointError::Endpoint {
				message,
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			},
		}
	}

	fn map_server_response(
		&self,
		grant: GrantType,
		response: &BasicErrorResponse,
		meta: Option<&ResponseMetadata>,
	) -> TokenEndpointError {
		let code = response.error().as_ref().to_string();
		let mut ctx = TokenErrorContext::new(grant).with_oauth_error(code.clone());

		if let Some(description) = response.error_description() {
			ctx = ctx.with_error_description(description.clone());
		}
		if let Some(status) = meta_status(meta) {
			ctx = ctx.with_http_status(status);
		}

		let reason = response.error_description().cloned().unwrap_or(code);

		match self.classifier.classify(&ctx) {
			TokenErrorKind::InvalidGrant => TokenEndpointError::InvalidGrant { reason },
			TokenErrorKind::InvalidClient => TokenEndpointError::InvalidClient { reason },
			TokenErrorKind::InsufficientScope => TokenEndpointError::InsufficientScope { reason },
			TokenErrorKind::Transient => TokenEndpointError::Endpoint {
				message: reason,
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			},
		}
	}
}

/// Builds the credential minted by a token response.
///
/// Refresh responses usually omit the refresh token, granted scopes, and identity token; those
/// carry over from `previous`.
fn map_token_response(
	response: GoogleTokenResponse,
	previous: Option<&UserCreds>,
) -> FacadeResult<UserCreds> {
	let expires_in = response
		.expires_in()
		.ok_or(TokenEndpointError::InvalidResponse { reason: "missing expires_in" })?;
	let expires_in = i64::try_from(expires_in.as_secs())
		.map_err(|_| TokenEndpointError::InvalidResponse { reason: "expires_in out of range" })?;

	if expires_in <= 0 {
		return Err(TokenEndpointError::InvalidResponse { reason: "non-positive expires_in" });
	}

	let scopes = match response.scopes() {
		Some(scopes) => ScopeSet::new(scopes.iter().map(|scope| scope.as_str()))
			.map_err(|_| TokenEndpointError::InvalidResponse { reason: "invalid scope" })?,
		None => previous.map(|creds| creds.scopes.clone()).unwrap_or_default(),
	};
	let issued_at = OffsetDateTime::now_utc();
	let expires_at = issued_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or(TokenEndpointError::InvalidResponse { reason: "expires_in out of range" })?;
	let mut builder = UserCreds::builder(response.access_token().secret().to_owned())
		.token_type(normalize_token_type(response.token_type().as_ref()))
		.scopes(scopes)
		.issued_at(issued_at)
		.expires_at(expires_at);
	let refresh = response
		.refresh_token()
		.map(|token| token.secret().to_owned())
		.or_else(|| carried_secret(previous, |creds| creds.refresh_token.as_ref()));

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	let id_token = response
		.extra_fields()
		.id_token
		.clone()
		.or_else(|| carried_secret(previous, |creds| creds.id_token.as_ref()));

	if let Some(id_token) = id_token {
		builder = builder.id_token(id_token);
	}

	builder
		.build()
		.map_err(|_| TokenEndpointError::InvalidResponse { reason: "missing access_token" })
}

fn carried_secret(
	previous: Option<&UserCreds>,
	field: impl FnOnce(&UserCreds) -> Option<&Secret>,
) -> Option<String> {
	previous.and_then(field).map(|secret| secret.expose().to_owned())
}

fn normalize_token_type(raw: &str) -> String {
	if raw.eq_ignore_ascii_case("bearer") { "Bearer".into() } else { raw.to_owned() }
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> TokenEndpointError {
	if err.is_timeout() {
		return TokenEndpointError::Endpoint {
			message: format!("request timed out during the {grant} grant"),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		};
	}

	TokenEndpointError::from(err)
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(
	meta: Option<&ResponseMetadata>,
	message: impl Display,
) -> TokenEndpointError {
	TokenEndpointError::Endpoint {
		message: format!("HTTP client error: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

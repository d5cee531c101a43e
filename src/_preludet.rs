//! Convenience re-exports and in-memory fakes for unit and integration tests; enabled via
//! `cfg(test)` or the `test` crate feature.

pub use crate::_prelude::*;

// std
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
// crates.io
use oauth2::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
// self
use crate::{
	auth::{ClientCreds, IdTokenClaims, UserCreds},
	error::{IdTokenError, SessionError, TokenEndpointError},
	request::{Request, Response, SendOptions},
	session::{Session, SessionFactory, SessionFuture},
	strategy::{
		AuthorizationOptions, AuthorizationSession, RequestAuthorizer, StrategyFuture,
		StrategyKind, UserAuthStrategy, authorization,
	},
};

type Responder = Arc<dyn Fn(usize, &Request) -> Result<Response> + Send + Sync>;

/// Session factory that records every open, close, and request.
///
/// The default responder answers `200` with a JSON echo of the request:
/// `{"index": <position in batch>, "url": <full url>, "authorization": <header or null>}`.
#[derive(Clone)]
pub struct RecordingSessionFactory {
	state: Arc<RecordingState>,
	responder: Responder,
	drop_last_response: bool,
}
impl RecordingSessionFactory {
	/// Replaces the responder.
	pub fn responding<F>(mut self, responder: F) -> Self
	where
		F: 'static + Fn(usize, &Request) -> Result<Response> + Send + Sync,
	{
		self.responder = Arc::new(responder);

		self
	}

	/// Makes every session return one response fewer than requested.
	pub fn dropping_last_response(mut self) -> Self {
		self.drop_last_response = true;

		self
	}

	/// Number of sessions opened.
	pub fn opened(&self) -> usize {
		self.state.opened.load(Ordering::SeqCst)
	}

	/// Number of sessions closed.
	pub fn closed(&self) -> usize {
		self.state.closed.load(Ordering::SeqCst)
	}

	/// Every request sent so far, across sessions.
	pub fn sent(&self) -> Vec<Request> {
		self.state.sent.lock().clone()
	}

	/// Timeouts passed to [`SessionFactory::open`], in call order.
	pub fn timeouts(&self) -> Vec<Option<Duration>> {
		self.state.timeouts.lock().clone()
	}

	/// Options passed to each `send`, in call order.
	pub fn options(&self) -> Vec<SendOptions> {
		self.state.options.lock().clone()
	}
}
impl Default for RecordingSessionFactory {
	fn default() -> Self {
		Self {
			state: Default::default(),
			responder: Arc::new(echo_response),
			drop_last_response: false,
		}
	}
}
impl SessionFactory for RecordingSessionFactory {
	fn open(&self, timeout: Option<Duration>) -> SessionFuture<'_, Arc<dyn Session>> {
		self.state.opened.fetch_add(1, Ordering::SeqCst);
		self.state.timeouts.lock().push(timeout);

		let session: Arc<dyn Session> = Arc::new(RecordingSession {
			state: self.state.clone(),
			responder: self.responder.clone(),
			drop_last_response: self.drop_last_response,
			closed: AtomicBool::new(false),
		});

		Box::pin(async move { Ok(session) })
	}
}

#[derive(Default)]
struct RecordingState {
	opened: AtomicUsize,
	closed: AtomicUsize,
	sent: Mutex<Vec<Request>>,
	timeouts: Mutex<Vec<Option<Duration>>>,
	options: Mutex<Vec<SendOptions>>,
}

struct RecordingSession {
	state: Arc<RecordingState>,
	responder: Responder,
	drop_last_response: bool,
	closed: AtomicBool,
}
impl Session for RecordingSession {
	fn send(&self, requests: Vec<Request>, options: SendOptions) -> SessionFuture<'_, Vec<Response>> {
		Box::pin(async move {
			if self.closed.load(Ordering::SeqCst) {
				return Err(SessionError::Closed.into());
			}

			self.state.options.lock().push(options);
			self.state.sent.lock().extend(requests.iter().cloned());

			let mut responses = requests
				.iter()
				.enumerate()
				.map(|(index, request)| (self.responder)(index, request))
				.collect::<Result<Vec<_>>>()?;

			if self.drop_last_response {
				responses.pop();
			}

			Ok(responses)
		})
	}

	fn close(&self) -> SessionFuture<'_, ()> {
		if !self.closed.swap(true, Ordering::SeqCst) {
			self.state.closed.fetch_add(1, Ordering::SeqCst);
		}

		Box::pin(async { Ok(()) })
	}
}

fn echo_response(index: usize, request: &Request) -> Result<Response> {
	let authorization =
		request.headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_owned);
	let body = serde_json::json!({
		"index": index,
		"url": request.full_url().as_str(),
		"authorization": authorization,
	});

	Ok(Response::new(StatusCode::OK, body.to_string()))
}

/// Arguments observed by [`FakeUserStrategy::refresh`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshCall {
	/// Refresh token presented.
	pub refresh_token: Option<String>,
	/// Client identifier presented.
	pub client_id: String,
	/// Client secret presented.
	pub client_secret: String,
}

/// In-memory user strategy.
///
/// The n-th successful refresh returns access token `A{n + 1}`, valid for an hour, and keeps the
/// presented refresh token. Refreshes wait on [`FakeUserStrategy::gate`] before completing, which
/// lets tests hold a refresh in flight.
pub struct FakeUserStrategy {
	margin: Duration,
	fail_refresh: bool,
	refreshes: AtomicUsize,
	calls: Mutex<Vec<RefreshCall>>,
	gate: Arc<AsyncMutex<()>>,
}
impl FakeUserStrategy {
	/// Makes every refresh fail with `invalid_grant`.
	pub fn failing() -> Self {
		Self { fail_refresh: true, ..Default::default() }
	}

	/// Lock every refresh acquires before completing.
	pub fn gate(&self) -> Arc<AsyncMutex<()>> {
		self.gate.clone()
	}

	/// Number of refresh calls.
	pub fn refreshes(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}

	/// Arguments of every refresh call.
	pub fn calls(&self) -> Vec<RefreshCall> {
		self.calls.lock().clone()
	}
}
impl Default for FakeUserStrategy {
	fn default() -> Self {
		Self {
			margin: Duration::seconds(60),
			fail_refresh: false,
			refreshes: AtomicUsize::new(0),
			calls: Mutex::new(Vec::new()),
			gate: Arc::new(AsyncMutex::new(())),
		}
	}
}
impl RequestAuthorizer<UserCreds> for FakeUserStrategy {
	fn authorize(&self, request: Request, creds: &UserCreds) -> Result<Request> {
		let value = HeaderValue::from_str(&format!("Bearer {}", creds.access_token.expose()))
			.map_err(|_| Error::Authorization { reason: "invalid access token".into() })?;

		Ok(request.with_header(AUTHORIZATION, value))
	}
}
impl UserAuthStrategy for FakeUserStrategy {
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
			let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

			self.calls.lock().push(RefreshCall {
				refresh_token: creds.refresh_token.as_ref().map(|token| token.expose().to_owned()),
				client_id: client.client_id.clone(),
				client_secret: client.client_secret.expose().to_owned(),
			});

			let _gate = self.gate.lock().await;

			if self.fail_refresh {
				return Err(Error::AuthRefresh(TokenEndpointError::InvalidGrant {
					reason: "Token has been expired or revoked.".into(),
				}));
			}

			let mut builder = UserCreds::builder(format!("A{}", n + 1))
				.scopes(creds.scopes.clone())
				.expires_in(Duration::hours(1));

			if let Some(refresh) = &creds.refresh_token {
				builder = builder.refresh_token(refresh.expose());
			}

			Ok(builder.build().map_err(crate::error::ConfigError::from)?)
		})
	}

	fn authorization_session(
		&self,
		client: &ClientCreds,
		options: AuthorizationOptions,
	) -> Result<AuthorizationSession> {
		let endpoint = Url::parse("https://accounts.example.com/o/oauth2/auth")
			.map_err(|source| crate::error::ConfigError::InvalidUrl { source })?;

		authorization::build_session(&endpoint, client, options, false)
	}

	fn exchange_code<'a>(
		&'a self,
		_: &'a ClientCreds,
		_: AuthorizationSession,
		code: &'a str,
	) -> StrategyFuture<'a, UserCreds> {
		Box::pin(async move {
			Ok(UserCreds::builder(format!("A-{code}"))
				.refresh_token(format!("R-{code}"))
				.expires_in(Duration::hours(1))
				.build()
				.map_err(crate::error::ConfigError::from)?)
		})
	}

	fn decode_id_token(&self, creds: &UserCreds, _: &ClientCreds) -> Result<IdTokenClaims> {
		let token = creds.id_token.as_ref().ok_or(IdTokenError::Missing)?;

		Ok(IdTokenClaims::decode(token.expose())?)
	}
}

/// Builds a reqwest token client that accepts the self-signed certificates produced by
/// `httpmock` during tests.
#[cfg(feature = "reqwest")]
pub fn test_reqwest_http_client() -> crate::http::ReqwestHttpClient {
	let client = ReqwestClient::builder()
		.danger_accept_invalid_certs(true)
		.redirect(reqwest::redirect::Policy::none())
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	crate::http::ReqwestHttpClient::with_client(client)
}

//! Dispatch orchestrator.
//!
//! [`Dispatcher`] owns the credentials, the user strategy, and at most one active session. Each
//! `send_as_*` entry point picks exactly one strategy, repairs credential state if that strategy
//! needs it, authorizes every request in input order, and forwards the batch to the active
//! session. When no session is active the call opens a private one and releases it before
//! returning, on success and failure alike.
//!
//! User credentials are replaced by value: a refresh stores a new `Arc<UserCreds>` and never
//! patches the old one, so callers holding the previous value keep a consistent snapshot.
//! Concurrent refreshes are coalesced behind a single in-flight guard; the second caller re-reads
//! the stored credential after acquiring it and reuses the fresh value.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{ApiKey, ClientCreds, IdTokenClaims, UserCreds},
	config::DispatcherConfig,
	error::{CredentialKind, SessionError, TransportError},
	obs::{self, DispatchKind, DispatchOutcome, DispatchSpan},
	request::{Request, Response, SendOptions},
	session::{ScopedSession, Session, SessionFactory},
	strategy::{
		Anonymous, ApiKeyAuthorizer, AuthorizationOptions, AuthorizationSession,
		RequestAuthorizer, UserAuthStrategy,
	},
};

/// Credential-aware request dispatcher.
pub struct Dispatcher {
	session_factory: Arc<dyn SessionFactory>,
	user_strategy: Arc<dyn UserAuthStrategy>,
	api_key_authorizer: ApiKeyAuthorizer,
	api_key: Option<ApiKey>,
	client_creds: Option<ClientCreds>,
	user_creds: RwLock<Option<Arc<UserCreds>>>,
	active: RwLock<Option<Arc<dyn Session>>>,
	refresh_guard: AsyncMutex<()>,
	refresh_metrics: Arc<RefreshMetrics>,
	session_timeout: Option<Duration>,
	discovery_url: Url,
}
impl Dispatcher {
	/// Creates a builder.
	pub fn builder() -> DispatcherBuilder {
		DispatcherBuilder::default()
	}

	/// Sends `requests` without any credential.
	pub async fn send_as_anonymous<I>(&self, requests: I, options: SendOptions) -> Result<Vec<Response>>
	where
		I: IntoIterator<Item = Request>,
	{
		let requests = requests.into_iter().collect::<Vec<_>>();

		observe(DispatchKind::Anonymous, "send_as_anonymous", async move {
			let authorized = authorize_all(&Anonymous, requests, &())?;

			self.forward(authorized, options).await
		})
		.await
	}

	/// Sends `requests` stamped with the configured API key.
	///
	/// Never touches the token endpoint, whatever user credentials are configured.
	pub async fn send_as_api_key<I>(&self, requests: I, options: SendOptions) -> Result<Vec<Response>>
	where
		I: IntoIterator<Item = Request>,
	{
		let requests = requests.into_iter().collect::<Vec<_>>();

		observe(DispatchKind::ApiKey, "send_as_api_key", async move {
			let key = self
				.api_key
				.as_ref()
				.ok_or(Error::MissingCredentials { credential: CredentialKind::ApiKey })?;
			let authorized = authorize_all(&self.api_key_authorizer, requests, key)?;

			self.forward(authorized, options).await
		})
		.await
	}

	/// Sends `requests` on behalf of the configured user.
	///
	/// An expired credential is refreshed at most once per call, before any request is
	/// authorized. Refresh failures surface as [`Error::AuthRefresh`] and nothing is sent.
	pub async fn send_as_user<I>(&self, requests: I, options: SendOptions) -> Result<Vec<Response>>
	where
		I: IntoIterator<Item = Request>,
	{
		let requests = requests.into_iter().collect::<Vec<_>>();

		observe(DispatchKind::User, "send_as_user", async move {
			let creds = self.valid_user_creds().await?;
			let authorized = authorize_all(self.user_strategy.as_ref(), requests, &*creds)?;

			self.forward(authorized, options).await
		})
		.await
	}

	/// Opens a session and publishes it as the active one.
	///
	/// Fails with [`SessionError::AlreadyActive`] if a session is already active.
	pub async fn enter(&self) -> Result<()> {
		self.open_active().await.map(drop)
	}

	/// Releases the active session, if any.
	pub async fn exit(&self) -> Result<()> {
		let session = self.active.write().take();

		match session {
			Some(session) => session.close().await,
			None => Ok(()),
		}
	}

	/// Runs `body` with a session held open and releases it afterwards.
	///
	/// The session is released whether `body` succeeds or fails; if the future is dropped early
	/// the active reference is still cleared. A session that `body` itself enters after exiting
	/// the scoped one is left untouched.
	pub async fn scoped<'a, F, Fut, T>(&'a self, body: F) -> Result<T>
	where
		F: FnOnce(&'a Self) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let session = self.open_active().await?;
		let reset = ActiveReset { dispatcher: self, session };
		let outcome = body(self).await;
		let closed = reset.release().await;
		let value = outcome?;

		closed?;

		Ok(value)
	}

	/// Returns true while a session entered via [`Dispatcher::enter`] is active.
	pub fn is_active(&self) -> bool {
		self.active.read().is_some()
	}

	/// Current user credential snapshot.
	pub fn user_creds(&self) -> Option<Arc<UserCreds>> {
		self.user_creds.read().clone()
	}

	/// Replaces the user credential, returning the previous value.
	pub fn set_user_creds(&self, creds: UserCreds) -> Option<Arc<UserCreds>> {
		self.user_creds.write().replace(Arc::new(creds))
	}

	/// Removes the user credential, returning the previous value.
	pub fn clear_user_creds(&self) -> Option<Arc<UserCreds>> {
		self.user_creds.write().take()
	}

	/// Configured API key.
	pub fn api_key(&self) -> Option<&ApiKey> {
		self.api_key.as_ref()
	}

	/// Configured client credentials.
	pub fn client_creds(&self) -> Option<&ClientCreds> {
		self.client_creds.as_ref()
	}

	/// User strategy applied by [`Dispatcher::send_as_user`].
	pub fn user_strategy(&self) -> &dyn UserAuthStrategy {
		self.user_strategy.as_ref()
	}

	/// Refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Discovery Service root.
	pub fn discovery_url(&self) -> &Url {
		&self.discovery_url
	}

	/// Starts the authorization-code flow for the configured client.
	pub fn start_authorization(&self, options: AuthorizationOptions) -> Result<AuthorizationSession> {
		let client = self.require_client_creds()?;

		self.user_strategy.authorization_session(client, options)
	}

	/// Finishes the authorization-code flow and stores the resulting user credential.
	pub async fn complete_authorization(
		&self,
		session: AuthorizationSession,
		returned_state: &str,
		code: &str,
	) -> Result<Arc<UserCreds>> {
		observe(DispatchKind::Authorization, "complete_authorization", async move {
			session.validate_state(returned_state)?;

			let client = self.require_client_creds()?;
			let creds = Arc::new(self.user_strategy.exchange_code(client, session, code).await?);

			*self.user_creds.write() = Some(creds.clone());

			Ok(creds)
		})
		.await
	}

	/// Decodes and validates the identity token of the stored user credential.
	pub fn decode_id_token(&self) -> Result<IdTokenClaims> {
		let creds = self
			.user_creds()
			.ok_or(Error::MissingCredentials { credential: CredentialKind::UserCreds })?;

		self.user_strategy.decode_id_token(&creds, self.require_client_creds()?)
	}

	pub(crate) async fn forward(
		&self,
		requests: Vec<Request>,
		options: SendOptions,
	) -> Result<Vec<Response>> {
		let sent = requests.len();

		if sent == 0 {
			return Ok(Vec::new());
		}

		let active = self.active.read().clone();
		let responses = match active {
			Some(session) => session.send(requests, options).await?,
			None => {
				let scoped =
					ScopedSession::open(self.session_factory.as_ref(), self.session_timeout).await?;
				let outcome = scoped.session().send(requests, options).await;
				let released = scoped.release().await;
				let responses = outcome?;

				released?;

				responses
			},
		};

		if responses.len() != sent {
			return Err(TransportError::ResponseCount { sent, received: responses.len() }.into());
		}

		Ok(responses)
	}

	async fn valid_user_creds(&self) -> Result<Arc<UserCreds>> {
		let current = self
			.user_creds()
			.ok_or(Error::MissingCredentials { credential: CredentialKind::UserCreds })?;

		if !self.user_strategy.is_expired(&current) {
			return Ok(current);
		}

		let client = self.require_client_creds()?;
		let _in_flight = self.refresh_guard.lock().await;
		let latest = self
			.user_creds()
			.ok_or(Error::MissingCredentials { credential: CredentialKind::UserCreds })?;

		if !Arc::ptr_eq(&latest, &current) && !self.user_strategy.is_expired(&latest) {
			self.refresh_metrics.record_coalesced();

			return Ok(latest);
		}

		self.refresh_user_creds(latest, client).await
	}

	async fn refresh_user_creds(
		&self,
		stale: Arc<UserCreds>,
		client: &ClientCreds,
	) -> Result<Arc<UserCreds>> {
		observe(DispatchKind::Refresh, "refresh_user_creds", async move {
			self.refresh_metrics.record_attempt();

			let refreshed = self
				.user_strategy
				.refresh(&stale, client)
				.await
				.inspect_err(|_| self.refresh_metrics.record_failure())?;
			let refreshed = Arc::new(refreshed);

			{
				let mut slot = self.user_creds.write();

				// Keep a credential installed via `set_user_creds` while the refresh was in flight.
				if slot.as_ref().is_some_and(|held| Arc::ptr_eq(held, &stale)) {
					*slot = Some(refreshed.clone());
				}
			}

			self.refresh_metrics.record_success();

			Ok(refreshed)
		})
		.await
	}

	async fn open_active(&self) -> Result<Arc<dyn Session>> {
		if self.is_active() {
			return Err(SessionError::AlreadyActive.into());
		}

		let session = self.session_factory.open(self.session_timeout).await?;
		let rejected = {
			let mut active = self.active.write();

			if active.is_some() {
				true
			} else {
				*active = Some(session.clone());

				false
			}
		};

		if rejected {
			session.close().await?;

			return Err(SessionError::AlreadyActive.into());
		}

		Ok(session)
	}

	fn require_client_creds(&self) -> Result<&ClientCreds> {
		self.client_creds
			.as_ref()
			.ok_or(Error::MissingCredentials { credential: CredentialKind::ClientCreds })
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("user_strategy", &self.user_strategy.kind())
			.field("api_key_style", &self.api_key_authorizer.style)
			.field("has_api_key", &self.api_key.is_some())
			.field("client_creds", &self.client_creds)
			.field("user_creds", &self.user_creds.read())
			.field("active", &self.is_active())
			.field("session_timeout", &self.session_timeout)
			.field("discovery_url", &self.discovery_url.as_str())
			.finish()
	}
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
	config: DispatcherConfig,
	session_factory: Option<Arc<dyn SessionFactory>>,
	user_strategy: Option<Arc<dyn UserAuthStrategy>>,
	api_key: Option<ApiKey>,
	client_creds: Option<ClientCreds>,
	user_creds: Option<UserCreds>,
}
impl DispatcherBuilder {
	/// Applies `config`.
	pub fn config(mut self, config: DispatcherConfig) -> Self {
		self.config = config;

		self
	}

	/// Sets the session factory; defaults to the reqwest transport.
	pub fn session_factory(mut self, factory: Arc<dyn SessionFactory>) -> Self {
		self.session_factory = Some(factory);

		self
	}

	/// Sets the user strategy; defaults to the one named by
	/// [`DispatcherConfig::user_strategy`] over the reqwest transport.
	///
	/// A custom strategy carries its own refresh margin and endpoints.
	pub fn user_strategy(mut self, strategy: Arc<dyn UserAuthStrategy>) -> Self {
		self.user_strategy = Some(strategy);

		self
	}

	/// Sets the API key.
	pub fn api_key(mut self, key: ApiKey) -> Self {
		self.api_key = Some(key);

		self
	}

	/// Sets the client credentials used for refresh and authorization.
	pub fn client_creds(mut self, creds: ClientCreds) -> Self {
		self.client_creds = Some(creds);

		self
	}

	/// Sets the initial user credential.
	pub fn user_creds(mut self, creds: UserCreds) -> Self {
		self.user_creds = Some(creds);

		self
	}

	/// Builds the dispatcher.
	pub fn build(self) -> Result<Dispatcher> {
		let session_factory = match self.session_factory {
			Some(factory) => factory,
			None => default_session_factory()?,
		};
		let user_strategy = match self.user_strategy {
			Some(strategy) => strategy,
			None => default_user_strategy(&self.config)?,
		};

		crate::session::std_timeout(self.config.session_timeout())?;

		Ok(Dispatcher {
			session_factory,
			user_strategy,
			api_key_authorizer: ApiKeyAuthorizer::new(self.config.api_key_style),
			api_key: self.api_key,
			client_creds: self.client_creds,
			user_creds: RwLock::new(self.user_creds.map(Arc::new)),
			active: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			refresh_metrics: Default::default(),
			session_timeout: self.config.session_timeout(),
			discovery_url: self.config.discovery_url()?,
		})
	}
}
impl Debug for DispatcherBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DispatcherBuilder")
			.field("config", &self.config)
			.field("session_factory", &self.session_factory.is_some())
			.field("user_strategy", &self.user_strategy.as_ref().map(|strategy| strategy.kind()))
			.field("has_api_key", &self.api_key.is_some())
			.field("client_creds", &self.client_creds)
			.field("user_creds", &self.user_creds)
			.finish()
	}
}

struct ActiveReset<'a> {
	dispatcher: &'a Dispatcher,
	session: Arc<dyn Session>,
}
impl ActiveReset<'_> {
	fn clear(&self) {
		let mut active = self.dispatcher.active.write();

		if active.as_ref().is_some_and(|held| Arc::ptr_eq(held, &self.session)) {
			*active = None;
		}
	}

	async fn release(self) -> Result<()> {
		self.clear();

		self.session.close().await
	}
}
impl Drop for ActiveReset<'_> {
	fn drop(&mut self) {
		self.clear();
	}
}

#[cfg(feature = "reqwest")]
fn default_session_factory() -> Result<Arc<dyn SessionFactory>> {
	Ok(Arc::new(crate::session::ReqwestSessionFactory::default()))
}
#[cfg(not(feature = "reqwest"))]
fn default_session_factory() -> Result<Arc<dyn SessionFactory>> {
	Err(crate::error::ConfigError::MissingTransport { component: "session factory" }.into())
}

#[cfg(feature = "reqwest")]
fn default_user_strategy(config: &DispatcherConfig) -> Result<Arc<dyn UserAuthStrategy>> {
	use crate::{
		http::ReqwestHttpClient,
		strategy::{OAuth2Strategy, OpenIdConnectStrategy, StrategyKind},
	};

	let timeout = crate::session::std_timeout(config.refresh_timeout())?;
	let oauth2 = OAuth2Strategy::new(config.endpoints()?, ReqwestHttpClient::with_timeout(timeout)?)
		.with_margin(config.refresh_margin());

	Ok(match config.user_strategy {
		StrategyKind::OAuth2 => Arc::new(oauth2),
		StrategyKind::OpenIdConnect => Arc::new(OpenIdConnectStrategy::new(oauth2)),
	})
}
#[cfg(not(feature = "reqwest"))]
fn default_user_strategy(_: &DispatcherConfig) -> Result<Arc<dyn UserAuthStrategy>> {
	Err(crate::error::ConfigError::MissingTransport { component: "user strategy" }.into())
}

fn authorize_all<A, Cred>(authorizer: &A, requests: Vec<Request>, credential: &Cred) -> Result<Vec<Request>>
where
	A: ?Sized + RequestAuthorizer<Cred>,
	Cred: ?Sized,
{
	requests.into_iter().map(|request| authorizer.authorize(request, credential)).collect()
}

pub(crate) async fn observe<T, Fut>(kind: DispatchKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = DispatchSpan::new(kind, stage);

	obs::record_dispatch_outcome(kind, DispatchOutcome::Attempt);

	let result = span.instrument(fut).await;

	obs::record_dispatch_outcome(kind, DispatchOutcome::of(&result));

	result
}

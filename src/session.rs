//! Transport session seam and scoped lifecycle.
//!
//! A [`SessionFactory`] mints a fresh [`Session`] per scope; handles are never reused once
//! closed. [`ScopedSession`] wraps a handle whose lifetime is bounded by one unit of work and
//! releases it on every exit path.

#[cfg(feature = "reqwest")] mod transport;
#[cfg(feature = "reqwest")] pub use transport::*;

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	request::{Request, Response, SendOptions},
};

/// Boxed future returned by session operations.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Live transport handle.
///
/// `send` must return exactly one response per request, in input order. Requests may be executed
/// concurrently.
pub trait Session
where
	Self: Send + Sync,
{
	/// Sends a batch of authorized requests.
	fn send(&self, requests: Vec<Request>, options: SendOptions) -> SessionFuture<'_, Vec<Response>>;

	/// Releases the handle. Further sends fail with
	/// [`SessionError::Closed`](crate::error::SessionError::Closed).
	fn close(&self) -> SessionFuture<'_, ()>;
}

/// Creates sessions on demand.
pub trait SessionFactory
where
	Self: Send + Sync,
{
	/// Opens a new session whose requests are bounded by `timeout`.
	fn open(&self, timeout: Option<Duration>) -> SessionFuture<'_, Arc<dyn Session>>;
}

/// Session acquired for a single unit of work.
///
/// Call [`ScopedSession::release`] when done. Dropping an unreleased guard (for example when the
/// owning future is cancelled) still drops the handle, but skips the orderly close.
pub struct ScopedSession {
	session: Arc<dyn Session>,
	released: bool,
}
impl ScopedSession {
	/// Opens a session through `factory`.
	pub async fn open(factory: &dyn SessionFactory, timeout: Option<Duration>) -> Result<Self> {
		let session = factory.open(timeout).await?;

		Ok(Self::new(session))
	}

	/// Wraps an already opened session.
	pub fn new(session: Arc<dyn Session>) -> Self {
		Self { session, released: false }
	}

	/// Borrowed handle.
	pub fn session(&self) -> &dyn Session {
		self.session.as_ref()
	}

	/// Closes the session.
	pub async fn release(mut self) -> Result<()> {
		self.released = true;

		self.session.close().await
	}
}
impl Drop for ScopedSession {
	fn drop(&mut self) {
		if !self.released {
			#[cfg(feature = "tracing")]
			tracing::warn!("scoped session dropped without release");
		}
	}
}
impl Debug for ScopedSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ScopedSession").field("released", &self.released).finish()
	}
}

/// Converts a session timeout into the std representation transports expect.
pub fn std_timeout(timeout: Option<Duration>) -> Result<Option<std::time::Duration>> {
	timeout
		.map(|timeout| {
			std::time::Duration::try_from(timeout).map_err(|_| ConfigError::InvalidTimeout.into())
		})
		.transpose()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::RecordingSessionFactory;

	#[tokio::test]
	async fn release_closes_the_handle_once() {
		let factory = RecordingSessionFactory::default();
		let scoped = ScopedSession::open(&factory, None).await.expect("Open should succeed.");

		assert_eq!(factory.opened(), 1);
		assert_eq!(factory.closed(), 0);

		scoped.release().await.expect("Release should succeed.");

		assert_eq!(factory.closed(), 1);
	}

	#[test]
	fn negative_timeouts_are_rejected() {
		assert_eq!(
			std_timeout(Some(Duration::seconds(3))).expect("Positive timeout converts."),
			Some(std::time::Duration::from_secs(3))
		);
		assert!(std_timeout(None).expect("No timeout converts.").is_none());
		assert!(matches!(
			std_timeout(Some(Duration::seconds(-1))),
			Err(Error::Config(ConfigError::InvalidTimeout))
		));
	}
}

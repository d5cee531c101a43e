// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use futures::future;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, HttpError, SessionError, TransportError},
	request::{Request, Response, SendOptions},
	session::{self, Session, SessionFactory, SessionFuture},
};

/// Opens reqwest-backed sessions.
///
/// Each [`SessionFactory::open`] builds a dedicated [`ReqwestClient`] so a closed session never
/// shares a connection pool with its successor.
#[derive(Clone, Debug, Default)]
pub struct ReqwestSessionFactory {
	accept_invalid_certs: bool,
}
impl ReqwestSessionFactory {
	/// Accepts self-signed certificates. Only meant for local mock servers.
	pub fn danger_accept_invalid_certs(mut self) -> Self {
		self.accept_invalid_certs = true;

		self
	}

	fn client(&self, timeout: Option<Duration>) -> Result<ReqwestClient> {
		let mut builder = ReqwestClient::builder();

		if let Some(timeout) = session::std_timeout(timeout)? {
			builder = builder.timeout(timeout);
		}
		if self.accept_invalid_certs {
			builder = builder.danger_accept_invalid_certs(true);
		}

		builder.build().map_err(|err| ConfigError::from(err).into())
	}
}
impl SessionFactory for ReqwestSessionFactory {
	fn open(&self, timeout: Option<Duration>) -> SessionFuture<'_, Arc<dyn Session>> {
		let client = self.client(timeout);

		Box::pin(async move {
			let session: Arc<dyn Session> = Arc::new(ReqwestSession::new(client?));

			Ok(session)
		})
	}
}

/// Session over a single [`ReqwestClient`].
#[derive(Debug)]
pub struct ReqwestSession {
	client: ReqwestClient,
	closed: AtomicBool,
}
impl ReqwestSession {
	/// Wraps `client`.
	pub fn new(client: ReqwestClient) -> Self {
		Self { client, closed: AtomicBool::new(false) }
	}

	async fn execute(&self, request: Request, options: SendOptions) -> Result<Response> {
		let url = request.full_url();
		let mut builder = self.client.request(request.method, url.clone()).headers(request.headers);

		if let Some(timeout) = session::std_timeout(options.timeout)? {
			builder = builder.timeout(timeout);
		}
		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await.map_err(TransportError::from)?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

		if !status.is_success() {
			return Err(HttpError { status: status.as_u16(), url, body }.into());
		}

		let response = Response::new(status, body);

		Ok(if options.full_response { response.with_headers(headers) } else { response })
	}
}
impl Session for ReqwestSession {
	fn send(&self, requests: Vec<Request>, options: SendOptions) -> SessionFuture<'_, Vec<Response>> {
		Box::pin(async move {
			if self.closed.load(Ordering::Acquire) {
				return Err(SessionError::Closed.into());
			}

			future::join_all(requests.into_iter().map(|request| self.execute(request, options)))
				.await
				.into_iter()
				.collect()
		})
	}

	fn close(&self) -> SessionFuture<'_, ()> {
		self.closed.store(true, Ordering::Release);

		Box::pin(async { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;

	#[tokio::test]
	async fn batch_results_keep_input_order_and_surface_http_errors() {
		let server = MockServer::start_async().await;
		let slow = server
			.mock_async(|when, then| {
				when.method(GET).path("/first");
				then.status(200).delay(std::time::Duration::from_millis(50)).body("1");
			})
			.await;
		let fast = server
			.mock_async(|when, then| {
				when.method(GET).path("/second");
				then.status(200).header("x-trace", "t").body("2");
			})
			.await;
		let session = ReqwestSessionFactory::default()
			.danger_accept_invalid_certs()
			.open(Some(Duration::seconds(5)))
			.await
			.expect("Session should open.");
		let url = |path: &str| Url::parse(&server.url(path)).expect("Mock URL should parse.");
		let responses = session
			.send(
				vec![Request::get(url("/first")), Request::get(url("/second"))],
				SendOptions::default().full_response(),
			)
			.await
			.expect("Batch should succeed.");

		slow.assert_async().await;
		fast.assert_async().await;

		assert_eq!(responses.iter().map(Response::text).collect::<Vec<_>>(), ["1", "2"]);
		assert!(responses[1].full_response);
		assert_eq!(responses[1].headers.get("x-trace").map(|v| v.as_bytes()), Some(&b"t"[..]));

		let err = session
			.send(vec![Request::get(url("/missing"))], SendOptions::default())
			.await
			.expect_err("Unmatched mock path responds 404.");

		assert!(matches!(err, Error::Http(HttpError { status: 404, .. })));

		session.close().await.expect("Close should succeed.");

		let err = session
			.send(vec![Request::get(url("/first"))], SendOptions::default())
			.await
			.expect_err("Closed sessions reject sends.");

		assert!(matches!(err, Error::Session(SessionError::Closed)));
	}
}

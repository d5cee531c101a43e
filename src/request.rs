//! Request and response value objects exchanged between the dispatcher, strategies, and sessions.

// crates.io
use oauth2::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::TransportError};

/// Outbound API request.
///
/// Strategies decorate a request by value: [`RequestAuthorizer::authorize`] consumes it and
/// returns the stamped copy.
///
/// [`RequestAuthorizer::authorize`]: crate::strategy::RequestAuthorizer::authorize
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
	/// HTTP method.
	pub method: Method,
	/// Target URL; any query already present is kept and [`Request::query`] is appended to it.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Query parameters appended at send time, in insertion order.
	pub query: Vec<(String, String)>,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
}
impl Request {
	/// Creates a request with no headers, query parameters, or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), query: Vec::new(), body: None }
	}

	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Creates a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((name.into(), value.into()));

		self
	}

	/// Sets a header, replacing any previous value.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `content-type` accordingly.
	pub fn with_json<T>(mut self, value: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(value)?);
		self.headers.insert(
			oauth2::http::header::CONTENT_TYPE,
			HeaderValue::from_static("application/json"),
		);

		Ok(self)
	}

	/// Returns the last value of query parameter `name`, if set.
	pub fn query_value(&self, name: &str) -> Option<&str> {
		self.query.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
	}

	/// Returns the URL with [`Request::query`] merged in.
	pub fn full_url(&self) -> Url {
		let mut url = self.url.clone();

		if !self.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.query.iter());
		}

		url
	}
}

/// Response returned by a [`Session`](crate::session::Session).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers; empty unless the caller asked for full responses.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
	/// Whether the session surfaced the full transport response or only the content.
	pub full_response: bool,
}
impl Response {
	/// Creates a content-only response.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into(), full_response: false }
	}

	/// Attaches transport headers and marks the response as full.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;
		self.full_response = true;

		self
	}

	/// Returns true for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body into `T`.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(de)
			.map_err(|source| TransportError::Decode { source }.into())
	}

	/// Decodes the body as untyped JSON.
	pub fn content(&self) -> Result<serde_json::Value> {
		self.json()
	}

	/// Returns the body as UTF-8 text (lossy).
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Per-call options forwarded unchanged to the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SendOptions {
	/// Upper bound on transport I/O for the batch.
	pub timeout: Option<Duration>,
	/// Surface full transport responses (headers included) instead of content only.
	pub full_response: bool,
}
impl SendOptions {
	/// Sets the per-call timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Requests full transport responses.
	pub fn full_response(mut self) -> Self {
		self.full_response = true;

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn full_url_keeps_existing_query_and_appends_in_order() {
		let request = Request::get(url("https://www.googleapis.com/discovery/v1/apis?name=youtube"))
			.with_query("preferred", "true")
			.with_query("key", "k 1");

		assert_eq!(
			request.full_url().as_str(),
			"https://www.googleapis.com/discovery/v1/apis?name=youtube&preferred=true&key=k+1"
		);
		assert_eq!(request.query_value("key"), Some("k 1"));
		assert_eq!(request.query_value("missing"), None);
	}

	#[test]
	fn json_body_sets_content_type() {
		let request = Request::post(url("https://example.com/items"))
			.with_json(&serde_json::json!({ "title": "hello" }))
			.expect("JSON body should serialize.");

		assert_eq!(request.body.as_deref(), Some(br#"{"title":"hello"}"#.as_slice()));
		assert_eq!(
			request.headers.get(oauth2::http::header::CONTENT_TYPE),
			Some(&HeaderValue::from_static("application/json"))
		);
	}

	#[test]
	fn response_decoding_reports_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Listing {
			#[allow(dead_code)]
			items: Vec<String>,
		}

		let ok = Response::new(StatusCode::OK, br#"{"items":["a"]}"#.to_vec());

		assert!(ok.json::<Listing>().is_ok());
		assert_eq!(ok.content().expect("Content should decode.")["items"][0], "a");

		let bad = Response::new(StatusCode::OK, br#"{"items":[1]}"#.to_vec());
		let err = bad.json::<Listing>().expect_err("Wrong element type must fail.");

		match err {
			Error::Transport(TransportError::Decode { source }) =>
				assert_eq!(source.path().to_string(), "items[0]"),
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}

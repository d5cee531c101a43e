#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use oauth2::http::StatusCode;
// self
use discovery_dispatch::{
	_preludet::*,
	auth::ApiKey,
	config::DispatcherConfig,
	discovery::{DiscoveryDocument, ResourceBuilder},
	dispatch::Dispatcher,
	request::Response,
	session::ReqwestSessionFactory,
};

fn config(server: &MockServer) -> DispatcherConfig {
	DispatcherConfig {
		discovery_url: Some(
			Url::parse(&server.url("/discovery/v1")).expect("Mock discovery root should parse."),
		),
		..Default::default()
	}
}

fn dispatcher(server: &MockServer) -> Dispatcher {
	Dispatcher::builder()
		.config(config(server))
		.session_factory(Arc::new(ReqwestSessionFactory::default().danger_accept_invalid_certs()))
		.api_key(ApiKey::new("AIza-never-sent"))
		.build()
		.expect("Dispatcher should build.")
}

fn directory_body(items: serde_json::Value) -> String {
	serde_json::json!({
		"kind": "discovery#directoryList",
		"discoveryVersion": "v1",
		"items": items,
	})
	.to_string()
}

fn youtube_document() -> String {
	serde_json::json!({
		"kind": "discovery#restDescription",
		"id": "youtube:v3",
		"name": "youtube",
		"version": "v3",
		"rootUrl": "https://youtube.googleapis.com/",
		"servicePath": "",
		"resources": { "channels": { "methods": { "list": { "httpMethod": "GET" } } } }
	})
	.to_string()
}

#[tokio::test]
async fn list_api_filters_by_name_and_preference() {
	let server = MockServer::start_async().await;
	let list_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/discovery/v1/apis")
				.query_param("name", "youtube")
				.query_param("preferred", "true");
			then.status(200).header("content-type", "application/json").body(directory_body(
				serde_json::json!([{
					"kind": "discovery#directoryItem",
					"id": "youtube:v3",
					"name": "youtube",
					"version": "v3",
					"preferred": true
				}]),
			));
		})
		.await;
	let dispatcher = dispatcher(&server);
	let listing = dispatcher
		.list_api(Some("youtube"), true, None)
		.await
		.expect("Directory listing should succeed.");

	list_mock.assert_async().await;

	assert_eq!(listing.items.len(), 1);
	assert_eq!(listing.items[0].name, "youtube");
	assert!(!dispatcher.is_active(), "The auto-wrapped session is released.");
}

#[tokio::test]
async fn discover_resolves_the_preferred_version() {
	let server = MockServer::start_async().await;
	let list_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis").query_param("name", "youtube");
			then.status(200).header("content-type", "application/json").body(directory_body(
				serde_json::json!([{ "name": "youtube", "version": "v3", "preferred": true }]),
			));
		})
		.await;
	let doc_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis/youtube/v3/rest");
			then.status(200).header("content-type", "application/json").body(youtube_document());
		})
		.await;
	let dispatcher = dispatcher(&server);
	let document =
		dispatcher.discover("youtube", None).await.expect("Discovery should resolve youtube.");

	list_mock.assert_async().await;
	doc_mock.assert_async().await;

	assert_eq!(document.version, "v3");
	assert!(document.resources.contains_key("channels"));
	assert_eq!(
		document.service_url().expect("Service URL should resolve.").as_str(),
		"https://youtube.googleapis.com/"
	);
}

#[tokio::test]
async fn discover_with_an_explicit_version_skips_the_directory() {
	let server = MockServer::start_async().await;
	let list_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis");
			then.status(500);
		})
		.await;
	let doc_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis/youtube/v3/rest");
			then.status(200).header("content-type", "application/json").body(youtube_document());
		})
		.await;
	let dispatcher = dispatcher(&server);

	struct ResourceNames;
	impl ResourceBuilder for ResourceNames {
		type Output = Vec<String>;

		fn build(&self, document: DiscoveryDocument) -> Result<Self::Output> {
			Ok(document.resources.into_keys().collect())
		}
	}

	let names = dispatcher
		.discover_with(&ResourceNames, "youtube", Some("v3"))
		.await
		.expect("Builder should receive the document.");

	doc_mock.assert_async().await;
	list_mock.assert_calls_async(0).await;

	assert_eq!(names, ["channels"]);
}

#[tokio::test]
async fn discover_without_a_preferred_entry_fails_to_resolve() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"kind\":\"discovery#directoryList\",\"discoveryVersion\":\"v1\"}");
		})
		.await;

	let dispatcher = dispatcher(&server);
	let err = dispatcher
		.discover("nonexistent", None)
		.await
		.expect_err("Unknown APIs must not resolve.");

	assert!(matches!(err, Error::Resolution { ref api } if api == "nonexistent"));
}

#[tokio::test]
async fn discovery_calls_are_anonymous_and_reuse_the_active_session() {
	let factory = Arc::new(RecordingSessionFactory::default().responding(|_, request| {
		let body = if request.url.path().ends_with("/rest") {
			youtube_document()
		} else {
			directory_body(serde_json::json!([{ "name": "youtube", "version": "v3" }]))
		};

		Ok(Response::new(StatusCode::OK, body))
	}));
	let dispatcher = Dispatcher::builder()
		.session_factory(factory.clone())
		.api_key(ApiKey::new("AIza-never-sent"))
		.build()
		.expect("Dispatcher should build.");

	dispatcher
		.scoped(|dispatcher| async move { dispatcher.discover("youtube", None).await })
		.await
		.expect("Discovery should succeed inside a scope.");

	let sent = factory.sent();

	assert_eq!(factory.opened(), 1);
	assert_eq!(factory.closed(), 1);
	assert_eq!(sent.len(), 2);
	assert_eq!(
		sent[0].full_url().as_str(),
		"https://www.googleapis.com/discovery/v1/apis?name=youtube&preferred=true"
	);
	assert_eq!(
		sent[1].full_url().as_str(),
		"https://www.googleapis.com/discovery/v1/apis/youtube/v3/rest"
	);
	assert!(sent.iter().all(|request| request.query_value("key").is_none()));
	assert!(sent.iter().all(|request| request.headers.is_empty()));
}

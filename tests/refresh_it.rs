#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use discovery_dispatch::{
	_preludet::*,
	auth::{ClientCreds, UserCreds},
	dispatch::Dispatcher,
	error::{IdTokenError, TokenEndpointError},
	provider::OAuthEndpoints,
	request::{Request, SendOptions},
	strategy::{
		OAuth2Strategy, OpenIdConnectStrategy, ReqwestOpenIdConnectStrategy, UserAuthStrategy,
	},
};

const CLIENT_ID: &str = "client-refresh";
const CLIENT_SECRET: &str = "secret-refresh";

fn endpoints(server: &MockServer) -> OAuthEndpoints {
	endpoints_at(&server.url("/authorize"), &server.url("/token"))
}

fn endpoints_at(authorize: &str, token: &str) -> OAuthEndpoints {
	OAuthEndpoints::builder()
		.authorization_endpoint(
			Url::parse(authorize).expect("Mock authorize endpoint should parse successfully."),
		)
		.token_endpoint(Url::parse(token).expect("Mock token endpoint should parse successfully."))
		.build()
		.expect("Loopback endpoints should validate.")
}

fn expired_creds() -> UserCreds {
	let issued = OffsetDateTime::now_utc() - Duration::hours(2);

	UserCreds::builder("A1")
		.refresh_token("R1")
		.issued_at(issued)
		.expires_at(issued + Duration::hours(1))
		.build()
		.expect("User credential fixture should build successfully.")
}

fn dispatcher(server: &MockServer, factory: &Arc<RecordingSessionFactory>) -> Dispatcher {
	dispatcher_with(OAuth2Strategy::new(endpoints(server), test_reqwest_http_client()), factory)
}

fn dispatcher_with<S>(strategy: S, factory: &Arc<RecordingSessionFactory>) -> Dispatcher
where
	S: 'static + UserAuthStrategy,
{
	Dispatcher::builder()
		.session_factory(factory.clone())
		.user_strategy(Arc::new(strategy))
		.client_creds(ClientCreds::new(CLIENT_ID, CLIENT_SECRET))
		.user_creds(expired_creds())
		.build()
		.expect("Dispatcher should build.")
}

fn stored_access_token(dispatcher: &Dispatcher) -> Option<String> {
	dispatcher.user_creds().map(|creds| creds.access_token.expose().to_owned())
}

fn openid_strategy(server: &MockServer) -> ReqwestOpenIdConnectStrategy {
	OpenIdConnectStrategy::new(OAuth2Strategy::new(endpoints(server), test_reqwest_http_client()))
}

fn api_request() -> Request {
	Request::get(
		Url::parse("https://www.googleapis.com/youtube/v3/channels?mine=true")
			.expect("API URL should parse."),
	)
}

#[tokio::test]
async fn expired_user_creds_are_refreshed_against_the_token_endpoint() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "R1")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"A2\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher(&server, &factory);
	let responses = dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect("Dispatch should succeed after refresh.");

	token_mock.assert_async().await;

	let echoed = responses[0].content().expect("Echo response should decode.");

	assert_eq!(echoed["authorization"], "Bearer A2");

	let stored = dispatcher.user_creds().expect("Refreshed credential should be stored.");

	assert_eq!(stored.access_token.expose(), "A2");
	assert_eq!(
		stored.refresh_token.as_ref().map(|token| token.expose()),
		Some("R1"),
		"A refresh response without a new refresh token keeps the previous one."
	);
	assert!(!stored.is_expired_at(OffsetDateTime::now_utc(), Duration::seconds(60)));

	dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect("Second dispatch should reuse the refreshed credential.");

	token_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rotated_refresh_tokens_replace_the_stored_one() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"A2\",\"refresh_token\":\"R2\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher(&server, &factory);

	dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect("Dispatch should succeed after refresh.");

	token_mock.assert_async().await;

	let stored = dispatcher.user_creds().expect("Refreshed credential should be stored.");

	assert_eq!(stored.refresh_token.as_ref().map(|token| token.expose()), Some("R2"));
}

#[tokio::test]
async fn invalid_grant_surfaces_as_auth_refresh() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"Token has been expired or revoked.\"}",
			);
		})
		.await;
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher(&server, &factory);
	let err = dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect_err("Revoked refresh tokens must fail.");

	token_mock.assert_async().await;

	assert!(matches!(err, Error::AuthRefresh(TokenEndpointError::InvalidGrant { .. })));
	assert!(factory.sent().is_empty(), "Nothing is sent when the refresh fails.");
	assert_eq!(stored_access_token(&dispatcher).as_deref(), Some("A1"));
}

#[tokio::test]
async fn openid_refresh_without_a_new_id_token_keeps_the_credential_usable() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"A2\",\"token_type\":\"Bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher_with(openid_strategy(&server), &factory);
	let responses = dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect("Dispatch should succeed after refresh.");

	token_mock.assert_async().await;

	assert_eq!(
		responses[0].content().expect("Echo response should decode.")["authorization"],
		"Bearer A2"
	);
}

#[tokio::test]
async fn openid_refresh_with_an_invalid_id_token_is_a_refresh_failure() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"A2\",\"token_type\":\"Bearer\",\"expires_in\":3600,\"id_token\":\"not-a-jwt\"}",
			);
		})
		.await;
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher_with(openid_strategy(&server), &factory);
	let err = dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect_err("An unusable identity token must fail the refresh.");

	token_mock.assert_async().await;

	assert!(matches!(
		err,
		Error::AuthRefresh(TokenEndpointError::InvalidIdToken(IdTokenError::Malformed))
	));
	assert!(factory.sent().is_empty());
	assert_eq!(stored_access_token(&dispatcher).as_deref(), Some("A1"));
}

#[tokio::test]
async fn out_of_range_expires_in_is_a_refresh_failure() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"A2\",\"token_type\":\"Bearer\",\"expires_in\":9223372036854775807}",
			);
		})
		.await;
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher(&server, &factory);
	let err = dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect_err("An unrepresentable expiry must fail the refresh.");

	token_mock.assert_async().await;

	assert!(matches!(err, Error::AuthRefresh(TokenEndpointError::InvalidResponse { .. })));
	assert!(factory.sent().is_empty());
	assert_eq!(stored_access_token(&dispatcher).as_deref(), Some("A1"));
}

#[tokio::test]
async fn unreachable_token_endpoint_is_a_refresh_failure() {
	let port = std::net::TcpListener::bind("127.0.0.1:0")
		.and_then(|listener| listener.local_addr())
		.expect("An ephemeral port should be available.")
		.port();
	let base = format!("http://127.0.0.1:{port}");
	let strategy = OAuth2Strategy::new(
		endpoints_at(&format!("{base}/authorize"), &format!("{base}/token")),
		test_reqwest_http_client(),
	);
	let factory = Arc::new(RecordingSessionFactory::default());
	let dispatcher = dispatcher_with(strategy, &factory);
	let err = dispatcher
		.send_as_user([api_request()], SendOptions::default())
		.await
		.expect_err("A refused connection must fail the refresh.");

	assert!(
		matches!(
			err,
			Error::AuthRefresh(
				TokenEndpointError::Network { .. } | TokenEndpointError::Endpoint { .. }
			)
		),
		"Unexpected error: {err:?}."
	);
	assert!(factory.sent().is_empty());
	assert_eq!(factory.opened(), 0);
	assert_eq!(stored_access_token(&dispatcher).as_deref(), Some("A1"));
}

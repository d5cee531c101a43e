//! Lists a discovery directory and fetches a REST description through a dispatcher backed by the
//! default reqwest session transport.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use discovery_dispatch::{
	config::DispatcherConfig,
	dispatch::Dispatcher,
	error::ConfigError,
	request::{Request, SendOptions},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let directory_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis").query_param("name", "youtube");
			then.status(200).header("content-type", "application/json").body(
				"{\"kind\":\"discovery#directoryList\",\"items\":[{\"name\":\"youtube\",\"version\":\"v3\",\"preferred\":true}]}",
			);
		})
		.await;
	let document_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/discovery/v1/apis/youtube/v3/rest");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"name\":\"youtube\",\"version\":\"v3\",\"rootUrl\":\"{}\",\"servicePath\":\"youtube/v3/\"}}",
				server.url("/")
			));
		})
		.await;
	let channels_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/youtube/v3/channels");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"kind\":\"youtube#channelListResponse\",\"items\":[]}");
		})
		.await;
	let config = DispatcherConfig {
		discovery_url: Some(Url::parse(&server.url("/discovery/v1/"))?),
		..Default::default()
	};
	let dispatcher = Dispatcher::builder().config(config).build()?;

	dispatcher
		.scoped(|dispatcher| async move {
			let listing = dispatcher.list_api(Some("youtube"), true, None).await?;

			for item in &listing.items {
				println!("Found {}:{} (preferred: {}).", item.name, item.version, item.preferred);
			}

			let document = dispatcher.discover("youtube", None).await?;
			let channels = document
				.service_url()?
				.join("channels")
				.map_err(|source| ConfigError::InvalidUrl { source })?;
			let responses = dispatcher
				.send_as_anonymous([Request::get(channels)], SendOptions::default())
				.await?;

			println!("Channels: {}.", responses[0].text());

			Ok(())
		})
		.await?;

	directory_mock.assert_async().await;
	document_mock.assert_async().await;
	channels_mock.assert_async().await;

	Ok(())
}

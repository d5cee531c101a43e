//! Discovery Service bootstrap calls.
//!
//! Both calls are dispatched anonymously, even when the dispatcher holds other credentials: the
//! directory needs no authorization. Turning a [`DiscoveryDocument`] into callable request
//! builders is the job of a [`ResourceBuilder`]; the dispatcher only fetches and forwards
//! documents.

// self
use crate::{
	_prelude::*,
	dispatch::{self, Dispatcher},
	error::{ConfigError, TransportError},
	obs::DispatchKind,
	request::{Request, SendOptions},
};

/// `discovery#directoryList` response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryList {
	/// Resource kind, `discovery#directoryList`.
	#[serde(default)]
	pub kind: Option<String>,
	/// Discovery format version.
	#[serde(default)]
	pub discovery_version: Option<String>,
	/// Matching API versions; absent when nothing matches.
	#[serde(default)]
	pub items: Vec<DirectoryItem>,
}

/// One API version listed by the directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryItem {
	/// Resource kind, `discovery#directoryItem`.
	#[serde(default)]
	pub kind: Option<String>,
	/// `name:version` identifier.
	#[serde(default)]
	pub id: Option<String>,
	/// API name.
	#[serde(default)]
	pub name: String,
	/// API version.
	#[serde(default)]
	pub version: String,
	/// Human-readable title.
	#[serde(default)]
	pub title: Option<String>,
	/// Human-readable description.
	#[serde(default)]
	pub description: Option<String>,
	/// Absolute URL of the REST discovery document.
	#[serde(default)]
	pub discovery_rest_url: Option<String>,
	/// Documentation URL.
	#[serde(default)]
	pub documentation_link: Option<String>,
	/// Whether Google designates this version as preferred.
	#[serde(default)]
	pub preferred: bool,
}

/// REST discovery document.
///
/// Well-known top-level fields are typed; the nested resource, method, and schema descriptions
/// stay as JSON for the [`ResourceBuilder`] to interpret.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
	/// Resource kind, `discovery#restDescription`.
	#[serde(default)]
	pub kind: Option<String>,
	/// `name:version` identifier.
	#[serde(default)]
	pub id: Option<String>,
	/// API name.
	pub name: String,
	/// API version.
	pub version: String,
	/// Human-readable title.
	#[serde(default)]
	pub title: Option<String>,
	/// Root URL all requests are relative to.
	#[serde(default)]
	pub root_url: Option<String>,
	/// Path under [`DiscoveryDocument::root_url`].
	#[serde(default)]
	pub service_path: Option<String>,
	/// Legacy absolute base URL.
	#[serde(default)]
	pub base_url: Option<String>,
	/// Batch endpoint path.
	#[serde(default)]
	pub batch_path: Option<String>,
	/// Parameters shared by every method.
	#[serde(default)]
	pub parameters: BTreeMap<String, serde_json::Value>,
	/// Top-level methods.
	#[serde(default)]
	pub methods: BTreeMap<String, serde_json::Value>,
	/// Resource collections.
	#[serde(default)]
	pub resources: BTreeMap<String, serde_json::Value>,
	/// Schema definitions.
	#[serde(default)]
	pub schemas: BTreeMap<String, serde_json::Value>,
	/// OAuth scope descriptions.
	#[serde(default)]
	pub auth: Option<serde_json::Value>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}
impl DiscoveryDocument {
	/// Base URL for requests, preferring `rootUrl + servicePath` over the legacy `baseUrl`.
	pub fn service_url(&self) -> Result<Url> {
		let raw = match (&self.root_url, &self.service_path, &self.base_url) {
			(Some(root), path, _) => format!("{root}{}", path.as_deref().unwrap_or_default()),
			(None, _, Some(base)) => base.clone(),
			(None, _, None) =>
				return Err(Error::Resolution { api: format!("{}:{}", self.name, self.version) }),
		};

		Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { source }.into())
	}
}

/// Collaborator that turns a discovery document into invocable request builders.
pub trait ResourceBuilder {
	/// Built API surface.
	type Output;

	/// Builds the API surface described by `document`.
	fn build(&self, document: DiscoveryDocument) -> Result<Self::Output>;
}

impl Dispatcher {
	/// Lists directory entries, optionally filtered by `name` and preferred versions.
	///
	/// `fields` is forwarded as the partial-response selector.
	pub async fn list_api(
		&self,
		name: Option<&str>,
		preferred: bool,
		fields: Option<&str>,
	) -> Result<DirectoryList> {
		let mut request = Request::get(self.discovery_endpoint("apis")?);

		if let Some(name) = name {
			request = request.with_query("name", name);
		}
		if preferred {
			request = request.with_query("preferred", "true");
		}
		if let Some(fields) = fields {
			request = request.with_query("fields", fields);
		}

		self.fetch_anonymous(request, "list_api").await
	}

	/// Fetches the discovery document for `name`.
	///
	/// Without a `version`, the first preferred directory entry for `name` is used. "Preferred" is
	/// Google's designation and is not necessarily the newest version; pass a version explicitly
	/// when that matters. Fails with [`Error::Resolution`] when nothing matches.
	pub async fn discover(&self, name: &str, version: Option<&str>) -> Result<DiscoveryDocument> {
		let (name, version) = match version {
			Some(version) => (name.to_owned(), version.to_owned()),
			None => {
				let listing = self.list_api(Some(name), true, None).await?;
				let item = listing
					.items
					.into_iter()
					.next()
					.ok_or_else(|| Error::Resolution { api: name.to_owned() })?;

				(item.name, item.version)
			},
		};
		let url = self.discovery_endpoint(&format!("apis/{name}/{version}/rest"))?;

		self.fetch_anonymous(Request::get(url), "discover").await
	}

	/// Fetches a discovery document and hands it to `builder`.
	pub async fn discover_with<B>(
		&self,
		builder: &B,
		name: &str,
		version: Option<&str>,
	) -> Result<B::Output>
	where
		B: ?Sized + ResourceBuilder,
	{
		builder.build(self.discover(name, version).await?)
	}

	fn discovery_endpoint(&self, path: &str) -> Result<Url> {
		self.discovery_url().join(path).map_err(|source| ConfigError::InvalidUrl { source }.into())
	}

	async fn fetch_anonymous<T>(&self, request: Request, stage: &'static str) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		dispatch::observe(DispatchKind::Discovery, stage, async move {
			let responses = self.send_as_anonymous([request], SendOptions::default()).await?;
			let response = responses
				.into_iter()
				.next()
				.ok_or(TransportError::ResponseCount { sent: 1, received: 0 })?;

			response.json()
		})
		.await
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn directory_listing_decodes_camel_case() {
		let listing: DirectoryList = serde_json::from_value(serde_json::json!({
			"kind": "discovery#directoryList",
			"discoveryVersion": "v1",
			"items": [{
				"kind": "discovery#directoryItem",
				"id": "youtube:v3",
				"name": "youtube",
				"version": "v3",
				"discoveryRestUrl": "https://www.googleapis.com/discovery/v1/apis/youtube/v3/rest",
				"preferred": true
			}]
		}))
		.expect("Listing should decode.");

		assert_eq!(listing.discovery_version.as_deref(), Some("v1"));
		assert_eq!(listing.items[0].name, "youtube");
		assert!(listing.items[0].preferred);

		let empty: DirectoryList = serde_json::from_value(serde_json::json!({
			"kind": "discovery#directoryList"
		}))
		.expect("Listing without items should decode.");

		assert!(empty.items.is_empty());
	}

	#[test]
	fn service_url_prefers_root_and_service_path() {
		let document: DiscoveryDocument = serde_json::from_value(serde_json::json!({
			"name": "youtube",
			"version": "v3",
			"rootUrl": "https://youtube.googleapis.com/",
			"servicePath": "youtube/v3/",
			"baseUrl": "https://legacy.example.com/",
			"revision": "20240101"
		}))
		.expect("Document should decode.");

		assert_eq!(
			document.service_url().expect("Service URL should resolve.").as_str(),
			"https://youtube.googleapis.com/youtube/v3/"
		);
		assert_eq!(document.extra.get("revision"), Some(&serde_json::json!("20240101")));

		let bare = DiscoveryDocument { name: "x".into(), version: "v1".into(), ..Default::default() };

		assert!(matches!(bare.service_url(), Err(Error::Resolution { .. })));
	}
}

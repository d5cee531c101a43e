//! Dispatcher configuration.
//!
//! Credentials never live here; they are supplied on the
//! [`DispatcherBuilder`](crate::dispatch::DispatcherBuilder).

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	provider::OAuthEndpoints,
	strategy::{ApiKeyStyle, StrategyKind},
};

/// Google Discovery Service v1 root.
pub const DEFAULT_DISCOVERY_URL: &str = "https://www.googleapis.com/discovery/v1/";

/// Tunables that shape how a dispatcher opens sessions and keeps credentials valid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
	/// Timeout handed to the session factory, in seconds.
	pub session_timeout_secs: Option<u64>,
	/// Tokens are treated as expired this many seconds before their real expiry.
	pub refresh_margin_secs: u64,
	/// Timeout applied to token-endpoint calls made by the default transport, in seconds.
	pub refresh_timeout_secs: Option<u64>,
	/// Placement of the API key.
	pub api_key_style: ApiKeyStyle,
	/// User strategy flavor.
	pub user_strategy: StrategyKind,
	/// OAuth endpoints; Google's when unset.
	pub endpoints: Option<OAuthEndpoints>,
	/// Discovery Service root; [`DEFAULT_DISCOVERY_URL`] when unset.
	pub discovery_url: Option<Url>,
}
impl DispatcherConfig {
	/// Parses a JSON document, reporting the path of the offending field on failure.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(de)
			.map_err(|source| ConfigError::Parse { source })?;

		if let Some(endpoints) = &config.endpoints {
			endpoints.validate()?;
		}

		Ok(config)
	}

	/// Session timeout as a duration.
	pub fn session_timeout(&self) -> Option<Duration> {
		self.session_timeout_secs.map(secs)
	}

	/// Refresh safety margin as a duration.
	pub fn refresh_margin(&self) -> Duration {
		secs(self.refresh_margin_secs)
	}

	/// Token-endpoint timeout as a duration.
	pub fn refresh_timeout(&self) -> Option<Duration> {
		self.refresh_timeout_secs.map(secs)
	}

	/// Resolved OAuth endpoints.
	pub fn endpoints(&self) -> Result<OAuthEndpoints, ConfigError> {
		match &self.endpoints {
			Some(endpoints) => Ok(endpoints.clone()),
			None => Ok(OAuthEndpoints::google()?),
		}
	}

	/// Resolved Discovery Service root.
	///
	/// A missing trailing slash is added so relative joins stay under the root.
	pub fn discovery_url(&self) -> Result<Url, ConfigError> {
		let mut url = match &self.discovery_url {
			Some(url) => url.clone(),
			None => Url::parse(DEFAULT_DISCOVERY_URL)
				.map_err(|source| ConfigError::InvalidUrl { source })?,
		};

		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		Ok(url)
	}
}
impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			session_timeout_secs: None,
			refresh_margin_secs: 60,
			refresh_timeout_secs: Some(30),
			api_key_style: ApiKeyStyle::default(),
			user_strategy: StrategyKind::default(),
			endpoints: None,
			discovery_url: None,
		}
	}
}

fn secs(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

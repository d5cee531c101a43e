// crates.io
use oauth2::http::{HeaderName, HeaderValue};
// self
use crate::{_prelude::*, auth::ApiKey, request::Request, strategy::RequestAuthorizer};

/// Query parameter carrying the key in [`ApiKeyStyle::Query`] mode.
pub const API_KEY_QUERY_PARAM: &str = "key";
/// Header carrying the key in [`ApiKeyStyle::Header`] mode.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Where the API key is placed on the request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStyle {
	/// `?key=<api key>`.
	#[default]
	Query,
	/// `x-goog-api-key: <api key>`.
	Header,
}

/// Strategy that stamps requests with an [`ApiKey`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ApiKeyAuthorizer {
	/// Placement of the key.
	pub style: ApiKeyStyle,
}
impl ApiKeyAuthorizer {
	/// Creates an authorizer using `style`.
	pub fn new(style: ApiKeyStyle) -> Self {
		Self { style }
	}
}
impl RequestAuthorizer<ApiKey> for ApiKeyAuthorizer {
	fn authorize(&self, request: Request, key: &ApiKey) -> Result<Request> {
		match self.style {
			ApiKeyStyle::Query => Ok(request.with_query(API_KEY_QUERY_PARAM, key.expose())),
			ApiKeyStyle::Header => {
				let mut value = HeaderValue::from_str(key.expose()).map_err(|_| {
					Error::Authorization {
						reason: "API key contains characters not allowed in a header".into(),
					}
				})?;

				value.set_sensitive(true);

				Ok(request.with_header(HeaderName::from_static(API_KEY_HEADER), value))
			},
		}
	}
}

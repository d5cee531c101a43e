// self
use crate::{_prelude::*, request::Request, strategy::RequestAuthorizer};

/// Strategy for endpoints that need no credential, such as the discovery directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct Anonymous;
impl RequestAuthorizer<()> for Anonymous {
	fn authorize(&self, request: Request, _: &()) -> Result<Request> {
		Ok(request)
	}
}

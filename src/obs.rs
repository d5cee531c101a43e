//! Optional observability helpers for dispatch calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `discovery_dispatch.dispatch` with the `kind`
//!   (strategy or operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `discovery_dispatch_total` counter for every
//!   attempt/success/failure, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchKind {
	/// Anonymous dispatch.
	Anonymous,
	/// API-key dispatch.
	ApiKey,
	/// User-credential dispatch.
	User,
	/// User-credential refresh.
	Refresh,
	/// Authorization-code exchange.
	Authorization,
	/// Discovery directory or document fetch.
	Discovery,
}
impl DispatchKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchKind::Anonymous => "anonymous",
			DispatchKind::ApiKey => "api_key",
			DispatchKind::User => "user",
			DispatchKind::Refresh => "refresh",
			DispatchKind::Authorization => "authorization",
			DispatchKind::Discovery => "discovery",
		}
	}
}
impl Display for DispatchKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DispatchOutcome {
	/// Entry to a dispatcher operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl DispatchOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			DispatchOutcome::Attempt => "attempt",
			DispatchOutcome::Success => "success",
			DispatchOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { DispatchOutcome::Success } else { DispatchOutcome::Failure }
	}
}
impl Display for DispatchOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

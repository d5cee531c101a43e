// self
use crate::obs::{DispatchKind, DispatchOutcome};

/// Records a dispatch outcome via the global metrics recorder (when enabled).
pub fn record_dispatch_outcome(kind: DispatchKind, outcome: DispatchOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"discovery_dispatch_total",
			"kind" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_dispatch_outcome_noop_without_metrics() {
		record_dispatch_outcome(DispatchKind::Discovery, DispatchOutcome::Failure);
		assert_eq!(DispatchOutcome::of(&Ok::<_, ()>(1)), DispatchOutcome::Success);
		assert_eq!(DispatchOutcome::of(&Err::<(), _>(())), DispatchOutcome::Failure);
	}
}

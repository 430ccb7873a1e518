// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process state shared between the caller and its runners.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct RunnerContext {
	teardown: Arc<AtomicBool>,
}

impl RunnerContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Mark the start of orderly teardown. Runners stop healing dropped
	/// connections from this point on.
	pub fn begin_teardown(&self) {
		self.teardown.store(true, Ordering::SeqCst);
	}

	pub fn is_teardown_started(&self) -> bool {
		self.teardown.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_clones_share_teardown_state() {
		let context = RunnerContext::new();
		let runner_view = context.clone();
		assert!(!runner_view.is_teardown_started());
		context.begin_teardown();
		assert!(runner_view.is_teardown_started());
	}
}

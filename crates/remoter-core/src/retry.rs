// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixed-delay retry for transient runner faults.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{FaultKind, RunnerError};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	/// Sleep between attempts. Constant, no backoff.
	pub delay: Duration,
	pub retryable: Vec<FaultKind>,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(8, Duration::from_secs(5))
	}
}

impl RetryPolicy {
	/// A policy that retries every transient fault kind.
	pub fn new(max_attempts: u32, delay: Duration) -> Self {
		Self {
			max_attempts,
			delay,
			retryable: FaultKind::ALL.to_vec(),
		}
	}

	/// Restrict retries to `kinds`.
	pub fn only(mut self, kinds: &[FaultKind]) -> Self {
		self.retryable = kinds.to_vec();
		self
	}

	pub fn is_retryable(&self, err: &RunnerError) -> bool {
		err
			.fault_kind()
			.is_some_and(|kind| self.retryable.contains(&kind))
	}
}

/// Run `f` until it succeeds, fails with a non-retryable error or the
/// policy's attempts are used up.
///
/// Exhaustion is reported as [`RunnerError::MaxRetries`] wrapping the last
/// error.
pub async fn retrying<F, Fut, T>(
	policy: &RetryPolicy,
	destination: &str,
	operation: &str,
	mut f: F,
) -> Result<T, RunnerError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, RunnerError>>,
{
	let mut attempt = 0;

	loop {
		match f().await {
			Ok(result) => return Ok(result),
			Err(err) => {
				attempt += 1;

				if !policy.is_retryable(&err) {
					return Err(err);
				}

				if attempt >= policy.max_attempts {
					warn!(
						destination,
						operation,
						error = %err,
						attempt,
						max_attempts = policy.max_attempts,
						"max retry attempts exhausted"
					);
					return Err(RunnerError::MaxRetries {
						destination: destination.to_string(),
						operation: operation.to_string(),
						attempts: attempt,
						source: Box::new(err),
					});
				}

				warn!(
					destination,
					operation,
					error = %err,
					attempt,
					max_attempts = policy.max_attempts,
					delay_ms = policy.delay.as_millis() as u64,
					"retrying after error"
				);

				tokio::time::sleep(policy.delay).await;
			}
		}
	}
}

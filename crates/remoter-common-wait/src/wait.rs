// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error};

use crate::error::WaitError;
use crate::truthy::Truthy;

const DEFAULT_DESCRIPTION: &str = "condition";

/// Options controlling a single wait.
#[derive(Debug, Clone)]
pub struct WaitOptions {
	/// Time to sleep between attempts.
	pub step: Duration,
	/// Text logged while waiting, for debugging purposes.
	pub text: Option<String>,
	/// Overall timeout. `None` or zero waits forever.
	pub timeout: Option<Duration>,
	/// Fail if the timeout expires without a truthy result.
	pub throw_on_timeout: bool,
}

impl Default for WaitOptions {
	fn default() -> Self {
		Self {
			step: Duration::from_secs(1),
			text: None,
			timeout: None,
			throw_on_timeout: true,
		}
	}
}

impl WaitOptions {
	pub fn new(step: Duration) -> Self {
		Self {
			step,
			..Default::default()
		}
	}

	pub fn text(mut self, text: impl Into<String>) -> Self {
		self.text = Some(text.into());
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn throw_on_timeout(mut self, throw: bool) -> Self {
		self.throw_on_timeout = throw;
		self
	}

	fn description(&self) -> &str {
		self.text.as_deref().unwrap_or(DEFAULT_DESCRIPTION)
	}

	fn bounded_timeout(&self) -> Option<Duration> {
		self.timeout.filter(|timeout| !timeout.is_zero())
	}
}

enum Attempt<T, E> {
	Falsy(T),
	Failed(E),
}

impl<T: Debug, E: Display> Attempt<T, E> {
	fn describe(&self) -> String {
		match self {
			Attempt::Falsy(value) => format!("{value:?}"),
			Attempt::Failed(error) => error.to_string(),
		}
	}
}

enum Outcome<T, E> {
	Ready(T),
	Expired(Attempt<T, E>),
}

/// Wait until `probe` returns a truthy value.
///
/// Without a timeout the probe is evaluated forever, sleeping `step` between
/// attempts; an error from the probe ends the wait immediately.
///
/// With a timeout, a probe error counts as "not ready yet" and polling
/// continues with a fixed `step` until the elapsed time exceeds the timeout.
/// An attempt landing exactly on the deadline is followed by one more.
/// When it does:
/// - with `throw_on_timeout`, the probe's own error is returned if the last
///   attempt failed, otherwise [`WaitError::Timeout`]
/// - without it, the last falsy value is returned, or `None` if the last
///   attempt failed
pub async fn wait_for<P, Fut, T, E>(
	probe: P,
	options: &WaitOptions,
) -> Result<Option<T>, WaitError<E>>
where
	P: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	T: Truthy + Debug,
	E: Display,
{
	match poll(probe, options).await? {
		Outcome::Ready(value) => Ok(Some(value)),
		Outcome::Expired(last) if options.throw_on_timeout => Err(expired_error(last, options)),
		Outcome::Expired(Attempt::Falsy(value)) => Ok(Some(value)),
		Outcome::Expired(Attempt::Failed(_)) => Ok(None),
	}
}

/// Like [`wait_for`], but always fails when the timeout expires.
///
/// `options.throw_on_timeout` is ignored.
pub async fn wait_until<P, Fut, T, E>(probe: P, options: &WaitOptions) -> Result<T, WaitError<E>>
where
	P: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	T: Truthy + Debug,
	E: Display,
{
	match poll(probe, options).await? {
		Outcome::Ready(value) => Ok(value),
		Outcome::Expired(last) => Err(expired_error(last, options)),
	}
}

fn expired_error<T: Debug, E>(last: Attempt<T, E>, options: &WaitOptions) -> WaitError<E> {
	let text = options.description().to_string();
	match last {
		Attempt::Falsy(value) => WaitError::Timeout {
			text,
			timeout: options.timeout.unwrap_or_default(),
			last_result: format!("{value:?}"),
		},
		Attempt::Failed(error) => WaitError::Probe { text, error },
	}
}

async fn poll<P, Fut, T, E>(
	mut probe: P,
	options: &WaitOptions,
) -> Result<Outcome<T, E>, WaitError<E>>
where
	P: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	T: Truthy + Debug,
	E: Display,
{
	let Some(timeout) = options.bounded_timeout() else {
		return poll_forever(probe, options).await.map(Outcome::Ready);
	};

	let text = options.description();
	let start = Instant::now();
	let mut attempt: u32 = 0;

	loop {
		attempt += 1;
		let last = match probe().await {
			Ok(value) if value.is_truthy() => return Ok(Outcome::Ready(value)),
			Ok(value) => Attempt::Falsy(value),
			Err(error) => Attempt::Failed(error),
		};

		if start.elapsed() > timeout {
			error!(
				"Wait for: {}: timeout - {} seconds - expired",
				text,
				timeout.as_secs_f64()
			);
			error!(attempt, "last error: {}", last.describe());
			return Ok(Outcome::Expired(last));
		}

		debug!(
			"wait_for: Retrying {}: attempt {} ended with: {}",
			text,
			attempt,
			last.describe()
		);
		sleep(options.step).await;
	}
}

async fn poll_forever<P, Fut, T, E>(mut probe: P, options: &WaitOptions) -> Result<T, WaitError<E>>
where
	P: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	T: Truthy,
{
	let start = Instant::now();
	loop {
		match probe().await {
			Ok(value) if value.is_truthy() => return Ok(value),
			Ok(_) => {}
			Err(error) => {
				return Err(WaitError::Probe {
					text: options.description().to_string(),
					error,
				})
			}
		}

		sleep(options.step).await;
		if let Some(text) = &options.text {
			debug!("{} ({:.1} s)", text, start.elapsed().as_secs_f64());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tokio_test::{assert_err, assert_ok};

	fn opts(step_secs: u64, timeout_secs: u64) -> WaitOptions {
		WaitOptions::new(Duration::from_secs(step_secs))
			.text("test condition")
			.timeout(Duration::from_secs(timeout_secs))
	}

	#[tokio::test(start_paused = true)]
	async fn test_returns_first_truthy_value() {
		let mut calls = 0u32;
		let result = wait_for(
			|| {
				calls += 1;
				let n = calls;
				async move { Ok::<_, String>(if n >= 3 { Some(n) } else { None }) }
			},
			&opts(1, 10),
		)
		.await
		.unwrap();

		assert_eq!(result, Some(Some(3)));
		assert_eq!(calls, 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_sleeps_fixed_step_between_attempts() {
		let start = Instant::now();
		let mut calls = 0u32;
		wait_until(
			|| {
				calls += 1;
				let n = calls;
				async move { Ok::<_, String>(n == 4) }
			},
			&opts(2, 60),
		)
		.await
		.unwrap();

		// Three sleeps of exactly two seconds, no exponential growth.
		assert_eq!(start.elapsed(), Duration::from_secs(6));
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_with_throw_returns_timeout_error() {
		let start = Instant::now();
		let err = wait_for(|| async { Ok::<_, String>(false) }, &opts(1, 5))
			.await
			.unwrap_err();

		assert!(err.is_timeout());
		assert!(start.elapsed() >= Duration::from_secs(5));
		assert!(start.elapsed() <= Duration::from_secs(6));
		match err {
			WaitError::Timeout {
				text, last_result, ..
			} => {
				assert_eq!(text, "test condition");
				assert_eq!(last_result, "false");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_attempt_on_deadline_is_not_the_last() {
		let start = Instant::now();
		let mut calls = 0u32;
		let err = assert_err!(
			wait_for(
				|| {
					calls += 1;
					async { Ok::<_, String>(false) }
				},
				&opts(5, 10),
			)
			.await
		);

		assert!(err.is_timeout());
		// Attempts at 0, 5, 10 and 15 seconds; only the last is past the deadline.
		assert_eq!(calls, 4);
		assert_eq!(start.elapsed(), Duration::from_secs(15));
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_without_throw_returns_last_falsy_value() {
		let result = assert_ok!(
			wait_for(
				|| async { Ok::<_, String>(0u32) },
				&opts(1, 3).throw_on_timeout(false),
			)
			.await
		);

		assert_eq!(result, Some(0));
	}

	#[tokio::test(start_paused = true)]
	async fn test_probe_errors_are_retried() {
		let mut calls = 0u32;
		let result = wait_until(
			|| {
				calls += 1;
				let n = calls;
				async move {
					if n < 3 {
						Err("connection refused".to_string())
					} else {
						Ok(true)
					}
				}
			},
			&opts(1, 10),
		)
		.await
		.unwrap();

		assert!(result);
		assert_eq!(calls, 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_last_probe_error_is_propagated_on_timeout() {
		let err = assert_err!(
			wait_for(
				|| async { Err::<bool, _>("boom".to_string()) },
				&opts(1, 3),
			)
			.await
		);

		assert!(!err.is_timeout());
		assert_eq!(err.into_probe_error(), Some("boom".to_string()));
	}

	#[tokio::test(start_paused = true)]
	async fn test_last_probe_error_without_throw_returns_none() {
		let result = wait_for(
			|| async { Err::<bool, _>("boom".to_string()) },
			&opts(1, 3).throw_on_timeout(false),
		)
		.await
		.unwrap();

		assert_eq!(result, None);
	}

	#[tokio::test(start_paused = true)]
	async fn test_without_timeout_polls_until_truthy() {
		let mut calls = 0u32;
		let result = wait_for(
			|| {
				calls += 1;
				let n = calls;
				async move { Ok::<_, String>(n == 50) }
			},
			&WaitOptions::new(Duration::from_secs(60)).text("forever"),
		)
		.await
		.unwrap();

		assert_eq!(result, Some(true));
		assert_eq!(calls, 50);
	}

	#[tokio::test(start_paused = true)]
	async fn test_zero_timeout_means_forever() {
		let mut calls = 0u32;
		let result = wait_until(
			|| {
				calls += 1;
				let n = calls;
				async move { Ok::<_, String>(n == 20) }
			},
			&WaitOptions::new(Duration::from_secs(1)).timeout(Duration::ZERO),
		)
		.await
		.unwrap();

		assert!(result);
	}

	#[tokio::test(start_paused = true)]
	async fn test_without_timeout_probe_error_ends_wait() {
		let err = wait_for(
			|| async { Err::<bool, _>("fatal".to_string()) },
			&WaitOptions::new(Duration::from_secs(1)),
		)
		.await
		.unwrap_err();

		assert_eq!(err.into_probe_error(), Some("fatal".to_string()));
	}
}

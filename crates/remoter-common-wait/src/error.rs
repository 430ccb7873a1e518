// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`crate::wait_for`] and [`crate::wait_until`].
#[derive(Debug, Error)]
pub enum WaitError<E> {
	/// The timeout expired and the last attempt returned a falsy value.
	#[error("Wait for: {text}: timeout - {} seconds - expired (last result: {last_result})", .timeout.as_secs_f64())]
	Timeout {
		text: String,
		timeout: Duration,
		last_result: String,
	},

	/// The probe failed and the failure was not absorbed by polling: either
	/// the final attempt before the timeout raised, or the wait had no
	/// timeout at all.
	#[error("Wait for: {text}: probe failed: {error}")]
	Probe { text: String, error: E },
}

impl<E> WaitError<E> {
	/// Whether this error means the timeout expired on a falsy result.
	pub fn is_timeout(&self) -> bool {
		matches!(self, WaitError::Timeout { .. })
	}

	/// Extract the probe's own error, if that is what ended the wait.
	pub fn into_probe_error(self) -> Option<E> {
		match self {
			WaitError::Probe { error, .. } => Some(error),
			WaitError::Timeout { .. } => None,
		}
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use remoter_config::RemoterConfig;
use remoter_core::{FaultKind, RetryPolicy};

/// Faults that reopening a log stream can cure.
const STREAM_FAULTS: [FaultKind; 3] = [
	FaultKind::ConnectionReset,
	FaultKind::Protocol,
	FaultKind::ReadTimeout,
];

/// Exec channel settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecSettings {
	pub shell: String,
	pub read_timeout: Duration,
	pub chunk_size: usize,
	/// Bound on waiting for the completion status once output is closed.
	pub status_timeout: Duration,
}

impl Default for ExecSettings {
	fn default() -> Self {
		Self::from_config(&RemoterConfig::default())
	}
}

impl ExecSettings {
	pub fn from_config(config: &RemoterConfig) -> Self {
		Self {
			shell: config.exec.shell.clone(),
			read_timeout: Duration::from_millis(config.exec.read_timeout_ms),
			chunk_size: config.exec.read_chunk_size,
			status_timeout: Duration::from_secs(config.exec.status_timeout_secs),
		}
	}

	/// `[shell, "-c", command]`
	pub fn wrap(&self, command: &str) -> Vec<String> {
		vec![self.shell.clone(), "-c".to_string(), command.to_string()]
	}
}

/// Pod log watcher settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PodWatcherSettings {
	/// Server-side bound on opening a log stream.
	pub read_request_timeout: Duration,
	/// Streams older than this are reopened before the next read.
	pub stream_ttl: Duration,
	/// Status polls with a closed stream and a live pod before giving up.
	pub liveness_polls: u32,
	pub open_policy: RetryPolicy,
	pub read_policy: RetryPolicy,
	/// Reopen plus discarding already delivered bytes.
	pub start_policy: RetryPolicy,
	pub ready_timeout: Duration,
	pub ready_step: Duration,
	pub status_poll_interval: Duration,
	pub stop_command: String,
	pub stop_timeout: Duration,
}

impl Default for PodWatcherSettings {
	fn default() -> Self {
		Self::from_config(&RemoterConfig::default())
	}
}

impl PodWatcherSettings {
	pub fn from_config(config: &RemoterConfig) -> Self {
		let watcher = &config.pod_watcher;
		Self {
			read_request_timeout: Duration::from_secs(watcher.read_request_timeout_secs),
			stream_ttl: Duration::from_secs(watcher.stream_ttl_secs),
			liveness_polls: watcher.liveness_polls,
			open_policy: RetryPolicy::new(
				watcher.open_attempts,
				Duration::from_secs(watcher.open_delay_secs),
			)
			.only(&[
				FaultKind::ConnectionFailed,
				FaultKind::ConnectionReset,
				FaultKind::Protocol,
				FaultKind::ReadTimeout,
			]),
			read_policy: RetryPolicy::new(
				watcher.read_attempts,
				Duration::from_secs(watcher.read_delay_secs),
			)
			.only(&STREAM_FAULTS),
			start_policy: RetryPolicy::new(
				watcher.start_attempts,
				Duration::from_secs(watcher.start_delay_secs),
			)
			.only(&STREAM_FAULTS),
			ready_timeout: Duration::from_secs(watcher.ready_timeout_secs),
			ready_step: Duration::from_secs(watcher.ready_step_secs),
			status_poll_interval: Duration::from_secs(watcher.status_poll_interval_secs),
			stop_command: watcher.stop_command.clone(),
			stop_timeout: Duration::from_secs(watcher.stop_timeout_secs),
		}
	}
}

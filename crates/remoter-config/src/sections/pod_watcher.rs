// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pod log watcher configuration section.

use serde::{Deserialize, Serialize};

fn default_stop_command() -> String {
	"rm /tmp/keep_running".to_string()
}

/// Pod log watcher configuration layer (for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PodWatcherConfigLayer {
	pub read_request_timeout_secs: Option<u64>,
	pub stream_ttl_secs: Option<u64>,
	pub liveness_polls: Option<u32>,
	pub open_attempts: Option<u32>,
	pub open_delay_secs: Option<u64>,
	pub read_attempts: Option<u32>,
	pub read_delay_secs: Option<u64>,
	pub start_attempts: Option<u32>,
	pub start_delay_secs: Option<u64>,
	pub ready_timeout_secs: Option<u64>,
	pub ready_step_secs: Option<u64>,
	pub status_poll_interval_secs: Option<u64>,
	pub stop_command: Option<String>,
	pub stop_timeout_secs: Option<u64>,
}

macro_rules! merge_fields {
	($self:ident, $other:ident, $($field:ident),* $(,)?) => {
		$(
			if $other.$field.is_some() {
				$self.$field = $other.$field;
			}
		)*
	};
}

impl PodWatcherConfigLayer {
	pub fn merge(&mut self, other: Self) {
		merge_fields!(
			self,
			other,
			read_request_timeout_secs,
			stream_ttl_secs,
			liveness_polls,
			open_attempts,
			open_delay_secs,
			read_attempts,
			read_delay_secs,
			start_attempts,
			start_delay_secs,
			ready_timeout_secs,
			ready_step_secs,
			status_poll_interval_secs,
			stop_command,
			stop_timeout_secs,
		);
	}

	pub fn finalize(self) -> PodWatcherConfig {
		PodWatcherConfig {
			read_request_timeout_secs: self.read_request_timeout_secs.unwrap_or(30),
			stream_ttl_secs: self.stream_ttl_secs.unwrap_or(7200),
			liveness_polls: self.liveness_polls.unwrap_or(300),
			open_attempts: self.open_attempts.unwrap_or(20),
			open_delay_secs: self.open_delay_secs.unwrap_or(3),
			read_attempts: self.read_attempts.unwrap_or(12),
			read_delay_secs: self.read_delay_secs.unwrap_or(10),
			start_attempts: self.start_attempts.unwrap_or(30),
			start_delay_secs: self.start_delay_secs.unwrap_or(10),
			ready_timeout_secs: self.ready_timeout_secs.unwrap_or(420),
			ready_step_secs: self.ready_step_secs.unwrap_or(2),
			status_poll_interval_secs: self.status_poll_interval_secs.unwrap_or(3),
			stop_command: self.stop_command.unwrap_or_else(default_stop_command),
			stop_timeout_secs: self.stop_timeout_secs.unwrap_or(30),
		}
	}
}

/// Pod log watcher configuration (runtime).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PodWatcherConfig {
	/// Upper bound on waiting for the next chunk of a follow-mode log stream.
	pub read_request_timeout_secs: u64,
	/// Streams older than this are closed and reopened on the next read.
	pub stream_ttl_secs: u64,
	/// Status polls allowed while the pod is alive but the stream stays closed.
	pub liveness_polls: u32,
	pub open_attempts: u32,
	pub open_delay_secs: u64,
	pub read_attempts: u32,
	pub read_delay_secs: u64,
	pub start_attempts: u32,
	pub start_delay_secs: u64,
	pub ready_timeout_secs: u64,
	pub ready_step_secs: u64,
	pub status_poll_interval_secs: u64,
	/// Executed in the pod to make it finish.
	pub stop_command: String,
	pub stop_timeout_secs: u64,
}

impl Default for PodWatcherConfig {
	fn default() -> Self {
		PodWatcherConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = PodWatcherConfig::default();
		assert_eq!(config.read_request_timeout_secs, 30);
		assert_eq!(config.stream_ttl_secs, 7200);
		assert_eq!(config.liveness_polls, 300);
		assert_eq!(config.open_attempts, 20);
		assert_eq!(config.open_delay_secs, 3);
		assert_eq!(config.read_attempts, 12);
		assert_eq!(config.read_delay_secs, 10);
		assert_eq!(config.ready_timeout_secs, 420);
		assert_eq!(config.stop_command, "rm /tmp/keep_running");
	}

	#[test]
	fn test_merge_keeps_base_when_other_empty() {
		let mut base = PodWatcherConfigLayer {
			stream_ttl_secs: Some(60),
			..Default::default()
		};
		base.merge(PodWatcherConfigLayer::default());
		assert_eq!(base.stream_ttl_secs, Some(60));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let toml_str = r#"
liveness_polls = 5
stop_command = "kill 1"
"#;
		let config = toml::from_str::<PodWatcherConfigLayer>(toml_str)
			.unwrap()
			.finalize();
		assert_eq!(config.liveness_polls, 5);
		assert_eq!(config.stop_command, "kill 1");
		assert_eq!(config.read_attempts, 12);
	}
}

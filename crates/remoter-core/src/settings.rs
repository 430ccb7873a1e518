// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use remoter_config::RemoterConfig;

use crate::retry::RetryPolicy;

/// Retry settings shared by every runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
	/// Reconnect-and-retry policy around each command.
	pub run_policy: RetryPolicy,
	/// Policy for file transfers.
	pub transfer_policy: RetryPolicy,
}

impl Default for RunnerSettings {
	fn default() -> Self {
		Self::from_config(&RemoterConfig::default())
	}
}

impl RunnerSettings {
	pub fn from_config(config: &RemoterConfig) -> Self {
		Self {
			run_policy: RetryPolicy::new(
				config.retry.run_attempts,
				Duration::from_secs(config.retry.run_delay_secs),
			),
			transfer_policy: RetryPolicy::new(
				config.retry.transfer_attempts,
				Duration::from_secs(config.retry.transfer_delay_secs),
			),
		}
	}
}

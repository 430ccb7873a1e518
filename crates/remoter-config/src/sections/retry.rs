// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry configuration section.
//!
//! `run_*` bounds the reconnect-and-retry loop around every command;
//! `transfer_*` bounds file transfers over exec channels.

use serde::{Deserialize, Serialize};

const DEFAULT_RUN_ATTEMPTS: u32 = 8;
const DEFAULT_RUN_DELAY_SECS: u64 = 5;
const DEFAULT_TRANSFER_ATTEMPTS: u32 = 3;
const DEFAULT_TRANSFER_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetryConfigLayer {
	pub run_attempts: Option<u32>,
	pub run_delay_secs: Option<u64>,
	pub transfer_attempts: Option<u32>,
	pub transfer_delay_secs: Option<u64>,
}

impl RetryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.run_attempts.is_some() {
			self.run_attempts = other.run_attempts;
		}
		if other.run_delay_secs.is_some() {
			self.run_delay_secs = other.run_delay_secs;
		}
		if other.transfer_attempts.is_some() {
			self.transfer_attempts = other.transfer_attempts;
		}
		if other.transfer_delay_secs.is_some() {
			self.transfer_delay_secs = other.transfer_delay_secs;
		}
	}

	pub fn finalize(self) -> RetryConfig {
		RetryConfig {
			run_attempts: self.run_attempts.unwrap_or(DEFAULT_RUN_ATTEMPTS),
			run_delay_secs: self.run_delay_secs.unwrap_or(DEFAULT_RUN_DELAY_SECS),
			transfer_attempts: self.transfer_attempts.unwrap_or(DEFAULT_TRANSFER_ATTEMPTS),
			transfer_delay_secs: self
				.transfer_delay_secs
				.unwrap_or(DEFAULT_TRANSFER_DELAY_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
	pub run_attempts: u32,
	pub run_delay_secs: u64,
	pub transfer_attempts: u32,
	pub transfer_delay_secs: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		RetryConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = RetryConfig::default();
		assert_eq!(config.run_attempts, 8);
		assert_eq!(config.run_delay_secs, 5);
		assert_eq!(config.transfer_attempts, 3);
		assert_eq!(config.transfer_delay_secs, 5);
	}

	#[test]
	fn test_merge_overwrites_only_present_fields() {
		let mut base = RetryConfigLayer {
			run_attempts: Some(4),
			run_delay_secs: Some(1),
			..Default::default()
		};
		base.merge(RetryConfigLayer {
			run_attempts: Some(10),
			..Default::default()
		});
		assert_eq!(base.run_attempts, Some(10));
		assert_eq!(base.run_delay_secs, Some(1));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: RetryConfigLayer = toml::from_str("run_attempts = 2").unwrap();
		let config = layer.finalize();
		assert_eq!(config.run_attempts, 2);
		assert_eq!(config.run_delay_secs, 5);
	}
}

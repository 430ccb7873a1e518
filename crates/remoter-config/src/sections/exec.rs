// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exec channel configuration section.

use serde::{Deserialize, Serialize};

fn default_shell() -> String {
	"/bin/bash".to_string()
}

const DEFAULT_READ_TIMEOUT_MS: u64 = 100;
const DEFAULT_READ_CHUNK_SIZE: usize = 1000;
const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecConfigLayer {
	pub shell: Option<String>,
	pub read_timeout_ms: Option<u64>,
	pub read_chunk_size: Option<usize>,
	pub status_timeout_secs: Option<u64>,
}

impl ExecConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.shell.is_some() {
			self.shell = other.shell;
		}
		if other.read_timeout_ms.is_some() {
			self.read_timeout_ms = other.read_timeout_ms;
		}
		if other.read_chunk_size.is_some() {
			self.read_chunk_size = other.read_chunk_size;
		}
		if other.status_timeout_secs.is_some() {
			self.status_timeout_secs = other.status_timeout_secs;
		}
	}

	pub fn finalize(self) -> ExecConfig {
		ExecConfig {
			shell: self.shell.unwrap_or_else(default_shell),
			read_timeout_ms: self.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
			read_chunk_size: self.read_chunk_size.unwrap_or(DEFAULT_READ_CHUNK_SIZE),
			status_timeout_secs: self
				.status_timeout_secs
				.unwrap_or(DEFAULT_STATUS_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecConfig {
	/// Shell used to wrap every command as `<shell> -c "<command>"`.
	pub shell: String,
	/// Upper bound on a single read from the channel.
	pub read_timeout_ms: u64,
	pub read_chunk_size: usize,
	/// How long to wait for the channel's completion status once both output
	/// streams are closed.
	pub status_timeout_secs: u64,
}

impl Default for ExecConfig {
	fn default() -> Self {
		ExecConfigLayer::default().finalize()
	}
}

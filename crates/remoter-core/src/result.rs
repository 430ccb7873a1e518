// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::watcher::StreamWatcher;

/// Outcome of one command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
	pub command: String,
	pub stdout: String,
	pub stderr: String,
	/// `None` when the backend could not report a status.
	pub exit_status: Option<i32>,
	pub duration: Duration,
	pub ignore_status: bool,
}

impl CommandResult {
	/// Success unless the exit status is non-zero (or unknown) and the
	/// status was not ignored.
	pub fn ok(&self) -> bool {
		self.ignore_status || self.exit_status == Some(0)
	}

	pub fn failed(&self) -> bool {
		!self.ok()
	}
}

impl fmt::Display for CommandResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let exit = self
			.exit_status
			.map_or_else(|| "unknown".to_string(), |code| code.to_string());
		write!(
			f,
			"Encountered a bad command exit code!\n\nCommand: {:?}\n\nExit code: {}\n\nStdout:\n\n{}\n\nStderr:\n\n{}\n",
			self.command, exit, self.stdout, self.stderr
		)
	}
}

/// Per-invocation options for [`crate::CommandRunner::run`].
#[derive(Clone)]
pub struct RunOptions {
	/// Bound on the whole invocation. The connection is killed on expiry.
	pub timeout: Option<Duration>,
	pub ignore_status: bool,
	/// Log each line of output as it arrives.
	pub verbose: bool,
	/// Use a connection created for this invocation only.
	pub new_session: bool,
	pub watchers: Vec<Arc<dyn StreamWatcher>>,
}

impl Default for RunOptions {
	fn default() -> Self {
		Self {
			timeout: None,
			ignore_status: false,
			verbose: true,
			new_session: false,
			watchers: Vec::new(),
		}
	}
}

impl RunOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn ignore_status(mut self) -> Self {
		self.ignore_status = true;
		self
	}

	pub fn quiet(mut self) -> Self {
		self.verbose = false;
		self
	}

	pub fn new_session(mut self) -> Self {
		self.new_session = true;
		self
	}

	pub fn watcher(mut self, watcher: Arc<dyn StreamWatcher>) -> Self {
		self.watchers.push(watcher);
		self
	}
}

impl fmt::Debug for RunOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RunOptions")
			.field("timeout", &self.timeout)
			.field("ignore_status", &self.ignore_status)
			.field("verbose", &self.verbose)
			.field("new_session", &self.new_session)
			.field("watchers", &self.watchers.len())
			.finish()
	}
}

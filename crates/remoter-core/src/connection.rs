// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::RunnerError;

/// A live channel to a destination that runs one command at a time.
///
/// Implementations serialize all channel operations through a single lock;
/// concurrent callers wait for each other rather than racing on the channel.
#[async_trait]
pub trait Connection: Send + Sync {
	/// Start `command`, replacing whatever the channel was running before.
	async fn start(&self, command: &str) -> Result<(), RunnerError>;

	/// Next chunk of stdout. Empty when nothing arrived within the read
	/// timeout or the stream is closed.
	async fn read_stdout(&self) -> Result<Vec<u8>, RunnerError>;

	async fn read_stderr(&self) -> Result<Vec<u8>, RunnerError>;

	async fn write_stdin(&self, data: &[u8]) -> Result<(), RunnerError>;

	async fn close_stdin(&self) -> Result<(), RunnerError>;

	async fn is_finished(&self) -> Result<bool, RunnerError>;

	/// Exit code of the finished command, `None` when unknown.
	async fn returncode(&self) -> Result<Option<i32>, RunnerError>;

	/// Close the channel. Safe to call repeatedly.
	async fn stop(&self) -> Result<(), RunnerError>;

	async fn kill(&self) -> Result<(), RunnerError>;
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runner for commands on the local host.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use remoter_config::RemoterConfig;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::channel::{read_chunk, Chunk};
use crate::connection::Connection;
use crate::error::RunnerError;
use crate::result::{CommandResult, RunOptions};
use crate::runner::{CommandRunner, RunnerCore, ROOT_USER};
use crate::settings::RunnerSettings;

const LOCALHOST: &str = "localhost";

struct LocalProcess {
	child: Child,
	stdin: Option<ChildStdin>,
	stdout: Option<ChildStdout>,
	stderr: Option<ChildStderr>,
	exit_status: Option<i32>,
}

/// A child process driven through [`Connection`].
pub struct LocalConnection {
	shell: String,
	read_timeout: Duration,
	chunk_size: usize,
	process: Mutex<Option<LocalProcess>>,
}

impl LocalConnection {
	pub fn new(shell: impl Into<String>, read_timeout: Duration, chunk_size: usize) -> Self {
		Self {
			shell: shell.into(),
			read_timeout,
			chunk_size,
			process: Mutex::new(None),
		}
	}

	fn io_error(source: std::io::Error) -> RunnerError {
		RunnerError::Io {
			destination: LOCALHOST.to_string(),
			source,
		}
	}
}

#[async_trait]
impl Connection for LocalConnection {
	async fn start(&self, command: &str) -> Result<(), RunnerError> {
		let mut child = Command::new(&self.shell)
			.arg("-c")
			.arg(command)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| RunnerError::Connection {
				destination: LOCALHOST.to_string(),
				message: format!("failed to spawn {}: {e}", self.shell),
			})?;

		let process = LocalProcess {
			stdin: child.stdin.take(),
			stdout: child.stdout.take(),
			stderr: child.stderr.take(),
			exit_status: None,
			child,
		};
		*self.process.lock().await = Some(process);
		Ok(())
	}

	async fn read_stdout(&self) -> Result<Vec<u8>, RunnerError> {
		let mut guard = self.process.lock().await;
		let Some(process) = guard.as_mut() else {
			return Ok(Vec::new());
		};
		let Some(stdout) = process.stdout.as_mut() else {
			return Ok(Vec::new());
		};
		match read_chunk(stdout, self.chunk_size, self.read_timeout)
			.await
			.map_err(Self::io_error)?
		{
			Chunk::Data(data) => Ok(data),
			Chunk::Empty => Ok(Vec::new()),
			Chunk::Closed => {
				process.stdout = None;
				Ok(Vec::new())
			}
		}
	}

	async fn read_stderr(&self) -> Result<Vec<u8>, RunnerError> {
		let mut guard = self.process.lock().await;
		let Some(process) = guard.as_mut() else {
			return Ok(Vec::new());
		};
		let Some(stderr) = process.stderr.as_mut() else {
			return Ok(Vec::new());
		};
		match read_chunk(stderr, self.chunk_size, self.read_timeout)
			.await
			.map_err(Self::io_error)?
		{
			Chunk::Data(data) => Ok(data),
			Chunk::Empty => Ok(Vec::new()),
			Chunk::Closed => {
				process.stderr = None;
				Ok(Vec::new())
			}
		}
	}

	async fn write_stdin(&self, data: &[u8]) -> Result<(), RunnerError> {
		let mut guard = self.process.lock().await;
		if let Some(stdin) = guard.as_mut().and_then(|p| p.stdin.as_mut()) {
			stdin.write_all(data).await.map_err(Self::io_error)?;
			stdin.flush().await.map_err(Self::io_error)?;
		}
		Ok(())
	}

	async fn close_stdin(&self) -> Result<(), RunnerError> {
		if let Some(process) = self.process.lock().await.as_mut() {
			process.stdin = None;
		}
		Ok(())
	}

	async fn is_finished(&self) -> Result<bool, RunnerError> {
		Ok(self
			.process
			.lock()
			.await
			.as_ref()
			.map_or(true, |p| p.stdout.is_none() && p.stderr.is_none()))
	}

	async fn returncode(&self) -> Result<Option<i32>, RunnerError> {
		let mut guard = self.process.lock().await;
		let Some(process) = guard.as_mut() else {
			return Ok(None);
		};
		if process.exit_status.is_none() {
			let status = process.child.wait().await.map_err(Self::io_error)?;
			process.exit_status = status.code();
		}
		Ok(process.exit_status)
	}

	async fn stop(&self) -> Result<(), RunnerError> {
		let Some(mut process) = self.process.lock().await.take() else {
			return Ok(());
		};
		if process.exit_status.is_none() {
			if let Err(err) = process.child.start_kill() {
				debug!(error = %err, "child already gone");
			}
			process.child.wait().await.map_err(Self::io_error)?;
		}
		Ok(())
	}

	async fn kill(&self) -> Result<(), RunnerError> {
		self.stop().await
	}
}

/// Runs commands on this machine through `<shell> -c`.
pub struct LocalCmdRunner {
	core: RunnerCore,
	shell: String,
	read_timeout: Duration,
	chunk_size: usize,
}

impl LocalCmdRunner {
	pub fn new(
		settings: RunnerSettings,
		shell: impl Into<String>,
		read_timeout: Duration,
		chunk_size: usize,
	) -> Self {
		let user = std::env::var("USER").unwrap_or_else(|_| ROOT_USER.to_string());
		Self {
			core: RunnerCore::new(LOCALHOST, user, settings),
			shell: shell.into(),
			read_timeout,
			chunk_size,
		}
	}

	pub fn from_config(config: &RemoterConfig) -> Self {
		Self::new(
			RunnerSettings::from_config(config),
			config.exec.shell.clone(),
			Duration::from_millis(config.exec.read_timeout_ms),
			config.exec.read_chunk_size,
		)
	}

	fn connect(&self) -> Result<Arc<dyn Connection>, RunnerError> {
		Ok(Arc::new(LocalConnection::new(
			self.shell.clone(),
			self.read_timeout,
			self.chunk_size,
		)))
	}

	async fn copy(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(LocalConnection::io_error)?;
		}
		tokio::fs::copy(src, dst)
			.await
			.map_err(LocalConnection::io_error)?;
		Ok(())
	}
}

#[async_trait]
impl CommandRunner for LocalCmdRunner {
	fn hostname(&self) -> &str {
		self.core.hostname()
	}

	fn user(&self) -> &str {
		self.core.user()
	}

	async fn execute(&self, command: &str, options: &RunOptions) -> Result<CommandResult, RunnerError> {
		self.core.execute(command, options, || self.connect()).await
	}

	async fn is_up(&self, _timeout: Option<Duration>) -> bool {
		true
	}

	async fn send_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		self.copy(src, dst).await
	}

	async fn receive_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		self.copy(src, dst).await
	}

	async fn stop(&self) -> Result<(), RunnerError> {
		self.core.close_connection().await;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::watcher::Responder;
	use tokio_test::assert_ok;

	fn runner() -> LocalCmdRunner {
		LocalCmdRunner::new(
			RunnerSettings::default(),
			"/bin/sh",
			Duration::from_millis(50),
			1000,
		)
	}

	#[tokio::test]
	async fn test_captures_stdout_and_exit_code() {
		let result = runner()
			.run("echo hello", RunOptions::new().quiet())
			.await
			.unwrap();
		assert_eq!(result.stdout, "hello\n");
		assert_eq!(result.exit_status, Some(0));
		assert!(result.ok());
	}

	#[tokio::test]
	async fn test_nonzero_exit_fails() {
		let err = runner()
			.run("echo oops >&2; exit 3", RunOptions::new().quiet())
			.await
			.unwrap_err();
		let result = err.result().expect("command result");
		assert_eq!(result.exit_status, Some(3));
		assert_eq!(result.stderr, "oops\n");
	}

	#[tokio::test]
	async fn test_ignore_status_returns_result() {
		let result = runner()
			.run("exit 5", RunOptions::new().quiet().ignore_status())
			.await
			.unwrap();
		assert_eq!(result.exit_status, Some(5));
		assert!(result.ok());
		assert!(!result.failed());
	}

	#[tokio::test]
	async fn test_concurrent_runs_share_connection_in_turn() {
		let runner = Arc::new(runner());

		let first = {
			let runner = Arc::clone(&runner);
			tokio::spawn(async move {
				runner
					.run("sleep 0.5; echo AAA", RunOptions::new().quiet())
					.await
			})
		};
		tokio::time::sleep(Duration::from_millis(100)).await;
		let second = {
			let runner = Arc::clone(&runner);
			tokio::spawn(async move { runner.run("sleep 0.2; echo BBB", RunOptions::new().quiet()).await })
		};

		let first = assert_ok!(first.await.unwrap());
		let second = assert_ok!(second.await.unwrap());
		assert_eq!(first.stdout, "AAA\n");
		assert_eq!(second.stdout, "BBB\n");
	}

	#[tokio::test]
	async fn test_timeout_kills_command() {
		let err = runner()
			.run(
				"sleep 5",
				RunOptions::new().quiet().timeout(Duration::from_millis(200)),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, RunnerError::CommandTimedOut { .. }));
	}

	#[tokio::test]
	async fn test_responder_answers_prompt() {
		let responder = Responder::new(r"name\?", "world\n").unwrap();
		let result = runner()
			.run(
				"printf 'name?'; read name; echo \"hi $name\"",
				RunOptions::new().quiet().watcher(Arc::new(responder)),
			)
			.await
			.unwrap();
		assert_eq!(result.stdout, "name?hi world\n");
	}

	#[tokio::test]
	async fn test_send_files_copies() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("src.txt");
		let dst = dir.path().join("nested/dst.txt");
		tokio::fs::write(&src, b"payload").await.unwrap();

		let runner = runner();
		assert_ok!(runner.send_files(&src, &dst).await);
		assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"payload");
		assert!(runner.is_up(None).await);
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::panic::Location;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::connection::Connection;
use crate::error::RunnerError;
use crate::result::{CommandResult, RunOptions};
use crate::session::run_session;
use crate::settings::RunnerSettings;

pub const ROOT_USER: &str = "root";

/// Capability set shared by every backend.
#[async_trait]
pub trait CommandRunner: Send + Sync {
	/// Identity of the destination, used in logs and errors.
	fn hostname(&self) -> &str;

	/// User that commands run as.
	fn user(&self) -> &str;

	/// Run `command` verbatim with the backend's retry policy.
	async fn execute(&self, command: &str, options: &RunOptions)
		-> Result<CommandResult, RunnerError>;

	/// Run `command`, failing on a non-zero exit unless
	/// `options.ignore_status` is set.
	///
	/// A leading `sudo` or `sudo -u <user>` is deprecated: it is stripped and
	/// the rest is routed through [`CommandRunner::sudo`]. The warning names
	/// the calling location.
	#[track_caller]
	fn run<'a>(
		&'a self,
		command: &'a str,
		options: RunOptions,
	) -> BoxFuture<'a, Result<CommandResult, RunnerError>> {
		let caller = Location::caller();
		Box::pin(async move {
			if let Some(legacy) = strip_legacy_sudo(command) {
				warn!(
					destination = self.hostname(),
					command,
					caller = %caller,
					"Using `sudo' in cmd string is deprecated. Use `remoter.sudo()' instead."
				);
				return self
					.sudo(legacy.command, Some(legacy.user.unwrap_or(ROOT_USER)), options)
					.await;
			}
			self.execute(command, &options).await
		})
	}

	/// Run `command` as `user` (root when `None`), escalating only when that
	/// differs from the session user.
	async fn sudo(
		&self,
		command: &str,
		user: Option<&str>,
		options: RunOptions,
	) -> Result<CommandResult, RunnerError> {
		let command = sudo_command(command, user.unwrap_or(ROOT_USER), self.user());
		self.execute(&command, &options).await
	}

	async fn is_up(&self, timeout: Option<Duration>) -> bool;

	async fn send_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError>;

	async fn receive_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError>;

	/// Tear down every connection the runner holds.
	async fn stop(&self) -> Result<(), RunnerError>;
}

/// Reshape `command` to run as `user` from a session logged in as
/// `session_user`.
pub fn sudo_command(command: &str, user: &str, session_user: &str) -> String {
	if user == session_user {
		command.to_string()
	} else if user == ROOT_USER {
		format!("sudo {command}")
	} else {
		format!("sudo -u {user} {command}")
	}
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct LegacySudo<'a> {
	pub(crate) user: Option<&'a str>,
	pub(crate) command: &'a str,
}

pub(crate) fn strip_legacy_sudo(command: &str) -> Option<LegacySudo<'_>> {
	let rest = command.trim_start().strip_prefix("sudo")?;
	if !rest.starts_with(char::is_whitespace) {
		return None;
	}
	let rest = rest.trim_start();

	let legacy = match rest.strip_prefix("-u") {
		Some(after) if after.starts_with(char::is_whitespace) => {
			let (user, command) = after.trim_start().split_once(char::is_whitespace)?;
			LegacySudo {
				user: Some(user),
				command: command.trim_start(),
			}
		}
		_ => LegacySudo {
			user: None,
			command: rest,
		},
	};

	(!legacy.command.is_empty()).then_some(legacy)
}

/// State shared by connection-based runners: identity, retry settings and
/// the cached connection.
pub struct RunnerCore {
	hostname: String,
	user: String,
	settings: RunnerSettings,
	connection: Mutex<Option<Arc<dyn Connection>>>,
	/// Held for a whole session on the cached connection.
	session: Mutex<()>,
}

impl RunnerCore {
	pub fn new(hostname: impl Into<String>, user: impl Into<String>, settings: RunnerSettings) -> Self {
		Self {
			hostname: hostname.into(),
			user: user.into(),
			settings,
			connection: Mutex::new(None),
			session: Mutex::new(()),
		}
	}

	pub fn hostname(&self) -> &str {
		&self.hostname
	}

	pub fn user(&self) -> &str {
		&self.user
	}

	pub fn settings(&self) -> &RunnerSettings {
		&self.settings
	}

	/// Run `command`, reconnecting and retrying on transient faults.
	///
	/// `connect` creates a connection. It is called for every invocation
	/// with `new_session`, otherwise only when no connection is cached.
	/// Sessions on the cached connection run one at a time.
	/// Exhausting the run policy yields [`RunnerError::RetryableNetwork`].
	pub async fn execute<F>(
		&self,
		command: &str,
		options: &RunOptions,
		connect: F,
	) -> Result<CommandResult, RunnerError>
	where
		F: Fn() -> Result<Arc<dyn Connection>, RunnerError> + Send + Sync,
	{
		let policy = &self.settings.run_policy;
		let mut attempt = 0;

		loop {
			attempt += 1;
			match self.execute_once(command, options, &connect).await {
				Ok(result) if result.ok() => return Ok(result),
				Ok(result) => {
					debug!(
						destination = %self.hostname,
						command,
						exit_status = ?result.exit_status,
						"command exited with failure"
					);
					return Err(RunnerError::UnexpectedExit(Box::new(result)));
				}
				Err(err) if policy.is_retryable(&err) => {
					error!(
						destination = %self.hostname,
						command,
						error = %err,
						attempt,
						"retryable failure, closing connection"
					);
					self.close_connection().await;

					if attempt >= policy.max_attempts {
						warn!(
							destination = %self.hostname,
							attempt,
							max_attempts = policy.max_attempts,
							"max retry attempts exhausted"
						);
						return Err(RunnerError::RetryableNetwork {
							attempts: attempt,
							source: Box::new(err),
						});
					}

					warn!(
						destination = %self.hostname,
						attempt,
						max_attempts = policy.max_attempts,
						delay_ms = policy.delay.as_millis() as u64,
						"retrying command after error"
					);
					tokio::time::sleep(policy.delay).await;
				}
				Err(err) => {
					error!(destination = %self.hostname, command, error = %err, "command failed");
					return Err(err);
				}
			}
		}
	}

	async fn execute_once<F>(
		&self,
		command: &str,
		options: &RunOptions,
		connect: &F,
	) -> Result<CommandResult, RunnerError>
	where
		F: Fn() -> Result<Arc<dyn Connection>, RunnerError> + Send + Sync,
	{
		if options.new_session {
			let connection = connect()?;
			return run_session(connection.as_ref(), &self.hostname, command, options).await;
		}

		let _session = self.session.lock().await;
		let connection = self.cached_connection(connect).await?;
		run_session(connection.as_ref(), &self.hostname, command, options).await
	}

	async fn cached_connection<F>(&self, connect: &F) -> Result<Arc<dyn Connection>, RunnerError>
	where
		F: Fn() -> Result<Arc<dyn Connection>, RunnerError> + Send + Sync,
	{
		let mut slot = self.connection.lock().await;
		if let Some(connection) = slot.as_ref() {
			return Ok(Arc::clone(connection));
		}
		let connection = connect()?;
		*slot = Some(Arc::clone(&connection));
		Ok(connection)
	}

	/// Drop the cached connection, stopping it first.
	pub async fn close_connection(&self) {
		let cached = self.connection.lock().await.take();
		if let Some(connection) = cached {
			if let Err(err) = connection.stop().await {
				warn!(destination = %self.hostname, error = %err, "failed to close connection");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::{self, Write};
	use tracing_subscriber::fmt::MakeWriter;

	struct CapturedLogs {
		output: Arc<std::sync::Mutex<Vec<u8>>>,
	}

	impl<'a> MakeWriter<'a> for CapturedLogs {
		type Writer = CapturedWriter;

		fn make_writer(&'a self) -> Self::Writer {
			CapturedWriter {
				output: self.output.clone(),
			}
		}
	}

	struct CapturedWriter {
		output: Arc<std::sync::Mutex<Vec<u8>>>,
	}

	impl Write for CapturedWriter {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.output.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[derive(Default)]
	struct RecordingRunner {
		commands: std::sync::Mutex<Vec<String>>,
	}

	#[async_trait]
	impl CommandRunner for RecordingRunner {
		fn hostname(&self) -> &str {
			"recorder"
		}

		fn user(&self) -> &str {
			ROOT_USER
		}

		async fn execute(
			&self,
			command: &str,
			options: &RunOptions,
		) -> Result<CommandResult, RunnerError> {
			self.commands.lock().unwrap().push(command.to_string());
			Ok(CommandResult {
				command: command.to_string(),
				stdout: String::new(),
				stderr: String::new(),
				exit_status: Some(0),
				duration: Duration::ZERO,
				ignore_status: options.ignore_status,
			})
		}

		async fn is_up(&self, _timeout: Option<Duration>) -> bool {
			true
		}

		async fn send_files(&self, _src: &Path, _dst: &Path) -> Result<(), RunnerError> {
			Ok(())
		}

		async fn receive_files(&self, _src: &Path, _dst: &Path) -> Result<(), RunnerError> {
			Ok(())
		}

		async fn stop(&self) -> Result<(), RunnerError> {
			Ok(())
		}
	}

	/// Purpose: Verifies that the deprecation warning for a `sudo` prefix names
	/// the file and line of the `run` call, so callers still using the prefix
	/// can be found from the logs.
	#[tokio::test]
	async fn test_legacy_sudo_warning_names_caller() {
		let output = Arc::new(std::sync::Mutex::new(Vec::new()));
		let subscriber = tracing_subscriber::fmt()
			.with_writer(CapturedLogs {
				output: output.clone(),
			})
			.with_ansi(false)
			.finish();
		let _guard = tracing::subscriber::set_default(subscriber);

		let runner = RecordingRunner::default();
		let (line, pending) = (line!(), runner.run("sudo echo hi", RunOptions::new()));
		pending.await.unwrap();

		assert_eq!(*runner.commands.lock().unwrap(), vec!["echo hi".to_string()]);
		let logs = String::from_utf8(output.lock().unwrap().clone()).unwrap();
		assert!(logs.contains("deprecated"), "logs: {logs}");
		assert!(logs.contains(&format!("{}:{line}", file!())), "logs: {logs}");
	}

	#[test]
	fn test_sudo_as_root_from_other_user() {
		assert_eq!(sudo_command("whoami", "root", "scylla"), "sudo whoami");
	}

	#[test]
	fn test_sudo_as_session_user_passes_through() {
		assert_eq!(sudo_command("whoami", "root", "root"), "whoami");
		assert_eq!(sudo_command("whoami", "alice", "alice"), "whoami");
	}

	#[test]
	fn test_sudo_as_other_user() {
		assert_eq!(sudo_command("ls /tmp", "alice", "root"), "sudo -u alice ls /tmp");
	}

	#[test]
	fn test_strip_plain_prefix() {
		assert_eq!(
			strip_legacy_sudo("sudo ls /tmp"),
			Some(LegacySudo {
				user: None,
				command: "ls /tmp"
			})
		);
	}

	#[test]
	fn test_strip_user_prefix() {
		assert_eq!(
			strip_legacy_sudo("sudo -u alice ls  /tmp"),
			Some(LegacySudo {
				user: Some("alice"),
				command: "ls  /tmp"
			})
		);
	}

	#[test]
	fn test_not_a_prefix() {
		assert_eq!(strip_legacy_sudo("sudoedit /etc/hosts"), None);
		assert_eq!(strip_legacy_sudo("echo sudo ls"), None);
		assert_eq!(strip_legacy_sudo("sudo"), None);
		assert_eq!(strip_legacy_sudo("sudo -u alice"), None);
	}

	proptest! {
		#[test]
		fn stripped_command_round_trips(cmd in "[a-z][a-z0-9 /._-]{0,30}[a-z0-9]", user in "[a-z]{1,8}") {
			let plain = format!("sudo {cmd}");
			let stripped = strip_legacy_sudo(&plain).unwrap();
			prop_assert_eq!(stripped.command, cmd.as_str());
			prop_assert_eq!(stripped.user, None);

			let as_user = format!("sudo -u {user} {cmd}");
			let stripped = strip_legacy_sudo(&as_user).unwrap();
			prop_assert_eq!(stripped.command, cmd.as_str());
			prop_assert_eq!(stripped.user, Some(user.as_str()));
		}
	}
}

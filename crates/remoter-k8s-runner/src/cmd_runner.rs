// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runner that executes commands in a running container.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use remoter_config::RemoterConfig;
use remoter_core::{
	retrying, CommandResult, CommandRunner, Connection, RunOptions, RunnerCore, RunnerError,
	RunnerSettings, ROOT_USER,
};
use remoter_k8s::K8sClient;
use tracing::{debug, info};

use crate::exec::{ExecConnection, PodTarget};
use crate::settings::ExecSettings;

/// Runs each command over a fresh exec channel into one container.
pub struct KubernetesCmdRunner {
	core: RunnerCore,
	client: Arc<dyn K8sClient>,
	target: PodTarget,
	settings: ExecSettings,
}

impl KubernetesCmdRunner {
	pub fn new(
		client: Arc<dyn K8sClient>,
		target: PodTarget,
		runner_settings: RunnerSettings,
		settings: ExecSettings,
	) -> Self {
		Self {
			core: RunnerCore::new(target.identity(), ROOT_USER, runner_settings),
			client,
			target,
			settings,
		}
	}

	pub fn from_config(client: Arc<dyn K8sClient>, target: PodTarget, config: &RemoterConfig) -> Self {
		Self::new(
			client,
			target,
			RunnerSettings::from_config(config),
			ExecSettings::from_config(config),
		)
	}

	pub fn target(&self) -> &PodTarget {
		&self.target
	}

	fn connection(&self) -> ExecConnection {
		ExecConnection::new(self.client.clone(), self.target.clone(), self.settings.clone())
	}

	/// Run `command` feeding it `input`, collecting raw stdout.
	async fn transfer_once(&self, command: &str, input: &[u8]) -> Result<Vec<u8>, RunnerError> {
		let connection = self.connection();
		let started = Instant::now();
		let collected = drive_raw(&connection, command, input).await;
		let stopped = connection.stop().await;
		let (stdout, stderr, exit_status) = collected?;
		stopped?;

		if exit_status == Some(0) {
			return Ok(stdout);
		}
		Err(RunnerError::UnexpectedExit(Box::new(CommandResult {
			command: command.to_string(),
			stdout: String::from_utf8_lossy(&stdout).into_owned(),
			stderr: String::from_utf8_lossy(&stderr).into_owned(),
			exit_status,
			duration: started.elapsed(),
			ignore_status: false,
		})))
	}
}

async fn drive_raw(
	connection: &ExecConnection,
	command: &str,
	input: &[u8],
) -> Result<(Vec<u8>, Vec<u8>, Option<i32>), RunnerError> {
	connection.start(command).await?;
	if !input.is_empty() {
		connection.write_stdin(input).await?;
	}

	let mut stdout = Vec::new();
	let mut stderr = Vec::new();
	while !connection.is_finished().await? {
		stdout.extend(connection.read_stdout().await?);
		stderr.extend(connection.read_stderr().await?);
	}
	let exit_status = connection.returncode().await?;
	Ok((stdout, stderr, exit_status))
}

/// Quote `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl CommandRunner for KubernetesCmdRunner {
	fn hostname(&self) -> &str {
		self.core.hostname()
	}

	fn user(&self) -> &str {
		self.core.user()
	}

	/// Every command gets its own channel.
	async fn execute(&self, command: &str, options: &RunOptions) -> Result<CommandResult, RunnerError> {
		let mut options = options.clone();
		options.new_session = true;
		self.core
			.execute(command, &options, || {
				Ok(Arc::new(self.connection()) as Arc<dyn Connection>)
			})
			.await
	}

	async fn is_up(&self, _timeout: Option<Duration>) -> bool {
		true
	}

	/// Streams `src` into `head -c <len> > dst` inside the container.
	async fn send_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		let data = tokio::fs::read(src).await.map_err(|source| RunnerError::Io {
			destination: self.hostname().to_string(),
			source,
		})?;
		let command = format!(
			"head -c {} > {}",
			data.len(),
			shell_quote(&dst.to_string_lossy())
		);
		debug!(destination = self.hostname(), src = %src.display(), dst = %dst.display(), "sending file");

		retrying(
			&self.core.settings().transfer_policy,
			self.hostname(),
			"send_files",
			|| self.transfer_once(&command, &data),
		)
		.await?;
		info!(destination = self.hostname(), bytes = data.len(), dst = %dst.display(), "file sent");
		Ok(())
	}

	async fn receive_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		let command = format!("cat {}", shell_quote(&src.to_string_lossy()));
		debug!(destination = self.hostname(), src = %src.display(), dst = %dst.display(), "receiving file");

		let data = retrying(
			&self.core.settings().transfer_policy,
			self.hostname(),
			"receive_files",
			|| self.transfer_once(&command, &[]),
		)
		.await?;

		if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent)
				.await
				.map_err(|source| RunnerError::Io {
					destination: self.hostname().to_string(),
					source,
				})?;
		}
		tokio::fs::write(dst, &data)
			.await
			.map_err(|source| RunnerError::Io {
				destination: self.hostname().to_string(),
				source,
			})?;
		info!(destination = self.hostname(), bytes = data.len(), dst = %dst.display(), "file received");
		Ok(())
	}

	/// Channels close when their command ends.
	async fn stop(&self) -> Result<(), RunnerError> {
		Ok(())
	}
}

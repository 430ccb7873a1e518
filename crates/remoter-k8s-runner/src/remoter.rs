// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use remoter_core::{CommandResult, CommandRunner, LocalCmdRunner, RunOptions, RunnerError};

use crate::cmd_runner::KubernetesCmdRunner;
use crate::pod_runner::KubernetesPodRunner;

/// Any supported backend behind one type.
pub enum Remoter {
	Local(LocalCmdRunner),
	Kubernetes(KubernetesCmdRunner),
	Pod(KubernetesPodRunner),
}

impl Remoter {
	fn inner(&self) -> &dyn CommandRunner {
		match self {
			Remoter::Local(runner) => runner,
			Remoter::Kubernetes(runner) => runner,
			Remoter::Pod(runner) => runner,
		}
	}
}

impl From<LocalCmdRunner> for Remoter {
	fn from(runner: LocalCmdRunner) -> Self {
		Remoter::Local(runner)
	}
}

impl From<KubernetesCmdRunner> for Remoter {
	fn from(runner: KubernetesCmdRunner) -> Self {
		Remoter::Kubernetes(runner)
	}
}

impl From<KubernetesPodRunner> for Remoter {
	fn from(runner: KubernetesPodRunner) -> Self {
		Remoter::Pod(runner)
	}
}

#[async_trait]
impl CommandRunner for Remoter {
	fn hostname(&self) -> &str {
		self.inner().hostname()
	}

	fn user(&self) -> &str {
		self.inner().user()
	}

	async fn execute(&self, command: &str, options: &RunOptions) -> Result<CommandResult, RunnerError> {
		self.inner().execute(command, options).await
	}

	async fn is_up(&self, timeout: Option<Duration>) -> bool {
		self.inner().is_up(timeout).await
	}

	async fn send_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		self.inner().send_files(src, dst).await
	}

	async fn receive_files(&self, src: &Path, dst: &Path) -> Result<(), RunnerError> {
		self.inner().receive_files(src, dst).await
	}

	async fn stop(&self) -> Result<(), RunnerError> {
		self.inner().stop().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use remoter_core::RunnerSettings;

	#[tokio::test]
	async fn test_delegates_to_local() {
		let remoter: Remoter = LocalCmdRunner::new(
			RunnerSettings::default(),
			"/bin/sh",
			Duration::from_millis(50),
			1000,
		)
		.into();
		assert_eq!(remoter.hostname(), "localhost");
		let result = remoter
			.run("printf ok", RunOptions::new().quiet())
			.await
			.unwrap();
		assert_eq!(result.stdout, "ok");
		assert!(remoter.is_up(None).await);
	}
}

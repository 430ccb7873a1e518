// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exec channel into a running container.

use std::sync::Arc;

use async_trait::async_trait;
use remoter_core::channel::{read_chunk, Chunk};
use remoter_core::{Connection, RunnerError};
use remoter_k8s::{ExecProcess, K8sClient};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{open_error, stream_error};
use crate::settings::ExecSettings;

/// Coordinates of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTarget {
	pub pod: String,
	pub container: Option<String>,
	pub namespace: String,
}

impl PodTarget {
	pub fn new(pod: impl Into<String>, container: Option<&str>, namespace: impl Into<String>) -> Self {
		Self {
			pod: pod.into(),
			container: container.map(str::to_string),
			namespace: namespace.into(),
		}
	}

	/// `"<pod>/<container>"`, or the pod alone for the default container.
	pub fn identity(&self) -> String {
		match &self.container {
			Some(container) => format!("{}/{}", self.pod, container),
			None => self.pod.clone(),
		}
	}
}

#[derive(Default)]
struct ExecState {
	process: Option<ExecProcess>,
	exit_status: Option<i32>,
}

/// One command over an exec channel.
///
/// Stdout and stderr share the channel and are read under one lock, one
/// bounded chunk at a time.
pub struct ExecConnection {
	client: Arc<dyn K8sClient>,
	target: PodTarget,
	identity: String,
	settings: ExecSettings,
	state: Mutex<ExecState>,
}

impl ExecConnection {
	pub fn new(client: Arc<dyn K8sClient>, target: PodTarget, settings: ExecSettings) -> Self {
		Self {
			client,
			identity: target.identity(),
			target,
			settings,
			state: Mutex::new(ExecState::default()),
		}
	}
}

#[async_trait]
impl Connection for ExecConnection {
	async fn start(&self, command: &str) -> Result<(), RunnerError> {
		let mut state = self.state.lock().await;
		if let Some(mut previous) = state.process.take() {
			previous.abort();
		}
		state.exit_status = None;

		let process = self
			.client
			.exec(
				&self.target.pod,
				&self.target.namespace,
				self.target.container.as_deref(),
				self.settings.wrap(command),
			)
			.await
			.map_err(|e| open_error(&self.identity, e))?;
		state.process = Some(process);
		Ok(())
	}

	async fn read_stdout(&self) -> Result<Vec<u8>, RunnerError> {
		let mut state = self.state.lock().await;
		let Some(process) = state.process.as_mut() else {
			return Ok(Vec::new());
		};
		let Some(stdout) = process.stdout.as_mut() else {
			return Ok(Vec::new());
		};
		match read_chunk(stdout, self.settings.chunk_size, self.settings.read_timeout)
			.await
			.map_err(|e| stream_error(&self.identity, e))?
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
		let mut state = self.state.lock().await;
		let Some(process) = state.process.as_mut() else {
			return Ok(Vec::new());
		};
		let Some(stderr) = process.stderr.as_mut() else {
			return Ok(Vec::new());
		};
		match read_chunk(stderr, self.settings.chunk_size, self.settings.read_timeout)
			.await
			.map_err(|e| stream_error(&self.identity, e))?
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
		let mut state = self.state.lock().await;
		if let Some(stdin) = state.process.as_mut().and_then(|p| p.stdin.as_mut()) {
			stdin
				.write_all(data)
				.await
				.map_err(|e| stream_error(&self.identity, e))?;
			stdin
				.flush()
				.await
				.map_err(|e| stream_error(&self.identity, e))?;
		}
		Ok(())
	}

	/// The channel has no half-close.
	async fn close_stdin(&self) -> Result<(), RunnerError> {
		Ok(())
	}

	async fn is_finished(&self) -> Result<bool, RunnerError> {
		let state = self.state.lock().await;
		Ok(state
			.process
			.as_ref()
			.map_or(true, |p| p.stdout.is_none() && p.stderr.is_none()))
	}

	async fn returncode(&self) -> Result<Option<i32>, RunnerError> {
		let mut state = self.state.lock().await;
		if state.exit_status.is_some() {
			return Ok(state.exit_status);
		}
		let Some(status) = state.process.as_mut().and_then(|p| p.status.take()) else {
			return Ok(None);
		};
		match tokio::time::timeout(self.settings.status_timeout, status).await {
			Ok(code) => state.exit_status = code,
			Err(_) => debug!(destination = %self.identity, "exec status not reported in time"),
		}
		Ok(state.exit_status)
	}

	async fn stop(&self) -> Result<(), RunnerError> {
		if let Some(process) = self.state.lock().await.process.as_mut() {
			process.abort();
		}
		Ok(())
	}

	async fn kill(&self) -> Result<(), RunnerError> {
		self.stop().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use remoter_k8s::{ExecReply, MockK8sClient};

	fn connection(mock: &Arc<MockK8sClient>) -> ExecConnection {
		ExecConnection::new(
			mock.clone(),
			PodTarget::new("db-0", Some("scylla"), "scylla"),
			ExecSettings::default(),
		)
	}

	#[test]
	fn test_identity() {
		assert_eq!(PodTarget::new("db-0", Some("scylla"), "ns").identity(), "db-0/scylla");
		assert_eq!(PodTarget::new("db-0", None, "ns").identity(), "db-0");
	}

	#[tokio::test]
	async fn test_reads_until_closed_then_reports_status() {
		let mock = Arc::new(MockK8sClient::new());
		mock.push_exec_reply(ExecReply::exit(2).stdout("out").stderr("err"));
		let conn = connection(&mock);

		conn.start("false").await.unwrap();
		assert!(!conn.is_finished().await.unwrap());
		assert_eq!(conn.read_stdout().await.unwrap(), b"out");
		assert_eq!(conn.read_stderr().await.unwrap(), b"err");
		assert!(conn.read_stdout().await.unwrap().is_empty());
		assert!(conn.read_stderr().await.unwrap().is_empty());
		assert!(conn.is_finished().await.unwrap());
		assert_eq!(conn.returncode().await.unwrap(), Some(2));
		assert_eq!(conn.returncode().await.unwrap(), Some(2));

		let calls = mock.exec_calls();
		assert_eq!(calls[0].command, vec!["/bin/bash", "-c", "false"]);
		assert_eq!(calls[0].container.as_deref(), Some("scylla"));
	}

	#[tokio::test]
	async fn test_stop_is_idempotent() {
		let mock = Arc::new(MockK8sClient::new());
		let conn = connection(&mock);
		conn.stop().await.unwrap();
		conn.start("true").await.unwrap();
		conn.stop().await.unwrap();
		conn.stop().await.unwrap();
		assert!(conn.is_finished().await.unwrap());
	}

	#[tokio::test]
	async fn test_open_failure_is_connection_fault() {
		let mock = Arc::new(MockK8sClient::new());
		mock.push_exec_error(remoter_k8s::K8sError::Transport {
			message: "connection refused".into(),
		});
		let err = connection(&mock).start("true").await.unwrap_err();
		assert!(matches!(err, RunnerError::Connection { .. }));
	}
}

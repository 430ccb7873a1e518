// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncWrite};

pub use k8s_openapi::api::core::v1::{
	ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStatus, Pod,
	PodCondition, PodStatus,
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;

/// Options for log streaming.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
	pub timestamps: bool,
	/// Upper bound on opening the stream.
	pub request_timeout: Option<Duration>,
}

/// A pinned follow-mode stream of log bytes from a container.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Resolves to the exit code once the remote process finishes, or `None`
/// when the channel closed without reporting one.
pub type ExitStatusFuture = Pin<Box<dyn Future<Output = Option<i32>> + Send>>;

/// A command running in a container over an exec channel.
///
/// Streams are optional so callers can take ownership of each one
/// independently.
pub struct ExecProcess {
	pub stdin: Option<Pin<Box<dyn AsyncWrite + Send>>>,
	pub stdout: Option<Pin<Box<dyn AsyncRead + Send>>>,
	pub stderr: Option<Pin<Box<dyn AsyncRead + Send>>>,
	pub status: Option<ExitStatusFuture>,
	abort: Option<Box<dyn FnOnce() + Send>>,
}

impl ExecProcess {
	pub fn new(
		stdin: Option<Pin<Box<dyn AsyncWrite + Send>>>,
		stdout: Option<Pin<Box<dyn AsyncRead + Send>>>,
		stderr: Option<Pin<Box<dyn AsyncRead + Send>>>,
		status: Option<ExitStatusFuture>,
	) -> Self {
		Self {
			stdin,
			stdout,
			stderr,
			status,
			abort: None,
		}
	}

	/// Attach the action that tears down the underlying channel.
	pub fn with_abort(mut self, abort: impl FnOnce() + Send + 'static) -> Self {
		self.abort = Some(Box::new(abort));
		self
	}

	/// Close the channel. Safe to call more than once.
	pub fn abort(&mut self) {
		self.stdin = None;
		self.stdout = None;
		self.stderr = None;
		if let Some(abort) = self.abort.take() {
			abort();
		}
	}
}

impl std::fmt::Debug for ExecProcess {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ExecProcess")
			.field("stdin", &self.stdin.is_some())
			.field("stdout", &self.stdout.is_some())
			.field("stderr", &self.stderr.is_some())
			.field("status", &self.status.is_some())
			.finish()
	}
}

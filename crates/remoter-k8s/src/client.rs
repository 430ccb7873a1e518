// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{ExecProcess, LogOptions, LogStream, Pod};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the K8s operations needed by the runners.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create or update a pod with server-side apply.
	async fn apply_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sError>;

	/// Get a specific pod by name from the specified namespace.
	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError>;

	/// Follow the logs of a container in a pod from the beginning.
	///
	/// `container` may be omitted for single-container pods.
	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		container: Option<&str>,
		opts: LogOptions,
	) -> Result<LogStream, K8sError>;

	/// Run `command` inside a container with stdin, stdout and stderr attached.
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: Option<&str>,
		command: Vec<String>,
	) -> Result<ExecProcess, K8sError>;
}

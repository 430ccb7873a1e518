// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Running a command as a templated pod and following its log.
//!
//! The pod's log is its only output channel. It combines stdout and stderr
//! and cannot be resumed at an offset, so every reopen reads the log from the
//! start and drops the bytes the caller already has.
//!
//! The pod template must hold a single container whose command is
//! `${K8S_POD_COMMAND}`, be named `${K8S_POD_NAME}` and use the image
//! `${DOCKER_IMAGE_WITH_TAG}`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use remoter_common_wait::{wait_until, WaitOptions};
use remoter_core::{retrying, Connection, RunnerContext, RunnerError};
use remoter_k8s::status::{is_failed_or_completed, is_ready_or_completed, pod_exit_code};
use remoter_k8s::{K8sClient, K8sError, LogOptions, LogStream, ManifestApplier, PodStatus};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{api_error, open_error, stream_error};
use crate::settings::{ExecSettings, PodWatcherSettings};

pub const POD_COMMAND_VAR: &str = "K8S_POD_COMMAND";
pub const POD_NAME_VAR: &str = "K8S_POD_NAME";
pub const IMAGE_VAR: &str = "DOCKER_IMAGE_WITH_TAG";

/// Where and how pods are created.
#[derive(Debug, Clone, PartialEq)]
pub struct PodTemplate {
	pub path: PathBuf,
	pub namespace: String,
	/// Extra `${VAR}` substitutions.
	pub environ: BTreeMap<String, String>,
	/// Image reference for `${DOCKER_IMAGE_WITH_TAG}`.
	pub image: String,
}

/// Everything needed to start pods from one template.
#[derive(Clone)]
pub struct PodLauncher {
	pub client: Arc<dyn K8sClient>,
	pub applier: Arc<dyn ManifestApplier>,
	pub template: Arc<PodTemplate>,
	pub exec: ExecSettings,
	pub settings: PodWatcherSettings,
	pub context: RunnerContext,
}

impl PodLauncher {
	/// A watcher for a pod named `pod_name`. Nothing is created until the
	/// watcher is started.
	pub fn watcher(self: &Arc<Self>, pod_name: impl Into<String>) -> PodLogWatcher {
		PodLogWatcher {
			launcher: Arc::clone(self),
			pod_name: pod_name.into(),
			state: Mutex::new(WatcherState::new(self.settings.liveness_polls)),
		}
	}
}

#[derive(Debug)]
enum Readiness {
	Ready,
	Failed(i32),
}

struct WatcherState {
	stream: Option<LogStream>,
	/// Read from the stream but not yet handed out.
	pending: Bytes,
	/// Bytes handed to the caller since the pod started.
	delivered: usize,
	opened_at: Instant,
	liveness: u32,
	last_status_poll: Option<Instant>,
}

impl WatcherState {
	fn new(liveness: u32) -> Self {
		Self {
			stream: None,
			pending: Bytes::new(),
			delivered: 0,
			opened_at: Instant::now(),
			liveness,
			last_status_poll: None,
		}
	}

	fn take_pending(&mut self, max: usize) -> Vec<u8> {
		let n = max.max(1).min(self.pending.len());
		self.delivered += n;
		self.pending.split_to(n).to_vec()
	}

	fn close_stream(&mut self) {
		self.stream = None;
		self.pending = Bytes::new();
	}
}

/// One pod from the template, observed through its log.
pub struct PodLogWatcher {
	launcher: Arc<PodLauncher>,
	pod_name: String,
	state: Mutex<WatcherState>,
}

impl PodLogWatcher {
	pub fn pod_name(&self) -> &str {
		&self.pod_name
	}

	fn namespace(&self) -> &str {
		&self.launcher.template.namespace
	}

	fn settings(&self) -> &PodWatcherSettings {
		&self.launcher.settings
	}

	async fn pod_status(&self) -> Result<Option<PodStatus>, RunnerError> {
		match self
			.launcher
			.client
			.get_pod(&self.pod_name, self.namespace())
			.await
		{
			Ok(pod) => Ok(pod.status),
			Err(K8sError::PodNotFound { .. }) => Ok(None),
			Err(err) => Err(api_error(&self.pod_name, err)),
		}
	}

	async fn probe_readiness(&self) -> Result<Option<Readiness>, RunnerError> {
		let status = self.pod_status().await?;
		if let Some(code) = pod_exit_code(status.as_ref()).filter(|code| *code != 0) {
			return Ok(Some(Readiness::Failed(code)));
		}
		let ready = is_ready_or_completed(status.as_ref());
		debug!(pod = %self.pod_name, ready, "pod readiness");
		Ok(ready.then_some(Readiness::Ready))
	}

	async fn wait_ready(&self) -> Result<(), RunnerError> {
		let options = WaitOptions::new(self.settings().ready_step)
			.text(format!("'{}' pod is not ready/completed yet...", self.pod_name))
			.timeout(self.settings().ready_timeout);

		let readiness = match wait_until(|| self.probe_readiness(), &options).await {
			Ok(readiness) => readiness,
			Err(err) if err.is_timeout() => {
				return Err(RunnerError::WaitTimeout {
					destination: self.pod_name.clone(),
					message: err.to_string(),
				})
			}
			Err(err) => {
				let message = err.to_string();
				return Err(err.into_probe_error().unwrap_or(RunnerError::WaitTimeout {
					destination: self.pod_name.clone(),
					message,
				}));
			}
		};

		if let Some(Readiness::Failed(exit_code)) = readiness {
			error!(pod = %self.pod_name, exit_code, "pod failed before becoming ready");
			return Err(RunnerError::DestinationFailed {
				destination: self.pod_name.clone(),
				exit_code,
			});
		}
		Ok(())
	}

	/// Whether the pod stopped running. Never polls the cluster more often
	/// than the configured interval.
	async fn poll_failed_or_completed(&self, state: &mut WatcherState) -> Result<bool, RunnerError> {
		let interval = self.settings().status_poll_interval;
		if let Some(last) = state.last_status_poll {
			let since = last.elapsed();
			if since < interval {
				tokio::time::sleep(interval - since).await;
			}
		}
		let status = self.pod_status().await;
		state.last_status_poll = Some(Instant::now());

		let done = is_failed_or_completed(status?.as_ref());
		debug!(pod = %self.pod_name, done, "pod failed or completed");
		Ok(done)
	}

	async fn open_stream(&self) -> Result<LogStream, RunnerError> {
		let options = LogOptions {
			timestamps: false,
			request_timeout: Some(self.settings().read_request_timeout),
		};
		retrying(
			&self.settings().open_policy,
			&self.pod_name,
			"open log stream",
			|| {
				let options = options.clone();
				async move {
					self.launcher
						.client
						.stream_logs(&self.pod_name, self.namespace(), None, options)
						.await
						.map_err(|err| {
							warn!(pod = %self.pod_name, error = %err, "failed to open pod log stream");
							open_error(&self.pod_name, err)
						})
				}
			},
		)
		.await
	}

	/// Open the log and read past the first `delivered` bytes.
	///
	/// Returns the stream with whatever was read beyond them.
	async fn reopen_skipping(&self, delivered: usize) -> Result<(LogStream, Bytes), RunnerError> {
		let mut stream = self.open_stream().await?;
		if delivered == 0 {
			return Ok((stream, Bytes::new()));
		}

		debug!(pod = %self.pod_name, delivered, "re-reading already delivered bytes");
		let mut skipped = 0;
		while skipped < delivered {
			let next = tokio::time::timeout(self.settings().read_request_timeout, stream.next())
				.await
				.map_err(|_| RunnerError::ReadTimeout {
					destination: self.pod_name.clone(),
				})?;
			match next {
				Some(Ok(mut chunk)) => {
					let needed = delivered - skipped;
					if chunk.len() > needed {
						let rest = chunk.split_off(needed);
						debug!(pod = %self.pod_name, delivered, "re-read done");
						return Ok((stream, rest));
					}
					skipped += chunk.len();
				}
				Some(Err(err)) => return Err(stream_error(&self.pod_name, err)),
				None => {
					return Err(RunnerError::Protocol {
						destination: self.pod_name.clone(),
						message: format!(
							"log ended after {skipped} of {delivered} already delivered bytes"
						),
					})
				}
			}
		}
		debug!(pod = %self.pod_name, delivered, "re-read done");
		Ok((stream, Bytes::new()))
	}

	async fn restart_stream(&self, state: &mut WatcherState) -> Result<(), RunnerError> {
		debug!(pod = %self.pod_name, "starting log stream");
		let delivered = state.delivered;
		let (stream, rest) = retrying(
			&self.settings().start_policy,
			&self.pod_name,
			"start log stream",
			|| self.reopen_skipping(delivered),
		)
		.await?;
		state.stream = Some(stream);
		state.pending = rest;
		state.opened_at = Instant::now();
		Ok(())
	}

	async fn read_once(&self) -> Result<Vec<u8>, RunnerError> {
		let mut state = self.state.lock().await;
		let chunk_size = self.launcher.exec.chunk_size;
		if !state.pending.is_empty() {
			return Ok(state.take_pending(chunk_size));
		}

		if state.stream.is_none() {
			warn!(pod = %self.pod_name, "reading from a closed log stream, reopening it");
			self.restart_stream(&mut state).await?;
		} else if state.opened_at.elapsed() > self.settings().stream_ttl {
			debug!(
				pod = %self.pod_name,
				ttl_secs = self.settings().stream_ttl.as_secs(),
				"log stream reached its time to live, reopening it"
			);
			state.close_stream();
			self.restart_stream(&mut state).await?;
		}
		if !state.pending.is_empty() {
			return Ok(state.take_pending(chunk_size));
		}

		let Some(stream) = state.stream.as_mut() else {
			return Ok(Vec::new());
		};
		match tokio::time::timeout(self.launcher.exec.read_timeout, stream.next()).await {
			Err(_) => Ok(Vec::new()),
			Ok(None) => {
				debug!(pod = %self.pod_name, delivered = state.delivered, "log stream ended");
				state.close_stream();
				Ok(Vec::new())
			}
			Ok(Some(Err(err))) => {
				state.close_stream();
				Err(stream_error(&self.pod_name, err))
			}
			Ok(Some(Ok(chunk))) => {
				state.pending = chunk;
				Ok(state.take_pending(chunk_size))
			}
		}
	}

	/// Run the stop command in the pod and close the log stream. Failures
	/// are logged and ignored.
	async fn stop_pod(&self, state: &mut WatcherState) {
		let command = self.launcher.exec.wrap(&self.settings().stop_command);
		let stop = async {
			let mut process = self
				.launcher
				.client
				.exec(&self.pod_name, self.namespace(), None, command)
				.await?;
			let exit_code = match process.status.take() {
				Some(status) => status.await,
				None => None,
			};
			process.abort();
			Ok::<_, K8sError>(exit_code)
		};

		match tokio::time::timeout(self.settings().stop_timeout, stop).await {
			Ok(Ok(exit_code)) => info!(pod = %self.pod_name, exit_code = ?exit_code, "pod stop command finished"),
			Ok(Err(err)) => warn!(pod = %self.pod_name, error = %err, "pod stop command failed"),
			Err(_) => warn!(pod = %self.pod_name, "pod stop command timed out"),
		}
		state.close_stream();
	}
}

#[async_trait]
impl Connection for PodLogWatcher {
	/// Create the pod running `command`, wait for it and follow its log.
	async fn start(&self, command: &str) -> Result<(), RunnerError> {
		let template = &self.launcher.template;
		let mut vars = template.environ.clone();
		vars.insert(POD_COMMAND_VAR.to_string(), command.to_string());
		vars.insert(POD_NAME_VAR.to_string(), self.pod_name.clone());
		vars.insert(IMAGE_VAR.to_string(), template.image.clone());

		debug!(pod = %self.pod_name, command, "creating pod");
		self.launcher
			.applier
			.apply(&template.path, &vars, &template.namespace)
			.await
			.map_err(|err| api_error(&self.pod_name, err))?;
		self.wait_ready().await?;

		let mut state = self.state.lock().await;
		*state = WatcherState::new(self.settings().liveness_polls);
		self.restart_stream(&mut state).await
	}

	async fn read_stdout(&self) -> Result<Vec<u8>, RunnerError> {
		retrying(
			&self.settings().read_policy,
			&self.pod_name,
			"read log stream",
			|| self.read_once(),
		)
		.await
	}

	/// The log combines both streams; everything arrives on stdout.
	async fn read_stderr(&self) -> Result<Vec<u8>, RunnerError> {
		Ok(Vec::new())
	}

	async fn write_stdin(&self, data: &[u8]) -> Result<(), RunnerError> {
		warn!(
			pod = %self.pod_name,
			bytes = data.len(),
			"pod log watcher has no stdin, dropping data"
		);
		Ok(())
	}

	async fn close_stdin(&self) -> Result<(), RunnerError> {
		Ok(())
	}

	/// Finished once the log is drained and the pod stopped. A closed log on
	/// a live pod spends one liveness poll; the last one stops the pod.
	async fn is_finished(&self) -> Result<bool, RunnerError> {
		let mut state = self.state.lock().await;
		if state.stream.is_some() || !state.pending.is_empty() {
			return Ok(false);
		}

		let done = self.poll_failed_or_completed(&mut state).await?;
		if !done {
			state.liveness = state.liveness.saturating_sub(1);
			if state.liveness == 0 {
				warn!(
					pod = %self.pod_name,
					"stopping pod because its log stream cannot be established while it is alive"
				);
				self.stop_pod(&mut state).await;
				return Err(RunnerError::LivenessExhausted {
					destination: self.pod_name.clone(),
				});
			}
		}
		Ok(done)
	}

	async fn returncode(&self) -> Result<Option<i32>, RunnerError> {
		Ok(pod_exit_code(self.pod_status().await?.as_ref()))
	}

	async fn stop(&self) -> Result<(), RunnerError> {
		let mut state = self.state.lock().await;
		if self.poll_failed_or_completed(&mut state).await? {
			warn!(pod = %self.pod_name, "stop called for a pod that already stopped, ignoring");
			return Ok(());
		}

		let stream_state = if state.stream.is_some() { "open" } else { "closed" };
		if self.launcher.context.is_teardown_started() {
			warn!(pod = %self.pod_name, stream = stream_state, "stopping pod for teardown");
			self.stop_pod(&mut state).await;
			return Err(RunnerError::Interrupted {
				destination: self.pod_name.clone(),
			});
		}

		if state.stream.is_none() {
			warn!(
				pod = %self.pod_name,
				"stop called for a running pod with a closed log stream, reopening the stream"
			);
			self.restart_stream(&mut state).await
		} else {
			warn!(
				pod = %self.pod_name,
				"stop called for a running pod with an open log stream, stopping the pod"
			);
			self.stop_pod(&mut state).await;
			Ok(())
		}
	}

	async fn kill(&self) -> Result<(), RunnerError> {
		warn!(pod = %self.pod_name, "killing pod");
		let mut state = self.state.lock().await;
		self.stop_pod(&mut state).await;
		Ok(())
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runner that starts a fresh pod for every command.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use remoter_config::RemoterConfig;
use remoter_core::{
	CommandResult, CommandRunner, Connection, RunOptions, RunnerContext, RunnerCore, RunnerError,
	RunnerSettings, ROOT_USER,
};
use remoter_k8s::{K8sClient, ManifestApplier, TemplateApplier};
use tracing::{debug, warn};

use crate::pod_watcher::{PodLauncher, PodLogWatcher, PodTemplate};
use crate::settings::{ExecSettings, PodWatcherSettings};

const BACKEND: &str = "KubernetesPodRunner";

/// Runs every command in its own pod named `<name-template>-<n>`.
///
/// Pods are remembered so [`CommandRunner::stop`] can stop all of them.
pub struct KubernetesPodRunner {
	core: RunnerCore,
	launcher: Arc<PodLauncher>,
	pod_name_template: String,
	counter: AtomicI64,
	watchers: Mutex<Vec<Arc<PodLogWatcher>>>,
}

impl KubernetesPodRunner {
	pub fn new(
		launcher: PodLauncher,
		pod_name_template: impl Into<String>,
		settings: RunnerSettings,
	) -> Self {
		let pod_name_template = pod_name_template.into();
		Self {
			core: RunnerCore::new(format!("pod/{pod_name_template}"), ROOT_USER, settings),
			launcher: Arc::new(launcher),
			pod_name_template,
			counter: AtomicI64::new(-1),
			watchers: Mutex::new(Vec::new()),
		}
	}

	/// A runner applying templates through `client`.
	pub fn from_config(
		client: Arc<dyn K8sClient>,
		template: PodTemplate,
		pod_name_template: impl Into<String>,
		context: RunnerContext,
		config: &RemoterConfig,
	) -> Self {
		let applier: Arc<dyn ManifestApplier> = Arc::new(TemplateApplier::new(client.clone()));
		let launcher = PodLauncher {
			client,
			applier,
			template: Arc::new(template),
			exec: ExecSettings::from_config(config),
			settings: PodWatcherSettings::from_config(config),
			context,
		};
		Self::new(launcher, pod_name_template, RunnerSettings::from_config(config))
	}

	/// Name of the most recently created pod.
	pub fn pod_name(&self) -> String {
		format!(
			"{}-{}",
			self.pod_name_template,
			self.counter.load(Ordering::SeqCst)
		)
	}

	/// Pods created so far, oldest first.
	pub fn pod_names(&self) -> Vec<String> {
		self.registry()
			.iter()
			.map(|watcher| watcher.pod_name().to_string())
			.collect()
	}

	fn registry(&self) -> std::sync::MutexGuard<'_, Vec<Arc<PodLogWatcher>>> {
		self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn connect(&self) -> Arc<dyn Connection> {
		let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
		let pod_name = format!("{}-{}", self.pod_name_template, n);
		debug!(destination = self.hostname(), pod = %pod_name, "new pod connection");

		let watcher = Arc::new(self.launcher.watcher(pod_name));
		self.registry().push(Arc::clone(&watcher));
		watcher
	}
}

#[async_trait]
impl CommandRunner for KubernetesPodRunner {
	fn hostname(&self) -> &str {
		self.core.hostname()
	}

	fn user(&self) -> &str {
		self.core.user()
	}

	/// Every attempt creates a new pod.
	async fn execute(&self, command: &str, options: &RunOptions) -> Result<CommandResult, RunnerError> {
		let mut options = options.clone();
		options.new_session = true;
		self.core
			.execute(command, &options, || Ok(self.connect()))
			.await
	}

	async fn is_up(&self, _timeout: Option<Duration>) -> bool {
		true
	}

	async fn send_files(&self, _src: &Path, _dst: &Path) -> Result<(), RunnerError> {
		Err(RunnerError::NotImplemented {
			operation: "send_files",
			backend: BACKEND,
		})
	}

	async fn receive_files(&self, _src: &Path, _dst: &Path) -> Result<(), RunnerError> {
		Err(RunnerError::NotImplemented {
			operation: "receive_files",
			backend: BACKEND,
		})
	}

	/// Stops every pod this runner created. Individual failures are logged.
	async fn stop(&self) -> Result<(), RunnerError> {
		let watchers = self.registry().clone();
		for watcher in watchers {
			if let Err(err) = watcher.stop().await {
				warn!(
					destination = self.hostname(),
					pod = watcher.pod_name(),
					error = %err,
					"failed to stop pod"
				);
			}
		}
		Ok(())
	}
}

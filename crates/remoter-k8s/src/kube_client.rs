// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
	api::{Api, AttachParams, LogParams, Patch, PatchParams},
	Client, ResourceExt,
};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::status::exec_exit_code;
use crate::types::{ExecProcess, ExitStatusFuture, LogOptions, LogStream};

const FIELD_MANAGER: &str = "remoter";

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. In-cluster service account (when running in K8s)
	/// 2. KUBECONFIG environment variable
	/// 3. ~/.kube/config
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}

	pub fn from_client(client: Client) -> Self {
		Self { client }
	}

	fn pods(&self, namespace: &str) -> Api<Pod> {
		Api::namespaced(self.client.clone(), namespace)
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self, pod), fields(pod = %pod.name_any()))]
	async fn apply_pod(&self, namespace: &str, pod: Pod) -> Result<Pod, K8sError> {
		let name = pod.name_any();
		if name.is_empty() {
			return Err(K8sError::Client {
				message: "pod manifest has no metadata.name".to_string(),
			});
		}
		let params = PatchParams::apply(FIELD_MANAGER).force();
		let applied = self
			.pods(namespace)
			.patch(&name, &params, &Patch::Apply(&pod))
			.await?;
		debug!(namespace, "pod applied");
		Ok(applied)
	}

	async fn get_pod(&self, name: &str, namespace: &str) -> Result<Pod, K8sError> {
		match self.pods(namespace).get(name).await {
			Ok(pod) => Ok(pod),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::PodNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		container: Option<&str>,
		opts: LogOptions,
	) -> Result<LogStream, K8sError> {
		let pods = self.pods(namespace);
		let lp = LogParams {
			container: container.map(str::to_string),
			follow: true,
			timestamps: opts.timestamps,
			..Default::default()
		};

		let open = pods.log_stream(name, &lp);
		let opened = match opts.request_timeout {
			Some(limit) => tokio::time::timeout(limit, open)
				.await
				.map_err(|_| K8sError::Timeout)?,
			None => open.await,
		};
		let stream = opened
			.map_err(|e| K8sError::classify(e, name, |message| K8sError::StreamError { message }))?;

		let compat_stream = stream.compat();
		let bytes_stream = tokio_util::io::ReaderStream::new(compat_stream);
		let mapped = bytes_stream.map(|result| result.map_err(std::io::Error::other));
		Ok(Box::pin(mapped))
	}

	#[instrument(skip(self, command), fields(argv0 = command.first().map(String::as_str)))]
	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: Option<&str>,
		command: Vec<String>,
	) -> Result<ExecProcess, K8sError> {
		let ap = AttachParams {
			container: container.map(str::to_string),
			stdin: true,
			stdout: true,
			stderr: true,
			tty: false,
			..Default::default()
		};

		let mut attached = self
			.pods(namespace)
			.exec(name, command, &ap)
			.await
			.map_err(|e| K8sError::classify(e, name, |message| K8sError::ExecError { message }))?;

		let stdin = attached.stdin().ok_or_else(|| K8sError::ExecError {
			message: "stdin not available".into(),
		})?;
		let stdout = attached.stdout().ok_or_else(|| K8sError::ExecError {
			message: "stdout not available".into(),
		})?;
		let stderr = attached.stderr().ok_or_else(|| K8sError::ExecError {
			message: "stderr not available".into(),
		})?;
		let status: Option<ExitStatusFuture> = attached.take_status().map(|status| {
			Box::pin(async move { status.await.as_ref().and_then(exec_exit_code) })
				as ExitStatusFuture
		});

		Ok(
			ExecProcess::new(
				Some(Box::pin(stdin)),
				Some(Box::pin(stdout)),
				Some(Box::pin(stderr)),
				status,
			)
			.with_abort(move || attached.abort()),
		)
	}
}

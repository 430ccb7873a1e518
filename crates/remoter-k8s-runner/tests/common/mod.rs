// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use remoter_core::{RunnerContext, RunnerSettings};
use remoter_k8s::{
	ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStatus,
	MockK8sClient, PodCondition, PodStatus, TemplateApplier,
};
use remoter_k8s_runner::{ExecSettings, KubernetesPodRunner, PodLauncher, PodTemplate, PodWatcherSettings};

pub const POD_TEMPLATE: &str = r#"apiVersion: v1
kind: Pod
metadata:
  name: ${K8S_POD_NAME}
  labels:
    app: ${APP_LABEL}
spec:
  restartPolicy: Never
  containers:
    - name: loader
      image: ${DOCKER_IMAGE_WITH_TAG}
      command: ["/bin/bash", "-c", "touch /tmp/keep_running; ${K8S_POD_COMMAND}"]
"#;

fn ready_condition(status: &str, reason: Option<&str>) -> PodCondition {
	PodCondition {
		type_: "Ready".to_string(),
		status: status.to_string(),
		reason: reason.map(str::to_string),
		..Default::default()
	}
}

fn container(state: ContainerState) -> ContainerStatus {
	ContainerStatus {
		name: "loader".to_string(),
		state: Some(state),
		..Default::default()
	}
}

pub fn running_status() -> PodStatus {
	PodStatus {
		conditions: Some(vec![ready_condition("True", None)]),
		container_statuses: Some(vec![container(ContainerState {
			running: Some(ContainerStateRunning::default()),
			..Default::default()
		})]),
		..Default::default()
	}
}

pub fn terminated_status(exit_code: i32) -> PodStatus {
	let reason = if exit_code == 0 { "PodCompleted" } else { "PodFailed" };
	PodStatus {
		conditions: Some(vec![ready_condition("False", Some(reason))]),
		container_statuses: Some(vec![container(ContainerState {
			terminated: Some(ContainerStateTerminated {
				exit_code,
				..Default::default()
			}),
			..Default::default()
		})]),
		..Default::default()
	}
}

pub fn write_template(dir: &Path) -> std::path::PathBuf {
	let path = dir.join("loader-pod.yaml");
	std::fs::write(&path, POD_TEMPLATE).unwrap();
	path
}

pub fn launcher(
	mock: &Arc<MockK8sClient>,
	template_path: &Path,
	settings: PodWatcherSettings,
	context: RunnerContext,
) -> PodLauncher {
	let mut environ = BTreeMap::new();
	environ.insert("APP_LABEL".to_string(), "loader".to_string());
	PodLauncher {
		client: mock.clone(),
		applier: Arc::new(TemplateApplier::new(mock.clone())),
		template: Arc::new(PodTemplate {
			path: template_path.to_path_buf(),
			namespace: "scylla".to_string(),
			environ,
			image: "scylladb/scylla-bench:0.1.3".to_string(),
		}),
		exec: ExecSettings::default(),
		settings,
		context,
	}
}

pub fn pod_runner(mock: &Arc<MockK8sClient>, template_path: &Path) -> KubernetesPodRunner {
	KubernetesPodRunner::new(
		launcher(
			mock,
			template_path,
			PodWatcherSettings::default(),
			RunnerContext::new(),
		),
		"loader",
		RunnerSettings::default(),
	)
}

/// `len` bytes of numbered lines.
pub fn numbered_lines(len: usize) -> Vec<u8> {
	let mut out = Vec::new();
	let mut line = 0;
	while out.len() < len {
		out.extend(format!("line {line}\n").bytes());
		line += 1;
	}
	out.truncate(len);
	out
}

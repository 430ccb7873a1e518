// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rendering and applying pod manifest templates.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::Pod;

/// Substitute `${NAME}` references with values from `vars`.
///
/// References to names missing from `vars` are left untouched so that
/// manifests may carry their own shell-style variables.
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> String {
	let mut out = String::with_capacity(template.len());
	let mut rest = template;

	while let Some(start) = rest.find("${") {
		out.push_str(&rest[..start]);
		let after = &rest[start + 2..];
		let replaced = after.find('}').and_then(|end| {
			let name = &after[..end];
			vars.get(name).map(|value| (value, end))
		});
		match replaced {
			Some((value, end)) => {
				out.push_str(value);
				rest = &after[end + 1..];
			}
			None => {
				out.push_str("${");
				rest = after;
			}
		}
	}

	out.push_str(rest);
	out
}

/// Applies a templated manifest to the cluster.
#[async_trait]
pub trait ManifestApplier: Send + Sync {
	async fn apply(
		&self,
		template_path: &Path,
		substitutions: &BTreeMap<String, String>,
		namespace: &str,
	) -> Result<(), K8sError>;
}

/// Renders a single-pod YAML template and server-side applies it.
pub struct TemplateApplier {
	client: Arc<dyn K8sClient>,
}

impl TemplateApplier {
	pub fn new(client: Arc<dyn K8sClient>) -> Self {
		Self { client }
	}
}

#[async_trait]
impl ManifestApplier for TemplateApplier {
	async fn apply(
		&self,
		template_path: &Path,
		substitutions: &BTreeMap<String, String>,
		namespace: &str,
	) -> Result<(), K8sError> {
		let template = tokio::fs::read_to_string(template_path)
			.await
			.map_err(|e| K8sError::Template {
				path: template_path.to_path_buf(),
				message: e.to_string(),
			})?;

		let rendered = render_template(&template, substitutions);
		let mut pod: Pod = serde_yaml::from_str(&rendered).map_err(|e| K8sError::Template {
			path: template_path.to_path_buf(),
			message: e.to_string(),
		})?;
		pod.metadata.namespace = Some(namespace.to_string());

		debug!(path = %template_path.display(), namespace, "applying pod template");
		let applied = self.client.apply_pod(namespace, pod).await?;
		info!(pod = %applied.name_any(), namespace, "pod template applied");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mock::MockK8sClient;

	fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn test_render_substitutes_known_vars() {
		let rendered = render_template(
			"name: ${K8S_POD_NAME}\nimage: ${DOCKER_IMAGE_WITH_TAG}",
			&vars(&[("K8S_POD_NAME", "loader-0"), ("DOCKER_IMAGE_WITH_TAG", "img:1")]),
		);
		assert_eq!(rendered, "name: loader-0\nimage: img:1");
	}

	#[test]
	fn test_render_leaves_unknown_and_unterminated() {
		let rendered = render_template("a ${UNKNOWN} b ${OPEN", &vars(&[("X", "y")]));
		assert_eq!(rendered, "a ${UNKNOWN} b ${OPEN");
	}

	#[test]
	fn test_render_values_are_not_rescanned() {
		let rendered = render_template("${A}", &vars(&[("A", "${B}"), ("B", "no")]));
		assert_eq!(rendered, "${B}");
	}

	#[tokio::test]
	async fn test_apply_parses_and_sets_namespace() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("pod.yaml");
		std::fs::write(
			&path,
			r#"
apiVersion: v1
kind: Pod
metadata:
  name: ${K8S_POD_NAME}
spec:
  containers:
    - name: loader
      image: ${DOCKER_IMAGE_WITH_TAG}
      command: ["/bin/bash", "-c", "${K8S_POD_COMMAND}"]
"#,
		)
		.unwrap();

		let client = Arc::new(MockK8sClient::new());
		let applier = TemplateApplier::new(client.clone());
		applier
			.apply(
				&path,
				&vars(&[
					("K8S_POD_NAME", "loader-0"),
					("DOCKER_IMAGE_WITH_TAG", "scylla:6.0"),
					("K8S_POD_COMMAND", "echo hi"),
				]),
				"loaders",
			)
			.await
			.unwrap();

		let applied = client.applied_pods();
		assert_eq!(applied.len(), 1);
		assert_eq!(applied[0].name_any(), "loader-0");
		assert_eq!(applied[0].metadata.namespace.as_deref(), Some("loaders"));
		let container = &applied[0].spec.as_ref().unwrap().containers[0];
		assert_eq!(container.image.as_deref(), Some("scylla:6.0"));
		assert_eq!(container.command.as_ref().unwrap()[2], "echo hi");
	}

	#[tokio::test]
	async fn test_apply_missing_template_is_error() {
		let applier = TemplateApplier::new(Arc::new(MockK8sClient::new()));
		let err = applier
			.apply(Path::new("/nonexistent/pod.yaml"), &BTreeMap::new(), "default")
			.await
			.unwrap_err();
		assert!(matches!(err, K8sError::Template { .. }));
	}
}

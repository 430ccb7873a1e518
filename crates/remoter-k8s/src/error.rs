// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error ({code}): {message}")]
	ApiError { code: u16, message: String },

	#[error("Pod not found: {name}")]
	PodNotFound { name: String },

	#[error("Unauthorized: {message}")]
	Unauthorized { message: String },

	#[error("Transport error: {message}")]
	Transport { message: String },

	#[error("Operation timed out")]
	Timeout,

	#[error("Log stream error: {message}")]
	StreamError { message: String },

	#[error("Exec error: {message}")]
	ExecError { message: String },

	#[error("Template {path}: {message}")]
	Template { path: PathBuf, message: String },

	#[error("K8s client error: {message}")]
	Client { message: String },
}

impl K8sError {
	/// Authorization failures are never cured by reconnecting.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, K8sError::Unauthorized { .. })
	}

	/// Build an error for a failed stream/exec open, keeping the
	/// not-found/unauthorized/transport classification of `err`.
	pub(crate) fn classify(
		err: kube::Error,
		name: &str,
		fallback: fn(String) -> K8sError,
	) -> K8sError {
		match err {
			kube::Error::Api(ref api) if api.code == 404 => K8sError::PodNotFound { name: name.into() },
			kube::Error::Api(ref api) if api.code == 401 || api.code == 403 => err.into(),
			kube::Error::Auth(_)
			| kube::Error::HyperError(_)
			| kube::Error::Service(_)
			| kube::Error::ReadEvents(_) => err.into(),
			other => fallback(other.to_string()),
		}
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(api) if api.code == 401 || api.code == 403 => K8sError::Unauthorized {
				message: api.message,
			},
			kube::Error::Api(api) => K8sError::ApiError {
				code: api.code,
				message: api.message,
			},
			kube::Error::Auth(e) => K8sError::Unauthorized {
				message: e.to_string(),
			},
			kube::Error::HyperError(e) => K8sError::Transport {
				message: e.to_string(),
			},
			kube::Error::Service(e) => K8sError::Transport {
				message: e.to_string(),
			},
			kube::Error::ReadEvents(e) => K8sError::Transport {
				message: e.to_string(),
			},
			kube::Error::UpgradeConnection(e) => K8sError::Transport {
				message: e.to_string(),
			},
			other => K8sError::Client {
				message: other.to_string(),
			},
		}
	}
}

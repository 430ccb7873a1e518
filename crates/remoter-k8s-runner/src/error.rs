// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mapping control-plane failures onto runner errors.

use std::io;

use remoter_core::RunnerError;
use remoter_k8s::K8sError;

/// Failure to open an exec or log channel.
///
/// Authorization failures are fatal. Everything else is a connection fault
/// that reopening may cure.
pub(crate) fn open_error(destination: &str, err: K8sError) -> RunnerError {
	match err {
		K8sError::Unauthorized { message } => RunnerError::Unauthorized {
			destination: destination.to_string(),
			message,
		},
		K8sError::Timeout => RunnerError::ReadTimeout {
			destination: destination.to_string(),
		},
		other => RunnerError::Connection {
			destination: destination.to_string(),
			message: other.to_string(),
		},
	}
}

/// Failure of a control-plane call other than opening a channel.
pub(crate) fn api_error(destination: &str, err: K8sError) -> RunnerError {
	match err {
		K8sError::Unauthorized { message } => RunnerError::Unauthorized {
			destination: destination.to_string(),
			message,
		},
		K8sError::Transport { message } => RunnerError::Connection {
			destination: destination.to_string(),
			message,
		},
		K8sError::Timeout => RunnerError::ReadTimeout {
			destination: destination.to_string(),
		},
		K8sError::StreamError { message } => RunnerError::Protocol {
			destination: destination.to_string(),
			message,
		},
		other => RunnerError::Backend {
			destination: destination.to_string(),
			source: Box::new(other),
		},
	}
}

/// Failure while reading an open channel.
pub(crate) fn stream_error(destination: &str, err: io::Error) -> RunnerError {
	match err.kind() {
		io::ErrorKind::ConnectionReset
		| io::ErrorKind::ConnectionAborted
		| io::ErrorKind::BrokenPipe
		| io::ErrorKind::UnexpectedEof => RunnerError::ConnectionReset {
			destination: destination.to_string(),
			message: err.to_string(),
		},
		io::ErrorKind::TimedOut => RunnerError::ReadTimeout {
			destination: destination.to_string(),
		},
		_ => RunnerError::Protocol {
			destination: destination.to_string(),
			message: err.to_string(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use remoter_core::FaultKind;

	#[test]
	fn test_unauthorized_is_fatal() {
		let err = open_error(
			"pod/c",
			K8sError::Unauthorized {
				message: "token expired".into(),
			},
		);
		assert!(matches!(err, RunnerError::Unauthorized { .. }));
		assert_eq!(err.fault_kind(), None);
	}

	#[test]
	fn test_open_failures_are_connection_faults() {
		let err = open_error("pod/c", K8sError::PodNotFound { name: "pod".into() });
		assert_eq!(err.fault_kind(), Some(FaultKind::ConnectionFailed));
	}

	#[test]
	fn test_not_found_from_api_is_not_retryable() {
		let err = api_error("pod/c", K8sError::PodNotFound { name: "pod".into() });
		assert_eq!(err.fault_kind(), None);
	}

	#[test]
	fn test_stream_errors() {
		let reset = stream_error("p", io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
		assert_eq!(reset.fault_kind(), Some(FaultKind::ConnectionReset));
		let other = stream_error("p", io::Error::new(io::ErrorKind::InvalidData, "garbage"));
		assert_eq!(other.fault_kind(), Some(FaultKind::Protocol));
	}
}

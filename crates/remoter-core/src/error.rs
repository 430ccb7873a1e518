// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use thiserror::Error;

use crate::result::CommandResult;

/// Transient fault kinds. A runner retries only errors whose kind is listed
/// in its [`crate::RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
	ConnectionReset,
	Protocol,
	ReadTimeout,
	ConnectionFailed,
	MaxRetries,
	Worker,
}

impl FaultKind {
	pub const ALL: [FaultKind; 6] = [
		FaultKind::ConnectionReset,
		FaultKind::Protocol,
		FaultKind::ReadTimeout,
		FaultKind::ConnectionFailed,
		FaultKind::MaxRetries,
		FaultKind::Worker,
	];
}

/// Errors returned by runners and connections.
#[derive(Debug, Error)]
pub enum RunnerError {
	#[error("{destination}: connection failed: {message}")]
	Connection { destination: String, message: String },

	#[error("{destination}: connection reset: {message}")]
	ConnectionReset { destination: String, message: String },

	#[error("{destination}: protocol error: {message}")]
	Protocol { destination: String, message: String },

	#[error("{destination}: read timed out")]
	ReadTimeout { destination: String },

	#[error("{destination}: {operation} failed after {attempts} attempts: {source}")]
	MaxRetries {
		destination: String,
		operation: String,
		attempts: u32,
		#[source]
		source: Box<RunnerError>,
	},

	#[error("worker failed: {message}")]
	Worker { message: String },

	#[error("retryable network failure after {attempts} attempts: {source}")]
	RetryableNetwork {
		attempts: u32,
		#[source]
		source: Box<RunnerError>,
	},

	#[error("{destination}: unauthorized: {message}")]
	Unauthorized { destination: String, message: String },

	#[error("{destination}: failed with exit code {exit_code}")]
	DestinationFailed { destination: String, exit_code: i32 },

	#[error("{destination}: log stream cannot be established while the pod is alive")]
	LivenessExhausted { destination: String },

	#[error("{destination}: execution was interrupted by teardown")]
	Interrupted { destination: String },

	#[error("{destination}: {message}")]
	WaitTimeout { destination: String, message: String },

	#[error("Command did not complete within {} seconds!\n\nCommand: {command:?}", .timeout.as_secs_f64())]
	CommandTimedOut { command: String, timeout: Duration },

	#[error("{0}")]
	UnexpectedExit(Box<CommandResult>),

	#[error("{operation} is not implemented for {backend}")]
	NotImplemented {
		operation: &'static str,
		backend: &'static str,
	},

	#[error("{destination}: I/O error: {source}")]
	Io {
		destination: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{destination}: {source}")]
	Backend {
		destination: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},
}

impl RunnerError {
	/// The transient fault kind of this error, if it is one.
	pub fn fault_kind(&self) -> Option<FaultKind> {
		match self {
			RunnerError::Connection { .. } => Some(FaultKind::ConnectionFailed),
			RunnerError::ConnectionReset { .. } => Some(FaultKind::ConnectionReset),
			RunnerError::Protocol { .. } => Some(FaultKind::Protocol),
			RunnerError::ReadTimeout { .. } => Some(FaultKind::ReadTimeout),
			RunnerError::MaxRetries { .. } => Some(FaultKind::MaxRetries),
			RunnerError::Worker { .. } => Some(FaultKind::Worker),
			_ => None,
		}
	}

	/// The failed command's result, for non-zero exits.
	pub fn result(&self) -> Option<&CommandResult> {
		match self {
			RunnerError::UnexpectedExit(result) => Some(&**result),
			_ => None,
		}
	}
}

impl From<tokio::task::JoinError> for RunnerError {
	fn from(err: tokio::task::JoinError) -> Self {
		RunnerError::Worker {
			message: err.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transient_kinds() {
		let reset = RunnerError::ConnectionReset {
			destination: "pod/c".into(),
			message: "eof".into(),
		};
		assert_eq!(reset.fault_kind(), Some(FaultKind::ConnectionReset));

		let timeout = RunnerError::ReadTimeout {
			destination: "pod/c".into(),
		};
		assert_eq!(timeout.fault_kind(), Some(FaultKind::ReadTimeout));
	}

	#[test]
	fn test_fatal_kinds_have_no_fault_kind() {
		let fatal = [
			RunnerError::Unauthorized {
				destination: "pod/c".into(),
				message: "forbidden".into(),
			},
			RunnerError::DestinationFailed {
				destination: "pod".into(),
				exit_code: 1,
			},
			RunnerError::LivenessExhausted {
				destination: "pod".into(),
			},
			RunnerError::NotImplemented {
				operation: "send_files",
				backend: "pod",
			},
		];
		for err in fatal {
			assert_eq!(err.fault_kind(), None, "{err}");
		}
	}

	#[test]
	fn test_timed_out_message() {
		let err = RunnerError::CommandTimedOut {
			command: "sleep 10".into(),
			timeout: Duration::from_millis(1500),
		};
		assert!(err.to_string().contains("1.5 seconds"));
	}
}

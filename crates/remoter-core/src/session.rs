// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Driving one command over a connection from start to exit status.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::RunnerError;
use crate::result::{CommandResult, RunOptions};
use crate::watcher::{StreamKind, StreamWatcher};

/// Accumulated output of one stream.
struct OutputCapture<'a> {
	kind: StreamKind,
	destination: &'a str,
	verbose: bool,
	bytes: Vec<u8>,
	logged: usize,
}

impl<'a> OutputCapture<'a> {
	fn new(kind: StreamKind, destination: &'a str, verbose: bool) -> Self {
		Self {
			kind,
			destination,
			verbose,
			bytes: Vec::new(),
			logged: 0,
		}
	}

	fn push(&mut self, data: &[u8]) {
		self.bytes.extend_from_slice(data);
		if !self.verbose {
			return;
		}
		while let Some(pos) = self.bytes[self.logged..].iter().position(|b| *b == b'\n') {
			let end = self.logged + pos;
			self.log_line(self.logged, end);
			self.logged = end + 1;
		}
	}

	fn log_line(&self, start: usize, end: usize) {
		let line = String::from_utf8_lossy(&self.bytes[start..end]);
		match self.kind {
			StreamKind::Stdout => info!(destination = self.destination, "{line}"),
			StreamKind::Stderr => info!(destination = self.destination, stream = "stderr", "{line}"),
		}
	}

	/// The longest valid UTF-8 prefix of the output so far.
	fn text(&self) -> &str {
		match std::str::from_utf8(&self.bytes) {
			Ok(text) => text,
			Err(e) => std::str::from_utf8(&self.bytes[..e.valid_up_to()]).unwrap_or_default(),
		}
	}

	fn finish(self) -> String {
		if self.verbose && self.logged < self.bytes.len() {
			self.log_line(self.logged, self.bytes.len());
		}
		String::from_utf8_lossy(&self.bytes).into_owned()
	}
}

struct Output {
	stdout: String,
	stderr: String,
	exit_status: Option<i32>,
}

/// Run `command` on `connection` and collect its result.
///
/// The connection is stopped afterwards. On timeout it is killed instead and
/// [`RunnerError::CommandTimedOut`] is returned.
pub async fn run_session(
	connection: &dyn Connection,
	destination: &str,
	command: &str,
	options: &RunOptions,
) -> Result<CommandResult, RunnerError> {
	let started = Instant::now();
	if options.verbose {
		info!(destination, command, "Running command");
	} else {
		debug!(destination, command, "Running command");
	}

	let driven = match options.timeout {
		Some(limit) => {
			match tokio::time::timeout(limit, drive(connection, destination, command, options)).await {
				Ok(driven) => driven,
				Err(_) => {
					warn!(
						destination,
						command,
						timeout_secs = limit.as_secs_f64(),
						"command timed out, killing it"
					);
					if let Err(err) = connection.kill().await {
						warn!(destination, error = %err, "failed to kill timed out command");
					}
					return Err(RunnerError::CommandTimedOut {
						command: command.to_string(),
						timeout: limit,
					});
				}
			}
		}
		None => drive(connection, destination, command, options).await,
	};

	let output = match (driven, connection.stop().await) {
		(Ok(output), Ok(())) => output,
		(Ok(_), Err(err)) | (Err(err), Ok(())) => return Err(err),
		(Err(err), Err(stop_err)) => {
			warn!(destination, error = %stop_err, "failed to stop connection after error");
			return Err(err);
		}
	};

	let result = CommandResult {
		command: command.to_string(),
		stdout: output.stdout,
		stderr: output.stderr,
		exit_status: output.exit_status,
		duration: started.elapsed(),
		ignore_status: options.ignore_status,
	};

	let duration_ms = result.duration.as_millis() as u64;
	if options.verbose {
		info!(destination, exit_status = ?result.exit_status, duration_ms, "Command finished");
	} else {
		debug!(destination, exit_status = ?result.exit_status, duration_ms, "Command finished");
	}
	Ok(result)
}

async fn drive(
	connection: &dyn Connection,
	destination: &str,
	command: &str,
	options: &RunOptions,
) -> Result<Output, RunnerError> {
	connection.start(command).await?;

	let mut stdout = OutputCapture::new(StreamKind::Stdout, destination, options.verbose);
	let mut stderr = OutputCapture::new(StreamKind::Stderr, destination, options.verbose);

	while !connection.is_finished().await? {
		let data = connection.read_stdout().await?;
		if !data.is_empty() {
			stdout.push(&data);
			respond(connection, &options.watchers, &stdout).await?;
		}

		let data = connection.read_stderr().await?;
		if !data.is_empty() {
			stderr.push(&data);
			respond(connection, &options.watchers, &stderr).await?;
		}
	}

	let exit_status = connection.returncode().await?;
	Ok(Output {
		stdout: stdout.finish(),
		stderr: stderr.finish(),
		exit_status,
	})
}

async fn respond(
	connection: &dyn Connection,
	watchers: &[Arc<dyn StreamWatcher>],
	capture: &OutputCapture<'_>,
) -> Result<(), RunnerError> {
	for watcher in watchers {
		for response in watcher.submit(capture.kind, capture.text()) {
			connection.write_stdin(response.as_bytes()).await?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::VecDeque;
	use std::sync::Mutex;

	use async_trait::async_trait;

	use crate::watcher::Responder;

	/// Replays scripted stdout chunks and records stdin.
	#[derive(Default)]
	struct ScriptedConnection {
		chunks: Mutex<VecDeque<Vec<u8>>>,
		stdin: Mutex<Vec<u8>>,
		stopped: Mutex<u32>,
		exit: Option<i32>,
	}

	impl ScriptedConnection {
		fn new(chunks: &[&str], exit: Option<i32>) -> Self {
			Self {
				chunks: Mutex::new(chunks.iter().map(|c| c.as_bytes().to_vec()).collect()),
				exit,
				..Default::default()
			}
		}
	}

	#[async_trait]
	impl Connection for ScriptedConnection {
		async fn start(&self, _command: &str) -> Result<(), RunnerError> {
			Ok(())
		}

		async fn read_stdout(&self) -> Result<Vec<u8>, RunnerError> {
			Ok(self.chunks.lock().unwrap().pop_front().unwrap_or_default())
		}

		async fn read_stderr(&self) -> Result<Vec<u8>, RunnerError> {
			Ok(Vec::new())
		}

		async fn write_stdin(&self, data: &[u8]) -> Result<(), RunnerError> {
			self.stdin.lock().unwrap().extend_from_slice(data);
			Ok(())
		}

		async fn close_stdin(&self) -> Result<(), RunnerError> {
			Ok(())
		}

		async fn is_finished(&self) -> Result<bool, RunnerError> {
			Ok(self.chunks.lock().unwrap().is_empty())
		}

		async fn returncode(&self) -> Result<Option<i32>, RunnerError> {
			Ok(self.exit)
		}

		async fn stop(&self) -> Result<(), RunnerError> {
			*self.stopped.lock().unwrap() += 1;
			Ok(())
		}

		async fn kill(&self) -> Result<(), RunnerError> {
			self.stop().await
		}
	}

	#[tokio::test]
	async fn test_collects_output_in_order_and_stops() {
		let connection = ScriptedConnection::new(&["hel", "lo\nwor", "ld\n"], Some(0));
		let result = run_session(&connection, "test", "echo", &RunOptions::default())
			.await
			.unwrap();

		assert_eq!(result.stdout, "hello\nworld\n");
		assert_eq!(result.exit_status, Some(0));
		assert!(result.ok());
		assert_eq!(*connection.stopped.lock().unwrap(), 1);
	}

	#[tokio::test]
	async fn test_unknown_exit_status_is_not_ok() {
		let connection = ScriptedConnection::new(&["x"], None);
		let result = run_session(&connection, "test", "x", &RunOptions::default())
			.await
			.unwrap();
		assert_eq!(result.exit_status, None);
		assert!(result.failed());
	}

	#[tokio::test]
	async fn test_watchers_answer_on_stdin() {
		let connection = ScriptedConnection::new(&["Continue? ", "[y/N]", "\ndone\n"], Some(0));
		let responder = Arc::new(Responder::new(r"\[y/N\]", "y\n").unwrap());
		let options = RunOptions::default().watcher(responder);

		run_session(&connection, "test", "install", &options)
			.await
			.unwrap();

		assert_eq!(*connection.stdin.lock().unwrap(), b"y\n");
	}

	#[test]
	fn test_text_stops_at_partial_utf8() {
		let mut capture = OutputCapture::new(StreamKind::Stdout, "test", false);
		capture.push(&[b'o', b'k', 0xE2, 0x82]);
		assert_eq!(capture.text(), "ok");
		capture.push(&[0xAC]);
		assert_eq!(capture.text(), "ok\u{20ac}");
	}
}

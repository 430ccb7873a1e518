// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scripted in-memory control plane for tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use kube::ResourceExt;
use tokio::io::AsyncWrite;

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{ExecProcess, LogOptions, LogStream, Pod, PodStatus};

/// Log output served for a pod.
#[derive(Debug, Clone)]
pub struct LogScript {
	pub content: Vec<u8>,
	pub chunk_size: usize,
	/// For successive opens, how many chunks to deliver before the stream
	/// fails. Opens past the end of the list deliver everything.
	pub drop_after: VecDeque<usize>,
	/// Keep an intact stream open after the content instead of ending it.
	pub stall_at_end: bool,
}

impl LogScript {
	pub fn new(content: impl Into<Vec<u8>>, chunk_size: usize) -> Self {
		Self {
			content: content.into(),
			chunk_size: chunk_size.max(1),
			drop_after: VecDeque::new(),
			stall_at_end: false,
		}
	}

	pub fn drop_after(mut self, chunks: impl IntoIterator<Item = usize>) -> Self {
		self.drop_after.extend(chunks);
		self
	}

	pub fn stall_at_end(mut self) -> Self {
		self.stall_at_end = true;
		self
	}
}

/// Canned result of one exec call.
#[derive(Debug, Clone, Default)]
pub struct ExecReply {
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
	pub exit_code: Option<i32>,
}

impl ExecReply {
	pub fn exit(code: i32) -> Self {
		Self {
			exit_code: Some(code),
			..Default::default()
		}
	}

	pub fn stdout(mut self, data: impl Into<Vec<u8>>) -> Self {
		self.stdout = data.into();
		self
	}

	pub fn stderr(mut self, data: impl Into<Vec<u8>>) -> Self {
		self.stderr = data.into();
		self
	}
}

/// A recorded exec call.
#[derive(Debug, Clone)]
pub struct ExecCall {
	pub pod: String,
	pub namespace: String,
	pub container: Option<String>,
	pub command: Vec<String>,
	stdin: SharedBuffer,
}

impl ExecCall {
	/// Everything the caller wrote to the command's stdin.
	pub fn stdin(&self) -> Vec<u8> {
		self.stdin.contents()
	}
}

#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
	fn contents(&self) -> Vec<u8> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
	}
}

impl AsyncWrite for SharedBuffer {
	fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
		self
			.0
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.extend_from_slice(buf);
		Poll::Ready(Ok(buf.len()))
	}

	fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}

	fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
		Poll::Ready(Ok(()))
	}
}

#[derive(Default)]
struct MockState {
	pods: HashMap<String, Pod>,
	applied: Vec<Pod>,
	apply_status: Option<PodStatus>,
	get_pod_errors: VecDeque<K8sError>,
	get_pod_calls: usize,
	logs: HashMap<String, LogScript>,
	log_open_errors: VecDeque<K8sError>,
	log_opens: HashMap<String, usize>,
	exec_replies: VecDeque<Result<ExecReply, K8sError>>,
	exec_calls: Vec<ExecCall>,
}

/// A mock K8s client with scripted pods, logs and exec replies.
///
/// Pods are keyed by name only. Unscripted exec calls succeed with exit
/// code 0 and no output.
#[derive(Default)]
pub struct MockK8sClient {
	state: Mutex<MockState>,
}

impl MockK8sClient {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, MockState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Status given to every pod applied from now on.
	pub fn set_apply_status(&self, status: PodStatus) {
		self.state().apply_status = Some(status);
	}

	/// Replace the status of a pod, creating the pod if needed.
	pub fn set_pod_status(&self, name: &str, status: PodStatus) {
		let mut state = self.state();
		let pod = state.pods.entry(name.to_string()).or_insert_with(|| {
			let mut pod = Pod::default();
			pod.metadata.name = Some(name.to_string());
			pod
		});
		pod.status = Some(status);
	}

	pub fn push_get_pod_error(&self, err: K8sError) {
		self.state().get_pod_errors.push_back(err);
	}

	pub fn get_pod_calls(&self) -> usize {
		self.state().get_pod_calls
	}

	pub fn applied_pods(&self) -> Vec<Pod> {
		self.state().applied.clone()
	}

	pub fn set_logs(&self, pod: &str, script: LogScript) {
		self.state().logs.insert(pod.to_string(), script);
	}

	pub fn push_log_open_error(&self, err: K8sError) {
		self.state().log_open_errors.push_back(err);
	}

	pub fn log_opens(&self, pod: &str) -> usize {
		self.state().log_opens.get(pod).copied().unwrap_or(0)
	}

	pub fn push_exec_reply(&self, reply: ExecReply) {
		self.state().exec_replies.push_back(Ok(reply));
	}

	pub fn push_exec_error(&self, err: K8sError) {
		self.state().exec_replies.push_back(Err(err));
	}

	pub fn exec_calls(&self) -> Vec<ExecCall> {
		self.state().exec_calls.clone()
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn apply_pod(&self, _namespace: &str, mut pod: Pod) -> Result<Pod, K8sError> {
		let mut state = self.state();
		if let Some(status) = state.apply_status.clone() {
			pod.status = Some(status);
		}
		state.pods.insert(pod.name_any(), pod.clone());
		state.applied.push(pod.clone());
		Ok(pod)
	}

	async fn get_pod(&self, name: &str, _namespace: &str) -> Result<Pod, K8sError> {
		let mut state = self.state();
		state.get_pod_calls += 1;
		if let Some(err) = state.get_pod_errors.pop_front() {
			return Err(err);
		}
		state
			.pods
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::PodNotFound { name: name.into() })
	}

	async fn stream_logs(
		&self,
		name: &str,
		_namespace: &str,
		_container: Option<&str>,
		_opts: LogOptions,
	) -> Result<LogStream, K8sError> {
		let mut state = self.state();
		if let Some(err) = state.log_open_errors.pop_front() {
			return Err(err);
		}
		*state.log_opens.entry(name.to_string()).or_default() += 1;

		let Some(script) = state.logs.get_mut(name) else {
			return Err(K8sError::PodNotFound { name: name.into() });
		};
		let drop_after = script.drop_after.pop_front();

		let mut items: Vec<Result<Bytes, io::Error>> = script
			.content
			.chunks(script.chunk_size)
			.map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
			.collect();

		if let Some(keep) = drop_after {
			items.truncate(keep);
			items.push(Err(io::Error::new(
				io::ErrorKind::ConnectionReset,
				"log stream dropped",
			)));
			return Ok(Box::pin(futures::stream::iter(items)));
		}

		let stream = futures::stream::iter(items);
		if script.stall_at_end {
			Ok(Box::pin(futures::StreamExt::chain(
				stream,
				futures::stream::pending(),
			)))
		} else {
			Ok(Box::pin(stream))
		}
	}

	async fn exec(
		&self,
		name: &str,
		namespace: &str,
		container: Option<&str>,
		command: Vec<String>,
	) -> Result<ExecProcess, K8sError> {
		let mut state = self.state();
		let stdin = SharedBuffer::default();
		state.exec_calls.push(ExecCall {
			pod: name.to_string(),
			namespace: namespace.to_string(),
			container: container.map(str::to_string),
			command,
			stdin: stdin.clone(),
		});

		let reply = state
			.exec_replies
			.pop_front()
			.unwrap_or_else(|| Ok(ExecReply::exit(0)))?;
		let exit_code = reply.exit_code;

		Ok(ExecProcess::new(
			Some(Box::pin(stdin)),
			Some(Box::pin(io::Cursor::new(reply.stdout))),
			Some(Box::pin(io::Cursor::new(reply.stderr))),
			Some(Box::pin(async move { exit_code })),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::StreamExt;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio_test::assert_err;

	#[tokio::test]
	async fn test_log_stream_drops_after_scripted_chunks() {
		let mock = MockK8sClient::new();
		mock.set_logs("p", LogScript::new("abcdef", 2).drop_after([1]));

		let mut first = mock.stream_logs("p", "ns", None, LogOptions::default()).await.unwrap();
		assert_eq!(first.next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
		assert!(first.next().await.unwrap().is_err());

		let second: Vec<_> = mock
			.stream_logs("p", "ns", None, LogOptions::default())
			.await
			.unwrap()
			.collect()
			.await;
		assert_eq!(second.len(), 3);
		assert_eq!(mock.log_opens("p"), 2);
	}

	#[tokio::test]
	async fn test_exec_records_command_and_stdin() {
		let mock = MockK8sClient::new();
		mock.push_exec_reply(ExecReply::exit(3).stdout("out"));

		let mut process = mock
			.exec("p", "ns", Some("c"), vec!["sh".into(), "-c".into(), "cat".into()])
			.await
			.unwrap();
		process.stdin.as_mut().unwrap().write_all(b"payload").await.unwrap();

		let mut out = String::new();
		process.stdout.as_mut().unwrap().read_to_string(&mut out).await.unwrap();
		assert_eq!(out, "out");
		assert_eq!(process.status.take().unwrap().await, Some(3));

		let calls = mock.exec_calls();
		assert_eq!(calls[0].command, vec!["sh", "-c", "cat"]);
		assert_eq!(calls[0].stdin(), b"payload");
	}

	#[tokio::test]
	async fn test_get_pod_scripted_error_then_not_found() {
		let mock = MockK8sClient::new();
		mock.push_get_pod_error(K8sError::Timeout);
		assert!(matches!(assert_err!(mock.get_pod("p", "ns").await), K8sError::Timeout));
		assert!(matches!(
			assert_err!(mock.get_pod("p", "ns").await),
			K8sError::PodNotFound { .. }
		));
		assert_eq!(mock.get_pod_calls(), 2);
	}
}

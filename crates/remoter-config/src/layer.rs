// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	ExecConfigLayer, LoggingConfigLayer, PodWatcherConfigLayer, RetryConfigLayer,
};

/// Remoter configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoterConfigLayer {
	#[serde(default)]
	pub retry: Option<RetryConfigLayer>,
	#[serde(default)]
	pub exec: Option<ExecConfigLayer>,
	#[serde(default)]
	pub pod_watcher: Option<PodWatcherConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl RemoterConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: RemoterConfigLayer) {
		merge_option(&mut self.retry, other.retry, RetryConfigLayer::merge);
		merge_option(&mut self.exec, other.exec, ExecConfigLayer::merge);
		merge_option(
			&mut self.pod_watcher,
			other.pod_watcher,
			PodWatcherConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

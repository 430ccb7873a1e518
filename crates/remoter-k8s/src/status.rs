// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interpreting pod and exec status objects.

use crate::types::{PodStatus, Status};

const READY_CONDITION: &str = "Ready";
const REASON_POD_COMPLETED: &str = "PodCompleted";
const REASON_POD_FAILED: &str = "PodFailed";

/// Exit code of the pod's first container.
///
/// `None` while the pod is unscheduled, the container has no state yet or
/// is still running.
pub fn pod_exit_code(status: Option<&PodStatus>) -> Option<i32> {
	let container = status?.container_statuses.as_ref()?.first()?;
	let state = container.state.as_ref()?;
	state.terminated.as_ref().map(|terminated| terminated.exit_code)
}

/// The reason of the last `Ready` condition together with its status flag.
fn ready_condition(status: Option<&PodStatus>) -> Option<(bool, Option<&str>)> {
	status?
		.conditions
		.as_ref()?
		.iter()
		.filter(|condition| condition.type_ == READY_CONDITION)
		.last()
		.map(|condition| (condition.status == "True", condition.reason.as_deref()))
}

/// Whether the pod is running and ready, or has already run to completion.
pub fn is_ready_or_completed(status: Option<&PodStatus>) -> bool {
	match ready_condition(status) {
		Some((ready, reason)) => ready || reason == Some(REASON_POD_COMPLETED),
		None => false,
	}
}

/// Whether the pod has stopped running, successfully or not.
pub fn is_failed_or_completed(status: Option<&PodStatus>) -> bool {
	if pod_exit_code(status).is_some() {
		return true;
	}
	matches!(
		ready_condition(status),
		Some((_, Some(REASON_POD_FAILED | REASON_POD_COMPLETED)))
	)
}

/// Exit code reported on an exec channel's status.
///
/// A `Success` status means 0; a failure carries the code as the message of
/// its `ExitCode` cause.
pub fn exec_exit_code(status: &Status) -> Option<i32> {
	if status.status.as_deref() == Some("Success") {
		return Some(0);
	}
	status
		.details
		.as_ref()?
		.causes
		.as_ref()?
		.iter()
		.find(|cause| cause.reason.as_deref() == Some("ExitCode"))
		.and_then(|cause| cause.message.as_deref())
		.and_then(|message| message.trim().parse().ok())
}

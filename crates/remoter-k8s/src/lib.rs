// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! K8s control-plane abstraction for remoter runners.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - Pod and exec status interpretation
//! - Pod manifest templating and server-side apply
//! - A scripted in-memory client for tests

mod client;
mod error;
mod kube_client;
mod mock;
pub mod status;
mod template;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
pub use mock::{ExecCall, ExecReply, LogScript, MockK8sClient};
pub use template::{render_template, ManifestApplier, TemplateApplier};
pub use types::{
	ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStatus, ExecProcess,
	ExitStatusFuture, LogOptions, LogStream, Pod, PodCondition, PodStatus, Status,
};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kubernetes backends for remoter.
//!
//! - [`KubernetesCmdRunner`] runs commands in a running container over exec
//!   channels
//! - [`KubernetesPodRunner`] starts a pod per command from a template and
//!   follows its log with [`PodLogWatcher`]
//! - [`Remoter`] holds any backend, local ones included

mod cmd_runner;
mod error;
mod exec;
mod pod_runner;
mod pod_watcher;
mod remoter;
mod settings;

pub use cmd_runner::KubernetesCmdRunner;
pub use exec::{ExecConnection, PodTarget};
pub use pod_runner::KubernetesPodRunner;
pub use pod_watcher::{PodLauncher, PodLogWatcher, PodTemplate, IMAGE_VAR, POD_COMMAND_VAR, POD_NAME_VAR};
pub use remoter::Remoter;
pub use settings::{ExecSettings, PodWatcherSettings};

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod exec;
mod logging;
mod pod_watcher;
mod retry;

pub use exec::{ExecConfig, ExecConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use pod_watcher::{PodWatcherConfig, PodWatcherConfigLayer};
pub use retry::{RetryConfig, RetryConfigLayer};

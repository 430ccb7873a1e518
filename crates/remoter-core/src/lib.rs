// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Remote command execution core.
//!
//! A [`CommandRunner`] runs shell commands on a destination and returns a
//! [`CommandResult`]. Connection-based runners share [`RunnerCore`], which
//! caches a [`Connection`], drives each command with [`run_session`] and
//! reconnects on transient faults according to a [`RetryPolicy`].

pub mod channel;
mod connection;
mod context;
mod error;
mod local;
mod result;
mod retry;
mod runner;
mod session;
mod settings;
mod watcher;

pub use connection::Connection;
pub use context::RunnerContext;
pub use error::{FaultKind, RunnerError};
pub use local::{LocalCmdRunner, LocalConnection};
pub use result::{CommandResult, RunOptions};
pub use retry::{retrying, RetryPolicy};
pub use runner::{sudo_command, CommandRunner, RunnerCore, ROOT_USER};
pub use session::run_session;
pub use settings::RunnerSettings;
pub use watcher::{Responder, StreamKind, StreamWatcher};

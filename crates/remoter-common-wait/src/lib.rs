// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wait functions for conditions with high timing variance.
//!
//! This crate provides:
//! - [`wait_for`], which repeatedly evaluates a probe until it yields a truthy
//!   value, with an optional timeout and a fixed step between attempts
//! - [`wait_until`], the variant that always fails on timeout
//! - The [`Truthy`] trait used to decide when a probe result means "done"

mod error;
mod truthy;
mod wait;

pub use error::WaitError;
pub use truthy::Truthy;
pub use wait::{wait_for, wait_until, WaitOptions};

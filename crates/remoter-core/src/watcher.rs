// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reacting to command output while it runs.

use std::collections::HashMap;
use std::sync::Mutex;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
	Stdout,
	Stderr,
}

/// Observes a command's output and may answer on its stdin.
pub trait StreamWatcher: Send + Sync {
	/// Called with everything received so far on `kind`. Returned strings
	/// are written to the command's stdin in order.
	fn submit(&self, kind: StreamKind, stream: &str) -> Vec<String>;
}

/// Answers every new match of a pattern with a fixed response.
///
/// Each stream is scanned only past the point seen by the previous call, so
/// a prompt is answered once.
pub struct Responder {
	pattern: Regex,
	response: String,
	seen: Mutex<HashMap<StreamKind, usize>>,
}

impl Responder {
	pub fn new(pattern: &str, response: impl Into<String>) -> Result<Self, regex::Error> {
		Ok(Self {
			pattern: Regex::new(pattern)?,
			response: response.into(),
			seen: Mutex::new(HashMap::new()),
		})
	}
}

impl StreamWatcher for Responder {
	fn submit(&self, kind: StreamKind, stream: &str) -> Vec<String> {
		let mut seen = self
			.seen
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner);
		let index = seen.entry(kind).or_insert(0);
		let fresh = stream.get(*index..).unwrap_or_default();
		let matches = self.pattern.find_iter(fresh).count();
		*index = stream.len();
		vec![self.response.clone(); matches]
	}
}

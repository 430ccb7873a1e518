// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::RemoterConfigLayer;
use crate::sections::{
	ExecConfigLayer, LogFormat, LoggingConfigLayer, PodWatcherConfigLayer, RetryConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<RemoterConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<RemoterConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(RemoterConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/remoter/remoter.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<RemoterConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(RemoterConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: RemoterConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: REMOTER_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<RemoterConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(RemoterConfigLayer {
			retry: Some(load_retry_from_env()?),
			exec: Some(load_exec_from_env()?),
			pod_watcher: Some(load_pod_watcher_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_retry_from_env() -> Result<RetryConfigLayer, ConfigError> {
	Ok(RetryConfigLayer {
		run_attempts: env_parse("REMOTER_RETRY_RUN_ATTEMPTS")?,
		run_delay_secs: env_parse("REMOTER_RETRY_RUN_DELAY_SECS")?,
		transfer_attempts: env_parse("REMOTER_RETRY_TRANSFER_ATTEMPTS")?,
		transfer_delay_secs: env_parse("REMOTER_RETRY_TRANSFER_DELAY_SECS")?,
	})
}

fn load_exec_from_env() -> Result<ExecConfigLayer, ConfigError> {
	Ok(ExecConfigLayer {
		shell: env_var("REMOTER_EXEC_SHELL"),
		read_timeout_ms: env_parse("REMOTER_EXEC_READ_TIMEOUT_MS")?,
		read_chunk_size: env_parse("REMOTER_EXEC_READ_CHUNK_SIZE")?,
		status_timeout_secs: env_parse("REMOTER_EXEC_STATUS_TIMEOUT_SECS")?,
	})
}

fn load_pod_watcher_from_env() -> Result<PodWatcherConfigLayer, ConfigError> {
	Ok(PodWatcherConfigLayer {
		read_request_timeout_secs: env_parse("REMOTER_POD_WATCHER_READ_REQUEST_TIMEOUT_SECS")?,
		stream_ttl_secs: env_parse("REMOTER_POD_WATCHER_STREAM_TTL_SECS")?,
		liveness_polls: env_parse("REMOTER_POD_WATCHER_LIVENESS_POLLS")?,
		open_attempts: env_parse("REMOTER_POD_WATCHER_OPEN_ATTEMPTS")?,
		open_delay_secs: env_parse("REMOTER_POD_WATCHER_OPEN_DELAY_SECS")?,
		read_attempts: env_parse("REMOTER_POD_WATCHER_READ_ATTEMPTS")?,
		read_delay_secs: env_parse("REMOTER_POD_WATCHER_READ_DELAY_SECS")?,
		start_attempts: env_parse("REMOTER_POD_WATCHER_START_ATTEMPTS")?,
		start_delay_secs: env_parse("REMOTER_POD_WATCHER_START_DELAY_SECS")?,
		ready_timeout_secs: env_parse("REMOTER_POD_WATCHER_READY_TIMEOUT_SECS")?,
		ready_step_secs: env_parse("REMOTER_POD_WATCHER_READY_STEP_SECS")?,
		status_poll_interval_secs: env_parse("REMOTER_POD_WATCHER_STATUS_POLL_INTERVAL_SECS")?,
		stop_command: env_var("REMOTER_POD_WATCHER_STOP_COMMAND"),
		stop_timeout_secs: env_parse("REMOTER_POD_WATCHER_STOP_TIMEOUT_SECS")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = env_var("REMOTER_LOGGING_FORMAT")
		.map(|v| v.parse::<LogFormat>())
		.transpose()?;

	Ok(LoggingConfigLayer {
		level: env_var("REMOTER_LOGGING_LEVEL"),
		format,
	})
}

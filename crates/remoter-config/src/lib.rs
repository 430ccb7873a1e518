// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration for remoter runners.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Consistent environment variable naming (`REMOTER_<SECTION>_<FIELD>`)
//! - Tracing subscriber setup driven by the `logging` section
//!
//! # Usage
//!
//! ```ignore
//! use remoter_config::{init_tracing, load_config};
//!
//! let config = load_config()?;
//! init_tracing(&config.logging)?;
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
mod tracing_init;

pub use error::ConfigError;
pub use layer::RemoterConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
pub use tracing_init::init_tracing;

use tracing::{debug, info};

/// Fully resolved remoter configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoterConfig {
	pub retry: RetryConfig,
	pub exec: ExecConfig,
	pub pod_watcher: PodWatcherConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`REMOTER_*`)
/// 2. Config file (`/etc/remoter/remoter.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<RemoterConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<RemoterConfig, ConfigError> {
	let mut merged = RemoterConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<RemoterConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<RemoterConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = RemoterConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: RemoterConfigLayer) -> Result<RemoterConfig, ConfigError> {
	let config = RemoterConfig {
		retry: layer.retry.unwrap_or_default().finalize(),
		exec: layer.exec.unwrap_or_default().finalize(),
		pod_watcher: layer.pod_watcher.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		run_attempts = config.retry.run_attempts,
		run_delay_secs = config.retry.run_delay_secs,
		shell = %config.exec.shell,
		ready_timeout_secs = config.pod_watcher.ready_timeout_secs,
		stream_ttl_secs = config.pod_watcher.stream_ttl_secs,
		"Remoter configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &RemoterConfig) -> Result<(), ConfigError> {
	let attempts = [
		("retry.run_attempts", config.retry.run_attempts),
		("retry.transfer_attempts", config.retry.transfer_attempts),
		("pod_watcher.open_attempts", config.pod_watcher.open_attempts),
		("pod_watcher.read_attempts", config.pod_watcher.read_attempts),
		("pod_watcher.start_attempts", config.pod_watcher.start_attempts),
	];
	for (key, value) in attempts {
		if value == 0 {
			return Err(ConfigError::Validation(format!(
				"{key} must be at least 1"
			)));
		}
	}

	if config.exec.shell.trim().is_empty() {
		return Err(ConfigError::Validation(
			"exec.shell must not be empty".to_string(),
		));
	}

	if config.exec.read_chunk_size == 0 {
		return Err(ConfigError::Validation(
			"exec.read_chunk_size must be at least 1".to_string(),
		));
	}

	Ok(())
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;
use crate::sections::{LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&logging.level))
		.map_err(|e| ConfigError::InvalidValue {
			key: "logging.level".to_string(),
			message: e.to_string(),
		})?;

	let result = match logging.format {
		LogFormat::Json => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json())
			.try_init(),
		LogFormat::Compact => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact())
			.try_init(),
		LogFormat::Pretty => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer())
			.try_init(),
	};

	result.map_err(|e| ConfigError::Tracing(e.to_string()))
}

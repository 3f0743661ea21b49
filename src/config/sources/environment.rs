//! Environment variable source: STATESYNC_* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "STATESYNC";

/// Add environment variable overlay to builder.
/// `STATESYNC_ENGINE__LOCK_TIMEOUT_MS=500` sets `engine.lock_timeout_ms`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, DeliveryMode, DemoSettings, LogSettings, Settings};

/// Prefix for environment overrides, e.g. `FANOUT_BROKER__DELIVERY=buffered`.
pub const ENV_PREFIX: &str = "FANOUT";

/// Loads the configuration from `config/default` and the environment.
///
/// A `.env` file, if present, is loaded into the environment first. Values
/// missing from every source fall back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit file stem, without reading `.env`.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("demo.topics")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge())
}

pub mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    DatabaseSettings, LoggerSettings, MqttSettings, RegistrySettings, RelaySettings, ServerSettings,
    Settings,
};

const ENV_PREFIX: &str = "DEVICEHUB";

/// Loads the configuration from the default file and environment variables
/// (`DEVICEHUB__<SECTION>__<KEY>`), merged over default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as `load_config`, reading the optional file at `path` (extension
/// picked by the `config` crate).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    // every key is optional here, missing ones come from the defaults
    let partial: PartialSettings = builder.build()?.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{
    LinkSettings, LinkTiming, LogSettings, RouterSettings, ServerSettings, Settings,
};

/// File read when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Prefix of environment overrides, e.g. `POPROUTE_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "POPROUTE";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Like `load_config`, reading `path` instead of the default file.
/// An explicit path must exist; the default file is optional.
pub fn load_config_from(path: Option<&str>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::with_name(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("router.peers"),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge(Settings::default());
    settings.validate()?;
    Ok(settings)
}

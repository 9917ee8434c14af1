use config::{Config, Environment, File};
use std::path::PathBuf;

use crate::settings::Settings;
use crate::{ConfigError, Result};

/// Load settings from an optional TOML file layered with environment
/// variable overrides, e.g. `STRATA__REDIS__URL=redis://cache:6379`.
///
/// With no explicit path, a root-level `strata.toml` is used if present.
pub fn load(path: Option<&str>) -> Result<Settings> {
    let mut builder = Config::builder();
    match path {
        Some(p) => {
            let pathbuf = PathBuf::from(p);
            if pathbuf.exists() {
                builder = builder.add_source(File::from(pathbuf));
            }
        }
        None => {
            let default_path = PathBuf::from("strata.toml");
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("STRATA")
            .try_parsing(true)
            .separator("__"),
    );
    let cfg = builder
        .build()
        .map_err(|e| ConfigError::parse(format!("config build error: {e}")))?;
    let settings: Settings = cfg
        .try_deserialize()
        .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))?;
    settings.validate()?;
    Ok(settings)
}

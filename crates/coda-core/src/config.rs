//! Generic configuration I/O utilities
//!
//! Provides generic YAML configuration loading and saving that works
//! with any serializable configuration type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file.
///
/// If the file doesn't exist, returns the default config. If the file
/// exists but is invalid, logs a warning and returns the default
/// config.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("load_config: {:?} doesn't exist, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => {
                log::info!("load_config: loaded {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file.
///
/// Creates parent directories if they don't exist.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {:?}", parent))?;
    }

    let contents = serde_yaml::to_string(config).context("serializing config")?;
    std::fs::write(path, contents).with_context(|| format!("writing config to {:?}", path))?;

    log::info!("save_config: saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        name: String,
        depth: f64,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                name: String::from("default"),
                depth: 0.6,
            }
        }
    }

    #[test]
    fn missing_file_yields_default() {
        let loaded: Sample = load_config(Path::new("/nonexistent/coda-test.yaml"));
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("coda-config-test-{}", std::process::id()));
        let path = dir.join("sample.yaml");

        let config = Sample {
            name: String::from("custom"),
            depth: 0.25,
        };
        save_config(&config, &path).unwrap();
        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }
}

use crate::error::Error;
use crate::util::Result;
use config::{Config, Environment, File};
use rastercalc_datatypes::raster::TilingSpecification;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

/// Files read from the settings directory, later files override earlier ones
pub const SETTINGS_FILES: [&str; 2] = ["Settings-default.toml", "Settings.toml"];

/// Prefix of environment variables that override settings,
/// e.g. `RASTERCALC__ENGINE__TILE_WIDTH=256`
pub const ENVIRONMENT_PREFIX: &str = "RASTERCALC";

pub trait ConfigElement {
    const KEY: &'static str;
}

/// Builds the layered settings: built-in defaults, the settings files in `dir` and the
/// process environment.
pub fn load_settings<P: AsRef<Path>>(dir: P) -> Result<Config> {
    build_settings(dir.as_ref(), None)
}

fn build_settings(dir: &Path, environment: Option<HashMap<String, String>>) -> Result<Config> {
    let defaults = EngineSettings::default();

    let mut settings = Config::builder()
        .set_default("engine.tile_width", defaults.tile_width as u64)?
        .set_default("engine.tile_height", defaults.tile_height as u64)?
        .set_default("engine.num_threads", defaults.num_threads as u64)?;

    let files: Vec<File<_, _>> = SETTINGS_FILES
        .iter()
        .map(|f| dir.join(f))
        .filter(|p| p.exists())
        .map(File::from)
        .collect();

    tracing::debug!(?dir, number_of_files = files.len(), "loading settings");

    settings = settings.add_source(files);

    // Since variables contain underscores, groups are separated by double underscores `__`
    settings = settings.add_source(
        Environment::with_prefix(ENVIRONMENT_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(environment),
    );

    Ok(settings.build()?)
}

pub fn get_config<T>(settings: &Config, key: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    settings.get::<T>(key).map_err(Error::from)
}

pub fn get_config_element<T>(settings: &Config) -> Result<T>
where
    T: ConfigElement + DeserializeOwned,
{
    get_config(settings, T::KEY)
}

/// Tiling and threading of the computation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineSettings {
    pub tile_width: usize,
    pub tile_height: usize,
    /// `0` chooses the number of threads automatically
    pub num_threads: usize,
}

impl ConfigElement for EngineSettings {
    const KEY: &'static str = "engine";
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tile_width: 512,
            tile_height: 512,
            num_threads: 0,
        }
    }
}

impl EngineSettings {
    /// Loads the `engine` settings from `dir` and the environment
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        get_config_element(&load_settings(dir)?)
    }

    pub fn tiling_specification(&self) -> Result<TilingSpecification> {
        Ok(TilingSpecification::new(
            [self.tile_height, self.tile_width].into(),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn it_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let settings = build_settings(dir.path(), Some(HashMap::new())).unwrap();

        assert_eq!(
            get_config_element::<EngineSettings>(&settings).unwrap(),
            EngineSettings::default()
        );
    }

    #[test]
    fn files_and_environment_are_layered() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "Settings-default.toml",
            "[engine]\ntile_width = 128\ntile_height = 64\nnum_threads = 4\n",
        );
        write_file(dir.path(), "Settings.toml", "[engine]\ntile_height = 32\n");

        let environment: HashMap<String, String> = [(
            "RASTERCALC__ENGINE__NUM_THREADS".to_string(),
            "2".to_string(),
        )]
        .into_iter()
        .collect();

        let settings = build_settings(dir.path(), Some(environment)).unwrap();
        let engine: EngineSettings = get_config_element(&settings).unwrap();

        assert_eq!(
            engine,
            EngineSettings {
                tile_width: 128,
                tile_height: 32,
                num_threads: 2,
            }
        );
        assert_eq!(get_config::<usize>(&settings, "engine.tile_width").unwrap(), 128);
    }

    #[test]
    fn zero_tile_sizes_are_rejected() {
        let engine = EngineSettings {
            tile_width: 0,
            ..EngineSettings::default()
        };

        assert!(engine.tiling_specification().is_err());
        assert_eq!(
            EngineSettings::default()
                .tiling_specification()
                .unwrap()
                .tile_size_in_pixels(),
            [512, 512].into()
        );
    }

    #[test]
    fn the_workspace_defaults_are_loadable() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");

        let settings = build_settings(&dir, Some(HashMap::new())).unwrap();

        assert!(get_config_element::<EngineSettings>(&settings).is_ok());
    }
}

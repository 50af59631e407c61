use crate::{AppConfig, TreeDiffError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "treediff.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
}

/// Load `treediff.toml` from beside the executable when present, otherwise
/// from the per-user config directory
pub fn load_config() -> Result<LoadedConfig, TreeDiffError> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

/// Load configuration from an explicit file; a missing file yields defaults
pub fn load_config_from(path: &Path) -> Result<LoadedConfig, TreeDiffError> {
    let exists = path.exists();

    let config = if exists {
        let data = fs::read_to_string(path)?;
        toml::from_str(&data).map_err(|e| TreeDiffError::Serialization(e.to_string()))?
    } else {
        AppConfig::default()
    };

    Ok(LoadedConfig {
        config,
        path: path.to_path_buf(),
        exists,
    })
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), TreeDiffError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config)
        .map_err(|e| TreeDiffError::Serialization(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

fn resolve_config_path() -> Result<PathBuf, TreeDiffError> {
    if let Some(portable_path) = portable_config_path() {
        if portable_path.exists() {
            return Ok(portable_path);
        }
    }

    let dirs = ProjectDirs::from("", "aecs4u", "treediff")
        .ok_or_else(|| TreeDiffError::Config("Unable to determine config directory".to_string()))?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}

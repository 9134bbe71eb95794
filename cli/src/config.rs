use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

pub use farme_core::config::Config;

static CONFIG_REL_PATHS: [&str; 2] = [".farme/config.toml", "farme.toml"];

/// Load `explicit` if given, otherwise the first config found in `.`, `..`, the user config
/// directory or the home directory. No file means default settings.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::read(path).with_context(|| format!("Failed to read config file {}", path.display()));
    }
    let mut search_paths = vec![PathBuf::from("."), PathBuf::from("..")];
    search_paths.extend(dirs::config_dir());
    search_paths.extend(dirs::home_dir());
    find_in(&search_paths)
}

fn find_in(search_paths: &[PathBuf]) -> Result<Config> {
    for dir in search_paths {
        for rel_path in &CONFIG_REL_PATHS {
            let path = dir.join(rel_path);
            if path.exists() {
                debug!(path = %path.display(), "using config file");
                return Config::read(&path).with_context(|| format!("Failed to read config file {}", path.display()));
            }
        }
    }
    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_first_match_wins() -> Result<()> {
        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        fs::create_dir_all(first.path().join(".farme"))?;
        fs::write(first.path().join(".farme/config.toml"), "[app.paths]\nmodels = \"app/models\"\n")?;
        fs::write(second.path().join("farme.toml"), "[app.paths]\nmodels = \"elsewhere\"\n")?;

        let config = find_in(&[second.path().to_path_buf(), first.path().to_path_buf()])?;
        assert_eq!(config.paths()?.models, PathBuf::from("elsewhere"));
        let config = find_in(&[first.path().to_path_buf()])?;
        assert_eq!(config.paths()?.models, PathBuf::from("app/models"));
        Ok(())
    }

    #[test]
    fn test_missing_config_is_default() -> Result<()> {
        let empty = tempfile::tempdir()?;
        assert_eq!(find_in(&[empty.path().to_path_buf()])?, Config::default());
        Ok(())
    }
}

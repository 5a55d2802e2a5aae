//! Locating and loading `vshim.toml` for a command.

use std::path::{Path, PathBuf};

use vshim_config::{load_config, ShimConfig, CONFIG_FILE_NAME};

/// Walks up from `start` to the first directory containing `vshim.toml`.
pub fn find_config_dir(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE_NAME).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE_NAME} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the configuration directory from a `--config` argument.
///
/// A file path resolves to its parent directory; a directory to itself.
/// Without an argument, walks up from the current directory.
pub fn resolve_config_dir(config: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match config {
        Some(path) => {
            let p = PathBuf::from(path);
            if p.is_file() {
                Ok(p.parent()
                    .map(Path::to_path_buf)
                    .filter(|d| !d.as_os_str().is_empty())
                    .unwrap_or_else(|| PathBuf::from(".")))
            } else {
                Ok(p)
            }
        }
        None => find_config_dir(&std::env::current_dir()?),
    }
}

/// Loads the configuration for a command, returning it with its directory.
pub fn load(config: Option<&str>) -> Result<(ShimConfig, PathBuf), Box<dyn std::error::Error>> {
    let dir = resolve_config_dir(config)?;
    let shim = load_config(&dir)?;
    Ok((shim, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONFIG: &str = "[model]\nname = \"Adder\"\nreference = \"adder\"\n";

    #[test]
    fn find_in_parent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("vshim.toml"), CONFIG).unwrap();
        let sub = tmp.path().join("build").join("obj");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_config_dir(&sub).unwrap(), tmp.path());
    }

    #[test]
    fn find_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_config_dir(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("could not find vshim.toml"));
    }

    #[test]
    fn config_file_resolves_to_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("vshim.toml");
        fs::write(&file, CONFIG).unwrap();
        let dir = resolve_config_dir(file.to_str()).unwrap();
        assert_eq!(dir, tmp.path());
        let (config, _) = load(file.to_str()).unwrap();
        assert_eq!(config.model.name, "Adder");
    }

    #[test]
    fn config_dir_used_as_is() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = resolve_config_dir(tmp.path().to_str()).unwrap();
        assert_eq!(dir, tmp.path());
        assert!(load(tmp.path().to_str()).is_err());
    }
}

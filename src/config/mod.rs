use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

pub const MODELS_DIR_NAME: &str = "models";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub models_dir: PathBuf,
}

impl AppConfig {
    pub fn from_override(path: Option<PathBuf>) -> Result<Self> {
        let models_dir = match path {
            Some(custom) => canonicalize_dir(&custom)?,
            None => default_models_dir()?,
        };
        Ok(Self { models_dir })
    }
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to resolve models directory at {:?}", path))?;
    if canonical.is_dir() {
        Ok(canonical)
    } else {
        Err(anyhow!("models path {:?} is not a directory", canonical))
    }
}

/// First `models` directory in `start` or one of its ancestors.
pub fn find_models_dir(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(MODELS_DIR_NAME);
        candidate.is_dir().then_some(candidate)
    })
}

fn default_models_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("unable to resolve current executable path")?;
    if let Some(found) = find_models_dir(&exe) {
        return Ok(found);
    }
    let cwd = std::env::current_dir().context("unable to resolve current directory")?;
    find_models_dir(&cwd).ok_or_else(|| {
        anyhow!("could not locate a models directory near the binary or the current directory; pass --models")
    })
}

#[cfg(test)]
mod tests {
    use super::{find_models_dir, AppConfig};
    use tempfile::TempDir;

    #[test]
    fn discovers_models_dir_in_ancestor() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("models")).unwrap();
        let nested = root.path().join("target").join("release");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_models_dir(&nested).unwrap();
        assert_eq!(found, root.path().join("models"));
    }

    #[test]
    fn nothing_found_without_models_dir() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a");
        std::fs::create_dir(&nested).unwrap();
        let found = find_models_dir(&nested);
        assert!(found.map_or(true, |dir| !dir.starts_with(root.path())));
    }

    #[test]
    fn accepts_override() {
        let root = TempDir::new().unwrap();
        let config = AppConfig::from_override(Some(root.path().to_path_buf())).unwrap();
        assert_eq!(config.models_dir, root.path().canonicalize().unwrap());
    }

    #[test]
    fn rejects_missing_override() {
        let root = TempDir::new().unwrap();
        assert!(AppConfig::from_override(Some(root.path().join("absent"))).is_err());
    }
}

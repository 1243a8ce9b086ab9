//! Housekeeping commands: `init`, `config` and `version`

use crate::config::Config;
use crate::error::{ParleyError, Result};
use std::path::Path;

/// Field name that prints the config file location instead of a value
pub const CONFIG_FILE_FIELD: &str = "config_file";

/// Run `parley init`: write the default configuration to `path`
///
/// A `sessions/` directory is created next to the file, since that is where
/// sessions go when the config names no directory.
///
/// # Errors
///
/// Returns an error if the file already exists and `force` is not set, or
/// if anything cannot be written.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    Config::write_default(path, force)?;

    let sessions_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("sessions");
    std::fs::create_dir_all(&sessions_dir).map_err(ParleyError::from)?;

    println!("Configuration file created at: {}", path.display());
    println!("Sessions directory: {}", sessions_dir.display());
    Ok(())
}

/// Render `parley config [field]`
///
/// Without a field the whole effective configuration is shown, preceded by
/// the file it was read from.
///
/// # Errors
///
/// Returns `ParleyError::InvalidArgument` for an unknown field.
pub fn show_config(config: &Config, config_path: Option<&Path>, field: Option<&str>) -> Result<String> {
    let location = match config_path {
        Some(path) if path.is_file() => path.display().to_string(),
        Some(path) => format!("{} (not found, using defaults)", path.display()),
        None => "(none)".to_string(),
    };

    match field {
        Some(CONFIG_FILE_FIELD) => Ok(location),
        Some(field) => config.render(Some(field)),
        None => Ok(format!("# {}: {}\n{}", CONFIG_FILE_FIELD, location, config.render(None)?)),
    }
}

/// Text printed by `parley version`
pub fn version_text(short: bool) -> String {
    let version = env!("CARGO_PKG_VERSION");
    if short {
        version.to_string()
    } else {
        format!(
            "{} {}\n{}",
            env!("CARGO_PKG_NAME"),
            version,
            env!("CARGO_PKG_DESCRIPTION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind;

    #[test]
    fn test_init_config_creates_file_and_sessions_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley").join("config.yaml");

        init_config(&path, false).unwrap();

        assert!(path.is_file());
        assert!(dir.path().join("parley").join("sessions").is_dir());
        let err = init_config(&path, false).unwrap_err();
        assert!(matches!(kind(&err), Some(ParleyError::Config(_))));
    }

    #[test]
    fn test_show_config_whole_and_single_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "{}").unwrap();
        let mut config = Config::default();
        config.providers.anthropic.token = Some("ant-api-0123456789".to_string());

        let all = show_config(&config, Some(&path), None).unwrap();
        assert!(all.starts_with(&format!("# config_file: {}", path.display())));
        assert!(all.contains("ant-...6789"));
        assert!(!all.contains("ant-api-0123456789"));

        assert_eq!(
            show_config(&config, Some(&path), Some("config_file")).unwrap(),
            path.display().to_string()
        );
        assert_eq!(
            show_config(&config, Some(&path), Some("providers.ollama.host")).unwrap(),
            "http://localhost:11434"
        );
    }

    #[test]
    fn test_show_config_notes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let shown = show_config(&Config::default(), Some(&path), Some("config_file")).unwrap();
        assert!(shown.contains("not found"));
    }

    #[test]
    fn test_version_text() {
        assert_eq!(version_text(true), env!("CARGO_PKG_VERSION"));
        assert!(version_text(false).starts_with(&format!("parley {}", env!("CARGO_PKG_VERSION"))));
    }
}

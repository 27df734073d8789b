//! Configuration loader with XDG-compliant path resolution
//!
//! Loads configuration from multiple locations with layered priority:
//! 1. `/etc/shellrun/config.toml` (lowest priority)
//! 2. `~/.config/shellrun/config.toml`
//! 3. `~/.shellrun.toml`
//! 4. `./.shellrun.toml`
//! 5. an explicit `--config` file
//! 6. `SHELLRUN_` environment variables (highest priority)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

/// Application name used for XDG directories
const APP_NAME: &str = "shellrun";

/// Prefix for environment overrides, e.g. `SHELLRUN_DEFAULTS__TIMEOUT_MS`
pub const ENV_PREFIX: &str = "SHELLRUN_";

/// Get XDG config search paths in priority order (lowest to highest)
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(format!("/etc/{}/config.toml", APP_NAME))];

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{}.toml", APP_NAME)));
    }

    paths.push(PathBuf::from(format!(".{}.toml", APP_NAME)));

    paths
}

/// Load configuration with XDG layering
///
/// Files are merged lowest to highest priority, then `override_path`,
/// then environment variables with prefix `SHELLRUN_` (`__` separates
/// nesting: `SHELLRUN_DEFAULTS__SHELL=bash`). A missing override file is
/// an error, since the caller asked for it by name.
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    for path in config_paths() {
        if path.exists() {
            tracing::debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }
    }

    if let Some(path) = override_path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        tracing::debug!("Loading override config from: {}", path.display());
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment.extract().context("Failed to load configuration")
}

/// Find all existing config files (for introspection)
pub fn find_config_files() -> Vec<PathBuf> {
    config_paths().into_iter().filter(|p| p.exists()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::shell::ShellKind;

    #[test]
    fn test_config_paths_order() {
        let paths = config_paths();

        assert!(paths.len() >= 2);
        assert!(paths[0].to_string_lossy().starts_with("/etc/shellrun"));
        assert_eq!(paths.last().unwrap(), &PathBuf::from(".shellrun.toml"));
    }

    #[test]
    fn test_load_config_from_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "shellrun.toml",
                r#"
                [defaults]
                shell = "bash"
                timeout_ms = 1234

                [shells]
                bash = "/usr/local/bin/bash"
                "#,
            )?;

            let config =
                load_config(Some(Path::new("shellrun.toml"))).map_err(|e| e.to_string())?;

            assert_eq!(config.defaults.shell, ShellKind::Bash);
            assert_eq!(config.defaults.timeout_ms, 1234);
            assert_eq!(config.shells.bash, "/usr/local/bin/bash");
            assert_eq!(config.shells.sh, "sh");
            Ok(())
        });
    }

    #[test]
    fn test_missing_override_is_error() {
        let err = load_config(Some(Path::new("/nonexistent/shellrun.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_override_is_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.toml", "[defaults]\nmax_concurrent = \"many\"\n")?;

            assert!(load_config(Some(Path::new("bad.toml"))).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SHELLRUN_DEFAULTS__MAX_CONCURRENT", "3");
            jail.set_env("SHELLRUN_CONTEXT__EXECUTION_POLICY", "AllSigned");

            let config = load_config(None).map_err(|e| e.to_string())?;

            assert_eq!(config.defaults.max_concurrent, 3);
            assert_eq!(config.context.execution_policy, "AllSigned");
            Ok(())
        });
    }

    #[test]
    fn test_env_beats_override_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "override.toml",
                r#"
                [defaults]
                timeout_ms = 100
                "#,
            )?;
            jail.set_env("SHELLRUN_DEFAULTS__TIMEOUT_MS", "200");

            let config =
                load_config(Some(Path::new("override.toml"))).map_err(|e| e.to_string())?;

            assert_eq!(config.defaults.timeout_ms, 200);
            Ok(())
        });
    }

    #[test]
    fn test_project_file_is_picked_up() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(".shellrun.toml", "[defaults]\nmax_concurrent = 7\n")?;

            let config = load_config(None).map_err(|e| e.to_string())?;

            assert_eq!(config.defaults.max_concurrent, 7);
            Ok(())
        });
    }
}

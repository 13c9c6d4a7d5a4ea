//! Config file discovery and the environment overlay.
//!
//! Resolution order (later overrides earlier):
//! 1. The config file: an explicit `--config` path, else `./parcelgate.toml`,
//!    else `~/.config/parcelgate/config.toml`
//! 2. Environment variables (see [`ENV_KEYS`])
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{AuthStrategy, ConfigError, ParcelgateConfig, QuoteMode, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "parcelgate.toml";

/// Default config filename within the XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "parcelgate";

/// Environment variables recognized by the overlay.
pub const ENV_KEYS: &[&str] = &[
    "PORT",
    "BIND_ADDRESS",
    "AUTH_STRATEGY",
    "ANDREANI_API_KEY",
    "ANDREANI_LOGIN_URL",
    "ANDREANI_TOKEN_URL",
    "ANDREANI_CLIENT_ID",
    "ANDREANI_REDIRECT_URI",
    "ANDREANI_SCOPE",
    "ANDREANI_TOKEN",
    "ANDREANI_TARIFF_URL",
    "ANDREANI_QUOTE_URL",
    "ANDREANI_SHIPMENT_URL",
    "ANDREANI_ORIGIN_POSTAL_CODE",
    "QUOTE_SHAPE",
    "PUPPETEER_EXECUTABLE_PATH",
    "CHROME_PATH",
];

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ParcelgateConfig,
    /// File the config was read from, if any.
    pub source: Option<PathBuf>,
    /// Environment variables that overrode file values.
    pub env_overrides: Vec<String>,
}

/// Load configuration from disk and the process environment, then validate.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(explicit, None, None, |key| std::env::var(key).ok())
}

/// Load configuration with explicit control over every input.
///
/// `project_dir` replaces the working directory and `config_dir` the
/// platform config directory when searching for files. `env` looks up
/// environment variables.
pub fn load_config_with_options<F>(
    explicit: Option<&Path>,
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let (mut config, source) = match explicit {
        Some(path) => (load_config_file(path)?, Some(path.to_path_buf())),
        None => match discover_config_file(project_dir, config_dir) {
            Some(path) => (load_config_file(&path)?, Some(path)),
            None => (ParcelgateConfig::new(), None),
        },
    };

    let env_overrides = apply_env(&mut config, env)?;
    config.validate()?;

    Ok(LoadedConfig {
        config,
        source,
        env_overrides,
    })
}

/// First config file that exists: project-local, then user config.
pub fn discover_config_file(project_dir: Option<&Path>, config_dir: Option<&Path>) -> Option<PathBuf> {
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    if project_path.is_file() {
        return Some(project_path);
    }

    let user_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    user_path.filter(|p| p.is_file())
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<ParcelgateConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    ParcelgateConfig::from_toml(&contents)
}

/// Get the XDG config file path for parcelgate.
pub fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME).join(USER_CONFIG_FILE))
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Overlay environment variables onto `config`. Empty values are ignored.
///
/// Returns the names of the variables that were applied.
pub fn apply_env<F>(config: &mut ParcelgateConfig, env: F) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = Vec::new();

    for key in ENV_KEYS {
        let Some(value) = env(key).filter(|v| !v.trim().is_empty()) else {
            continue;
        };

        match *key {
            "PORT" => config.server.port = parse(key, &value)?,
            "BIND_ADDRESS" => config.server.bind = value,
            "AUTH_STRATEGY" => config.auth.strategy = parse::<AuthStrategy>(key, &value)?,
            "ANDREANI_API_KEY" => config.carrier.api_key = Some(value),
            "ANDREANI_LOGIN_URL" => config.auth.login_url = Some(value),
            "ANDREANI_TOKEN_URL" => config.auth.token_url = Some(value),
            "ANDREANI_CLIENT_ID" => config.auth.client_id = Some(value),
            "ANDREANI_REDIRECT_URI" => config.auth.redirect_uri = Some(value),
            "ANDREANI_SCOPE" => config.auth.scope = Some(value),
            "ANDREANI_TOKEN" => config.auth.static_token = Some(value),
            "ANDREANI_TARIFF_URL" => config.carrier.tariff_url = value,
            "ANDREANI_QUOTE_URL" => config.carrier.quote_url = Some(value),
            "ANDREANI_SHIPMENT_URL" => config.carrier.shipment_url = value,
            "ANDREANI_ORIGIN_POSTAL_CODE" => {
                config.carrier.default_origin_postal_code = Some(value)
            }
            "QUOTE_SHAPE" => config.carrier.quote_shape = parse::<QuoteMode>(key, &value)?,
            // CHROME_PATH only fills in when PUPPETEER_EXECUTABLE_PATH did not.
            "PUPPETEER_EXECUTABLE_PATH" => {
                config.auth.browser_executable = Some(PathBuf::from(value))
            }
            "CHROME_PATH" => {
                if applied.iter().any(|k| k == "PUPPETEER_EXECUTABLE_PATH") {
                    continue;
                }
                config.auth.browser_executable = Some(PathBuf::from(value))
            }
            _ => continue,
        }
        applied.push(key.to_string());
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/parcelgate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("parcelgate.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();

        let loaded =
            load_config_with_options(None, Some(project.path()), Some(user.path()), no_env)
                .unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config.server.port, 3000);
        assert!(loaded.env_overrides.is_empty());
    }

    #[test]
    fn test_project_file_wins_over_user_file() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("parcelgate.toml"), "[server]\nport = 4000\n").unwrap();
        fs::write(user.path().join("config.toml"), "[server]\nport = 5000\n").unwrap();

        let loaded =
            load_config_with_options(None, Some(project.path()), Some(user.path()), no_env)
                .unwrap();
        assert_eq!(loaded.config.server.port, 4000);
        assert_eq!(
            loaded.source.as_deref(),
            Some(project.path().join("parcelgate.toml").as_path())
        );
    }

    #[test]
    fn test_user_file_used_when_no_project_file() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(user.path().join("config.toml"), "[server]\nport = 5000\n").unwrap();

        let loaded =
            load_config_with_options(None, Some(project.path()), Some(user.path()), no_env)
                .unwrap();
        assert_eq!(loaded.config.server.port, 5000);
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let err = load_config_with_options(
            Some(Path::new("/nonexistent/custom.toml")),
            None,
            None,
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
[server]
port = 4000

[auth]
strategy = "static"

[carrier]
tariff_url = "https://file.example.com/tarifas"
"#,
        )
        .unwrap();

        let env = env_from(&[
            ("PORT", "8081"),
            ("AUTH_STRATEGY", "rest"),
            ("ANDREANI_LOGIN_URL", "https://idp.example.com/login"),
            ("ANDREANI_TARIFF_URL", "https://env.example.com/tarifas"),
            ("ANDREANI_API_KEY", "k"),
        ]);
        let loaded = load_config_with_options(Some(&path), None, None, env).unwrap();

        assert_eq!(loaded.config.server.port, 8081);
        assert_eq!(loaded.config.auth.strategy, AuthStrategy::Rest);
        assert_eq!(
            loaded.config.carrier.tariff_url,
            "https://env.example.com/tarifas"
        );
        assert_eq!(loaded.config.carrier.api_key.as_deref(), Some("k"));
        assert!(loaded.env_overrides.contains(&"PORT".to_string()));
    }

    #[test]
    fn test_env_invalid_port() {
        let mut config = ParcelgateConfig::new();
        let err = apply_env(&mut config, env_from(&[("PORT", "eighty")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_env_empty_values_ignored() {
        let mut config = ParcelgateConfig::new();
        let applied = apply_env(&mut config, env_from(&[("ANDREANI_API_KEY", "  ")])).unwrap();
        assert!(applied.is_empty());
        assert!(config.carrier.api_key.is_none());
    }

    #[test]
    fn test_puppeteer_path_wins_over_chrome_path() {
        let mut config = ParcelgateConfig::new();
        apply_env(
            &mut config,
            env_from(&[
                ("PUPPETEER_EXECUTABLE_PATH", "/opt/chrome/puppeteer"),
                ("CHROME_PATH", "/usr/bin/chromium"),
            ]),
        )
        .unwrap();
        assert_eq!(
            config.auth.browser_executable,
            Some(PathBuf::from("/opt/chrome/puppeteer"))
        );

        let mut config = ParcelgateConfig::new();
        apply_env(&mut config, env_from(&[("CHROME_PATH", "/usr/bin/chromium")])).unwrap();
        assert_eq!(
            config.auth.browser_executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_env_quote_shape_and_validation() {
        let env = env_from(&[("QUOTE_SHAPE", "private")]);
        let err = load_config_with_options(
            None,
            Some(TempDir::new().unwrap().path()),
            Some(TempDir::new().unwrap().path()),
            env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }
}

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Every key is optional. The share code is never read from the file; it
//! comes from `--share-code` or `DEXCOM_SHARE_CODE` only.

use clarity_client::PollOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked for in the working directory when no path is given.
const DEFAULT_CONFIG_FILE: &str = "clarity-download.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub polling: PollingConfig,
    pub output: OutputConfig,
}

/// Portal connection settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

/// Report completion polling
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Absent means poll until the report completes
    pub max_attempts: Option<u32>,
}

/// Output filename templates. `DATERANGE` is replaced with the interval.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_file_name: String,
    pub report_file_name: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: clarity_auth::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_attempts: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_file_name: "clarity_data_DATERANGE.csv".to_string(),
            report_file_name: "clarity_report_DATERANGE.pdf".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the resolved path, or fall back to defaults.
    ///
    /// A file named via `--config` or `CONFIG_PATH` must exist. The default
    /// file in the working directory is optional.
    pub fn load_or_default(cli_path: Option<&Path>) -> common::Result<Self> {
        let (path, explicit) = Self::resolve_path(cli_path);
        if explicit || path.exists() {
            Self::load(&path).map_err(|e| match e {
                common::Error::Io(io) => common::Error::Config(format!(
                    "failed to read config file {}: {io}",
                    path.display()
                )),
                other => other,
            })
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag says whether the path was asked for explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }

    /// Check values that deserialize fine but make no sense.
    pub fn validate(&self) -> common::Result<()> {
        validate_base_url(&self.portal.base_url)?;

        if self.portal.timeout_secs == 0 {
            return Err(common::Error::Config(
                "portal.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.polling.interval_ms == 0 {
            return Err(common::Error::Config(
                "polling.interval_ms must be greater than 0".into(),
            ));
        }

        if self.polling.max_attempts == Some(0) {
            return Err(common::Error::Config(
                "polling.max_attempts must be greater than 0 when set".into(),
            ));
        }

        for (key, template) in [
            ("output.csv_file_name", &self.output.csv_file_name),
            ("output.report_file_name", &self.output.report_file_name),
        ] {
            if template.trim().is_empty() {
                return Err(common::Error::Config(format!("{key} must not be empty")));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.portal.timeout_secs)
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_attempts: self.polling.max_attempts,
        }
    }
}

/// Portal base URL must carry an http(s) scheme.
pub fn validate_base_url(url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "portal.base_url must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("clarity-download.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.portal.base_url, "https://clarity.dexcom.com");
        assert_eq!(config.portal.timeout_secs, 60);
        assert_eq!(config.polling.interval_ms, 1000);
        assert!(config.polling.max_attempts.is_none());
        assert_eq!(config.output.csv_file_name, "clarity_data_DATERANGE.csv");
        assert_eq!(config.output.report_file_name, "clarity_report_DATERANGE.pdf");
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[portal]
base_url = "http://127.0.0.1:9000"
timeout_secs = 5

[polling]
interval_ms = 250
max_attempts = 120

[output]
csv_file_name = "glucose_DATERANGE.csv"
report_file_name = "report_DATERANGE.pdf"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.portal.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        let poll = config.poll_options();
        assert_eq!(poll.interval, Duration::from_millis(250));
        assert_eq!(poll.max_attempts, Some(120));
        assert_eq!(config.output.csv_file_name, "glucose_DATERANGE.csv");
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[portal]\nbase_url = \"clarity.dexcom.com\"\n");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for contents in [
            "[portal]\ntimeout_secs = 0\n",
            "[polling]\ninterval_ms = 0\n",
            "[polling]\nmax_attempts = 0\n",
            "[output]\ncsv_file_name = \"  \"\n",
        ] {
            let path = write_config(&dir, contents);
            assert!(Config::load(&path).is_err(), "{contents:?} must be rejected");
        }
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let (path, explicit) = Config::resolve_path(Some(Path::new("/custom/path.toml")));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
        assert!(explicit);
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let (path, explicit) = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        assert!(explicit);
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let (path, _) = Config::resolve_path(Some(Path::new("/cli/wins.toml")));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default_is_implicit() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let (path, explicit) = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("clarity-download.toml"));
        assert!(!explicit);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let result = Config::load_or_default(Some(Path::new("/nonexistent/clarity.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("/nonexistent/clarity.toml"), "got: {err}");
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[polling]\nmax_attempts = 9\n");
        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.polling.max_attempts, Some(9));
    }
}

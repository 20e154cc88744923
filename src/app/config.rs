//! Client configuration: parse/write `client.conf`.
//!
//! The file uses the same `key = value` format as the theme and keybinding
//! files. Unknown keys are ignored; malformed values are reported so a typo
//! does not silently point the client at the wrong service.
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::state::RefreshOrdering;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid value for `{key}`: {value}")]
    InvalidValue {
        path: PathBuf,
        line: usize,
        key: String,
        value: String,
    },
}

/// Settings for talking to the user service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root; `/users` is appended.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// How overlapping refreshes are resolved.
    pub refresh_ordering: RefreshOrdering,
    /// Request the collection as `/users/` instead of `/users`.
    pub trailing_slash: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            refresh_ordering: RefreshOrdering::LatestIssued,
            trailing_slash: false,
        }
    }
}

impl ClientConfig {
    /// Load from `path`, starting from defaults and overriding known keys.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, '=');
            let key = parts.next().map(|s| s.trim()).unwrap_or("");
            let val = parts.next().map(|s| s.trim()).unwrap_or("");
            if key.is_empty() || val.is_empty() {
                continue;
            }
            let invalid = || ConfigError::InvalidValue {
                path: path.to_path_buf(),
                line: idx + 1,
                key: key.to_string(),
                value: val.to_string(),
            };
            match key {
                "api_url" => cfg.api_url = val.to_string(),
                "timeout_secs" => {
                    let secs = val.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(invalid)?;
                    cfg.timeout = Duration::from_secs(secs);
                }
                "refresh_ordering" => {
                    cfg.refresh_ordering = parse_ordering(val).ok_or_else(invalid)?;
                }
                "trailing_slash" => cfg.trailing_slash = parse_bool(val).ok_or_else(invalid)?,
                _ => {}
            }
        }
        Ok(cfg)
    }

    /// Persist the configuration in `key = value` format.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut buf = String::new();
        buf.push_str("# userdir-client configuration\n");
        buf.push_str("# refresh_ordering: latest-issued | last-completed\n\n");
        let _ = writeln!(buf, "api_url = {}", self.api_url);
        let _ = writeln!(buf, "timeout_secs = {}", self.timeout.as_secs());
        let _ = writeln!(buf, "refresh_ordering = {}", format_ordering(self.refresh_ordering));
        let _ = writeln!(buf, "trailing_slash = {}", self.trailing_slash);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, buf)
    }

    /// Load `path` if it exists; otherwise write the defaults there and return them.
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let cfg = Self::default();
        if let Err(e) = cfg.write_file(path) {
            tracing::debug!(path = %path.display(), error = %e, "could not write default config");
        }
        Ok(cfg)
    }
}

pub fn parse_ordering(s: &str) -> Option<RefreshOrdering> {
    match s.trim().to_ascii_lowercase().as_str() {
        "latest-issued" | "latest_issued" => Some(RefreshOrdering::LatestIssued),
        "last-completed" | "last_completed" => Some(RefreshOrdering::LastCompleted),
        _ => None,
    }
}

pub fn format_ordering(o: RefreshOrdering) -> &'static str {
    match o {
        RefreshOrdering::LatestIssued => "latest-issued",
        RefreshOrdering::LastCompleted => "last-completed",
    }
}

/// Pick the log filter: `--log-level` first, then a valid `RUST_LOG`, then `fallback`.
pub fn log_directive(cli_level: Option<&str>, rust_log: Option<&str>, fallback: &str) -> String {
    if let Some(level) = cli_level {
        return level.to_string();
    }
    match rust_log {
        Some(env) if !env.trim().is_empty() && EnvFilter::try_new(env).is_ok() => env.to_string(),
        _ => fallback.to_string(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_overrides_known_keys() {
        let text = "# comment\napi_url = http://svc:9000/api/v1\ntimeout_secs=5\n\
                    refresh_ordering = last-completed\ntrailing_slash = yes\nunknown = 1\n";
        let cfg = ClientConfig::parse(text, Path::new("client.conf")).unwrap();
        assert_eq!(cfg.api_url, "http://svc:9000/api/v1");
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.refresh_ordering, RefreshOrdering::LastCompleted);
        assert!(cfg.trailing_slash);
    }

    #[test]
    fn bad_value_reports_line() {
        let err = ClientConfig::parse("\ntimeout_secs = soon\n", Path::new("c.conf")).unwrap_err();
        assert_eq!(err.to_string(), "c.conf:2: invalid value for `timeout_secs`: soon");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ClientConfig::parse("timeout_secs = 0\n", Path::new("c.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { line: 1, .. }), "{err}");
    }

    #[test]
    fn rust_log_is_used_when_no_flag_is_given() {
        assert_eq!(log_directive(None, Some("debug"), "warn"), "debug");
        assert_eq!(log_directive(Some("trace"), Some("debug"), "warn"), "trace");
        assert_eq!(log_directive(None, None, "warn"), "warn");
        assert_eq!(log_directive(None, Some(""), "warn"), "warn");
        assert_eq!(log_directive(None, Some("userdir_client=loud"), "warn"), "warn");
    }

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = ClientConfig::parse("", Path::new("c.conf")).unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }
}

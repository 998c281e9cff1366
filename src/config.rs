//! TOML configuration file support
//!
//! ```toml
//! timeout = 30        # seconds per probe
//! concurrency = 100   # candidates in flight
//!
//! [[targets]]
//! label = "google"
//! url = "http://google.com/"
//! ```
//!
//! Every key is optional; missing keys keep the defaults of
//! [`CheckerConfig`].

use crate::proxy::{CheckerConfig, ProbeTarget};
use crate::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Checker settings as written in a configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Probe timeout in seconds
    pub timeout: Option<u64>,
    pub concurrency: Option<usize>,
    pub targets: Option<Vec<ProbeTarget>>,
}

impl FileConfig {
    /// Load a configuration file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply the file on top of `base` and validate the result
    pub fn apply(self, mut base: CheckerConfig) -> Result<CheckerConfig> {
        if let Some(timeout) = self.timeout {
            base = base.with_timeout(Duration::from_secs(timeout));
        }
        if let Some(concurrency) = self.concurrency {
            base = base.with_concurrency(concurrency);
        }
        if let Some(targets) = self.targets {
            base = base.with_targets(targets);
        }
        base.validate()?;
        Ok(base)
    }
}

/// Build the checker configuration from an optional file
pub fn load_checker_config(path: Option<&Path>) -> Result<CheckerConfig> {
    let file = match path {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    file.apply(CheckerConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_full_config() {
        let file = FileConfig::from_toml_str(
            r#"
timeout = 30
concurrency = 5

[[targets]]
label = "google"
url = "http://google.com/"

[[targets]]
label = "yandex"
url = "https://ya.ru/"
"#,
        )
        .unwrap();

        let config = file.apply(CheckerConfig::default()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.concurrency, 5);
        assert_eq!(
            config.targets,
            vec![
                ProbeTarget::new("google", "http://google.com/"),
                ProbeTarget::new("yandex", "https://ya.ru/"),
            ]
        );
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let file = FileConfig::from_toml_str("timeout = 3").unwrap();
        let config = file.apply(CheckerConfig::default()).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.targets, crate::proxy::default_targets());
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        let zero = FileConfig::from_toml_str("timeout = 0").unwrap();
        assert!(matches!(
            zero.apply(CheckerConfig::default()),
            Err(Error::InvalidConfig(_))
        ));

        let empty = FileConfig::from_toml_str("targets = []").unwrap();
        assert!(empty.apply(CheckerConfig::default()).is_err());

        assert!(matches!(
            FileConfig::from_toml_str("timeout = -1"),
            Err(Error::Toml(_))
        ));
        assert!(matches!(
            FileConfig::from_toml_str("unknown_key = 1"),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranker.toml");
        std::fs::write(&path, "concurrency = 7\n").unwrap();

        let config = load_checker_config(Some(&path)).unwrap();
        assert_eq!(config.concurrency, 7);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_checker_config(Some(&missing)),
            Err(Error::Io(_))
        ));
        assert_eq!(load_checker_config(None).unwrap(), CheckerConfig::default());
    }
}

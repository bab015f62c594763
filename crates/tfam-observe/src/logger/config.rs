use std::io::IsTerminal;

use serde::Deserialize;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "TFAM_LOG_FORMAT";
/// Environment variable holding the `EnvFilter` directive.
pub const LEVEL_ENV: &str = "TFAM_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `tfam_core=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by [`FORMAT_ENV`] and [`LEVEL_ENV`].
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the two variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(FORMAT_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.format = raw.parse().map_err(|e| LoggerError::InvalidEnv {
                var: FORMAT_ENV,
                source: Box::new(e),
            })?;
        }
        if let Some(raw) = lookup(LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.level = raw.trim().to_string();
        }
        if cfg.format != LoggerFormat::Text {
            cfg.use_color = false;
        }
        Ok(cfg)
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let cfg = LoggerConfig::from_lookup(|var| match var {
            FORMAT_ENV => Some("json".into()),
            LEVEL_ENV => Some(" tfam_core=debug,warn ".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "tfam_core=debug,warn");
        assert!(!cfg.use_color);
    }

    #[test]
    fn empty_variables_keep_defaults() {
        let cfg = LoggerConfig::from_lookup(|_| Some(String::new())).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Text);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn bad_format_names_the_variable() {
        let err = LoggerConfig::from_lookup(|var| (var == FORMAT_ENV).then(|| "xml".to_string())).unwrap_err();
        assert!(err.to_string().starts_with(FORMAT_ENV));
    }

    #[test]
    fn deserializes_partial_config() {
        let cfg: LoggerConfig = serde_json::from_str(r#"{"level":"debug","withTargets":false}"#).unwrap();
        assert_eq!(cfg.level, "debug");
        assert!(!cfg.with_targets);
        assert_eq!(cfg.format, LoggerFormat::Text);
    }
}

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    InvalidFormat(String),
    #[error("journald logging needs linux and the 'journald' feature")]
    JournaldNotSupported,
    #[error("a global logger is already installed")]
    AlreadyInitialized,
    #[error("logger setup failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log level directive '{0}'")]
    InvalidLogLevel(String),
    #[error("{var}: {source}")]
    InvalidEnv {
        var: &'static str,
        #[source]
        source: Box<LoggerError>,
    },
}

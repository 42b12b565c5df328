//! Error types for clusterprobe-core.

/// Errors produced by the command, polling and restore layers.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("\"{command}\" failed to meet expectedoutput {expected} within {retries} retries")]
    ConditionNotMet {
        command: String,
        expected: String,
        retries: u32,
    },

    #[error("command \"{command}\" exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("command \"{command}\" timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("failed to spawn \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("resource {0} was never captured")]
    UnknownResource(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for clusterprobe operations.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

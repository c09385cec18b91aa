use thiserror::Error;

/// Reasons an [`AccountConfig`](crate::AccountConfig) cannot be used to
/// connect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`user` is not set")]
    MissingUser,

    #[error("`pass` is not set")]
    MissingPassword,

    #[error("`user` is not a valid JID: {0}")]
    InvalidJid(String),

    #[error("`port` must be between 1 and 65535")]
    InvalidPort,
}

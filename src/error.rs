use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FactorizeError>;

#[derive(Debug, Error)]
pub enum FactorizeError {
    #[error("cannot open database {path:?}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("statement failed: {0}")]
    Statement(#[from] rusqlite::Error),

    #[error("changes were not saved")]
    OperatorDecline,

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

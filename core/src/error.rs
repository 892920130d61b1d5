use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BashBrosErr>;

#[derive(Error, Debug)]
pub enum BashBrosErr {
    /// The session store could not be opened or written. Hook call sites
    /// treat this as fail-open unless `store.failClosed` is set.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// A fixed string code read back from the store (or a config file) did
    /// not match any known enum member. Rejected at the read boundary to
    /// catch schema drift early.
    #[error("unknown {kind} code: `{code}`")]
    UnknownCode { kind: &'static str, code: String },

    /// Config file was found but could not be parsed. Call sites log this
    /// and fall back to the default config; it never crashes the evaluator.
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("egress block {0} not found")]
    BlockNotFound(i64),

    #[error("session {0} not found")]
    SessionNotFound(String),

    // -----------------------------------------------------------------
    // Automatic conversions for common external error types
    // -----------------------------------------------------------------
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

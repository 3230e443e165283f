use std::path::PathBuf;

use format_api::FormatError;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("console output failed: {0}")]
    Console(#[from] std::io::Error),
}

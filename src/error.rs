use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MigrateError {
    #[error("cannot reach report server: {0}")]
    #[diagnostic(help("check the server URL and credentials"))]
    Connection(String),

    #[error("report server returned status {status}: {message}")]
    ProtocolStatus { status: u16, message: String },

    #[error("unexpected report server response: {0}")]
    Protocol(String),

    #[error("invalid report definition: {0}")]
    Document(String),

    #[error("{item}: {source}")]
    Item {
        item: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("invalid catalog path: {0}")]
    InvalidPath(String),

    #[error("invalid catalog item name: {0}")]
    InvalidItemName(String),

    #[error("no report definitions to upload")]
    EmptyBatch,

    #[error("missing connection setting: {0}")]
    #[diagnostic(help("set it in rdlm.json, the RDLM_* environment, or on the command line"))]
    MissingSetting(&'static str),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl MigrateError {
    /// Wraps a per-item failure with the identifier of the item it belongs to.
    pub fn for_item(item: impl Into<String>, source: MigrateError) -> Self {
        MigrateError::Item {
            item: item.into(),
            source: Box::new(source),
        }
    }

    /// The server is unreachable or refuses the credentials. Outside a batch
    /// this ends the operation; inside one it fails only the current item.
    pub fn is_fatal(&self) -> bool {
        match self {
            MigrateError::Connection(_) => true,
            MigrateError::Item { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Message without the item prefix, as recorded in a batch outcome.
    pub fn detail(&self) -> String {
        match self {
            MigrateError::Item { source, .. } => source.detail(),
            other => other.to_string(),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Serialize, Serializer};

use crate::error::MigrateError;

const SERVICE_ENDPOINT: &str = "ReportService2010.asmx";

/// Kind of a catalog entry, as reported by the service's `TypeName` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemType {
    Report,
    Folder,
    DataSource,
    Other(String),
}

impl ItemType {
    pub fn from_type_name(value: &str) -> Self {
        match value {
            "Report" => ItemType::Report,
            "Folder" => ItemType::Folder,
            "DataSource" => ItemType::DataSource,
            other => ItemType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Report => "Report",
            ItemType::Folder => "Folder",
            ItemType::DataSource => "DataSource",
            ItemType::Other(name) => name,
        }
    }
}

impl Serialize for ItemType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Filter accepted by the CLI when listing a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ItemKind {
    Report,
    Folder,
    DataSource,
}

impl ItemKind {
    pub fn matches(self, item_type: &ItemType) -> bool {
        matches!(
            (self, item_type),
            (ItemKind::Report, ItemType::Report)
                | (ItemKind::Folder, ItemType::Folder)
                | (ItemKind::DataSource, ItemType::DataSource)
        )
    }
}

/// One entry of the remote catalog. Fields come verbatim from the service;
/// timestamps stay in the service's own format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogItem {
    pub name: String,
    pub path: String,
    pub item_type: ItemType,
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub data_source_path: Option<String>,
}

impl CatalogItem {
    pub fn is_report(&self) -> bool {
        self.item_type == ItemType::Report
    }
}

/// File name a downloaded definition is stored under.
pub fn definition_file_name(name: &str) -> String {
    format!("{name}.rdl")
}

/// Absolute catalog path such as `/Finance/Monthly`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CatalogPath(String);

impl CatalogPath {
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path of a direct child named `name`.
    pub fn join(&self, name: &str) -> Result<Self, MigrateError> {
        let name = validate_item_name(name)?;
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }
}

impl fmt::Display for CatalogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CatalogPath {
    type Err = MigrateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if !trimmed.starts_with('/') || trimmed.contains("//") {
            return Err(MigrateError::InvalidPath(value.to_string()));
        }
        let normalized = trimmed.trim_end_matches('/');
        if normalized.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self(normalized.to_string()))
    }
}

fn validate_item_name(name: &str) -> Result<&str, MigrateError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(MigrateError::InvalidItemName(name.to_string()));
    }
    Ok(trimmed)
}

/// Server location and credentials for one batch of remote calls.
#[derive(Clone)]
pub struct ConnectionContext {
    server_url: String,
    endpoint: String,
    username: String,
    password: String,
}

impl ConnectionContext {
    pub fn new(
        server_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, MigrateError> {
        let server_url = server_url.trim().trim_end_matches('/').to_string();
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(MigrateError::Connection(format!(
                "server URL must start with http:// or https://: {server_url}"
            )));
        }
        let endpoint = if server_url.ends_with(SERVICE_ENDPOINT) {
            server_url.clone()
        } else {
            format!("{server_url}/{SERVICE_ENDPOINT}")
        };
        Ok(Self {
            server_url,
            endpoint,
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A report definition queued for upload.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ReportDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Name the report is created under: trimmed, never empty.
    pub fn report_name(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            "UnnamedReport"
        } else {
            trimmed
        }
    }
}

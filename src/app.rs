use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::batch::{BatchOutcome, collect_batch, run_batch};
use crate::catalog::CatalogClient;
use crate::domain::{
    CatalogItem, CatalogPath, ConnectionContext, ItemType, ReportDocument, definition_file_name,
};
use crate::error::MigrateError;
use crate::events::{EventSink, OperationEvent};
use crate::rewriter;
use crate::transport::{HttpTransport, SoapTransport};

pub const DEFAULT_UPLOAD_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub data_source_path: Option<String>,
    pub overwrite: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            data_source_path: None,
            overwrite: true,
        }
    }
}

/// Definitions fetched by a download, keyed by `<name>.rdl`, plus the
/// record of which items could not be fetched.
#[derive(Debug, Clone, Default)]
pub struct DownloadResult {
    pub files: BTreeMap<String, Vec<u8>>,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataRow {
    pub name: String,
    pub path: String,
    pub data_source_path: String,
    pub created_at: String,
    pub modified_at: String,
}

impl From<&CatalogItem> for MetadataRow {
    fn from(item: &CatalogItem) -> Self {
        Self {
            name: item.name.clone(),
            path: item.path.clone(),
            data_source_path: item.data_source_path.clone().unwrap_or_default(),
            created_at: item.created_at.clone().unwrap_or_default(),
            modified_at: item.modified_at.clone().unwrap_or_default(),
        }
    }
}

/// Upload, download and export over one catalog connection. Items within a
/// batch are processed one at a time, in input order.
pub struct App<T: SoapTransport> {
    catalog: CatalogClient<T>,
    sink: Arc<dyn EventSink>,
    upload_limit: usize,
}

impl App<HttpTransport> {
    pub fn connect(
        context: ConnectionContext,
        timeout: Duration,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, MigrateError> {
        let transport = HttpTransport::new(context, timeout, sink.clone())?;
        Ok(Self::new(transport, sink))
    }
}

impl<T: SoapTransport> App<T> {
    pub fn new(transport: T, sink: Arc<dyn EventSink>) -> Self {
        Self {
            catalog: CatalogClient::new(transport),
            sink,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
        }
    }

    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.upload_limit = limit;
        self
    }

    pub fn catalog(&self) -> &CatalogClient<T> {
        &self.catalog
    }

    /// True when the root folder can be listed and is not empty. A reachable
    /// but empty catalog therefore reports `false`.
    pub fn check_connection(&self) -> Result<bool, MigrateError> {
        let items = self.catalog.list_children(&CatalogPath::root(), false)?;
        Ok(!items.is_empty())
    }

    pub fn list_children(
        &self,
        path: &CatalogPath,
        recursive: bool,
    ) -> Result<Vec<CatalogItem>, MigrateError> {
        self.catalog.list_children(path, recursive)
    }

    /// Shared data sources anywhere below `path`.
    pub fn list_data_sources(&self, path: &CatalogPath) -> Result<Vec<CatalogItem>, MigrateError> {
        self.list_of_type(path, true, ItemType::DataSource)
    }

    /// Reports directly inside `folder`.
    pub fn list_reports(&self, folder: &CatalogPath) -> Result<Vec<CatalogItem>, MigrateError> {
        self.list_of_type(folder, false, ItemType::Report)
    }

    /// Reports anywhere below `folder`, with their timestamps. One listing
    /// call, no per-item requests.
    pub fn report_metadata(&self, folder: &CatalogPath) -> Result<Vec<CatalogItem>, MigrateError> {
        self.list_of_type(folder, true, ItemType::Report)
    }

    fn list_of_type(
        &self,
        path: &CatalogPath,
        recursive: bool,
        item_type: ItemType,
    ) -> Result<Vec<CatalogItem>, MigrateError> {
        let items = self.catalog.list_children(path, recursive)?;
        Ok(items
            .into_iter()
            .filter(|item| item.item_type == item_type)
            .collect())
    }

    /// Creates each document as a report in `folder`, optionally rebinding
    /// its data sources first. Documents past the upload limit are dropped
    /// before anything is sent.
    pub fn upload_batch(
        &self,
        folder: &CatalogPath,
        documents: Vec<ReportDocument>,
        options: &UploadOptions,
    ) -> Result<BatchOutcome, MigrateError> {
        if documents.is_empty() {
            return Err(MigrateError::EmptyBatch);
        }
        let dropped = documents.len().saturating_sub(self.upload_limit);
        if dropped > 0 {
            self.sink.record(OperationEvent::warning(
                "upload",
                folder.as_str(),
                format!(
                    "{dropped} document(s) over the batch limit of {} were not sent",
                    self.upload_limit
                ),
            ));
        }
        let data_source = options
            .data_source_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty());

        let mut outcome = run_batch(
            documents.into_iter().take(self.upload_limit),
            |document| document.name.clone(),
            |document| {
                self.tracked("upload.item", &document.name, || {
                    self.upload_one(folder, &document, data_source, options.overwrite)
                })
            },
        );
        outcome.dropped = dropped;
        self.record_summary("upload", folder, &outcome);
        Ok(outcome)
    }

    fn upload_one(
        &self,
        folder: &CatalogPath,
        document: &ReportDocument,
        data_source: Option<&str>,
        overwrite: bool,
    ) -> Result<(), MigrateError> {
        let definition = match data_source {
            Some(path) => rewriter::rebind(&document.bytes, path)?,
            None => document.bytes.clone(),
        };
        self.catalog
            .create_report(folder, document.report_name(), &definition, overwrite)
    }

    /// Every report below `folder`. Fails only if the listing itself fails.
    pub fn download_all(&self, folder: &CatalogPath) -> Result<DownloadResult, MigrateError> {
        let reports = self.report_metadata(folder)?;
        let targets = reports
            .into_iter()
            .map(|item| (item.name, item.path))
            .collect::<Vec<_>>();
        Ok(self.download(folder, targets))
    }

    /// The named reports inside `folder`.
    pub fn download_selected(
        &self,
        folder: &CatalogPath,
        names: &[String],
    ) -> Result<DownloadResult, MigrateError> {
        let targets = names
            .iter()
            .map(|name| {
                let path = folder
                    .join(name)
                    .map(|path| path.to_string())
                    .unwrap_or_default();
                (name.trim().to_string(), path)
            })
            .collect::<Vec<_>>();
        Ok(self.download(folder, targets))
    }

    fn download(&self, folder: &CatalogPath, targets: Vec<(String, String)>) -> DownloadResult {
        let (fetched, outcome) = collect_batch(
            targets,
            |(name, _)| name.clone(),
            |(name, path)| {
                self.tracked("download.item", &name, || {
                    if path.is_empty() {
                        return Err(MigrateError::InvalidItemName(name.clone()));
                    }
                    self.catalog.get_item_definition(&path)
                })
            },
        );

        let mut files = BTreeMap::new();
        for (name, bytes) in fetched {
            let file_name = definition_file_name(&name);
            if files.insert(file_name.clone(), bytes).is_some() {
                self.sink.record(OperationEvent::warning(
                    "download",
                    file_name,
                    "duplicate report name, keeping the later one",
                ));
            }
        }
        self.record_summary("download", folder, &outcome);
        DownloadResult { files, outcome }
    }

    fn record_summary(&self, operation: &str, folder: &CatalogPath, outcome: &BatchOutcome) {
        let event = if outcome.is_clean() {
            OperationEvent::succeeded(operation, folder.as_str())
        } else {
            OperationEvent::failed(
                operation,
                folder.as_str(),
                format!(
                    "{} of {} item(s) failed",
                    outcome.failed,
                    outcome.attempted()
                ),
            )
        };
        self.sink.record(event);
    }

    fn tracked<V>(
        &self,
        operation: &str,
        item: &str,
        op: impl FnOnce() -> Result<V, MigrateError>,
    ) -> Result<V, MigrateError> {
        match op() {
            Ok(value) => {
                self.sink.record(OperationEvent::succeeded(operation, item));
                Ok(value)
            }
            Err(err) => {
                self.sink
                    .record(OperationEvent::failed(operation, item, err.to_string()));
                Err(err)
            }
        }
    }
}

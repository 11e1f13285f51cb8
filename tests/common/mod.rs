#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use roxmltree::Document;

use rdl_migrator::envelope::{
    Operation, REPORT_SERVER_NS, escape_text, find_by_local_name, text_content,
};
use rdl_migrator::error::MigrateError;
use rdl_migrator::transport::SoapTransport;

#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub type_name: String,
    pub definition: Option<Vec<u8>>,
}

/// In-memory catalog answering the three SOAP operations the client uses.
#[derive(Default)]
pub struct FakeCatalog {
    entries: Mutex<BTreeMap<String, Entry>>,
    rejected_names: Vec<String>,
    dropped_names: Vec<String>,
    pub requests: Mutex<Vec<(String, String)>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads of reports with these names fail with a server fault.
    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            rejected_names: names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Calls touching an item with this name fail as if the server had
    /// refused the credentials mid-batch.
    pub fn dropping_connection_on(mut self, name: &str) -> Self {
        self.dropped_names.push(name.to_string());
        self
    }

    fn connection_lost(&self, name: &str) -> Result<(), MigrateError> {
        if self.dropped_names.iter().any(|dropped| dropped == name) {
            return Err(MigrateError::Connection(
                "authentication rejected (403)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_folder(self, path: &str) -> Self {
        self.insert(path, "Folder", None);
        self
    }

    pub fn with_report(self, path: &str, definition: &[u8]) -> Self {
        self.insert(path, "Report", Some(definition.to_vec()));
        self
    }

    pub fn with_data_source(self, path: &str) -> Self {
        self.insert(path, "DataSource", None);
        self
    }

    fn insert(&self, path: &str, type_name: &str, definition: Option<Vec<u8>>) {
        self.entries.lock().unwrap().insert(
            path.to_string(),
            Entry {
                path: path.to_string(),
                type_name: type_name.to_string(),
                definition,
            },
        );
    }

    pub fn definition(&self, path: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .and_then(|entry| entry.definition.clone())
    }

    /// Keeps the item listed but makes its definition unavailable.
    pub fn forget_definition(&self, path: &str) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(path) {
            entry.definition = None;
        }
    }

    pub fn operations(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(action, _)| action.rsplit('/').next().unwrap_or_default().to_string())
            .collect()
    }

    fn list_children(&self, parent: &str, recursive: bool) -> String {
        let prefix = if parent == "/" {
            "/".to_string()
        } else {
            format!("{parent}/")
        };
        let entries = self.entries.lock().unwrap();
        let items: String = entries
            .values()
            .filter(|entry| entry.path.starts_with(&prefix))
            .filter(|entry| recursive || !entry.path[prefix.len()..].contains('/'))
            .map(|entry| {
                let name = entry.path.rsplit('/').next().unwrap_or_default();
                format!(
                    "<CatalogItem><Name>{}</Name><Path>{}</Path><TypeName>{}</TypeName>\
                     <CreationDate>2024-05-01T08:00:00</CreationDate>\
                     <ModifiedDate>2024-05-02T09:30:00</ModifiedDate></CatalogItem>",
                    escape_text(name),
                    escape_text(&entry.path),
                    entry.type_name
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><ListChildrenResponse xmlns="{REPORT_SERVER_NS}"><CatalogItems>{items}</CatalogItems></ListChildrenResponse></soap:Body></soap:Envelope>"#
        )
    }

    fn create(&self, doc: &Document<'_>) -> Result<String, MigrateError> {
        let name = field(doc, "Name");
        let parent = field(doc, "Parent");
        let overwrite = field(doc, "Overwrite") == "true";
        self.connection_lost(&name)?;
        if self.rejected_names.contains(&name) {
            return Err(fault(&format!("The report '{name}' was rejected.")));
        }
        let definition = STANDARD
            .decode(field(doc, "Definition"))
            .map_err(|err| fault(&err.to_string()))?;
        let path = if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        };
        if !overwrite && self.entries.lock().unwrap().contains_key(&path) {
            return Err(fault(&format!("The item '{path}' already exists.")));
        }
        self.insert(&path, "Report", Some(definition));
        Ok(format!(
            r#"<CreateCatalogItemResponse xmlns="{REPORT_SERVER_NS}"><ItemInfo><Path>{}</Path></ItemInfo></CreateCatalogItemResponse>"#,
            escape_text(&path)
        ))
    }

    fn get_definition(&self, path: &str) -> Result<String, MigrateError> {
        self.connection_lost(path.rsplit('/').next().unwrap_or_default())?;
        let definition = self
            .definition(path)
            .ok_or_else(|| fault(&format!("The item '{path}' cannot be found.")))?;
        Ok(format!(
            r#"<GetItemDefinitionResponse xmlns="{REPORT_SERVER_NS}"><Definition>{}</Definition></GetItemDefinitionResponse>"#,
            STANDARD.encode(definition)
        ))
    }
}

impl SoapTransport for FakeCatalog {
    fn send(&self, envelope_xml: &str, action: &str) -> Result<String, MigrateError> {
        self.requests
            .lock()
            .unwrap()
            .push((action.to_string(), envelope_xml.to_string()));
        let doc = Document::parse(envelope_xml).unwrap();
        if action == Operation::ListChildren.action_uri() {
            Ok(self.list_children(&field(&doc, "ItemPath"), field(&doc, "Recursive") == "true"))
        } else if action == Operation::CreateCatalogItem.action_uri() {
            self.create(&doc)
        } else if action == Operation::GetItemDefinition.action_uri() {
            self.get_definition(&field(&doc, "ItemPath"))
        } else {
            Err(fault("unknown action"))
        }
    }
}

/// Transport whose every call fails as if the server were unreachable.
pub struct DeadServer;

impl SoapTransport for DeadServer {
    fn send(&self, _envelope_xml: &str, _action: &str) -> Result<String, MigrateError> {
        Err(MigrateError::Connection("connection refused".to_string()))
    }
}

fn field(doc: &Document<'_>, name: &str) -> String {
    find_by_local_name(doc, name)
        .map(text_content)
        .unwrap_or_default()
}

fn fault(message: &str) -> MigrateError {
    MigrateError::ProtocolStatus {
        status: 500,
        message: message.to_string(),
    }
}

pub fn rdl_with_data_sources(names: &[&str]) -> Vec<u8> {
    let sources: String = names
        .iter()
        .map(|name| {
            format!(
                "\n    <DataSource Name=\"{name}\">\n      <ConnectionProperties>\n        <DataProvider>SQL</DataProvider>\n        <ConnectString>Data Source=.;Initial Catalog={name}</ConnectString>\n      </ConnectionProperties>\n    </DataSource>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<Report xmlns=\"http://schemas.microsoft.com/sqlserver/reporting/2016/01/reportdefinition\">\n  <DataSources>{sources}\n  </DataSources>\n  <ReportSections />\n</Report>"
    )
    .into_bytes()
}
